use std::path::PathBuf;
use std::time::{Duration, Instant};

use slide_viewer::events::Jump;
use slide_viewer::tasks::viewer::navigation::{Navigator, Removal, SlideOrder};

fn paths(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("/lib/{i:03}.jpg"))).collect()
}

#[test]
fn next_and_previous_are_cyclic() {
    let now = Instant::now();
    for n in 1..=7 {
        for start in 0..n {
            let mut nav = Navigator::new(paths(n), false, None, now).unwrap();
            assert!(nav.jump_to(Jump::Index(start), now) || start == 0);
            for _ in 0..n {
                nav.next(now);
            }
            assert_eq!(nav.index(), start, "next x{n} from {start}");
            for _ in 0..n {
                nav.previous(now);
            }
            assert_eq!(nav.index(), start, "previous x{n} from {start}");
        }
    }
}

#[test]
fn next_from_last_wraps_to_first() {
    let now = Instant::now();
    let mut nav = Navigator::new(paths(4), false, None, now).unwrap();
    nav.jump_to(Jump::Last, now);
    nav.next(now);
    assert_eq!(nav.index(), 0);
    nav.previous(now);
    assert_eq!(nav.index(), 3);
}

#[test]
fn delete_keeps_index_in_range_and_drops_the_slide() {
    let now = Instant::now();
    for n in 2..=6 {
        for start in 0..n {
            let mut nav = Navigator::new(paths(n), false, None, now).unwrap();
            nav.jump_to(Jump::Index(start), now);
            let expected_removed = nav.current().unwrap().to_path_buf();
            let removal = nav.remove_current(now).unwrap();
            assert_eq!(removal, Removal::Removed(expected_removed.clone()));
            assert_eq!(nav.len(), n - 1);
            assert!(nav.index() < nav.len());
            assert!(!nav.slides().contains(&expected_removed));
            assert_ne!(nav.current().unwrap(), expected_removed.as_path());
        }
    }
}

#[test]
fn deleting_everything_exhausts_the_list() {
    let now = Instant::now();
    let mut nav = Navigator::new(paths(3), true, Some(1), now).unwrap();
    assert!(matches!(nav.remove_current(now), Some(Removal::Removed(_))));
    assert!(matches!(nav.remove_current(now), Some(Removal::Removed(_))));
    assert!(matches!(nav.remove_current(now), Some(Removal::Exhausted(_))));
    assert!(nav.is_empty());
    assert_eq!(nav.remove_current(now), None);
}

#[test]
fn toggling_order_keeps_the_current_slide() {
    let now = Instant::now();
    let mut nav = Navigator::new(paths(25), true, Some(42), now).unwrap();
    for step in 0..10 {
        nav.next(now);
        if step % 3 == 0 {
            nav.next(now);
        }
        let before = nav.current().unwrap().to_path_buf();
        let order = nav.toggle_order();
        assert_eq!(nav.current().unwrap(), before.as_path());
        if order == SlideOrder::Sorted {
            let mut sorted = nav.slides().to_vec();
            sorted.sort();
            assert_eq!(nav.slides(), sorted.as_slice());
        }
    }
}

#[test]
fn auto_advance_fires_once_per_interval() {
    let t0 = Instant::now();
    let mut nav = Navigator::new(paths(10), false, None, t0).unwrap();
    nav.set_auto_advance(3, t0);

    let mut fired_at = Vec::new();
    for k in 1..=95u64 {
        let now = t0 + Duration::from_millis(100 * k);
        if nav.on_tick(now) {
            fired_at.push(k);
        }
    }
    assert_eq!(fired_at, vec![30, 60, 90]);
    assert_eq!(nav.index(), 3);
}

#[test]
fn manual_navigation_restarts_the_interval() {
    let t0 = Instant::now();
    let mut nav = Navigator::new(paths(10), false, None, t0).unwrap();
    nav.set_auto_advance(2, t0);
    nav.next(t0 + Duration::from_millis(1500));
    assert!(!nav.on_tick(t0 + Duration::from_millis(2000)));
    assert!(!nav.on_tick(t0 + Duration::from_millis(3400)));
    assert!(nav.on_tick(t0 + Duration::from_millis(3500)));
    assert_eq!(nav.index(), 2);
}

#[test]
fn zero_interval_disables_auto_advance() {
    let t0 = Instant::now();
    let mut nav = Navigator::new(paths(3), false, None, t0).unwrap();
    nav.set_auto_advance(4, t0);
    nav.set_auto_advance(0, t0 + Duration::from_secs(1));
    assert!(!nav.on_tick(t0 + Duration::from_secs(60)));
    assert_eq!(nav.index(), 0);
}
