mod common;

use std::sync::atomic::Ordering;
use std::time::Instant;

use common::{FakeBackend, RecordingTrash, settle, write_png};
use slide_viewer::events::{Action, Response};
use slide_viewer::gpu::frame::FrameSource;
use slide_viewer::processing::scale_plan::Size;
use slide_viewer::tasks::prefetch::{PrefetchCache, prefetch_one};
use slide_viewer::tasks::viewer::{Session, SessionOptions};
use slide_viewer::processing::kernels::ResampleKernel;
use tempfile::tempdir;

fn options() -> SessionOptions {
    SessionOptions {
        kernel: ResampleKernel::Lanczos,
        scaling: true,
        shuffle: false,
        seed: None,
        auto_advance_secs: 0,
        super_sampling: true,
        show_info: false,
    }
}

#[test]
fn cache_holds_only_scheduled_neighbors() {
    let tmp = tempdir().unwrap();
    let a = write_png(tmp.path(), "a.png", 8, 6);
    let b = write_png(tmp.path(), "b.png", 8, 6);
    let c = write_png(tmp.path(), "c.png", 8, 6);
    let backend = FakeBackend::new(false);
    let mut cache = PrefetchCache::spawn(backend.clone(), false);

    cache.schedule(&[a.clone(), b.clone()], Size::new(80, 60), true);
    settle(&mut cache, &[a.clone(), b.clone()]);
    assert_eq!(cache.len(), 2);

    cache.schedule(&[b.clone(), c.clone()], Size::new(80, 60), true);
    assert!(!cache.contains(&a), "non-adjacent entry must be dropped");
    settle(&mut cache, &[c.clone()]);
    assert!(cache.contains(&b));
    assert!(cache.contains(&c));
    assert_eq!(backend.uploads_of(&b), 1, "cached entries are not rebuilt");

    let taken = cache.take(&b).unwrap();
    assert_eq!(taken.texture.path, b);
    assert!(!cache.contains(&b));
    assert_eq!(cache.len(), 1);
}

#[test]
fn unwanted_results_are_discarded_on_arrival() {
    let tmp = tempdir().unwrap();
    let a = write_png(tmp.path(), "a.png", 8, 6);
    let b = write_png(tmp.path(), "b.png", 8, 6);
    let backend = FakeBackend::new(false);
    let mut cache = PrefetchCache::spawn(backend, false);

    cache.schedule(&[a.clone()], Size::new(80, 60), true);
    cache.schedule(&[b.clone()], Size::new(80, 60), true);
    settle(&mut cache, &[a.clone(), b.clone()]);
    assert!(!cache.contains(&a));
    assert!(cache.contains(&b));
}

#[test]
fn broken_neighbors_are_not_cached() {
    let tmp = tempdir().unwrap();
    let bad = tmp.path().join("bad.png");
    std::fs::write(&bad, b"definitely not an image").unwrap();
    let mut cache = PrefetchCache::spawn(FakeBackend::new(false), false);
    cache.schedule(&[bad.clone()], Size::new(80, 60), true);
    settle(&mut cache, &[bad.clone()]);
    assert!(cache.is_empty());
}

#[test]
fn upscale_neighbors_get_a_prebuilt_scaler() {
    let tmp = tempdir().unwrap();
    let small = write_png(tmp.path(), "small.png", 20, 15);
    let large = write_png(tmp.path(), "large.png", 200, 150);
    let backend = FakeBackend::new(true);

    let entry = prefetch_one(backend.as_ref(), &small, Size::new(80, 60), true, true).unwrap();
    let scaler = entry.scaler.expect("upscale should prebuild");
    assert!(scaler.matches(Size::new(20, 15), Size::new(80, 60)));

    let entry = prefetch_one(backend.as_ref(), &large, Size::new(80, 60), true, true).unwrap();
    assert!(entry.scaler.is_none());

    let entry = prefetch_one(backend.as_ref(), &small, Size::new(80, 60), true, false).unwrap();
    assert!(entry.scaler.is_none(), "disabled super-sampling builds nothing");
}

#[test]
fn navigating_forward_moves_the_neighbor_out_of_the_cache() {
    let tmp = tempdir().unwrap();
    let slides: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| write_png(tmp.path(), &format!("{n}.png"), 16, 12))
        .collect();
    let (a, b, c, d) = (&slides[0], &slides[1], &slides[2], &slides[3]);
    let backend = FakeBackend::new(false);
    let now = Instant::now();
    let mut session = Session::new(
        backend.clone(),
        slides.clone(),
        options(),
        Box::new(RecordingTrash::default()),
        Size::new(160, 120),
        now,
    )
    .unwrap();

    settle(session.prefetch_mut(), &[b.clone(), d.clone()]);
    assert!(session.prefetch().contains(b));
    assert!(session.prefetch().contains(d));

    session.handle(Action::Next, now);
    let current = session.textures().current().unwrap();
    assert_eq!(&current.path, b);
    assert!(!session.prefetch().contains(b), "current slide must not stay cached");
    assert!(!session.prefetch().contains(d), "d is no longer adjacent");

    settle(session.prefetch_mut(), &[a.clone(), c.clone()]);
    assert!(session.prefetch().contains(a));
    assert!(session.prefetch().contains(c));
    assert_eq!(backend.uploads_of(b), 1, "b was adopted, not decoded again");
    assert!(backend.scalers_built.load(Ordering::SeqCst) == 0);
}

#[test]
fn superseded_jobs_are_skipped_before_decoding() {
    let tmp = tempdir().unwrap();
    let paths: Vec<_> = (0..8)
        .map(|i| write_png(tmp.path(), &format!("{i}.png"), 8, 6))
        .collect();
    let backend = FakeBackend::new(false);
    let (release, gate) = crossbeam_channel::bounded::<()>(0);
    *backend.gate.lock().unwrap() = Some(gate);
    let mut cache = PrefetchCache::spawn(backend.clone(), false);

    // The worker holds at most one job in its upload while the rest queue up.
    for path in &paths {
        cache.schedule(std::slice::from_ref(path), Size::new(80, 60), true);
    }
    drop(release);
    settle(&mut cache, &paths);

    let last = paths.last().unwrap();
    assert!(cache.contains(last));
    assert_eq!(cache.len(), 1);
    assert_eq!(backend.uploads_of(last), 1);
    assert!(
        backend.total_uploads() <= 2,
        "only the job already in progress and the wanted one are uploaded, got {}",
        backend.total_uploads()
    );
}

#[test]
fn taking_a_pending_slide_waits_instead_of_decoding_again() {
    let tmp = tempdir().unwrap();
    let slides: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|n| write_png(tmp.path(), &format!("{n}.png"), 16, 12))
        .collect();
    let b = &slides[1];
    let backend = FakeBackend::new(false);
    let now = Instant::now();
    let mut session = Session::new(
        backend.clone(),
        slides.clone(),
        options(),
        Box::new(RecordingTrash::default()),
        Size::new(160, 120),
        now,
    )
    .unwrap();

    // No settling: b may still be queued or decoding when it becomes current.
    session.handle(Action::Next, now);
    assert_eq!(&session.textures().current().unwrap().path, b);
    let pending: Vec<_> = slides.clone();
    settle(session.prefetch_mut(), &pending);
    assert_eq!(backend.uploads_of(b), 1);
}

#[test]
fn prefetched_scaler_is_reused_until_the_viewport_changes() {
    let tmp = tempdir().unwrap();
    let slides: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|n| write_png(tmp.path(), &format!("{n}.png"), 8, 6))
        .collect();
    let (a, b, c) = (&slides[0], &slides[1], &slides[2]);
    let backend = FakeBackend::new(true);
    let now = Instant::now();
    let small = Size::new(80, 60);
    let large = Size::new(160, 120);
    let mut session = Session::new(
        backend.clone(),
        slides.clone(),
        options(),
        Box::new(RecordingTrash::default()),
        small,
        now,
    )
    .unwrap();
    settle(session.prefetch_mut(), &[b.clone(), c.clone()]);
    assert_eq!(backend.scalers_built(), 2, "both upscaling neighbours prebuilt");

    // Same viewport: b's prebuilt scaler is adopted as is.
    session.handle(Action::Next, now);
    settle(session.prefetch_mut(), &[a.clone()]);
    let before = backend.scalers_built();
    let seq = session.produce_frame(small).unwrap();
    assert_eq!(backend.scalers_built(), before);
    assert_eq!(seq.super_sample.as_ref().unwrap().output, small);
    drop(seq);

    // c was prefetched for the old viewport; its scaler is void and rebuilt.
    assert_eq!(session.resize(large), Response::Redraw);
    session.handle(Action::Next, now);
    assert_eq!(&session.textures().current().unwrap().path, c);
    settle(session.prefetch_mut(), &[a.clone(), b.clone()]);
    let before = backend.scalers_built();
    let seq = session.produce_frame(large).unwrap();
    assert_eq!(backend.scalers_built(), before + 1);
    let pass = seq.super_sample.as_ref().unwrap();
    assert_eq!(pass.input, Size::new(8, 6));
    assert_eq!(pass.output, large);
    assert!(seq.ordering_is_sound());
}
