use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::MAX_AUTO_ADVANCE_SECS;
use crate::events::Jump;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideOrder {
    Shuffled,
    Sorted,
}

#[derive(Debug, Clone, Copy)]
struct AutoAdvance {
    interval: Duration,
    last_change: Instant,
}

/// Slide list, current position and auto-advance timer.
///
/// The list is never empty while a `Navigator` exists from the caller's point
/// of view: removing the last slide returns `Removal::Exhausted` and the
/// session is expected to end.
pub struct Navigator {
    slides: Vec<PathBuf>,
    index: usize,
    order: SlideOrder,
    rng: StdRng,
    auto: AutoAdvance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// The slide was removed; the current slide is now another one.
    Removed(PathBuf),
    /// The removed slide was the last one.
    Exhausted(PathBuf),
}

impl Navigator {
    /// Returns `None` for an empty list.
    pub fn new(
        mut slides: Vec<PathBuf>,
        shuffle: bool,
        seed: Option<u64>,
        now: Instant,
    ) -> Option<Self> {
        if slides.is_empty() {
            return None;
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let order = if shuffle {
            slides.shuffle(&mut rng);
            SlideOrder::Shuffled
        } else {
            slides.sort();
            SlideOrder::Sorted
        };
        Some(Self {
            slides,
            index: 0,
            order,
            rng,
            auto: AutoAdvance {
                interval: Duration::ZERO,
                last_change: now,
            },
        })
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Path> {
        self.slides.get(self.index).map(PathBuf::as_path)
    }

    pub fn slides(&self) -> &[PathBuf] {
        &self.slides
    }

    pub fn order(&self) -> SlideOrder {
        self.order
    }

    pub fn next(&mut self, now: Instant) {
        let n = self.slides.len();
        if n > 0 {
            self.index = (self.index + 1) % n;
        }
        self.auto.last_change = now;
    }

    pub fn previous(&mut self, now: Instant) {
        let n = self.slides.len();
        if n > 0 {
            self.index = (self.index + n - 1) % n;
        }
        self.auto.last_change = now;
    }

    /// Returns `false` when the target is out of range or already current.
    pub fn jump_to(&mut self, jump: Jump, now: Instant) -> bool {
        let n = self.slides.len();
        let target = match jump {
            Jump::First => 0,
            Jump::Last => n.saturating_sub(1),
            Jump::Index(i) => i,
        };
        if target >= n || target == self.index {
            return false;
        }
        self.index = target;
        self.auto.last_change = now;
        true
    }

    /// Removes the current slide and re-clamps the index.
    ///
    /// The slide after the removed one moves into its position; removing the
    /// old last slide lands on the new last slide.
    pub fn remove_current(&mut self, now: Instant) -> Option<Removal> {
        if self.slides.is_empty() {
            return None;
        }
        let removed = self.slides.remove(self.index);
        self.auto.last_change = now;
        if self.slides.is_empty() {
            self.index = 0;
            return Some(Removal::Exhausted(removed));
        }
        if self.index == self.slides.len() {
            self.index = self.slides.len() - 1;
        }
        Some(Removal::Removed(removed))
    }

    /// Switches between shuffled and sorted order without changing the current slide.
    pub fn toggle_order(&mut self) -> SlideOrder {
        let current = self.slides.get(self.index).cloned();
        self.order = match self.order {
            SlideOrder::Sorted => {
                self.slides.shuffle(&mut self.rng);
                SlideOrder::Shuffled
            }
            SlideOrder::Shuffled => {
                self.slides.sort();
                SlideOrder::Sorted
            }
        };
        if let Some(current) = current {
            if let Some(pos) = self.slides.iter().position(|p| *p == current) {
                self.index = pos;
            }
        }
        self.order
    }

    /// Sets the auto-advance interval in seconds, `0` disabling it. Values
    /// above the maximum are clamped.
    pub fn set_auto_advance(&mut self, secs: u8, now: Instant) {
        let secs = secs.min(MAX_AUTO_ADVANCE_SECS);
        self.auto.interval = Duration::from_secs(u64::from(secs));
        self.auto.last_change = now;
    }

    pub fn auto_advance_secs(&self) -> u8 {
        self.auto.interval.as_secs() as u8
    }

    /// Advances once the interval has elapsed since the last position change.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        if self.auto.interval.is_zero() || self.slides.is_empty() {
            return false;
        }
        if now.saturating_duration_since(self.auto.last_change) >= self.auto.interval {
            self.next(now);
            return true;
        }
        false
    }

    /// Previous and next slide, excluding the current one and duplicates.
    pub fn neighbors(&self) -> Vec<PathBuf> {
        let n = self.slides.len();
        let mut out = Vec::with_capacity(2);
        if n < 2 {
            return out;
        }
        for i in [(self.index + n - 1) % n, (self.index + 1) % n] {
            let path = &self.slides[i];
            if i != self.index && !out.contains(path) {
                out.push(path.clone());
            }
        }
        out
    }
}
