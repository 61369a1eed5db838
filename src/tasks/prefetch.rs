//! Background decode and upload of the slides next to the current one.
//!
//! A single worker thread receives jobs over a channel and publishes each
//! finished [`PrefetchEntry`] as one message, so the render path either sees a
//! complete entry or nothing at all. The worker shares the wanted set and
//! skips jobs that stopped being neighbours before it got to them.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, warn};

use crate::error::Result;
use crate::gpu::backend::{LoadedTexture, RenderBackend, ScalerResource};
use crate::processing::scale_plan::{self, Size};
use crate::tasks::loader;

/// A neighbour decoded and uploaded ahead of time.
pub struct PrefetchEntry<B: RenderBackend> {
    pub texture: LoadedTexture<B::Texture>,
    /// Built only for upscales, sized for the viewport at scheduling time.
    /// The texture manager discards it if the window size changed since.
    pub scaler: Option<ScalerResource<B::Scaler>>,
}

enum PrefetchMsg {
    Prefetch(PrefetchJob),
    Quit,
}

struct PrefetchJob {
    path: PathBuf,
    viewport: Size,
    scaling: bool,
}

enum Outcome<B: RenderBackend> {
    Ready(PrefetchEntry<B>),
    Failed(crate::Error),
    /// Dropped before decoding; the slide was no longer wanted.
    Skipped,
}

struct PrefetchOutcome<B: RenderBackend> {
    path: PathBuf,
    outcome: Outcome<B>,
}

type WantedSet = Arc<Mutex<HashSet<PathBuf>>>;

/// Holds at most the previous and next slide of the current position.
pub struct PrefetchCache<B: RenderBackend> {
    jobs: Sender<PrefetchMsg>,
    done: Receiver<PrefetchOutcome<B>>,
    wanted: WantedSet,
    pending: HashSet<PathBuf>,
    entries: HashMap<PathBuf, PrefetchEntry<B>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<B: RenderBackend> PrefetchCache<B> {
    pub fn spawn(backend: Arc<B>, super_sampling: bool) -> Self {
        let (jobs, job_rx) = crossbeam_channel::unbounded();
        let (done_tx, done) = crossbeam_channel::unbounded();
        let wanted = WantedSet::default();
        let worker_wanted = Arc::clone(&wanted);
        let worker = thread::Builder::new()
            .name("prefetch".into())
            .spawn(move || run_worker(backend, super_sampling, worker_wanted, job_rx, done_tx));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "prefetch worker unavailable; every slide decodes on demand");
                None
            }
        };
        Self {
            jobs,
            done,
            wanted,
            pending: HashSet::new(),
            entries: HashMap::new(),
            worker,
        }
    }

    /// Makes `neighbors` the only slides worth keeping and requests the missing ones.
    ///
    /// Entries for anything else are dropped immediately; queued jobs for them
    /// are skipped by the worker.
    pub fn schedule(&mut self, neighbors: &[PathBuf], viewport: Size, scaling: bool) {
        self.set_wanted(|wanted| {
            wanted.clear();
            wanted.extend(neighbors.iter().cloned());
        });
        self.entries.retain(|path, _| neighbors.contains(path));

        if self.worker.is_none() {
            return;
        }
        for path in neighbors {
            if self.entries.contains_key(path) || self.pending.contains(path) {
                continue;
            }
            let job = PrefetchJob {
                path: path.clone(),
                viewport,
                scaling,
            };
            if self.jobs.send(PrefetchMsg::Prefetch(job)).is_ok() {
                debug!(path = %path.display(), %viewport, "prefetch scheduled");
                self.pending.insert(path.clone());
            }
        }
    }

    /// Moves finished entries into the cache. Returns how many were adopted.
    pub fn pump(&mut self) -> usize {
        let mut adopted = 0;
        loop {
            match self.done.try_recv() {
                Ok(outcome) => {
                    if self.adopt(outcome) {
                        adopted += 1;
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        adopted
    }

    /// Removes and returns the entry for `path`, transferring ownership to the caller.
    ///
    /// If the worker is still on `path`, waits for it rather than decoding the
    /// same slide twice.
    pub fn take(&mut self, path: &Path) -> Option<PrefetchEntry<B>> {
        self.pump();
        while self.pending.contains(path) {
            match self.done.recv() {
                Ok(PrefetchOutcome {
                    path: done_path,
                    outcome: Outcome::Ready(entry),
                }) if done_path == path => {
                    self.pending.remove(path);
                    debug!(path = %path.display(), "waited for in-flight prefetch");
                    return Some(entry);
                }
                Ok(outcome) => {
                    self.adopt(outcome);
                }
                Err(_) => {
                    self.pending.clear();
                    break;
                }
            }
        }
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.pending.contains(path)
    }

    /// Forgets a slide that left the list.
    pub fn forget(&mut self, path: &Path) {
        self.entries.remove(path);
        self.set_wanted(|wanted| {
            wanted.remove(path);
        });
    }

    fn is_wanted(&self, path: &Path) -> bool {
        self.wanted.lock().is_ok_and(|wanted| wanted.contains(path))
    }

    fn set_wanted(&self, update: impl FnOnce(&mut HashSet<PathBuf>)) {
        match self.wanted.lock() {
            Ok(mut wanted) => update(&mut wanted),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }

    fn adopt(&mut self, PrefetchOutcome { path, outcome }: PrefetchOutcome<B>) -> bool {
        self.pending.remove(&path);
        match outcome {
            Outcome::Ready(entry) if self.is_wanted(&path) => {
                debug!(path = %path.display(), "prefetch ready");
                self.entries.insert(path, entry);
                true
            }
            Outcome::Ready(_) => {
                debug!(path = %path.display(), "prefetch no longer needed");
                false
            }
            Outcome::Failed(err) => {
                debug!(path = %path.display(), error = %err, "prefetch failed");
                false
            }
            Outcome::Skipped => {
                debug!(path = %path.display(), "prefetch skipped");
                false
            }
        }
    }
}

impl<B: RenderBackend> Drop for PrefetchCache<B> {
    fn drop(&mut self) {
        let _ = self.jobs.send(PrefetchMsg::Quit);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker<B: RenderBackend>(
    backend: Arc<B>,
    super_sampling: bool,
    wanted: WantedSet,
    jobs: Receiver<PrefetchMsg>,
    done: Sender<PrefetchOutcome<B>>,
) {
    while let Ok(msg) = jobs.recv() {
        match msg {
            PrefetchMsg::Quit => break,
            PrefetchMsg::Prefetch(job) => {
                let still_wanted = wanted.lock().is_ok_and(|w| w.contains(&job.path));
                let outcome = if !still_wanted {
                    Outcome::Skipped
                } else {
                    match prefetch_one(
                        backend.as_ref(),
                        &job.path,
                        job.viewport,
                        job.scaling,
                        super_sampling,
                    ) {
                        Ok(entry) => Outcome::Ready(entry),
                        Err(err) => Outcome::Failed(err),
                    }
                };
                if done
                    .send(PrefetchOutcome {
                        path: job.path,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}

/// Decodes, uploads and, for upscales, pre-builds the scaler for one slide.
pub fn prefetch_one<B: RenderBackend>(
    backend: &B,
    path: &Path,
    viewport: Size,
    scaling: bool,
    super_sampling: bool,
) -> Result<PrefetchEntry<B>> {
    let prepared = loader::prepare_image(path, backend.max_texture_dimension())?;
    let size = Size::new(prepared.width, prepared.height);
    let texture = Arc::new(backend.upload(&prepared)?);

    let scaler = match scale_plan::plan(size, viewport, scaling) {
        Some(plan) if plan.is_upscale && super_sampling && backend.super_sampling_available() => {
            match backend.build_scaler(plan.image, plan.target) {
                Ok(scaler) => Some(ScalerResource::new(scaler, plan.image, plan.target)),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "prefetch scaler skipped");
                    None
                }
            }
        }
        _ => None,
    };

    Ok(PrefetchEntry {
        texture: LoadedTexture {
            path: path.to_path_buf(),
            texture,
            size,
        },
        scaler,
    })
}
