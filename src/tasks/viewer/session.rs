use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::events::{Action, ExitReason, Response};
use crate::gpu::backend::{LoadedTexture, RenderBackend};
use crate::gpu::frame::{
    CommandSequence, Fence, FilterKind, FrameSource, QUAD, QuadUniforms, SampleSource,
    SuperSamplePass,
};
use crate::gpu::residency::{Resident, ResidencySet};
use crate::gpu::textures::TextureManager;
use crate::processing::kernels::ResampleKernel;
use crate::processing::scale_plan::{self, Size};
use crate::tasks::files::TrashBin;
use crate::tasks::prefetch::PrefetchCache;

use super::navigation::{Navigator, Removal};
use super::status::{ScalingMode, status_line};

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub kernel: ResampleKernel,
    pub scaling: bool,
    pub shuffle: bool,
    pub seed: Option<u64>,
    pub auto_advance_secs: u8,
    pub super_sampling: bool,
    pub show_info: bool,
}

impl From<&Configuration> for SessionOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            kernel: cfg.resample_kernel,
            scaling: cfg.scaling,
            shuffle: cfg.shuffle,
            seed: cfg.startup_shuffle_seed,
            auto_advance_secs: cfg.auto_advance_secs,
            super_sampling: cfg.super_sampling,
            show_info: cfg.show_info,
        }
    }
}

/// Viewer core: navigation, texture ownership, prefetching and frame production.
///
/// Input arrives through [`Session::handle`] and [`Session::on_tick`]; the
/// window layer pulls GPU work through [`FrameSource::produce_frame`].
pub struct Session<B: RenderBackend> {
    nav: Navigator,
    textures: TextureManager<B>,
    prefetch: PrefetchCache<B>,
    residency: ResidencySet<B>,
    trash: Box<dyn TrashBin>,
    kernel: ResampleKernel,
    scaling: bool,
    show_info: bool,
    viewport: Size,
    frames: u64,
    status: String,
    notice: Option<String>,
    finished: Option<ExitReason>,
}

impl<B: RenderBackend> Session<B> {
    /// Returns `None` when `slides` is empty.
    pub fn new(
        backend: Arc<B>,
        slides: Vec<PathBuf>,
        options: SessionOptions,
        trash: Box<dyn TrashBin>,
        viewport: Size,
        now: Instant,
    ) -> Option<Self> {
        let mut nav = Navigator::new(slides, options.shuffle, options.seed, now)?;
        nav.set_auto_advance(options.auto_advance_secs, now);
        let super_sampling = options.super_sampling && backend.super_sampling_available();
        if options.super_sampling && !super_sampling {
            info!("super-sampling not supported on this device; upscales use the resample kernel");
        }
        let mut session = Self {
            nav,
            textures: TextureManager::new(Arc::clone(&backend), super_sampling),
            prefetch: PrefetchCache::spawn(backend, super_sampling),
            residency: ResidencySet::default(),
            trash,
            kernel: options.kernel,
            scaling: options.scaling,
            show_info: options.show_info,
            viewport,
            frames: 0,
            status: String::new(),
            notice: None,
            finished: None,
        };
        session.show_current(now);
        Some(session)
    }

    pub fn handle(&mut self, action: Action, now: Instant) -> Response {
        if let Some(reason) = self.finished {
            return Response::Exit(reason);
        }
        debug!(?action, "action");
        match action {
            Action::Next => {
                self.notice = None;
                self.nav.next(now);
                self.show_current(now)
            }
            Action::Previous => {
                self.notice = None;
                self.nav.previous(now);
                self.show_current(now)
            }
            Action::JumpTo(jump) => {
                if self.nav.jump_to(jump, now) {
                    self.notice = None;
                    self.show_current(now)
                } else {
                    Response::Unchanged
                }
            }
            Action::DeleteCurrent => self.delete_current(now),
            Action::ToggleInfo => {
                self.show_info = !self.show_info;
                Response::Redraw
            }
            Action::ToggleScaling => {
                self.scaling = !self.scaling;
                info!(scaling = self.scaling, "scaling toggled");
                self.schedule_prefetch();
                Response::Redraw
            }
            Action::ToggleShuffle => {
                let order = self.nav.toggle_order();
                info!(?order, position = self.nav.index(), "slide order toggled");
                self.schedule_prefetch();
                Response::Redraw
            }
            Action::SetAutoAdvance(secs) => {
                self.nav.set_auto_advance(secs, now);
                info!(secs = self.nav.auto_advance_secs(), "auto-advance interval set");
                Response::Unchanged
            }
            // Window-level concern; the platform layer acts on it directly.
            Action::ToggleFullscreen => Response::Unchanged,
            Action::Quit => {
                self.finished = Some(ExitReason::Quit);
                Response::Exit(ExitReason::Quit)
            }
        }
    }

    /// Clock tick: adopts finished prefetches and evaluates auto-advance.
    pub fn on_tick(&mut self, now: Instant) -> Response {
        if let Some(reason) = self.finished {
            return Response::Exit(reason);
        }
        self.prefetch.pump();
        if self.nav.on_tick(now) {
            debug!(position = self.nav.index(), "auto-advance");
            return self.show_current(now);
        }
        Response::Unchanged
    }

    pub fn resize(&mut self, viewport: Size) -> Response {
        if viewport == self.viewport {
            return Response::Unchanged;
        }
        debug!(%viewport, "viewport resized");
        self.viewport = viewport;
        Response::Redraw
    }

    pub fn is_finished(&self) -> Option<ExitReason> {
        self.finished
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn textures(&self) -> &TextureManager<B> {
        &self.textures
    }

    pub fn prefetch(&self) -> &PrefetchCache<B> {
        &self.prefetch
    }

    pub fn prefetch_mut(&mut self) -> &mut PrefetchCache<B> {
        &mut self.prefetch
    }

    pub fn scaling(&self) -> bool {
        self.scaling
    }

    /// Text for on-screen display: the status line while info is on, plus any
    /// pending notice such as a failed trash operation.
    pub fn display_text(&self) -> Option<String> {
        match (&self.notice, self.show_info && !self.status.is_empty()) {
            (Some(notice), true) => Some(format!("{} | {notice}", self.status)),
            (Some(notice), false) => Some(notice.clone()),
            (None, true) => Some(self.status.clone()),
            (None, false) => None,
        }
    }

    /// The most recent status line, computed on every produced frame.
    pub fn status(&self) -> &str {
        &self.status
    }

    fn delete_current(&mut self, now: Instant) -> Response {
        let Some(path) = self.nav.current().map(|p| p.to_path_buf()) else {
            return self.exhausted();
        };
        self.notice = match self.trash.trash(&path) {
            Ok(()) => None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "trash failed; removing from list anyway");
                Some(format!("trash failed: {err}"))
            }
        };
        self.textures.invalidate_path(&path);
        self.prefetch.forget(&path);
        match self.nav.remove_current(now) {
            Some(Removal::Removed(_)) => {
                info!(path = %path.display(), remaining = self.nav.len(), "slide deleted");
                self.show_current(now)
            }
            Some(Removal::Exhausted(_)) | None => self.exhausted(),
        }
    }

    /// Loads the slide at the current position, dropping slides that fail to decode.
    fn show_current(&mut self, now: Instant) -> Response {
        loop {
            let Some(path) = self.nav.current().map(|p| p.to_path_buf()) else {
                return self.exhausted();
            };
            match self.textures.ensure_current(&path, &mut self.prefetch) {
                Ok(source) => {
                    debug!(path = %path.display(), ?source, position = self.nav.index(), "slide ready");
                    break;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable slide");
                    self.prefetch.forget(&path);
                    if let Some(Removal::Exhausted(_)) | None = self.nav.remove_current(now) {
                        return self.exhausted();
                    }
                }
            }
        }
        self.schedule_prefetch();
        Response::Redraw
    }

    fn schedule_prefetch(&mut self) {
        let neighbors = self.nav.neighbors();
        self.prefetch.schedule(&neighbors, self.viewport, self.scaling);
    }

    fn exhausted(&mut self) -> Response {
        info!("no slides left; ending session");
        self.textures.invalidate();
        self.finished = Some(ExitReason::LibraryExhausted);
        Response::Exit(ExitReason::LibraryExhausted)
    }

    fn update_status(&mut self, current: &LoadedTexture<B::Texture>, output: Size, mode: ScalingMode) {
        let line = status_line(
            self.nav.index(),
            self.nav.len(),
            &current.path,
            current.size,
            output,
            mode,
        );
        if line != self.status {
            debug!(status = %line, "status");
            self.status = line;
        }
    }
}

impl<B: RenderBackend> FrameSource<B> for Session<B> {
    fn produce_frame(&mut self, viewport: Size) -> Option<CommandSequence<B>> {
        self.viewport = viewport;
        if self.finished.is_some() {
            return None;
        }
        let current = self.textures.current()?.clone();
        let mut plan = scale_plan::plan(current.size, viewport, self.scaling)?;

        let scaler = self.textures.ensure_scaler(&plan);
        if plan.is_upscale && scaler.is_none() {
            plan = plan.resample_fallback();
        }
        let enlarged = plan.target.width > plan.image.width || plan.target.height > plan.image.height;

        self.frames += 1;
        let frame = self.frames;
        self.residency.clear();
        self.residency.add(Resident::Texture(Arc::clone(&current.texture)));

        let (super_sample, source, wait, filter, mode) = match scaler {
            Some(s) => {
                self.residency.add(Resident::Scaler(Arc::clone(&s.scaler)));
                let fence = Fence(frame);
                let pass = SuperSamplePass {
                    scaler: Arc::clone(&s.scaler),
                    source: Arc::clone(&current.texture),
                    input: s.input,
                    output: s.output,
                    signal: fence,
                };
                (
                    Some(pass),
                    SampleSource::ScalerOutput(s.scaler),
                    Some(fence),
                    FilterKind::Passthrough,
                    ScalingMode::SuperSampled,
                )
            }
            None if plan.needs_resample => (
                None,
                SampleSource::Texture(Arc::clone(&current.texture)),
                None,
                FilterKind::Kernel(self.kernel),
                ScalingMode::Kernel {
                    kernel: self.kernel,
                    upscale: enlarged,
                },
            ),
            None => (
                None,
                SampleSource::Texture(Arc::clone(&current.texture)),
                None,
                FilterKind::Passthrough,
                ScalingMode::Native,
            ),
        };
        self.residency.add(Resident::Uniforms);
        let residency = self.residency.commit();

        self.update_status(&current, plan.target, mode);

        Some(CommandSequence {
            frame,
            plan,
            residency,
            super_sample,
            uniforms: QuadUniforms {
                scale: plan.quad_scale(),
                _pad: [0.0; 2],
            },
            source,
            filter,
            wait,
            vertex_count: QUAD.len() as u32,
        })
    }
}
