use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::gpu::backend::{LoadedTexture, RenderBackend, ScalerResource};
use crate::processing::scale_plan::{ScalePlan, Size};
use crate::tasks::loader;
use crate::tasks::prefetch::PrefetchCache;

/// How [`TextureManager::ensure_current`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    /// The slide was already on screen.
    Cached,
    /// Adopted from the prefetch cache.
    Prefetched,
    /// Decoded and uploaded on the render path.
    Decoded,
}

/// Owns the texture on screen and the super-sampling scaler built for it.
///
/// Replaced textures are dropped here, but in-flight submissions keep their
/// own reference until the GPU is done with them.
pub struct TextureManager<B: RenderBackend> {
    backend: Arc<B>,
    current: Option<LoadedTexture<B::Texture>>,
    scaler: Option<ScalerResource<B::Scaler>>,
    super_sampling: bool,
    failed_pair: Option<(Size, Size)>,
}

impl<B: RenderBackend> TextureManager<B> {
    pub fn new(backend: Arc<B>, super_sampling: bool) -> Self {
        let super_sampling = super_sampling && backend.super_sampling_available();
        Self {
            backend,
            current: None,
            scaler: None,
            super_sampling,
            failed_pair: None,
        }
    }

    pub fn ensure_current(
        &mut self,
        path: &Path,
        cache: &mut PrefetchCache<B>,
    ) -> Result<TextureSource> {
        if self.current.as_ref().is_some_and(|c| c.path == path) {
            return Ok(TextureSource::Cached);
        }

        if let Some(entry) = cache.take(path) {
            debug!(path = %path.display(), size = %entry.texture.size, "adopted prefetched texture");
            self.current = Some(entry.texture);
            if let Some(scaler) = entry.scaler {
                self.scaler = Some(scaler);
            }
            return Ok(TextureSource::Prefetched);
        }

        // Drop the stale texture first so a failed decode leaves nothing on screen.
        self.current = None;
        let prepared = loader::prepare_image(path, self.backend.max_texture_dimension())?;
        let size = Size::new(prepared.width, prepared.height);
        let texture = Arc::new(self.backend.upload(&prepared)?);
        debug!(path = %path.display(), %size, "decoded on demand");
        self.current = Some(LoadedTexture {
            path: path.to_path_buf(),
            texture,
            size,
        });
        Ok(TextureSource::Decoded)
    }

    pub fn current(&self) -> Option<&LoadedTexture<B::Texture>> {
        self.current.as_ref()
    }

    /// Releases the current texture and its scaler.
    pub fn invalidate(&mut self) {
        self.current = None;
        self.scaler = None;
    }

    /// Releases the current texture only if it was loaded for `path`.
    pub fn invalidate_path(&mut self, path: &Path) {
        if self.current.as_ref().is_some_and(|c| c.path == path) {
            self.invalidate();
        }
    }

    /// Returns the scaler for `plan`, building it on first use of a size pair.
    ///
    /// `None` means the frame has to fall back to the resampling kernel.
    pub fn ensure_scaler(&mut self, plan: &ScalePlan) -> Option<ScalerResource<B::Scaler>> {
        if !plan.is_upscale || !self.super_sampling {
            self.scaler = None;
            return None;
        }
        let (input, output) = (plan.image, plan.target);
        if let Some(scaler) = self.scaler.as_ref().filter(|s| s.matches(input, output)) {
            return Some(scaler.clone());
        }
        self.scaler = None;
        if self.failed_pair == Some((input, output)) {
            return None;
        }

        match self.backend.build_scaler(input, output) {
            Ok(scaler) => {
                debug!(%input, %output, "super-sampling scaler built");
                let scaler = ScalerResource::new(scaler, input, output);
                self.scaler = Some(scaler.clone());
                self.failed_pair = None;
                Some(scaler)
            }
            Err(err) => {
                warn!(%input, %output, error = %err, "super-sampling unavailable; using resample kernel");
                self.failed_pair = Some((input, output));
                None
            }
        }
    }
}
