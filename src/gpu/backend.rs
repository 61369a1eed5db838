//! Device capabilities the render path and the prefetch worker rely on.
//!
//! The wgpu implementation lives in [`crate::gpu::wgpu_backend`]; keeping the
//! seam as a trait lets texture ownership, prefetching and frame encoding run
//! against an in-memory device in tests.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::events::PreparedImageCpu;
use crate::processing::scale_plan::Size;

pub trait RenderBackend: Send + Sync + 'static {
    /// GPU-resident decoded slide.
    type Texture: Send + Sync + 'static;
    /// Super-sampling object together with its output texture.
    type Scaler: Send + Sync + 'static;

    /// Largest width or height a 2D texture may have on this device.
    fn max_texture_dimension(&self) -> u32;

    fn upload(&self, image: &PreparedImageCpu) -> Result<Self::Texture>;

    fn super_sampling_available(&self) -> bool;

    fn build_scaler(&self, input: Size, output: Size) -> Result<Self::Scaler>;
}

/// The texture currently on screen, tagged with the slide it was loaded for.
pub struct LoadedTexture<T> {
    pub path: PathBuf,
    pub texture: Arc<T>,
    pub size: Size,
}

impl<T> Clone for LoadedTexture<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            texture: Arc::clone(&self.texture),
            size: self.size,
        }
    }
}

/// A scaler valid for exactly one (input size, output size) pair.
pub struct ScalerResource<S> {
    pub scaler: Arc<S>,
    pub input: Size,
    pub output: Size,
}

impl<S> ScalerResource<S> {
    pub fn new(scaler: S, input: Size, output: Size) -> Self {
        Self {
            scaler: Arc::new(scaler),
            input,
            output,
        }
    }

    pub fn matches(&self, input: Size, output: Size) -> bool {
        self.input == input && self.output == output
    }
}

impl<S> Clone for ScalerResource<S> {
    fn clone(&self) -> Self {
        Self {
            scaler: Arc::clone(&self.scaler),
            input: self.input,
            output: self.output,
        }
    }
}
