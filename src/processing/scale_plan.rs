use std::fmt;

/// Pixel dimensions of an image, texture or drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn aspect(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-frame scaling decision for one image on one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePlan {
    pub image: Size,
    pub viewport: Size,
    /// Largest aspect-preserving size that fits entirely inside the viewport.
    pub fit: Size,
    /// Size the quad is drawn at: `fit` when scaling, the native size otherwise.
    pub target: Size,
    pub is_upscale: bool,
    pub needs_resample: bool,
}

impl ScalePlan {
    /// Quad scale factors `(targetW/viewportW, targetH/viewportH)` for the vertex stage.
    pub fn quad_scale(&self) -> [f32; 2] {
        [
            (f64::from(self.target.width) / f64::from(self.viewport.width)) as f32,
            (f64::from(self.target.height) / f64::from(self.viewport.height)) as f32,
        ]
    }

    /// Treat an upscale as a kernel resample at the fit size, used when the
    /// super-sampling pass is unavailable.
    pub fn resample_fallback(self) -> Self {
        if !self.is_upscale {
            return self;
        }
        Self {
            is_upscale: false,
            needs_resample: true,
            ..self
        }
    }
}

/// Plans how `image` is shown on `viewport`.
///
/// Returns `None` for an empty viewport (minimised or hidden window) or an empty
/// image; the caller skips the frame.
pub fn plan(image: Size, viewport: Size, scaling_enabled: bool) -> Option<ScalePlan> {
    if viewport.is_empty() || image.is_empty() {
        return None;
    }

    let image_aspect = image.aspect();
    let fit = if image_aspect > viewport.aspect() {
        let height = (f64::from(viewport.width) / image_aspect).round() as u32;
        Size::new(viewport.width, height.max(1))
    } else {
        let width = (f64::from(viewport.height) * image_aspect).round() as u32;
        Size::new(width.max(1), viewport.height)
    };

    let target = if scaling_enabled { fit } else { image };
    let is_upscale = target.width > image.width || target.height > image.height;
    let needs_resample = scaling_enabled && !is_upscale;

    Some(ScalePlan {
        image,
        viewport,
        fit,
        target,
        is_upscale,
        needs_resample,
    })
}
