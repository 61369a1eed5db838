//! Resampling filter math shared by the GPU shaders and the CPU reference sampler.
//!
//! The WGSL fragment kernels in `gpu/shaders/present.wgsl` evaluate exactly these
//! functions; the CPU versions exist so the filter behaviour can be checked
//! without a device.

use std::f64::consts::PI;
use std::fmt;

use image::RgbaImage;
use serde::Deserialize;

/// Support radius (in source texels) of the Lanczos kernel.
pub const LANCZOS_RADIUS: i32 = 3;
/// Window radius of the windowed jinc kernel; also its evaluation radius.
pub const JINC_RADIUS: i32 = 4;

/// Filter used for slides shown at native size or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleKernel {
    #[default]
    Lanczos,
    Jinc,
}

impl ResampleKernel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Lanczos => "Lanczos-3",
            Self::Jinc => "windowed Jinc",
        }
    }

    /// Side length of the square texel neighbourhood the kernel reads.
    pub fn footprint(self) -> i32 {
        match self {
            Self::Lanczos => 2 * LANCZOS_RADIUS + 1,
            Self::Jinc => 2 * JINC_RADIUS + 1,
        }
    }
}

impl fmt::Display for ResampleKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalised sinc, `sin(πx)/(πx)` with `sinc(0) = 1`.
pub fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-8 {
        return 1.0;
    }
    let px = PI * x;
    px.sin() / px
}

/// `L(x) = sinc(x)·sinc(x/3)` inside `|x| < 3`, zero outside.
pub fn lanczos3(x: f64) -> f64 {
    let a = LANCZOS_RADIUS as f64;
    if x.abs() >= a {
        return 0.0;
    }
    sinc(x) * sinc(x / a)
}

/// Bessel function of the first kind, order one.
///
/// Rational approximation in two regimes (`|x| < 8` and `|x| >= 8`), accurate to
/// well below single precision over the range the jinc kernel uses.
pub fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 8.0 {
        let y = x * x;
        let num = x
            * (72362614232.0
                + y * (-7895059235.0
                    + y * (242396853.1
                        + y * (-2972611.439 + y * (15704.48260 + y * (-30.16036606))))));
        let den = 144725228442.0
            + y * (2300535178.0
                + y * (18583304.74 + y * (99447.43394 + y * (376.9991397 + y))));
        num / den
    } else {
        let z = 8.0 / ax;
        let y = z * z;
        let xx = ax - 2.356194491;
        let p = 1.0
            + y * (0.183105e-2
                + y * (-0.3516396496e-4 + y * (0.2457520174e-5 + y * (-0.240337019e-6))));
        let q = 0.04687499995
            + y * (-0.2002690873e-3
                + y * (0.8449199096e-5 + y * (-0.88228987e-6 + y * 0.105787412e-6)));
        let ans = (0.636619772 / ax).sqrt() * (xx.cos() * p - z * xx.sin() * q);
        if x < 0.0 { -ans } else { ans }
    }
}

/// `jinc(x) = 2·J1(πx)/(πx)` with `jinc(0) = 1`.
pub fn jinc(x: f64) -> f64 {
    if x.abs() < 1e-8 {
        return 1.0;
    }
    let px = PI * x;
    2.0 * bessel_j1(px) / px
}

/// Jinc windowed by a second jinc stretched to the window radius.
pub fn windowed_jinc(r: f64) -> f64 {
    let window = JINC_RADIUS as f64;
    if r >= window {
        return 0.0;
    }
    jinc(r) * jinc(r / window)
}

/// Read-only texel access with clamp-to-edge addressing.
pub trait TexelSource {
    fn dimensions(&self) -> (u32, u32);
    fn texel(&self, x: u32, y: u32) -> [f64; 4];

    fn texel_clamped(&self, x: i64, y: i64) -> [f64; 4] {
        let (w, h) = self.dimensions();
        let cx = x.clamp(0, i64::from(w) - 1) as u32;
        let cy = y.clamp(0, i64::from(h) - 1) as u32;
        self.texel(cx, cy)
    }
}

impl TexelSource for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        RgbaImage::dimensions(self)
    }

    fn texel(&self, x: u32, y: u32) -> [f64; 4] {
        let p = self.get_pixel(x, y).0;
        [
            f64::from(p[0]) / 255.0,
            f64::from(p[1]) / 255.0,
            f64::from(p[2]) / 255.0,
            f64::from(p[3]) / 255.0,
        ]
    }
}

/// Filters `src` at normalised coordinate `(u, v)`.
///
/// The neighbourhood is centred on the texel nearest the sample point and the
/// result is divided by the accumulated weight, so any offset reproduces a flat
/// field exactly.
pub fn sample<S: TexelSource + ?Sized>(kernel: ResampleKernel, src: &S, u: f64, v: f64) -> [f64; 4] {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return [0.0; 4];
    }
    let px = u * f64::from(w) - 0.5;
    let py = v * f64::from(h) - 0.5;
    let cx = (px + 0.5).floor() as i64;
    let cy = (py + 0.5).floor() as i64;

    let radius = i64::from(kernel.footprint() / 2);
    let mut acc = [0.0f64; 4];
    let mut weight_sum = 0.0f64;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let tx = cx + dx;
            let ty = cy + dy;
            let ox = px - tx as f64;
            let oy = py - ty as f64;
            let weight = match kernel {
                ResampleKernel::Lanczos => lanczos3(ox) * lanczos3(oy),
                ResampleKernel::Jinc => windowed_jinc((ox * ox + oy * oy).sqrt()),
            };
            if weight == 0.0 {
                continue;
            }
            let texel = src.texel_clamped(tx, ty);
            for (slot, channel) in acc.iter_mut().zip(texel) {
                *slot += channel * weight;
            }
            weight_sum += weight;
        }
    }

    if weight_sum.abs() < 1e-12 {
        return src.texel_clamped(cx, cy);
    }
    acc.map(|c| c / weight_sum)
}
