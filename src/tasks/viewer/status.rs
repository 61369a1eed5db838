use std::fmt;
use std::path::Path;

use crate::processing::kernels::ResampleKernel;
use crate::processing::scale_plan::Size;

/// Which path produced the pixels on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    SuperSampled,
    /// Fragment kernel; `upscale` is set when standing in for super-sampling.
    Kernel { kernel: ResampleKernel, upscale: bool },
    /// Scaling off, drawn 1:1.
    Native,
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuperSampled => f.write_str("Upscaling: super-sampling"),
            Self::Kernel {
                kernel,
                upscale: true,
            } => write!(f, "Upscaling: {kernel}"),
            Self::Kernel {
                kernel,
                upscale: false,
            } => write!(f, "Downscaling: {kernel}"),
            Self::Native => f.write_str("Scaling off"),
        }
    }
}

/// One-line summary of the slide on screen.
pub fn status_line(
    index: usize,
    count: usize,
    path: &Path,
    input: Size,
    output: Size,
    mode: ScalingMode,
) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());
    format!(
        "Slide {} of {count} | {name} | Input {input} | Output {output} | {mode}",
        index + 1
    )
}
