use std::path::PathBuf;

use thiserror::Error;

/// Library error type for slide viewer operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The slide directory is missing or is not a directory.
    #[error("invalid slide directory: {0}")]
    BadDir(String),

    /// The scan completed but found no images.
    #[error("no images found under {}", .0.display())]
    EmptyLibrary(PathBuf),

    /// An image could not be read or decoded.
    #[error("failed to decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Decoded pixels could not be resized or uploaded to the GPU.
    #[error("failed to upload {}: {reason}", path.display())]
    Upload { path: PathBuf, reason: String },

    /// The super-sampling pass could not be built for the requested sizes.
    #[error("super-sampling unavailable for {input} -> {output}: {reason}")]
    Scaler {
        input: String,
        output: String,
        reason: String,
    },

    /// Shader or pipeline construction failed; rendering cannot start.
    #[error("pipeline build failed: {0}")]
    Pipeline(String),

    /// Moving a slide to the trash failed.
    #[error("failed to trash {}: {reason}", path.display())]
    Trash { path: PathBuf, reason: String },

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
