pub mod config;
pub mod error;
pub mod events;
pub mod gpu {
    pub mod backend;
    pub mod frame;
    pub mod residency;
    pub mod textures;
    pub mod wgpu_backend;
}
pub mod processing {
    pub mod kernels;
    pub mod scale_plan;
}
pub mod tasks {
    pub mod clock;
    pub mod files;
    pub mod loader;
    pub mod prefetch;
    pub mod viewer;
}

pub use error::{Error, Result};
