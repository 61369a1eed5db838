#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use image::{Rgba, RgbaImage};
use slide_viewer::error::{Error, Result};
use slide_viewer::events::PreparedImageCpu;
use slide_viewer::gpu::backend::RenderBackend;
use slide_viewer::processing::scale_plan::Size;
use slide_viewer::tasks::files::TrashBin;
use slide_viewer::tasks::prefetch::PrefetchCache;

pub struct FakeTexture {
    pub path: PathBuf,
    pub size: Size,
}

pub struct FakeScaler {
    pub input: Size,
    pub output: Size,
}

/// In-memory device that records what it was asked to create.
pub struct FakeBackend {
    pub max_dim: u32,
    pub super_sampling: bool,
    pub fail_scalers: AtomicBool,
    pub uploads: Mutex<Vec<PathBuf>>,
    pub scalers_built: AtomicUsize,
    /// While set, every upload blocks until the paired sender is dropped.
    pub gate: Mutex<Option<Receiver<()>>>,
}

impl FakeBackend {
    pub fn new(super_sampling: bool) -> Arc<Self> {
        Arc::new(Self {
            max_dim: 8192,
            super_sampling,
            fail_scalers: AtomicBool::new(false),
            uploads: Mutex::new(Vec::new()),
            scalers_built: AtomicUsize::new(0),
            gate: Mutex::new(None),
        })
    }

    pub fn uploads_of(&self, path: &Path) -> usize {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_path() == path)
            .count()
    }

    pub fn total_uploads(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn scalers_built(&self) -> usize {
        self.scalers_built.load(Ordering::SeqCst)
    }
}

impl RenderBackend for FakeBackend {
    type Texture = FakeTexture;
    type Scaler = FakeScaler;

    fn max_texture_dimension(&self) -> u32 {
        self.max_dim
    }

    fn upload(&self, image: &PreparedImageCpu) -> Result<FakeTexture> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        self.uploads.lock().unwrap().push(image.path.clone());
        Ok(FakeTexture {
            path: image.path.clone(),
            size: Size::new(image.width, image.height),
        })
    }

    fn super_sampling_available(&self) -> bool {
        self.super_sampling
    }

    fn build_scaler(&self, input: Size, output: Size) -> Result<FakeScaler> {
        if self.fail_scalers.load(Ordering::SeqCst) {
            return Err(Error::Scaler {
                input: input.to_string(),
                output: output.to_string(),
                reason: "refused".into(),
            });
        }
        self.scalers_built.fetch_add(1, Ordering::SeqCst);
        Ok(FakeScaler { input, output })
    }
}

/// Trash that records requests and optionally fails them.
#[derive(Clone, Default)]
pub struct RecordingTrash {
    pub trashed: Arc<Mutex<Vec<PathBuf>>>,
    pub fail: bool,
}

impl TrashBin for RecordingTrash {
    fn trash(&self, path: &Path) -> Result<()> {
        self.trashed.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(Error::Trash {
                path: path.to_path_buf(),
                reason: "permission denied".into(),
            });
        }
        Ok(())
    }
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbaImage::from_pixel(width, height, Rgba([120, 80, 40, 255]))
        .save(&path)
        .unwrap();
    path
}

/// Pumps `cache` until none of `paths` is still being prefetched.
pub fn settle<B: RenderBackend>(cache: &mut PrefetchCache<B>, paths: &[PathBuf]) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        cache.pump();
        if paths.iter().all(|p| !cache.is_pending(p)) {
            return;
        }
        assert!(Instant::now() < deadline, "prefetch did not finish in time");
        thread::sleep(Duration::from_millis(2));
    }
}
