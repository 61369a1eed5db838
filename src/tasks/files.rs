use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Recursively collects every supported image under `root`, sorted by path.
///
/// The caller decides the presentation order; an empty result is not an error.
#[instrument(fields(root = %root.display()))]
pub fn discover_slides(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::BadDir(root.display().to_string()));
    }
    let mut slides: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(error = %err, "scan: skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_image(p))
        .collect();
    slides.sort();
    info!(discovered = slides.len(), "recursive scan complete");
    Ok(slides)
}

#[inline]
pub fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "webp", "gif"].contains(&e.as_str())
    )
}

/// Where deleted slides go.
pub trait TrashBin {
    fn trash(&self, path: &Path) -> Result<()>;
}

/// The operating system's recycle bin.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl TrashBin for SystemTrash {
    fn trash(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            debug!(path = %path.display(), "trash: source missing; skipping");
            return Ok(());
        }
        trash::delete(path).map_err(|e| Error::Trash {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "trash: moved");
        Ok(())
    }
}
