//! Local persistence of captured screenshots.

use crate::rows::{ImageBytes, ViewportProfile};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Writes captured screenshots to a deterministic per-row location.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    /// Stores screenshots under `dir`, created on first write if absent.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory screenshots are written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a given viewport and row index: `{viewport}_{index}.png`.
    pub fn path_for(&self, profile: ViewportProfile, index: usize) -> PathBuf {
        self.dir.join(format!("{}_{index}.png", profile.slug()))
    }

    /// Persists one capture, returning the written path.
    ///
    /// Callers log failures and carry on; a missed screenshot never fails a
    /// row.
    pub async fn save(
        &self,
        profile: ViewportProfile,
        index: usize,
        bytes: &ImageBytes,
    ) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(profile, index);
        fs::write(&path, bytes.as_bytes()).await?;
        Ok(path)
    }
}
