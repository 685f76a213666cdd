//! Run-scoped scratch directory for rendered frame files.

use crate::error::EnvError;
use crate::types::FrameIndex;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Prefix of every scratch directory name.
pub const SCRATCH_PREFIX: &str = "flightreel_frames_";

/// Directory holding one run's frame images.
///
/// Removed when dropped unless [`ScratchDir::keep`] is called.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Creates a fresh directory under the system temp dir.
    pub fn create() -> Result<Self, EnvError> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(|e| EnvError::Scratch(e.to_string()))?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    /// Creates a fresh directory under `parent`.
    pub fn create_in(parent: &Path) -> Result<Self, EnvError> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| EnvError::Scratch(format!("{}: {}", parent.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the image for `index` goes.
    pub fn frame_path(&self, index: FrameIndex) -> PathBuf {
        self.dir.path().join(index.file_name())
    }

    /// Keeps the directory on disk and returns its path.
    pub fn keep(self) -> PathBuf {
        let path = self.dir.into_path();
        info!(path = %path.display(), "Keeping frame directory");
        path
    }

    /// Removes the directory, reporting failures instead of ignoring them.
    pub fn close(self) -> Result<(), EnvError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| EnvError::Scratch(format!("cannot remove {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Removed scratch directory");
        Ok(())
    }
}
