//! ABOUTME: Scratch workspace provisioning for script and container step runners
//! ABOUTME: Each invocation gets an isolated temp directory cleaned up on drop

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated working directory handed to a single script or container
/// invocation. Removed from disk when dropped.
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a new scratch workspace under the system temp directory,
    /// prefixed with the step id for easier debugging of leftover runs.
    pub fn new(step_id: &str) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("lacquer-{step_id}-"))
            .tempdir()?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
