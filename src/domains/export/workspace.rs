use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use super::types::ExportError;

const WORKSPACE_PREFIX: &str = "transactions_export_";

/// Exclusively-owned scratch directory for one export job.
///
/// The directory is removed by `cleanup()` or, failing that, when the value
/// is dropped. Removal happens at most once no matter how many times either
/// path runs.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    dir: Option<TempDir>,
}

impl Workspace {
    /// Create a fresh, uniquely named workspace under `root`, or under the
    /// system temp directory when `root` is `None`.
    pub fn begin(root: Option<&Path>) -> Result<Self, ExportError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    ExportError::Workspace(format!("cannot create root {}: {}", root.display(), e))
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| ExportError::Workspace(e.to_string()))?;

        let workspace = Self {
            id: Uuid::new_v4(),
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        };
        log::info!("Created export workspace {} for job {}", workspace.path.display(), workspace.id);
        Ok(workspace)
    }

    /// Job id this workspace belongs to.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False once `cleanup()` has run.
    pub fn is_active(&self) -> bool {
        self.dir.is_some()
    }

    /// Remove the workspace directory and everything inside it.
    ///
    /// Idempotent. Returns `true` only for the call that actually released the
    /// workspace. A directory that has already vanished is not an error.
    pub fn cleanup(&mut self) -> bool {
        let Some(dir) = self.dir.take() else {
            return false;
        };

        match dir.close() {
            Ok(()) => log::info!("Cleaned up export workspace {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Export workspace {} was already gone", self.path.display())
            }
            Err(e) => log::error!("Error cleaning up export workspace {}: {}", self.path.display(), e),
        }
        true
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.cleanup() {
            log::debug!("Workspace for job {} released by finalizer", self.id);
        }
    }
}
