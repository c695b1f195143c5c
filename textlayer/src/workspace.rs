//! Per-request scratch directory with guaranteed cleanup.
//!
//! Every accepted request owns exactly one [`Workspace`]. The directory is
//! removed when the guard drops, on every exit path. Removal is idempotent
//! and never propagates failures past the request boundary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub struct Workspace {
    id: Uuid,
    dir: PathBuf,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Creates a fresh, collision-free scratch directory under `temp_root`
    /// (or the system temp dir when unset). The staged file names embed the
    /// workspace UUID so hostile original filenames never reach the tool.
    pub fn acquire(temp_root: Option<&Path>) -> io::Result<Self> {
        let root = temp_root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        let id = Uuid::new_v4();
        let dir = root.join(format!("textlayer-{id}"));
        fs::create_dir_all(&dir)?;

        let input_path = dir.join(format!("input_{id}.pdf"));
        let output_path = dir.join(format!("output_{id}.pdf"));

        tracing::debug!(workspace = %id, dir = %dir.display(), "Acquired workspace");

        Ok(Self {
            id,
            dir,
            input_path,
            output_path,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Explicitly releases the workspace. Equivalent to dropping the guard;
    /// exists to mark the point after which no workspace file may be read.
    pub fn release(self) {}
}

impl Drop for Workspace {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::debug!(workspace = %self.id, "Released workspace");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                // Cleanup failures must not mask the request's result.
                tracing::warn!(
                    workspace = %self.id,
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove workspace directory"
                );
            }
        }
    }
}
