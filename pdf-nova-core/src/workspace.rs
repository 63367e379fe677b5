//! Per-request job directories
//!
//! External programs read and write real files, so every job that calls one
//! gets its own `job_<random>` directory under the work dir. The directory
//! is deleted when the [`Workspace`] is dropped.

use crate::error::Result;
use crate::upload::Upload;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

const JOB_PREFIX: &str = "job_";

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh job directory, creating `work_dir` as needed
    pub fn create(work_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(work_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(JOB_PREFIX)
            .tempdir_in(work_dir)?;
        debug!(path = %dir.path().display(), "job directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write an upload under its sanitised name and return the path
    pub fn save_upload(&self, upload: &Upload) -> Result<PathBuf> {
        self.write(&upload.disk_name(), &upload.data)
    }

    pub fn write(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.join(name);
        std::fs::write(&path, data)?;
        Ok(path)
    }

    /// Regular files directly inside the job directory, sorted by name
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.path())? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Remove `job_*` directories left behind by a previous run
///
/// Returns how many were removed. Failures are logged and skipped.
pub fn cleanup_stale_jobs(work_dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(work_dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let is_job = entry.file_name().to_string_lossy().starts_with(JOB_PREFIX)
            && entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_job {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "cannot remove stale job"),
        }
    }
    if removed > 0 {
        info!(removed, dir = %work_dir.display(), "removed stale job directories");
    }
    removed
}
