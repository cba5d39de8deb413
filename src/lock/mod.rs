//! Process-wide operation locking.
//!
//! Each facade operation holds an advisory exclusive file lock keyed by its
//! name (for example `postgres_setup`) so only one instance runs at a time
//! on the host. Acquisition is non-blocking: contention fails fast.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::SetupError;

/// An exclusively held operation lock, released on drop.
#[derive(Debug)]
pub struct ProcessLock {
    file: File,
    path: PathBuf,
}

impl ProcessLock {
    /// Acquire the named lock under the system temp directory.
    pub fn acquire(name: &str) -> Result<Self, SetupError> {
        Self::acquire_in(&std::env::temp_dir(), name)
    }

    /// Acquire the named lock under a specific directory.
    pub fn acquire_in(dir: &Path, name: &str) -> Result<Self, SetupError> {
        let path = dir.join(format!("prootctl-{name}.lock"));
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(SetupError::Lock {
                name: name.to_string(),
            });
        }

        // Record the holder PID for diagnostics.
        let _ = file.set_len(0);
        let _ = writeln!(file, "{}", std::process::id());
        debug!(lock = %path.display(), "acquired operation lock");

        Ok(Self { file, path })
    }

    /// Path of the underlying lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}
