//! Archive extraction and binary installation.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use crate::error::{ArtifactErrorKind, SetupError};

/// Unpack a gzip-compressed tar archive into a directory.
pub fn extract_tar_gz(bytes: &[u8], dest: &Path) -> Result<(), SetupError> {
    let decoder = GzDecoder::new(Cursor::new(bytes));
    let mut archive = Archive::new(decoder);
    archive.unpack(dest).map_err(|e| SetupError::Artifact {
        kind: ArtifactErrorKind::ExtractionFailed {
            message: e.to_string(),
        },
    })?;
    debug!(dest = %dest.display(), "extracted archive");
    Ok(())
}

/// Recursively search a directory tree for a file by name.
pub fn find_file(root: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().is_some_and(|f| f == name) {
            return Some(path);
        }
    }
    subdirs.into_iter().find_map(|dir| find_file(&dir, name))
}

/// Move a file to its final install path and mark it executable.
pub fn install_binary(src: &Path, dest: &Path) -> Result<(), SetupError> {
    // rename fails across filesystems (temp dir to install dir); fall back
    // to copy + remove.
    if fs::rename(src, dest).is_err() {
        fs::copy(src, dest)?;
        let _ = fs::remove_file(src);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(dest)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(dest, perms)?;
    }

    debug!(dest = %dest.display(), "installed binary");
    Ok(())
}
