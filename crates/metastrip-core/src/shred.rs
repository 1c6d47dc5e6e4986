//! Best-effort secure deletion of regular files.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use crate::Result;
use crate::StripError;

#[cfg(target_os = "macos")]
const SHRED: &str = "gshred";
#[cfg(not(target_os = "macos"))]
const SHRED: &str = "shred";

/// Overwrites and removes `path`.
///
/// Write permission is granted first so read-only files can be shredded.
/// If the `shred` tool is missing or fails, the entry is removed with a
/// plain unlink instead; the content may then still be recoverable.
///
/// Calling this twice on the same path fails the second time: callers are
/// expected to track what they already removed.
///
/// # Errors
///
/// - [`StripError::UnableToWriteFile`] if permissions cannot be relaxed
///   (this includes the path no longer existing)
/// - [`StripError::UnableToRemoveFile`] if the entry cannot be removed
pub fn secure_remove(path: &Path) -> Result<()> {
    make_writable(path).map_err(|source| {
        tracing::error!(path = %path.display(), "unable to add write rights");
        StripError::UnableToWriteFile {
            path: path.to_path_buf(),
            source,
        }
    })?;

    match Command::new(SHRED)
        .arg("--remove")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => {
            tracing::warn!(path = %path.display(), %status, "unable to securely remove");
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "{SHRED} unavailable");
        }
    }

    fs::remove_file(path).map_err(|source| {
        tracing::error!(path = %path.display(), "unable to remove");
        StripError::UnableToRemoveFile {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(unix)]
fn make_writable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)?.permissions().mode();
    fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o200))
}

#[cfg(not(unix))]
fn make_writable(path: &Path) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
}
