//! Cleaned-copy placement and promotion.
//!
//! Every handler writes its result to a temporary file next to the input,
//! then either promotes it over the original or moves it to the
//! [`CLEANED_SUFFIX`] sibling, depending on the [`BackupPolicy`].

use std::ffi::OsString;
use std::fs;
use std::fs::File;
use std::fs::Permissions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::BackupPolicy;
use crate::Result;
use crate::StripError;
use crate::shred::secure_remove;

/// Reserved suffix for in-progress and kept cleaned copies.
pub const CLEANED_SUFFIX: &str = ".cleaned";

/// Returns the sibling path a cleaned copy of `original` is written to.
///
/// # Examples
///
/// ```
/// use metastrip_core::cleaned_path;
/// use std::path::Path;
///
/// assert_eq!(
///     cleaned_path(Path::new("dir/photos.tar.gz")),
///     Path::new("dir/photos.tar.gz.cleaned")
/// );
/// ```
#[must_use]
pub fn cleaned_path(original: &Path) -> PathBuf {
    let mut name: OsString = original.as_os_str().to_owned();
    name.push(CLEANED_SUFFIX);
    PathBuf::from(name)
}

/// A cleaned copy that is not yet in its final place.
///
/// The copy lives in a uniquely named temporary file beside the original.
/// Dropping it without [`commit`](Self::commit) removes that file and
/// nothing else.
pub(crate) struct PendingOutput {
    original: PathBuf,
    permissions: Option<Permissions>,
    file: NamedTempFile,
}

impl PendingOutput {
    pub(crate) fn new(original: &Path) -> Result<Self> {
        let parent = original
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut prefix = OsString::from(".");
        if let Some(name) = original.file_name() {
            prefix.push(name);
            prefix.push(".");
        }

        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(CLEANED_SUFFIX)
            .tempfile_in(parent)
            .map_err(|source| StripError::UnableToWriteFile {
                path: cleaned_path(original),
                source,
            })?;

        Ok(Self {
            original: original.to_path_buf(),
            permissions: fs::metadata(original).ok().map(|m| m.permissions()),
            file,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        self.file.path()
    }

    pub(crate) fn create(&self) -> std::io::Result<File> {
        self.file.as_file().try_clone()
    }

    /// Writes `bytes` as the complete cleaned copy.
    pub(crate) fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = self.file.as_file();
        file.write_all(bytes)?;
        file.flush()
    }

    /// Moves the cleaned copy to its final place and returns that place.
    ///
    /// With [`BackupPolicy::Overwrite`] the original is securely deleted
    /// and the cleaned copy renamed over it. With [`BackupPolicy::Keep`]
    /// the copy lands at [`cleaned_path`], which must not exist yet.
    pub(crate) fn commit(self, backup: BackupPolicy) -> Result<PathBuf> {
        if let Some(permissions) = &self.permissions
            && let Err(err) = fs::set_permissions(self.file.path(), permissions.clone())
        {
            tracing::warn!(path = %self.original.display(), error = %err, "unable to carry permissions over");
        }

        match backup {
            BackupPolicy::Keep => {
                let target = cleaned_path(&self.original);
                self.file
                    .persist_noclobber(&target)
                    .map_err(|err| StripError::UnableToWriteFile {
                        path: target.clone(),
                        source: err.error,
                    })?;
                Ok(target)
            }
            BackupPolicy::Overwrite => {
                secure_remove(&self.original)?;
                let original = self.original;
                self.file.persist(&original).map_err(|err| {
                    // The cleaned copy is now the only copy.
                    if let Ok((_, kept)) = err.file.keep() {
                        tracing::error!(
                            path = %original.display(),
                            kept = %kept.display(),
                            "unable to move the cleaned copy into place"
                        );
                    }
                    StripError::UnableToWriteFile {
                        path: original.clone(),
                        source: err.error,
                    }
                })?;
                Ok(original)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cleaned_path_appends_suffix() {
        assert_eq!(
            cleaned_path(Path::new("/tmp/a.zip")),
            PathBuf::from("/tmp/a.zip.cleaned")
        );
    }

    #[test]
    fn test_commit_overwrite_replaces_original() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("a.bin");
        fs::write(&original, b"dirty").unwrap();

        let pending = PendingOutput::new(&original).unwrap();
        pending.write(b"clean").unwrap();
        let final_path = pending.commit(BackupPolicy::Overwrite).unwrap();

        assert_eq!(final_path, original);
        assert_eq!(fs::read(&original).unwrap(), b"clean");
        assert!(!cleaned_path(&original).exists());
    }

    #[test]
    fn test_commit_keep_leaves_both() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("a.bin");
        fs::write(&original, b"dirty").unwrap();

        let pending = PendingOutput::new(&original).unwrap();
        pending.write(b"clean").unwrap();
        let final_path = pending.commit(BackupPolicy::Keep).unwrap();

        assert_eq!(final_path, cleaned_path(&original));
        assert_eq!(fs::read(&original).unwrap(), b"dirty");
        assert_eq!(fs::read(&final_path).unwrap(), b"clean");
    }

    #[test]
    fn test_drop_discards_uncommitted() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("a.bin");
        fs::write(&original, b"dirty").unwrap();

        {
            let pending = PendingOutput::new(&original).unwrap();
            pending.write(b"half").unwrap();
            assert!(pending.path().exists());
        }

        assert!(!cleaned_path(&original).exists());
        assert_eq!(fs::read(&original).unwrap(), b"dirty");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_drop_spares_existing_cleaned_sibling() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("a.bin");
        fs::write(&original, b"dirty").unwrap();
        fs::write(cleaned_path(&original), b"mine").unwrap();

        {
            let pending = PendingOutput::new(&original).unwrap();
            assert_ne!(pending.path(), cleaned_path(&original));
            pending.write(b"half").unwrap();
        }

        assert_eq!(fs::read(cleaned_path(&original)).unwrap(), b"mine");
    }

    #[test]
    fn test_commit_keep_refuses_to_clobber() {
        let temp = TempDir::new().unwrap();
        let original = temp.path().join("a.bin");
        fs::write(&original, b"dirty").unwrap();
        fs::write(cleaned_path(&original), b"mine").unwrap();

        let pending = PendingOutput::new(&original).unwrap();
        pending.write(b"clean").unwrap();
        let err = pending.commit(BackupPolicy::Keep).unwrap_err();

        assert!(matches!(err, StripError::UnableToWriteFile { .. }));
        assert_eq!(fs::read(cleaned_path(&original)).unwrap(), b"mine");
        assert_eq!(fs::read(&original).unwrap(), b"dirty");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_commit_overwrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let original = temp.path().join("run.sh");
        fs::write(&original, b"dirty").unwrap();
        fs::set_permissions(&original, Permissions::from_mode(0o755)).unwrap();

        let pending = PendingOutput::new(&original).unwrap();
        pending.write(b"clean").unwrap();
        pending.commit(BackupPolicy::Overwrite).unwrap();

        let mode = fs::metadata(&original).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
