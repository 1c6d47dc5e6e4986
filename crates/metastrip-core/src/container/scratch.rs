//! Scratch area for members extracted out of a container.

use std::fs;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::Result;
use crate::StripError;
use crate::container::codec::read_error;
use crate::shred::secure_remove;

/// Owns every path created while extracting members of one container.
///
/// Extracted files are destroyed with [`secure_remove`]; directories are
/// removed afterwards, deepest first. Cleanup runs in [`finish`](Self::finish)
/// with error propagation, or in `Drop` on every other exit path.
#[derive(Debug)]
pub(crate) struct ScratchWorkspace {
    root: Option<TempDir>,
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl ScratchWorkspace {
    /// Creates the workspace as a hidden directory next to `container`, so
    /// extracted members live on the same filesystem as their container.
    pub(crate) fn beside(container: &Path) -> Result<Self> {
        let parent = container
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let root = tempfile::Builder::new()
            .prefix(".metastrip-")
            .tempdir_in(parent)?;
        tracing::trace!(root = %root.path().display(), "scratch workspace created");
        Ok(Self {
            root: Some(root),
            files: Vec::new(),
            dirs: Vec::new(),
        })
    }

    fn root(&self) -> &Path {
        self.root.as_ref().map_or_else(|| Path::new(""), TempDir::path)
    }

    /// Maps a member name to its location inside the workspace.
    ///
    /// Absolute names, `..` components and NUL bytes are rejected.
    pub(crate) fn member_path(&self, container: &Path, name: &str) -> Result<PathBuf> {
        if name.contains('\0') {
            return Err(StripError::malformed(
                container,
                format!("member name contains NUL: {name:?}"),
            ));
        }

        let mut relative = PathBuf::new();
        for component in Path::new(name).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StripError::malformed(
                        container,
                        format!("member escapes the archive root: {name}"),
                    ));
                }
            }
        }

        if relative.as_os_str().is_empty() {
            return Err(StripError::malformed(container, "member with an empty name"));
        }
        Ok(self.root().join(relative))
    }

    /// Writes `content` to `target`, which must come from
    /// [`member_path`](Self::member_path). Missing ancestors are created and
    /// tracked.
    pub(crate) fn extract(
        &mut self,
        container: &Path,
        target: &Path,
        content: &mut dyn Read,
    ) -> Result<()> {
        if let Some(parent) = target.parent() {
            self.create_ancestors(parent)?;
        }

        // Tracked before the first byte lands so a failed copy is still shredded.
        let file = File::create(target)?;
        self.files.push(target.to_path_buf());

        let mut writer = BufWriter::new(file);
        io::copy(content, &mut writer).map_err(|e| read_error(container, e))?;
        writer.flush()?;
        Ok(())
    }

    fn create_ancestors(&mut self, dir: &Path) -> Result<()> {
        let root = self.root().to_path_buf();
        let mut missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|p| *p != root.as_path() && p.starts_with(&root))
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect();
        missing.reverse();

        for path in missing {
            fs::create_dir(&path)?;
            self.dirs.push(path);
        }
        Ok(())
    }

    /// Records a directory member for deferred cleanup.
    pub(crate) fn defer_dir(&mut self, path: PathBuf) {
        if !self.dirs.contains(&path) {
            self.dirs.push(path);
        }
    }

    /// Securely deletes one extracted file.
    pub(crate) fn shred(&mut self, path: &Path) -> Result<()> {
        self.files.retain(|p| p != path);
        if let Err(err) = secure_remove(path) {
            if path.exists() {
                self.files.push(path.to_path_buf());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Destroys everything left in the workspace.
    pub(crate) fn finish(mut self) -> Result<()> {
        self.cleanup()
    }

    fn cleanup(&mut self) -> Result<()> {
        let Some(root) = self.root.take() else {
            return Ok(());
        };
        let mut first_error = None;

        for file in std::mem::take(&mut self.files) {
            if file.exists()
                && let Err(err) = secure_remove(&file)
            {
                tracing::error!(path = %file.display(), error = %err, "scratch file survived cleanup");
                first_error.get_or_insert(err);
            }
        }

        for dir in std::mem::take(&mut self.dirs).into_iter().rev() {
            if dir.exists()
                && let Err(err) = fs::remove_dir_all(&dir)
            {
                first_error.get_or_insert(err.into());
            }
        }

        if let Err(err) = root.close() {
            first_error.get_or_insert(err.into());
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if let Err(err) = self.cleanup() {
            tracing::warn!(error = %err, "scratch workspace cleanup failed");
        }
    }
}
