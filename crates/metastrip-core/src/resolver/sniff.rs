//! Structural content sniffing.

use std::path::Path;

/// Result of matching a file's leading bytes against known signatures.
///
/// Leaf handlers use it to confirm they were handed the structure they
/// expect; container handlers carry it along untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseHandle {
    mimetype: &'static str,
    extension: &'static str,
}

impl ParseHandle {
    /// Sniffs `path`. Returns `None` when no signature matched or the file
    /// could not be read.
    pub fn sniff(path: &Path) -> Option<Self> {
        match infer::get_from_path(path) {
            Ok(Some(kind)) => Some(Self {
                mimetype: kind.mime_type(),
                extension: kind.extension(),
            }),
            Ok(None) => None,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "sniffing failed");
                None
            }
        }
    }

    /// Mimetype implied by the file's signature.
    #[must_use]
    pub const fn mimetype(&self) -> &'static str {
        self.mimetype
    }

    /// Canonical extension for the sniffed type.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.extension
    }

    #[cfg(test)]
    pub(crate) const fn fixed(mimetype: &'static str, extension: &'static str) -> Self {
        Self {
            mimetype,
            extension,
        }
    }
}
