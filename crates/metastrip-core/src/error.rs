//! Error types for metadata stripping operations.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `StripError`.
pub type Result<T> = std::result::Result<T, StripError>;

/// Why a path could not be handed to a format handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadableReason {
    /// The path does not exist or is not a regular file.
    NotFound,
    /// The current user lacks read permission.
    NotReadable,
    /// The file has zero length.
    Empty,
}

impl fmt::Display for UnreadableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not a valid file"),
            Self::NotReadable => write!(f, "not readable"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// Errors that can occur while resolving, auditing or stripping a file.
#[derive(Error, Debug)]
pub enum StripError {
    /// Input is missing, unreadable or empty.
    #[error("{path} is {reason}")]
    UnreadableInput {
        /// The offending path.
        path: PathBuf,
        /// Which check failed.
        reason: UnreadableReason,
    },

    /// No handler is registered for the resolved format.
    #[error("unsupported format for {path}{}", mimetype_suffix(.mimetype.as_deref()))]
    UnsupportedFormat {
        /// The offending path.
        path: PathBuf,
        /// Resolved mimetype, if one could be guessed at all.
        mimetype: Option<String>,
    },

    /// A handler could not parse the bytes it was given.
    #[error("malformed {path}: {reason}")]
    Malformed {
        /// The offending path.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// Write permission could not be granted before secure deletion, or
    /// the cleaned copy could not be placed.
    #[error("unable to write {path}: {source}")]
    UnableToWriteFile {
        /// The file being deleted or written.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The directory entry could not be removed.
    #[error("unable to remove {path}: {source}")]
    UnableToRemoveFile {
        /// The file that should have been deleted.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Reading or writing the container encoding failed.
    #[error("container I/O failed for {path}: {source}")]
    ContainerWriteFailure {
        /// The container being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn mimetype_suffix(mimetype: Option<&str>) -> String {
    mimetype.map_or_else(String::new, |m| format!(" ({m})"))
}

impl StripError {
    /// Builds a `Malformed` error.
    pub(crate) fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error must abort every enclosing operation.
    ///
    /// Secure-deletion failures and container/raw I/O failures are fatal.
    /// Everything else describes a single file that a container can route
    /// through its pass-through policy instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use metastrip_core::StripError;
    /// use std::path::PathBuf;
    ///
    /// let err = StripError::UnsupportedFormat {
    ///     path: PathBuf::from("notes.txt"),
    ///     mimetype: Some("text/plain".into()),
    /// };
    /// assert!(!err.is_fatal());
    ///
    /// let err = StripError::UnableToRemoveFile {
    ///     path: PathBuf::from("secret.png"),
    ///     source: std::io::Error::other("busy"),
    /// };
    /// assert!(err.is_fatal());
    /// ```
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnableToWriteFile { .. }
                | Self::UnableToRemoveFile { .. }
                | Self::ContainerWriteFailure { .. }
                | Self::Io(_)
        )
    }

    /// Returns `true` if no handler could be produced for the file.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnreadableInput { .. } | Self::UnsupportedFormat { .. }
        )
    }

    /// Returns the path this error is about, if it carries one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::UnreadableInput { path, .. }
            | Self::UnsupportedFormat { path, .. }
            | Self::Malformed { path, .. }
            | Self::UnableToWriteFile { path, .. }
            | Self::UnableToRemoveFile { path, .. }
            | Self::ContainerWriteFailure { path, .. } => Some(path),
            Self::Io(_) => None,
        }
    }
}
