//! Error conversion utilities for CLI.
//!
//! Converts metastrip-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use metastrip_core::StripError;

/// Converts `StripError` to user-friendly anyhow error with context
pub fn convert_strip_error(err: StripError) -> anyhow::Error {
    match err {
        StripError::UnreadableInput { path, reason } => {
            anyhow!(
                "Cannot process '{}': {reason}\n\
                 HINT: Check that the path names an existing, readable, non-empty file.",
                path.display()
            )
        }
        StripError::UnsupportedFormat { path, mimetype } => {
            let detected = mimetype.map_or_else(String::new, |m| format!(" ({m})"));
            anyhow!(
                "Format not supported: {}{detected}\n\
                 HINT: Run `metastrip formats` to list supported formats.",
                path.display()
            )
        }
        StripError::Malformed { path, reason } => {
            anyhow!(
                "Could not parse '{}': {reason}\n\
                 HINT: The file may be corrupted, or its content may not match its name.",
                path.display()
            )
        }
        StripError::UnableToWriteFile { path, source } => {
            anyhow!(
                "Unable to write '{}': {source}\n\
                 HINT: Check ownership and permissions of the file and its directory, \
                 and remove any stale .cleaned copy.",
                path.display()
            )
        }
        StripError::UnableToRemoveFile { path, source } => {
            anyhow!(
                "Unable to remove '{}': {source}\n\
                 HINT: Check write permission on the containing directory.",
                path.display()
            )
        }
        StripError::ContainerWriteFailure { path, source } => {
            anyhow!(
                "Failed to write archive '{}': {source}\n\
                 HINT: Check free disk space and write permission on the directory.",
                path.display()
            )
        }
        StripError::Io(io_err) => anyhow!("I/O error: {io_err}"),
    }
}

/// Converts the error of a core operation on a single file.
pub fn add_file_context<T>(result: Result<T, StripError>) -> anyhow::Result<T> {
    result.map_err(convert_strip_error)
}
