//! Per-operation policies and process-wide capability configuration.

use std::process::Command;
use std::process::Stdio;

/// What happens to the original file once a cleaned copy exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPolicy {
    /// Securely delete the original and move the cleaned copy over it.
    #[default]
    Overwrite,
    /// Leave the original untouched; the cleaned copy stays next to it
    /// under the reserved [`CLEANED_SUFFIX`](crate::CLEANED_SUFFIX).
    Keep,
}

/// Policies chosen by the caller for one stripping operation.
///
/// # Examples
///
/// ```
/// use metastrip_core::BackupPolicy;
/// use metastrip_core::StripOptions;
///
/// let options = StripOptions::default()
///     .with_backup(BackupPolicy::Keep)
///     .with_pass_through(true);
/// assert!(options.pass_through);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StripOptions {
    /// In-place replacement or keep-original.
    pub backup: BackupPolicy,

    /// Retain archive members whose format is unsupported instead of
    /// dropping them.
    pub pass_through: bool,
}

impl StripOptions {
    /// Sets the backup policy.
    #[must_use]
    pub const fn with_backup(mut self, backup: BackupPolicy) -> Self {
        self.backup = backup;
        self
    }

    /// Sets the pass-through policy.
    #[must_use]
    pub const fn with_pass_through(mut self, pass_through: bool) -> Self {
        self.pass_through = pass_through;
        self
    }

    /// Options used for members extracted out of a container: always
    /// rewritten in place, pass-through inherited.
    #[must_use]
    pub(crate) const fn for_member(self) -> Self {
        Self {
            backup: BackupPolicy::Overwrite,
            pass_through: self.pass_through,
        }
    }
}

/// Optional backends available to this process.
///
/// Built once at startup and handed to [`Registry::new`](crate::Registry::new);
/// nothing in the crate consults ambient state to find out what is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// PDF documents can be parsed and rewritten.
    pub pdf: bool,

    /// FLAC audio is handled.
    pub extended_audio: bool,

    /// The external `exiftool` binary is on `PATH`.
    pub exiftool: bool,
}

impl Capabilities {
    /// Detects compiled-in features and external tools.
    #[must_use]
    pub fn detect() -> Self {
        let caps = Self {
            pdf: cfg!(feature = "pdf"),
            extended_audio: cfg!(feature = "extended-audio"),
            exiftool: exiftool_available(),
        };
        tracing::debug!(?caps, "capabilities detected");
        caps
    }

    /// Capabilities with every optional backend disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            pdf: false,
            extended_audio: false,
            exiftool: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

fn exiftool_available() -> bool {
    Command::new("exiftool")
        .arg("-ver")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}
