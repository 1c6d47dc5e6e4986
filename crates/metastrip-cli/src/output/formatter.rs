//! Output formatter trait for CLI results.

use anyhow::Result;
use metastrip_core::Metadata;
use metastrip_core::RewriteReport;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

/// What happened to one file given to `clean`.
#[derive(Debug, Serialize)]
pub struct CleanResult {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: CleanOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CleanOutcome {
    /// A cleaned file exists at `output`.
    Cleaned {
        output: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        members: Option<RewriteReport>,
    },
    /// Not treated; the file is left as it was.
    Skipped { reason: String },
    /// A fatal error stopped the treatment of this file.
    Failed { error: String },
}

/// Verdict of `check` for one file.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub path: PathBuf,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckOutcome {
    Clean,
    Dirty,
    Skipped { reason: String },
    Failed { error: String },
}

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format the results of a `clean` run
    fn format_clean_results(&self, results: &[CleanResult]) -> Result<()>;

    /// Format the results of a `check` run
    fn format_check_results(&self, results: &[CheckResult]) -> Result<()>;

    /// Format the metadata of one file
    fn format_metadata(&self, path: &Path, meta: &Metadata) -> Result<()>;

    /// Format the list of supported mimetypes
    fn format_formats(&self, mimetypes: &[&str]) -> Result<()>;
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn new(operation: impl Into<String>, success: bool, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: if success {
                Status::Success
            } else {
                Status::Failure
            },
            data: Some(data),
        }
    }

    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self::new(operation, true, data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_result_serialization() {
        let result = CleanResult {
            path: PathBuf::from("a.tar"),
            outcome: CleanOutcome::Cleaned {
                output: PathBuf::from("a.tar"),
                members: Some(RewriteReport {
                    stripped: 2,
                    ..RewriteReport::default()
                }),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["path"], "a.tar");
        assert_eq!(json["status"], "cleaned");
        assert_eq!(json["members"]["stripped"], 2);

        let skipped = CleanResult {
            path: PathBuf::from("b.txt"),
            outcome: CleanOutcome::Skipped {
                reason: "unsupported".into(),
            },
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "unsupported");
    }

    #[test]
    fn test_json_output_status() {
        let output = JsonOutput::new("check", false, Vec::<CheckResult>::new());
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["operation"], "check");
    }
}
