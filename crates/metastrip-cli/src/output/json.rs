//! JSON output formatter for machine-readable results.

use super::formatter::CheckOutcome;
use super::formatter::CheckResult;
use super::formatter::CleanOutcome;
use super::formatter::CleanResult;
use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use anyhow::Result;
use metastrip_core::Metadata;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter;

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_clean_results(&self, results: &[CleanResult]) -> Result<()> {
        let success = !results
            .iter()
            .any(|r| matches!(r.outcome, CleanOutcome::Failed { .. }));
        Self::output(&JsonOutput::new("clean", success, results))
    }

    fn format_check_results(&self, results: &[CheckResult]) -> Result<()> {
        let success = results
            .iter()
            .all(|r| !matches!(r.outcome, CheckOutcome::Dirty | CheckOutcome::Failed { .. }));
        Self::output(&JsonOutput::new("check", success, results))
    }

    fn format_metadata(&self, path: &Path, meta: &Metadata) -> Result<()> {
        #[derive(Serialize)]
        struct MetadataOutput<'a> {
            path: &'a Path,
            metadata: &'a Metadata,
        }

        Self::output(&JsonOutput::success(
            "show",
            MetadataOutput {
                path,
                metadata: meta,
            },
        ))
    }

    fn format_formats(&self, mimetypes: &[&str]) -> Result<()> {
        Self::output(&JsonOutput::success("formats", mimetypes))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_check_output_structure() {
        let results = vec![
            CheckResult {
                path: PathBuf::from("a.png"),
                outcome: CheckOutcome::Clean,
            },
            CheckResult {
                path: PathBuf::from("b.zip"),
                outcome: CheckOutcome::Dirty,
            },
        ];
        let json = serde_json::to_value(JsonOutput::new("check", false, &results)).unwrap();
        assert_eq!(json["data"][0]["status"], "clean");
        assert_eq!(json["data"][1]["path"], "b.zip");
        assert_eq!(json["data"][1]["status"], "dirty");
    }
}
