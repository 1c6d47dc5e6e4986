//! Human-readable output formatter with colors and styling.

use super::formatter::CheckOutcome;
use super::formatter::CheckResult;
use super::formatter::CleanOutcome;
use super::formatter::CleanResult;
use super::formatter::OutputFormatter;
use anyhow::Result;
use console::Term;
use console::style;
use metastrip_core::MetaValue;
use metastrip_core::Metadata;
use metastrip_core::RewriteReport;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
    err: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
            err: Term::stderr(),
        }
    }

    fn success_line(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.use_colors {
            let _ = self
                .term
                .write_line(&format!("{} {message}", style("✓").green().bold()));
        } else {
            let _ = self.term.write_line(message);
        }
    }

    // Shown even in quiet mode.
    fn failure_line(&self, message: &str) {
        if self.use_colors {
            let _ = self
                .err
                .write_line(&format!("{} {message}", style("✗").red().bold()));
        } else {
            let _ = self.err.write_line(&format!("ERROR: {message}"));
        }
    }

    fn warning_line(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            let _ = self
                .err
                .write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = self.err.write_line(&format!("WARNING: {message}"));
        }
    }

    fn members_line(report: &RewriteReport) -> String {
        format!(
            "    members: {} stripped, {} passed through, {} dropped, {} skipped",
            report.stripped, report.passed_through, report.dropped, report.skipped
        )
    }

    fn metadata_lines(meta: &Metadata, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        for (key, value) in meta {
            match value {
                MetaValue::Text(text) => lines.push(format!("{indent}{key}: {text}")),
                MetaValue::Nested(nested) => {
                    lines.push(format!("{indent}{key}:"));
                    Self::metadata_lines(nested, depth + 1, lines);
                }
            }
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_clean_results(&self, results: &[CleanResult]) -> Result<()> {
        let mut cleaned = 0;
        for result in results {
            let path = result.path.display();
            match &result.outcome {
                CleanOutcome::Cleaned { output, members } => {
                    cleaned += 1;
                    if output == &result.path {
                        self.success_line(&format!("{path} cleaned"));
                    } else {
                        self.success_line(&format!("{path} cleaned to {}", output.display()));
                    }
                    if self.verbose
                        && !self.quiet
                        && let Some(report) = members
                    {
                        let _ = self.term.write_line(&Self::members_line(report));
                    }
                }
                CleanOutcome::Skipped { reason } => {
                    self.warning_line(&format!("{path} skipped: {reason}"));
                }
                CleanOutcome::Failed { error } => self.failure_line(&format!("{path}: {error}")),
            }
        }

        if !self.quiet && results.len() > 1 {
            let _ = self.term.write_line("");
            let _ = self
                .term
                .write_line(&format!("Cleaned {cleaned} of {} files", results.len()));
        }
        Ok(())
    }

    fn format_check_results(&self, results: &[CheckResult]) -> Result<()> {
        for result in results {
            let path = result.path.display();
            match &result.outcome {
                CheckOutcome::Clean => self.success_line(&format!("{path} is clean")),
                CheckOutcome::Dirty => self.failure_line(&format!("{path} contains metadata")),
                CheckOutcome::Skipped { reason } => {
                    self.warning_line(&format!("{path} skipped: {reason}"));
                }
                CheckOutcome::Failed { error } => self.failure_line(&format!("{path}: {error}")),
            }
        }
        Ok(())
    }

    fn format_metadata(&self, path: &Path, meta: &Metadata) -> Result<()> {
        if meta.is_empty() {
            if !self.quiet {
                let _ = self
                    .term
                    .write_line(&format!("No metadata found in {}", path.display()));
            }
            return Ok(());
        }

        let header = format!("[{}]", path.display());
        if self.use_colors {
            let _ = self.term.write_line(&format!("{}", style(header).bold()));
        } else {
            let _ = self.term.write_line(&header);
        }
        let mut lines = Vec::new();
        Self::metadata_lines(meta, 1, &mut lines);
        for line in lines {
            let _ = self.term.write_line(&line);
        }
        Ok(())
    }

    fn format_formats(&self, mimetypes: &[&str]) -> Result<()> {
        for mimetype in mimetypes {
            let _ = self.term.write_line(mimetype);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_lines_nest_members() {
        let mut member = Metadata::new();
        member.insert("uid".into(), "1000".into());
        let mut meta = Metadata::new();
        meta.insert("photo.png".into(), MetaValue::Nested(member));
        meta.insert("comment".into(), "hello".into());

        let mut lines = Vec::new();
        HumanFormatter::metadata_lines(&meta, 1, &mut lines);
        assert_eq!(lines, vec!["  comment: hello", "  photo.png:", "    uid: 1000"]);
    }

    #[test]
    fn test_members_line() {
        let report = RewriteReport {
            stripped: 3,
            dropped: 1,
            ..RewriteReport::default()
        };
        assert_eq!(
            HumanFormatter::members_line(&report),
            "    members: 3 stripped, 0 passed through, 1 dropped, 0 skipped"
        );
    }
}
