//! Clean command implementation.

use crate::cli::CleanArgs;
use crate::error::convert_strip_error;
use crate::output::CleanOutcome;
use crate::output::CleanResult;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Result;
use anyhow::bail;
use metastrip_core::Capabilities;
use metastrip_core::Resolution;
use metastrip_core::Resolver;
use metastrip_core::StripError;
use metastrip_core::StripMethod;
use metastrip_core::StripOptions;
use std::path::Path;

pub fn execute(args: &CleanArgs, formatter: &dyn OutputFormatter, interactive: bool) -> Result<()> {
    let resolver = Resolver::with_capabilities(&Capabilities::detect());
    let options = args.options();
    let method = args.method();

    // Use progress bar if TTY is detected (not quiet, not JSON, is terminal)
    let progress = (interactive && args.files.len() > 1 && CliProgress::should_show())
        .then(|| CliProgress::new(args.files.len(), "Cleaning"));

    let mut results = Vec::with_capacity(args.files.len());
    for path in &args.files {
        if let Some(progress) = &progress {
            progress.start_file(path);
        }
        results.push(CleanResult {
            path: path.clone(),
            outcome: clean_file(&resolver, path, options, method),
        });
        if let Some(progress) = &progress {
            progress.finish_file();
        }
    }
    drop(progress);

    formatter.format_clean_results(&results)?;

    let failed = results
        .iter()
        .filter(|r| matches!(r.outcome, CleanOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        bail!("{failed} of {} files could not be cleaned", results.len());
    }
    Ok(())
}

fn clean_file(
    resolver: &Resolver,
    path: &Path,
    options: StripOptions,
    method: StripMethod,
) -> CleanOutcome {
    let stripper = match resolver.resolve(path, options) {
        Resolution::Handler(stripper) => stripper,
        Resolution::Unknown(err) => return failure(err),
    };

    match stripper.clean(method) {
        Ok(report) => CleanOutcome::Cleaned {
            output: report.output,
            members: report.members,
        },
        Err(err) => failure(err),
    }
}

/// Files without a handler are skipped; anything else left metadata behind.
fn failure(err: StripError) -> CleanOutcome {
    if err.is_unsupported() {
        CleanOutcome::Skipped {
            reason: err.to_string(),
        }
    } else {
        CleanOutcome::Failed {
            error: convert_strip_error(err).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metastrip_core::UnreadableReason;
    use std::path::PathBuf;

    #[test]
    fn test_unsupported_is_skipped() {
        let outcome = failure(StripError::UnsupportedFormat {
            path: PathBuf::from("notes.txt"),
            mimetype: None,
        });
        assert!(matches!(outcome, CleanOutcome::Skipped { .. }));
    }

    #[test]
    fn test_unreadable_is_skipped() {
        let outcome = failure(StripError::UnreadableInput {
            path: PathBuf::from("gone.png"),
            reason: UnreadableReason::NotFound,
        });
        let CleanOutcome::Skipped { reason } = outcome else {
            panic!("expected skip");
        };
        assert!(reason.contains("gone.png"));
    }

    #[test]
    fn test_malformed_is_a_failure() {
        let outcome = failure(StripError::Malformed {
            path: PathBuf::from("bad.png"),
            reason: "truncated chunk".into(),
        });
        let CleanOutcome::Failed { error } = outcome else {
            panic!("expected failure");
        };
        assert!(error.contains("bad.png"));
    }
}
