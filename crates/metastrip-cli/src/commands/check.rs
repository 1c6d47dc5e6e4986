//! Check command implementation

use crate::cli::CheckArgs;
use crate::error::convert_strip_error;
use crate::output::CheckOutcome;
use crate::output::CheckResult;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Result;
use anyhow::bail;
use metastrip_core::Capabilities;
use metastrip_core::Resolution;
use metastrip_core::Resolver;
use metastrip_core::Strip;
use metastrip_core::StripError;
use metastrip_core::StripOptions;
use std::path::Path;

pub fn execute(args: &CheckArgs, formatter: &dyn OutputFormatter, interactive: bool) -> Result<()> {
    let resolver = Resolver::with_capabilities(&Capabilities::detect());

    let progress = (interactive && args.files.len() > 1 && CliProgress::should_show())
        .then(|| CliProgress::new(args.files.len(), "Checking"));

    let mut results = Vec::with_capacity(args.files.len());
    for path in &args.files {
        if let Some(progress) = &progress {
            progress.start_file(path);
        }
        results.push(CheckResult {
            path: path.clone(),
            outcome: check_file(&resolver, path),
        });
        if let Some(progress) = &progress {
            progress.finish_file();
        }
    }
    drop(progress);

    formatter.format_check_results(&results)?;

    // Exit with appropriate code
    let dirty = results
        .iter()
        .filter(|r| matches!(r.outcome, CheckOutcome::Dirty))
        .count();
    let failed = results
        .iter()
        .filter(|r| matches!(r.outcome, CheckOutcome::Failed { .. }))
        .count();
    if dirty > 0 {
        bail!("{dirty} of {} files contain metadata", results.len());
    }
    if failed > 0 {
        bail!("{failed} of {} files could not be checked", results.len());
    }
    Ok(())
}

fn check_file(resolver: &Resolver, path: &Path) -> CheckOutcome {
    let stripper = match resolver.resolve(path, StripOptions::default()) {
        Resolution::Handler(stripper) => stripper,
        Resolution::Unknown(err) => return failure(err),
    };

    match stripper.is_clean() {
        Ok(true) => CheckOutcome::Clean,
        Ok(false) => CheckOutcome::Dirty,
        Err(err) => failure(err),
    }
}

fn failure(err: StripError) -> CheckOutcome {
    if err.is_unsupported() {
        CheckOutcome::Skipped {
            reason: err.to_string(),
        }
    } else {
        CheckOutcome::Failed {
            error: convert_strip_error(err).to_string(),
        }
    }
}
