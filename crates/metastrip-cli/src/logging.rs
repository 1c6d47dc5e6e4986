//! Tracing subscriber setup.
//!
//! Log events go to stderr so JSON on stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "warn,metastrip=debug,metastrip_core=debug";
const QUIET_FILTER: &str = "error";

fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        VERBOSE_FILTER
    } else if quiet {
        QUIET_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// verbosity flags.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, quiet)));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if let Err(err) = result {
        tracing::warn!(error = %err, "tracing already initialized");
    }
}
