//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use metastrip_core::BackupPolicy;
use metastrip_core::StripMethod;
use metastrip_core::StripOptions;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metastrip")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove metadata from files and archives
    Clean(CleanArgs),
    /// Check whether files are free of metadata
    Check(CheckArgs),
    /// Show the metadata a file carries
    Show(ShowArgs),
    /// List supported formats
    Formats,
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct CleanArgs {
    /// Files to clean
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Keep the original and write the cleaned copy next to it
    #[arg(short, long)]
    pub backup: bool,

    /// Keep archive members of unsupported formats instead of dropping them
    #[arg(long)]
    pub add2archive: bool,

    /// Remove everything that can be removed, even at a cost in fidelity
    #[arg(short, long)]
    pub ugly: bool,
}

impl CleanArgs {
    pub fn options(&self) -> StripOptions {
        let backup = if self.backup {
            BackupPolicy::Keep
        } else {
            BackupPolicy::Overwrite
        };
        StripOptions::default()
            .with_backup(backup)
            .with_pass_through(self.add2archive)
    }

    pub fn method(&self) -> StripMethod {
        if self.ugly {
            StripMethod::Ugly
        } else {
            StripMethod::Normal
        }
    }
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Files to check
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(clap::Args)]
pub struct ShowArgs {
    /// File to inspect
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
