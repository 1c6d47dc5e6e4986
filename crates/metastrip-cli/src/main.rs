//! Metastrip CLI - Command-line utility for removing metadata from files
//! and archives.

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod progress;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    logging::init(cli.verbose, cli.quiet);
    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);
    let interactive = !cli.json && !cli.quiet;

    match &cli.command {
        cli::Commands::Clean(args) => commands::clean::execute(args, &*formatter, interactive),
        cli::Commands::Check(args) => commands::check::execute(args, &*formatter, interactive),
        cli::Commands::Show(args) => commands::show::execute(args, &*formatter),
        cli::Commands::Formats => commands::formats::execute(&*formatter),
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    }
}
