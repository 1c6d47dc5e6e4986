//! Show command implementation

use crate::cli::ShowArgs;
use crate::error::add_file_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use metastrip_core::Capabilities;
use metastrip_core::Resolver;
use metastrip_core::Strip;
use metastrip_core::StripOptions;

pub fn execute(args: &ShowArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let resolver = Resolver::with_capabilities(&Capabilities::detect());
    let stripper = add_file_context(resolver.create_stripper(&args.file, StripOptions::default()))?;
    let meta = add_file_context(stripper.get_meta())?;

    formatter.format_metadata(&args.file, &meta)
}
