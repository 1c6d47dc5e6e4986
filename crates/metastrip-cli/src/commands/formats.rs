//! Formats command implementation

use crate::output::OutputFormatter;
use anyhow::Result;
use metastrip_core::Capabilities;
use metastrip_core::Registry;

pub fn execute(formatter: &dyn OutputFormatter) -> Result<()> {
    let registry = Registry::new(&Capabilities::detect());
    let mimetypes: Vec<&str> = registry.supported_mimetypes().collect();

    formatter.format_formats(&mimetypes)
}
