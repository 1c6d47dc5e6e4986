//! Recursive metadata stripping for files and the archives holding them.
//!
//! `metastrip-core` resolves a path to a format handler and lets callers
//! audit, list or remove the metadata it carries. Archives (tar in any
//! supported compression, zip and zip-packaged office documents) are
//! rewritten member by member: every regular file is extracted, stripped by
//! its own handler, and re-added with neutral ownership and timestamps.
//!
//! # Examples
//!
//! ```no_run
//! use metastrip_core::BackupPolicy;
//! use metastrip_core::Capabilities;
//! use metastrip_core::Resolver;
//! use metastrip_core::StripMethod;
//! use metastrip_core::StripOptions;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::with_capabilities(&Capabilities::detect());
//! let options = StripOptions::default().with_backup(BackupPolicy::Keep);
//! let stripper = resolver.create_stripper("photos.tar.gz".as_ref(), options)?;
//! let report = stripper.clean(StripMethod::Normal)?;
//! println!("cleaned copy at {}", report.output.display());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod container;
pub mod error;
pub mod formats;
pub mod output;
pub mod resolver;
pub mod shred;
pub mod strip;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::BackupPolicy;
pub use config::Capabilities;
pub use config::StripOptions;
pub use container::RewriteReport;
pub use error::Result;
pub use error::StripError;
pub use error::UnreadableReason;
pub use output::CLEANED_SUFFIX;
pub use output::cleaned_path;
pub use resolver::Family;
pub use resolver::ParseHandle;
pub use resolver::Registry;
pub use resolver::Resolution;
pub use resolver::Resolver;
pub use shred::secure_remove;
pub use strip::CleanReport;
pub use strip::MetaValue;
pub use strip::Metadata;
pub use strip::Strip;
pub use strip::StripMethod;
pub use strip::StripTarget;
pub use strip::Stripper;
