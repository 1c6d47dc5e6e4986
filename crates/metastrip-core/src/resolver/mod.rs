//! Maps a path to a format handler.
//!
//! Resolution runs in a fixed order: readability checks, content sniffing,
//! mimetype guessing and normalization, registry lookup, then handler
//! construction. Anything short of a handler is reported as
//! [`Resolution::Unknown`] rather than an `Err`, so container handlers can
//! route the member through their pass-through policy.
//!
//! # Examples
//!
//! ```no_run
//! use metastrip_core::Capabilities;
//! use metastrip_core::Resolver;
//! use metastrip_core::Strip;
//! use metastrip_core::StripOptions;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::with_capabilities(&Capabilities::detect());
//! let stripper = resolver.create_stripper("holiday.tar.gz".as_ref(), StripOptions::default())?;
//! if !stripper.is_clean()? {
//!     stripper.remove_all()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod mimetype;
pub mod registry;
pub mod sniff;

use std::fs;
use std::fs::File;
use std::path::Path;

use crate::Capabilities;
use crate::Result;
use crate::StripError;
use crate::StripOptions;
use crate::UnreadableReason;
use crate::strip::StripTarget;
use crate::strip::Stripper;

pub use registry::Family;
pub use registry::Registry;
pub use sniff::ParseHandle;

/// Outcome of resolving a path.
#[derive(Debug)]
pub enum Resolution<'r> {
    /// A handler bound to the path.
    Handler(Stripper<'r>),
    /// No handler; the error says why (unreadable input or unsupported
    /// format).
    Unknown(StripError),
}

/// Produces handlers from paths using a fixed [`Registry`].
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Registry,
}

impl Resolver {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub const fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Creates a resolver whose registry is built from `capabilities`.
    #[must_use]
    pub fn with_capabilities(capabilities: &Capabilities) -> Self {
        Self::new(Registry::new(capabilities))
    }

    /// The registry consulted by this resolver.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolves `path` into a handler bound to it.
    pub fn resolve(&self, path: &Path, options: StripOptions) -> Resolution<'_> {
        if let Err(reason) = check_readable(path) {
            tracing::warn!(path = %path.display(), %reason, "cannot process");
            return Resolution::Unknown(StripError::UnreadableInput {
                path: path.to_path_buf(),
                reason,
            });
        }

        let parse = ParseHandle::sniff(path);
        if parse.is_none() {
            tracing::info!(path = %path.display(), "unable to parse structurally");
        }

        let Some(mimetype) = guess_mimetype(path, parse.as_ref()) else {
            tracing::info!(path = %path.display(), "unable to find mimetype");
            return Resolution::Unknown(StripError::UnsupportedFormat {
                path: path.to_path_buf(),
                mimetype: None,
            });
        };

        let Some(family) = self.registry.get(mimetype) else {
            tracing::info!(path = %path.display(), mimetype, "no handler for format");
            return Resolution::Unknown(StripError::UnsupportedFormat {
                path: path.to_path_buf(),
                mimetype: Some(mimetype.to_string()),
            });
        };

        let target = StripTarget {
            path: path.to_path_buf(),
            parse,
            mimetype,
            options,
            writable: is_writable(path),
        };
        Resolution::Handler(Stripper::new(family, target, self))
    }

    /// Like [`resolve`](Self::resolve), but reports a missing handler as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`StripError::UnreadableInput`] or
    /// [`StripError::UnsupportedFormat`].
    pub fn create_stripper(&self, path: &Path, options: StripOptions) -> Result<Stripper<'_>> {
        match self.resolve(path, options) {
            Resolution::Handler(stripper) => Ok(stripper),
            Resolution::Unknown(err) => Err(err),
        }
    }
}

fn check_readable(path: &Path) -> std::result::Result<(), UnreadableReason> {
    let metadata = fs::metadata(path).map_err(|_| UnreadableReason::NotFound)?;
    if !metadata.is_file() {
        return Err(UnreadableReason::NotFound);
    }
    File::open(path).map_err(|_| UnreadableReason::NotReadable)?;
    if metadata.len() == 0 {
        return Err(UnreadableReason::Empty);
    }
    Ok(())
}

fn is_writable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| !m.permissions().readonly())
}

/// Content first, then the name. A generic container guess is refined by
/// the name when the name says something more specific.
fn guess_mimetype(path: &Path, parse: Option<&ParseHandle>) -> Option<&'static str> {
    let by_name = mimetype::guess_from_name(path);
    let primary = parse.map(ParseHandle::mimetype).or(by_name)?;

    let refined = if mimetype::is_generic_container(primary) {
        by_name.unwrap_or(primary)
    } else {
        primary
    };
    Some(mimetype::normalize(refined))
}
