//! Format handlers.
//!
//! Container encodings ([`tar`], [`zip`]) plug into the recursive engine in
//! [`crate::container`]. Everything else is a leaf: a [`ByteFormat`] that
//! turns the file's bytes into a cleaned copy, wrapped in a
//! [`LeafStripper`], or the external-tool backed [`exiftool`] handler.

pub mod compression;
pub mod exiftool;
pub mod flac;
pub mod jpeg;
pub mod mp3;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod png;
pub mod tar;
pub mod torrent;
pub mod zip;

use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use std::path::PathBuf;

use crate::Result;
use crate::StripError;
use crate::strip::Metadata;
use crate::strip::Strip;
use crate::strip::StripMethod;
use crate::strip::StripTarget;
use crate::strip::finalize_output;

/// A leaf format that can be read and rewritten entirely in memory.
pub trait ByteFormat: fmt::Debug {
    /// Short format name for logs.
    const NAME: &'static str;

    /// Mimetypes content sniffing may report for this format.
    const SIGNATURES: &'static [&'static str];

    /// Extraneous metadata present in `bytes`.
    fn read_meta(path: &Path, bytes: &[u8]) -> Result<Metadata>;

    /// `bytes` with metadata removed. Must be idempotent and must leave
    /// nothing [`read_meta`](Self::read_meta) would report.
    fn strip(path: &Path, bytes: &[u8], method: StripMethod) -> Result<Vec<u8>>;
}

/// Handler for one file of a [`ByteFormat`].
pub struct LeafStripper<F> {
    target: StripTarget,
    format: PhantomData<F>,
}

impl<F> fmt::Debug for LeafStripper<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafStripper")
            .field("format", &std::any::type_name::<F>())
            .field("target", &self.target)
            .finish()
    }
}

impl<F: ByteFormat> LeafStripper<F> {
    pub(crate) const fn new(target: StripTarget) -> Self {
        Self {
            target,
            format: PhantomData,
        }
    }

    /// The bound file and policies.
    #[must_use]
    pub const fn target(&self) -> &StripTarget {
        &self.target
    }

    fn load(&self) -> Result<Vec<u8>> {
        let path = self.target.path();
        if let Some(handle) = self.target.parse()
            && !F::SIGNATURES.contains(&handle.mimetype())
        {
            return Err(StripError::malformed(
                path,
                format!("content is {}, not {}", handle.mimetype(), F::NAME),
            ));
        }
        Ok(fs::read(path)?)
    }

    /// Writes the cleaned copy and returns where it ended up.
    pub fn clean(&self, method: StripMethod) -> Result<PathBuf> {
        let bytes = self.load()?;
        let cleaned = F::strip(self.target.path(), &bytes, method)?;
        let output = finalize_output(&self.target, &cleaned)?;
        tracing::debug!(
            path = %self.target.path().display(),
            format = F::NAME,
            removed = bytes.len().saturating_sub(cleaned.len()),
            "leaf stripped"
        );
        Ok(output)
    }
}

impl<F: ByteFormat> Strip for LeafStripper<F> {
    fn is_clean(&self) -> Result<bool> {
        Ok(self.get_meta()?.is_empty())
    }

    fn get_meta(&self) -> Result<Metadata> {
        let bytes = self.load()?;
        F::read_meta(self.target.path(), &bytes)
    }

    fn remove_all(&self) -> Result<()> {
        self.clean(StripMethod::Normal).map(drop)
    }

    fn remove_all_ugly(&self) -> Result<()> {
        self.clean(StripMethod::Ugly).map(drop)
    }
}

/// Inserts `value` under `key`, suffixing ` (2)`, ` (3)`, ... when a format
/// repeats the same field.
pub(crate) fn insert_unique(meta: &mut Metadata, key: &str, value: String) {
    if !meta.contains_key(key) {
        meta.insert(key.to_string(), value.into());
        return;
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{key} ({n})");
        if !meta.contains_key(&candidate) {
            meta.insert(candidate, value.into());
            return;
        }
        n += 1;
    }
}

/// Decodes ISO-8859-1.
pub(crate) fn latin1(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

/// Big-endian `u32` at `pos`, if in bounds.
pub(crate) fn be_u32(bytes: &[u8], pos: usize) -> Option<u32> {
    let chunk = bytes.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

/// Big-endian `u16` at `pos`, if in bounds.
pub(crate) fn be_u16(bytes: &[u8], pos: usize) -> Option<u16> {
    let chunk = bytes.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_be_bytes([chunk[0], chunk[1]]))
}
