//! Mimetype to handler-family lookup table.

use std::collections::BTreeMap;

use crate::Capabilities;
use crate::formats::compression::TarCompression;
use crate::formats::zip::ZipFlavor;
use crate::resolver::mimetype::BZIP_COMPRESSED_TAR;
use crate::resolver::mimetype::COMPRESSED_TAR;
use crate::resolver::mimetype::OFFICEOPENXML;
use crate::resolver::mimetype::OPENDOCUMENT;

/// Handler families a mimetype can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Tar archive with the given compression.
    Tar(TarCompression),
    /// Zip archive, plain or an office document packaged as zip.
    Zip(ZipFlavor),
    /// PNG image, parsed chunk by chunk.
    Png,
    /// JPEG image, parsed segment by segment.
    Jpeg,
    /// MPEG audio with ID3 tags.
    Mp3,
    /// FLAC audio.
    Flac,
    /// BitTorrent metainfo.
    Torrent,
    /// PDF document.
    #[cfg(feature = "pdf")]
    Pdf,
    /// Image handled by the external exiftool.
    Exiftool,
}

/// Immutable lookup table from canonical mimetype to handler family.
///
/// Optional families are only present when the matching
/// [`Capabilities`] flag is set, so callers must never assume a given
/// identifier is registered.
///
/// # Examples
///
/// ```
/// use metastrip_core::Capabilities;
/// use metastrip_core::Registry;
///
/// let registry = Registry::new(&Capabilities::none());
/// assert!(registry.get("application/zip").is_some());
/// assert!(registry.get("application/pdf").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    entries: BTreeMap<&'static str, Family>,
}

impl Registry {
    /// Builds the table for the given capabilities.
    #[must_use]
    pub fn new(capabilities: &Capabilities) -> Self {
        let mut entries = BTreeMap::new();

        entries.insert("application/x-tar", Family::Tar(TarCompression::None));
        entries.insert(COMPRESSED_TAR, Family::Tar(TarCompression::Gzip));
        entries.insert(BZIP_COMPRESSED_TAR, Family::Tar(TarCompression::Bzip2));
        entries.insert("application/zip", Family::Zip(ZipFlavor::Plain));
        entries.insert(OPENDOCUMENT, Family::Zip(ZipFlavor::OpenDocument));
        entries.insert(OFFICEOPENXML, Family::Zip(ZipFlavor::OpenXml));
        entries.insert("audio/mpeg", Family::Mp3);
        entries.insert("application/x-bittorrent", Family::Torrent);

        #[cfg(feature = "pdf")]
        if capabilities.pdf {
            entries.insert("application/pdf", Family::Pdf);
            entries.insert("application/x-pdf", Family::Pdf);
        }

        if capabilities.extended_audio {
            entries.insert("audio/x-flac", Family::Flac);
            entries.insert("audio/flac", Family::Flac);
        }

        // Same identifiers either way; exiftool wins when present.
        let (jpeg, png) = if capabilities.exiftool {
            (Family::Exiftool, Family::Exiftool)
        } else {
            (Family::Jpeg, Family::Png)
        };
        entries.insert("image/jpeg", jpeg);
        entries.insert("image/png", png);

        Self { entries }
    }

    /// Looks up the family registered for `mimetype`.
    #[must_use]
    pub fn get(&self, mimetype: &str) -> Option<Family> {
        self.entries.get(mimetype).copied()
    }

    /// Registered identifiers, sorted.
    pub fn supported_mimetypes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}
