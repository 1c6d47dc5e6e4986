//! The capability contract every format handler satisfies, and the closed
//! set of handlers the resolver can produce.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

use crate::Resolver;
use crate::Result;
use crate::StripOptions;
use crate::container::RewriteReport;
use crate::container::TarStripper;
use crate::container::ZipStripper;
use crate::formats::LeafStripper;
use crate::formats::exiftool::ExiftoolStripper;
use crate::formats::flac::Flac;
use crate::formats::jpeg::Jpeg;
use crate::formats::mp3::Mp3;
#[cfg(feature = "pdf")]
use crate::formats::pdf::Pdf;
use crate::formats::png::Png;
use crate::formats::tar::TarCodec;
use crate::formats::torrent::Torrent;
use crate::formats::zip::ZipCodec;
use crate::output::PendingOutput;
use crate::resolver::Family;
use crate::resolver::ParseHandle;

/// Extraneous metadata found in a file, keyed by location.
///
/// Leaf handlers map field names to values; containers nest one map per
/// member under the member's name.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A metadata value: either a single field or a nested group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// A single field value.
    Text(String),
    /// Fields of a nested location (a container member, say).
    Nested(Metadata),
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Metadata> for MetaValue {
    fn from(value: Metadata) -> Self {
        Self::Nested(value)
    }
}

/// How aggressively to strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StripMethod {
    /// Remove metadata, keep everything that affects presentation.
    #[default]
    Normal,
    /// Also drop structure that may alter presentation.
    Ugly,
}

/// Operations every handler supports.
///
/// No implementation touches the filesystem outside its own path, the
/// reserved `.cleaned` sibling and a scratch directory it owns.
pub trait Strip {
    /// `true` iff no extraneous metadata is present anywhere in the file.
    fn is_clean(&self) -> Result<bool>;

    /// Enumerates the extraneous metadata currently present.
    fn get_meta(&self) -> Result<Metadata>;

    /// Strips metadata, preserving payload content.
    fn remove_all(&self) -> Result<()>;

    /// Like [`remove_all`](Self::remove_all), but may also alter
    /// presentation-affecting structure.
    fn remove_all_ugly(&self) -> Result<()>;

    /// Runs whichever of the two destructive operations `method` selects.
    fn strip_with(&self, method: StripMethod) -> Result<()> {
        match method {
            StripMethod::Normal => self.remove_all(),
            StripMethod::Ugly => self.remove_all_ugly(),
        }
    }
}

/// Everything a handler is bound to at construction. Read-only afterwards.
#[derive(Debug, Clone)]
pub struct StripTarget {
    pub(crate) path: PathBuf,
    pub(crate) parse: Option<ParseHandle>,
    pub(crate) mimetype: &'static str,
    pub(crate) options: StripOptions,
    pub(crate) writable: bool,
}

impl StripTarget {
    /// Path of the file being processed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Structural parse handle, if sniffing produced one.
    #[must_use]
    pub const fn parse(&self) -> Option<&ParseHandle> {
        self.parse.as_ref()
    }

    /// Canonical format identifier.
    #[must_use]
    pub const fn mimetype(&self) -> &'static str {
        self.mimetype
    }

    /// Backup and pass-through policies.
    #[must_use]
    pub const fn options(&self) -> StripOptions {
        self.options
    }

    /// Whether the file was writable when resolved.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }
}

/// Writes `bytes` as the cleaned copy of `target` and promotes it according
/// to the backup policy. Returns where the cleaned copy ended up.
pub(crate) fn finalize_output(target: &StripTarget, bytes: &[u8]) -> Result<PathBuf> {
    let pending = PendingOutput::new(target.path())?;
    pending.write(bytes)?;
    pending.commit(target.options().backup)
}

/// Outcome of [`Stripper::clean`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    /// Where the cleaned file is: the original path, or its `.cleaned`
    /// sibling when the original was kept.
    pub output: PathBuf,
    /// Per-member counts, for containers.
    pub members: Option<RewriteReport>,
}

/// A handler bound to one file; one variant per supported family.
#[derive(Debug)]
pub enum Stripper<'r> {
    /// Tar archive, any compression.
    Tar(TarStripper<'r>),
    /// Zip archive, including office documents.
    Zip(ZipStripper<'r>),
    /// PNG image.
    Png(LeafStripper<Png>),
    /// JPEG image.
    Jpeg(LeafStripper<Jpeg>),
    /// MP3 audio.
    Mp3(LeafStripper<Mp3>),
    /// FLAC audio.
    Flac(LeafStripper<Flac>),
    /// BitTorrent metainfo.
    Torrent(LeafStripper<Torrent>),
    /// PDF document.
    #[cfg(feature = "pdf")]
    Pdf(LeafStripper<Pdf>),
    /// Image handled by exiftool.
    Exiftool(ExiftoolStripper),
}

impl<'r> Stripper<'r> {
    pub(crate) fn new(family: Family, target: StripTarget, resolver: &'r Resolver) -> Self {
        match family {
            Family::Tar(compression) => {
                Self::Tar(TarStripper::new(target, TarCodec::new(compression), resolver))
            }
            Family::Zip(flavor) => Self::Zip(ZipStripper::new(target, ZipCodec::new(flavor), resolver)),
            Family::Png => Self::Png(LeafStripper::new(target)),
            Family::Jpeg => Self::Jpeg(LeafStripper::new(target)),
            Family::Mp3 => Self::Mp3(LeafStripper::new(target)),
            Family::Flac => Self::Flac(LeafStripper::new(target)),
            Family::Torrent => Self::Torrent(LeafStripper::new(target)),
            #[cfg(feature = "pdf")]
            Family::Pdf => Self::Pdf(LeafStripper::new(target)),
            Family::Exiftool => Self::Exiftool(ExiftoolStripper::new(target)),
        }
    }

    fn as_strip(&self) -> &dyn Strip {
        match self {
            Self::Tar(s) => s,
            Self::Zip(s) => s,
            Self::Png(s) => s,
            Self::Jpeg(s) => s,
            Self::Mp3(s) => s,
            Self::Flac(s) => s,
            Self::Torrent(s) => s,
            #[cfg(feature = "pdf")]
            Self::Pdf(s) => s,
            Self::Exiftool(s) => s,
        }
    }

    /// The bound file and policies.
    #[must_use]
    pub fn target(&self) -> &StripTarget {
        match self {
            Self::Tar(s) => s.target(),
            Self::Zip(s) => s.target(),
            Self::Png(s) => s.target(),
            Self::Jpeg(s) => s.target(),
            Self::Mp3(s) => s.target(),
            Self::Flac(s) => s.target(),
            Self::Torrent(s) => s.target(),
            #[cfg(feature = "pdf")]
            Self::Pdf(s) => s.target(),
            Self::Exiftool(s) => s.target(),
        }
    }

    /// Canonical format identifier of the bound file.
    #[must_use]
    pub fn mimetype(&self) -> &'static str {
        self.target().mimetype()
    }

    /// Strips the bound file and reports where the result went.
    pub fn clean(&self, method: StripMethod) -> Result<CleanReport> {
        let target = self.target();
        if !target.is_writable() {
            tracing::debug!(path = %target.path().display(), "original is read-only");
        }

        match self {
            Self::Tar(s) => s.rewrite(method).map(CleanReport::from),
            Self::Zip(s) => s.rewrite(method).map(CleanReport::from),
            Self::Png(s) => leaf_report(s.clean(method)),
            Self::Jpeg(s) => leaf_report(s.clean(method)),
            Self::Mp3(s) => leaf_report(s.clean(method)),
            Self::Flac(s) => leaf_report(s.clean(method)),
            Self::Torrent(s) => leaf_report(s.clean(method)),
            #[cfg(feature = "pdf")]
            Self::Pdf(s) => leaf_report(s.clean(method)),
            Self::Exiftool(s) => leaf_report(s.clean(method)),
        }
    }
}

fn leaf_report(output: Result<PathBuf>) -> Result<CleanReport> {
    output.map(|output| CleanReport {
        output,
        members: None,
    })
}

impl From<(PathBuf, RewriteReport)> for CleanReport {
    fn from((output, members): (PathBuf, RewriteReport)) -> Self {
        Self {
            output,
            members: Some(members),
        }
    }
}

impl Strip for Stripper<'_> {
    fn is_clean(&self) -> Result<bool> {
        self.as_strip().is_clean()
    }

    fn get_meta(&self) -> Result<Metadata> {
        self.as_strip().get_meta()
    }

    fn remove_all(&self) -> Result<()> {
        self.as_strip().remove_all()
    }

    fn remove_all_ugly(&self) -> Result<()> {
        self.as_strip().remove_all_ugly()
    }
}
