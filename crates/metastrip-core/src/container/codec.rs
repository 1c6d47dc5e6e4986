//! Seam between the rewriting engine and a concrete container encoding.

use std::fs::File;
use std::io;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;

use crate::Result;
use crate::StripError;
use crate::strip::Metadata;

/// What a member record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Regular file; extracted, recursed into and re-added.
    File,
    /// Directory; only recorded for deferred cleanup.
    Directory,
    /// Symlinks, hardlinks, devices and anything else; never extracted.
    Other,
}

/// One entry of a container, as listed.
#[derive(Debug, Clone)]
pub struct MemberRecord<F> {
    /// Name relative to the container root.
    pub name: String,
    /// Entry kind.
    pub kind: MemberKind,
    /// Any execute permission bit is set.
    pub executable: bool,
    /// Metadata stored on the entry itself, as opposed to inside its bytes.
    pub fields: F,
}

/// Entry-level metadata of one container encoding.
pub trait EntryFields {
    /// `true` when every field already holds its neutral value.
    fn is_neutral(&self) -> bool;

    /// Non-neutral fields, by name.
    fn to_meta(&self) -> Metadata;
}

/// Writer for a Result Container.
pub trait MemberSink {
    /// Appends the file at `source` as member `name` with every entry-level
    /// field reset to its neutral value.
    fn add_file(&mut self, name: &str, source: &Path, executable: bool) -> Result<()>;

    /// Writes trailers and syncs the output.
    fn finish(self) -> Result<()>;
}

/// Callback invoked once per member with the member's content stream.
pub type Visitor<'a, F> =
    dyn FnMut(&MemberRecord<F>, &mut dyn Read) -> Result<ControlFlow<()>> + 'a;

/// A container encoding the engine can read and write.
pub trait ContainerCodec: Copy + std::fmt::Debug {
    /// Entry-level metadata carried by each member.
    type Fields: EntryFields;

    /// Writer produced by [`create_sink`](Self::create_sink).
    type Sink: MemberSink;

    /// Short encoding name for logs.
    fn name(&self) -> &'static str;

    /// Lists the members of the container at `path` in native order,
    /// handing each one to `visit` together with its content. Stops early
    /// when `visit` breaks.
    fn visit_members(&self, path: &Path, visit: &mut Visitor<'_, Self::Fields>) -> Result<()>;

    /// Starts a fresh container written to `file`. `path` is used for
    /// diagnostics only.
    fn create_sink(&self, file: File, path: &Path) -> Result<Self::Sink>;

    /// Metadata attached to the container as a whole.
    fn container_meta(&self, path: &Path) -> Result<Metadata>;

    /// Members that are themselves metadata and are dropped on rewrite.
    fn is_metadata_member(&self, _name: &str) -> bool {
        false
    }

    /// Whether members without a handler are always kept and never count
    /// as dirty, regardless of the pass-through policy.
    fn keeps_unsupported(&self) -> bool {
        false
    }
}

/// Classifies an I/O error raised while decoding a container.
pub(crate) fn read_error(path: &Path, err: io::Error) -> StripError {
    match err.kind() {
        io::ErrorKind::InvalidData
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::Other => StripError::malformed(path, err.to_string()),
        _ => StripError::ContainerWriteFailure {
            path: path.to_path_buf(),
            source: err,
        },
    }
}
