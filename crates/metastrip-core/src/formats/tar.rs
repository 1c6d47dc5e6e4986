//! Tar encoding for the container engine.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use tar::Archive;
use tar::Builder;
use tar::Entry;
use tar::EntryType;
use tar::Header;

use crate::Result;
use crate::StripError;
use crate::container::ContainerCodec;
use crate::container::EntryFields;
use crate::container::MemberKind;
use crate::container::MemberRecord;
use crate::container::MemberSink;
use crate::container::codec::Visitor;
use crate::container::codec::read_error;
use crate::formats::compression::TarCompression;
use crate::formats::compression::TarWriter;
use crate::strip::Metadata;

/// Reads and writes tar archives with a fixed compression layer.
///
/// The compression is chosen when the handler is built from the resolved
/// mimetype, never re-detected from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TarCodec {
    compression: TarCompression,
}

impl TarCodec {
    /// Creates a codec for the given compression.
    #[must_use]
    pub const fn new(compression: TarCompression) -> Self {
        Self { compression }
    }

    /// The compression layer.
    #[must_use]
    pub const fn compression(self) -> TarCompression {
        self.compression
    }
}

/// PAX keys describing the entry's layout rather than its origin.
const STRUCTURAL_PAX_KEYS: &[&str] = &["path", "linkpath", "size"];

/// Ownership and time fields of a tar header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TarFields {
    /// Modification time, seconds since the epoch.
    pub mtime: u64,
    /// Owner id.
    pub uid: u64,
    /// Group id.
    pub gid: u64,
    /// Owner name.
    pub uname: String,
    /// Group name.
    pub gname: String,
    /// PAX extended header records other than the structural ones, in
    /// archive order. They take precedence over the header fields.
    pub pax: Vec<(String, String)>,
}

impl TarFields {
    fn from_header(header: &Header, pax: Vec<(String, String)>, container: &Path) -> Result<Self> {
        let bad = |e: std::io::Error| StripError::malformed(container, e.to_string());
        let name = |v: std::result::Result<Option<&str>, std::str::Utf8Error>| {
            v.map(|n| n.unwrap_or_default().to_string())
                .map_err(|e| StripError::malformed(container, e.to_string()))
        };

        Ok(Self {
            mtime: header.mtime().map_err(bad)?,
            uid: header.uid().map_err(bad)?,
            gid: header.gid().map_err(bad)?,
            uname: name(header.username())?,
            gname: name(header.groupname())?,
            pax,
        })
    }

    fn header_is_neutral(&self) -> bool {
        self.mtime == 0
            && self.uid == 0
            && self.gid == 0
            && self.uname.is_empty()
            && self.gname.is_empty()
    }
}

impl EntryFields for TarFields {
    fn is_neutral(&self) -> bool {
        self.header_is_neutral() && self.pax.is_empty()
    }

    fn to_meta(&self) -> Metadata {
        let mut meta = Metadata::new();
        if !self.header_is_neutral() {
            meta.insert("mtime".into(), self.mtime.to_string().into());
            meta.insert("uid".into(), self.uid.to_string().into());
            meta.insert("gid".into(), self.gid.to_string().into());
            meta.insert("uname".into(), self.uname.as_str().into());
            meta.insert("gname".into(), self.gname.as_str().into());
        }
        for (key, value) in &self.pax {
            meta.insert(key.clone(), value.as_str().into());
        }
        meta
    }
}

/// Non-structural records of the entry's PAX extended header, if any.
fn pax_records<R: Read>(entry: &mut Entry<'_, R>, container: &Path) -> Result<Vec<(String, String)>> {
    let Some(extensions) = entry.pax_extensions().map_err(|e| read_error(container, e))? else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for extension in extensions {
        let extension = extension.map_err(|e| StripError::malformed(container, e.to_string()))?;
        let key = String::from_utf8_lossy(extension.key_bytes());
        if STRUCTURAL_PAX_KEYS.contains(&key.as_ref()) {
            continue;
        }
        records.push((
            key.into_owned(),
            String::from_utf8_lossy(extension.value_bytes()).into_owned(),
        ));
    }
    Ok(records)
}

fn member_kind(entry_type: EntryType) -> MemberKind {
    match entry_type {
        EntryType::Regular | EntryType::Continuous => MemberKind::File,
        EntryType::Directory => MemberKind::Directory,
        _ => MemberKind::Other,
    }
}

impl ContainerCodec for TarCodec {
    type Fields = TarFields;
    type Sink = TarSink;

    fn name(&self) -> &'static str {
        match self.compression {
            TarCompression::None => "tar",
            TarCompression::Gzip => "tar+gzip",
            TarCompression::Bzip2 => "tar+bzip2",
        }
    }

    fn visit_members(&self, path: &Path, visit: &mut Visitor<'_, TarFields>) -> Result<()> {
        let file = File::open(path)?;
        let mut archive = Archive::new(self.compression.decoder(file));
        let entries = archive.entries().map_err(|e| read_error(path, e))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| read_error(path, e))?;
            let pax = pax_records(&mut entry, path)?;
            let header = entry.header();
            let record = MemberRecord {
                name: entry
                    .path()
                    .map_err(|e| read_error(path, e))?
                    .to_string_lossy()
                    .into_owned(),
                kind: member_kind(header.entry_type()),
                executable: header.mode().is_ok_and(|m| m & 0o111 != 0),
                fields: TarFields::from_header(header, pax, path)?,
            };

            if visit(&record, &mut entry as &mut dyn Read)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    fn create_sink(&self, file: File, path: &Path) -> Result<TarSink> {
        let mut builder = Builder::new(self.compression.encoder(file));
        builder.follow_symlinks(false);
        Ok(TarSink {
            builder,
            path: path.to_path_buf(),
        })
    }

    fn container_meta(&self, _path: &Path) -> Result<Metadata> {
        Ok(Metadata::new())
    }
}

/// Writes the Result Container for [`TarCodec`].
pub struct TarSink {
    builder: Builder<TarWriter>,
    path: PathBuf,
}

impl std::fmt::Debug for TarSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarSink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl MemberSink for TarSink {
    fn add_file(&mut self, name: &str, source: &Path, executable: bool) -> Result<()> {
        let mut file = File::open(source)?;
        let size = file.metadata()?.len();

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(if executable { 0o755 } else { 0o644 });
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_username("")?;
        header.set_groupname("")?;

        self.builder
            .append_data(&mut header, name, &mut file)
            .map_err(|e| StripError::ContainerWriteFailure {
                path: self.path.clone(),
                source: e,
            })
    }

    fn finish(self) -> Result<()> {
        let path = self.path;
        let to_failure = |source| StripError::ContainerWriteFailure {
            path: path.clone(),
            source,
        };
        let writer = self.builder.into_inner().map_err(to_failure)?;
        writer.finish().map_err(to_failure)
    }
}
