//! Zip encoding for the container engine, including office documents
//! packaged as zip.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use zip::CompressionMethod;
use zip::DateTime;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;

use crate::Result;
use crate::StripError;
use crate::container::ContainerCodec;
use crate::container::EntryFields;
use crate::container::MemberKind;
use crate::container::MemberRecord;
use crate::container::MemberSink;
use crate::container::codec::Visitor;
use crate::formats::insert_unique;
use crate::strip::Metadata;

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Members holding document properties in an OpenDocument package.
const OPENDOCUMENT_METADATA: &[&str] = &["meta.xml"];

/// Members holding document properties in an Office Open XML package.
const OFFICEOPENXML_METADATA: &[&str] = &[
    "docProps/core.xml",
    "docProps/app.xml",
    "docProps/custom.xml",
];

/// What kind of package a zip archive is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZipFlavor {
    /// Ordinary zip archive.
    Plain,
    /// OpenDocument (`.odt`, `.ods`, ...).
    OpenDocument,
    /// Office Open XML (`.docx`, `.xlsx`, ...).
    OpenXml,
}

impl ZipFlavor {
    const fn metadata_members(self) -> &'static [&'static str] {
        match self {
            Self::Plain => &[],
            Self::OpenDocument => OPENDOCUMENT_METADATA,
            Self::OpenXml => OFFICEOPENXML_METADATA,
        }
    }

    const fn is_office(self) -> bool {
        !matches!(self, Self::Plain)
    }
}

/// Reads and writes zip archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipCodec {
    flavor: ZipFlavor,
}

impl ZipCodec {
    /// Creates a codec for the given package flavor.
    #[must_use]
    pub const fn new(flavor: ZipFlavor) -> Self {
        Self { flavor }
    }

    /// The package flavor.
    #[must_use]
    pub const fn flavor(self) -> ZipFlavor {
        self.flavor
    }

    fn open(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
        let file = File::open(path)?;
        ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(path, e))
    }
}

/// Zip64 sizes; structural, never metadata.
const ZIP64_EXTRA: u16 = 0x0001;
const NTFS_EXTRA: u16 = 0x000a;
const PKWARE_UNIX_EXTRA: u16 = 0x000d;
const EXTENDED_TIMESTAMP_EXTRA: u16 = 0x5455;
const INFOZIP_UNIX_EXTRA: u16 = 0x5855;
const INFOZIP_OWNER_EXTRA: u16 = 0x7875;

/// Entry-level fields of a zip member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFields {
    /// DOS timestamp; `None` when the entry carries none.
    pub modified: Option<DateTime>,
    /// Per-entry comment.
    pub comment: String,
    /// Extra-field records of the central directory entry, as
    /// `(header id, data)`, zip64 sizes excluded.
    pub extra: Vec<(u16, Vec<u8>)>,
}

/// Splits a raw extra-field block into its records. Bytes too short to
/// form a record header are kept under id 0.
fn extra_records(raw: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos + 4 <= raw.len() {
        let id = u16::from_le_bytes([raw[pos], raw[pos + 1]]);
        let len = usize::from(u16::from_le_bytes([raw[pos + 2], raw[pos + 3]]));
        let end = (pos + 4 + len).min(raw.len());
        if id != ZIP64_EXTRA {
            records.push((id, raw[pos + 4..end].to_vec()));
        }
        pos = end;
    }
    if pos < raw.len() {
        records.push((0, raw[pos..].to_vec()));
    }
    records
}

fn le_uint(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

/// Info-ZIP "ux": version, then size-prefixed uid and gid.
fn describe_owner(data: &[u8]) -> Option<String> {
    let (&uid_len, rest) = data.get(1..)?.split_first()?;
    let uid = le_uint(rest.get(..usize::from(uid_len))?)?;
    let rest = &rest[usize::from(uid_len)..];
    let (&gid_len, rest) = rest.split_first()?;
    let gid = le_uint(rest.get(..usize::from(gid_len))?)?;
    Some(format!("uid={uid} gid={gid}"))
}

/// "UT": flags, then the modification time first when flagged.
fn describe_timestamp(data: &[u8]) -> Option<String> {
    let (&flags, rest) = data.split_first()?;
    if flags & 1 == 0 {
        return None;
    }
    let mtime = i32::from_le_bytes(rest.get(..4)?.try_into().ok()?);
    Some(format!("mtime={mtime}"))
}

fn describe_extra(id: u16, data: &[u8]) -> (String, String) {
    let (name, value) = match id {
        INFOZIP_OWNER_EXTRA => ("unix owner".to_string(), describe_owner(data)),
        EXTENDED_TIMESTAMP_EXTRA => ("extended timestamp".to_string(), describe_timestamp(data)),
        INFOZIP_UNIX_EXTRA | PKWARE_UNIX_EXTRA => ("unix attributes".to_string(), None),
        NTFS_EXTRA => ("ntfs times".to_string(), None),
        other => (format!("extra field 0x{other:04x}"), None),
    };
    (name, value.unwrap_or_else(|| format!("{} bytes", data.len())))
}

fn format_datetime(dt: DateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

impl EntryFields for ZipFields {
    fn is_neutral(&self) -> bool {
        self.modified.is_none_or(|dt| dt == DateTime::default())
            && self.comment.is_empty()
            && self.extra.is_empty()
    }

    fn to_meta(&self) -> Metadata {
        let mut meta = Metadata::new();
        if let Some(dt) = self.modified
            && dt != DateTime::default()
        {
            meta.insert("modified".into(), format_datetime(dt).into());
        }
        if !self.comment.is_empty() {
            meta.insert("comment".into(), self.comment.as_str().into());
        }
        for (id, data) in &self.extra {
            let (name, value) = describe_extra(*id, data);
            insert_unique(&mut meta, &name, value);
        }
        meta
    }
}

fn zip_error(path: &Path, err: ZipError) -> StripError {
    match err {
        ZipError::Io(source) => StripError::ContainerWriteFailure {
            path: path.to_path_buf(),
            source,
        },
        other => StripError::malformed(path, other.to_string()),
    }
}

impl ContainerCodec for ZipCodec {
    type Fields = ZipFields;
    type Sink = ZipSink;

    fn name(&self) -> &'static str {
        match self.flavor {
            ZipFlavor::Plain => "zip",
            ZipFlavor::OpenDocument => "opendocument",
            ZipFlavor::OpenXml => "officeopenxml",
        }
    }

    fn visit_members(&self, path: &Path, visit: &mut Visitor<'_, ZipFields>) -> Result<()> {
        let mut archive = Self::open(path)?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| zip_error(path, e))?;
            let mode = entry.unix_mode();
            let kind = if entry.is_dir() {
                MemberKind::Directory
            } else if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
                MemberKind::Other
            } else {
                MemberKind::File
            };

            let record = MemberRecord {
                name: entry.name().to_string(),
                kind,
                executable: mode.is_some_and(|m| m & 0o111 != 0),
                fields: ZipFields {
                    modified: entry.last_modified(),
                    comment: entry.comment().to_string(),
                    extra: entry.extra_data().map(extra_records).unwrap_or_default(),
                },
            };

            if visit(&record, &mut entry as &mut dyn Read)?.is_break() {
                break;
            }
        }
        Ok(())
    }

    fn create_sink(&self, file: File, path: &Path) -> Result<ZipSink> {
        let mut writer = ZipWriter::new(file);
        writer.set_comment("");
        Ok(ZipSink {
            writer,
            flavor: self.flavor,
            path: path.to_path_buf(),
        })
    }

    fn container_meta(&self, path: &Path) -> Result<Metadata> {
        let archive = Self::open(path)?;
        let mut meta = Metadata::new();
        let comment = archive.comment();
        if !comment.is_empty() {
            meta.insert(
                "comment".into(),
                String::from_utf8_lossy(comment).into_owned().into(),
            );
        }
        Ok(meta)
    }

    fn is_metadata_member(&self, name: &str) -> bool {
        self.flavor.metadata_members().contains(&name)
    }

    fn keeps_unsupported(&self) -> bool {
        self.flavor.is_office()
    }
}

/// Writes the Result Container for [`ZipCodec`].
pub struct ZipSink {
    writer: ZipWriter<File>,
    flavor: ZipFlavor,
    path: PathBuf,
}

impl std::fmt::Debug for ZipSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipSink")
            .field("flavor", &self.flavor)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ZipSink {
    fn options(&self, name: &str, executable: bool) -> SimpleFileOptions {
        // OpenDocument readers expect the `mimetype` member uncompressed.
        let method = if self.flavor == ZipFlavor::OpenDocument && name == "mimetype" {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(DateTime::default())
            .unix_permissions(if executable { 0o755 } else { 0o644 })
    }
}

impl MemberSink for ZipSink {
    fn add_file(&mut self, name: &str, source: &Path, executable: bool) -> Result<()> {
        let mut file = File::open(source)?;
        let large = file.metadata()?.len() >= u64::from(u32::MAX);
        let options = self.options(name, executable).large_file(large);

        self.writer
            .start_file(name, options)
            .map_err(|e| zip_error(&self.path, e))?;
        std::io::copy(&mut file, &mut self.writer).map_err(|e| {
            StripError::ContainerWriteFailure {
                path: self.path.clone(),
                source: e,
            }
        })?;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.writer.set_comment("");
        let file = self.writer.finish().map_err(|e| zip_error(&self.path, e))?;
        file.sync_all().map_err(|e| StripError::ContainerWriteFailure {
            path: self.path,
            source: e,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;
    use crate::test_utils;
    use crate::test_utils::ZipTestBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn collect(codec: ZipCodec, path: &Path) -> Vec<(MemberRecord<ZipFields>, Vec<u8>)> {
        let mut seen = Vec::new();
        codec
            .visit_members(path, &mut |record, content| {
                let mut bytes = Vec::new();
                content.read_to_end(&mut bytes)?;
                seen.push((record.clone(), bytes));
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        seen
    }

    #[test]
    fn test_visit_members_reports_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.zip");
        let data = ZipTestBuilder::new()
            .modified(2021, 6, 1, 12, 0, 0)
            .add_directory("docs/")
            .add_file("docs/a.txt", b"hello")
            .build();
        fs::write(&path, data).unwrap();

        let seen = collect(ZipCodec::new(ZipFlavor::Plain), &path);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0.kind, MemberKind::Directory);
        assert_eq!(seen[1].0.kind, MemberKind::File);
        assert_eq!(seen[1].1, b"hello");

        let meta = seen[1].0.fields.to_meta();
        assert_eq!(meta.get("modified"), Some(&"2021-06-01 12:00:00".into()));
        assert!(!seen[1].0.fields.is_neutral());
    }

    #[test]
    fn test_entry_comment_is_not_neutral() {
        let fields = ZipFields {
            modified: None,
            comment: "written by alice".into(),
            extra: Vec::new(),
        };
        assert!(!fields.is_neutral());
        assert_eq!(fields.to_meta().get("comment"), Some(&"written by alice".into()));
    }

    #[test]
    fn test_owner_extra_field_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.zip");
        let data = ZipTestBuilder::new()
            .add_file_with_extra(
                "a.txt",
                b"hello",
                INFOZIP_OWNER_EXTRA,
                &test_utils::unix_owner_extra(1000, 1000),
            )
            .build();
        fs::write(&path, data).unwrap();

        let seen = collect(ZipCodec::new(ZipFlavor::Plain), &path);
        let fields = &seen[0].0.fields;
        assert!(!fields.is_neutral());
        assert_eq!(
            fields.to_meta().get("unix owner"),
            Some(&"uid=1000 gid=1000".into())
        );
    }

    #[test]
    fn test_extra_records() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&ZIP64_EXTRA.to_le_bytes());
        raw.extend_from_slice(&8u16.to_le_bytes());
        raw.extend_from_slice(&[0; 8]);
        raw.extend_from_slice(&EXTENDED_TIMESTAMP_EXTRA.to_le_bytes());
        raw.extend_from_slice(&5u16.to_le_bytes());
        raw.push(1);
        raw.extend_from_slice(&1_700_000_000i32.to_le_bytes());

        let records = extra_records(&raw);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, EXTENDED_TIMESTAMP_EXTRA);
        assert_eq!(
            describe_extra(records[0].0, &records[0].1),
            ("extended timestamp".to_string(), "mtime=1700000000".to_string())
        );
        assert!(extra_records(&[]).is_empty());
    }

    #[test]
    fn test_container_comment() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.zip");
        fs::write(&path, ZipTestBuilder::new().comment("secret").build()).unwrap();

        let meta = ZipCodec::new(ZipFlavor::Plain).container_meta(&path).unwrap();
        assert_eq!(meta.get("comment"), Some(&"secret".into()));
    }

    #[test]
    fn test_sink_writes_neutral_entries() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("payload");
        fs::write(&source, b"payload").unwrap();
        let out = temp.path().join("out.zip");

        let codec = ZipCodec::new(ZipFlavor::Plain);
        let mut sink = codec.create_sink(File::create(&out).unwrap(), &out).unwrap();
        sink.add_file("dir/payload", &source, false).unwrap();
        sink.finish().unwrap();

        let seen = collect(codec, &out);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.name, "dir/payload");
        assert!(seen[0].0.fields.is_neutral());
        assert_eq!(seen[0].1, b"payload");
        assert!(codec.container_meta(&out).unwrap().is_empty());
    }

    #[test]
    fn test_opendocument_mimetype_is_stored() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("mimetype");
        fs::write(&source, b"application/vnd.oasis.opendocument.text").unwrap();
        let out = temp.path().join("out.odt");

        let codec = ZipCodec::new(ZipFlavor::OpenDocument);
        let mut sink = codec.create_sink(File::create(&out).unwrap(), &out).unwrap();
        sink.add_file("mimetype", &source, false).unwrap();
        sink.add_file("content.xml", &source, false).unwrap();
        sink.finish().unwrap();

        let mut archive = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        assert_eq!(
            archive.by_index(0).unwrap().compression(),
            CompressionMethod::Stored
        );
        assert_eq!(
            archive.by_index(1).unwrap().compression(),
            CompressionMethod::Deflated
        );
    }

    #[test]
    fn test_office_metadata_members() {
        let odf = ZipCodec::new(ZipFlavor::OpenDocument);
        assert!(odf.is_metadata_member("meta.xml"));
        assert!(!odf.is_metadata_member("content.xml"));
        assert!(odf.keeps_unsupported());

        let ooxml = ZipCodec::new(ZipFlavor::OpenXml);
        assert!(ooxml.is_metadata_member("docProps/core.xml"));
        assert!(!ooxml.is_metadata_member("word/document.xml"));

        let plain = ZipCodec::new(ZipFlavor::Plain);
        assert!(!plain.is_metadata_member("meta.xml"));
        assert!(!plain.keeps_unsupported());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.zip");
        fs::write(&path, b"PK\x03\x04 definitely not a zip").unwrap();

        let err = ZipCodec::new(ZipFlavor::Plain)
            .container_meta(&path)
            .unwrap_err();
        assert!(matches!(err, StripError::Malformed { .. }));
    }
}
