//! Test utilities for building fixtures with known metadata.
//!
//! Archive builders mirror the entry kinds the container engine sees;
//! the leaf helpers produce minimal but well-formed files carrying a given
//! set of metadata fields.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::Compression;
use flate2::Crc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::write::ZlibEncoder;
use zip::DateTime;
use zip::write::FullFileOptions;
use zip::write::SimpleFileOptions;

use crate::formats::compression::TarCompression;

/// Builder for TAR test archives with various entry types.
///
/// Ownership and timestamps set with [`owner`](Self::owner) and
/// [`mtime`](Self::mtime) apply to every entry added afterwards.
///
/// # Examples
///
/// ```
/// use metastrip_core::test_utils::TarTestBuilder;
///
/// let tar_data = TarTestBuilder::new()
///     .owner(1000, 1000, "alice", "staff")
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .add_symlink("link", "file.txt")
///     .build();
/// ```
pub struct TarTestBuilder {
    builder: tar::Builder<Vec<u8>>,
    uid: u64,
    gid: u64,
    uname: String,
    gname: String,
    mtime: u64,
}

impl TarTestBuilder {
    /// Creates a new TAR test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
            uid: 0,
            gid: 0,
            uname: String::new(),
            gname: String::new(),
            mtime: 0,
        }
    }

    /// Sets the owner recorded on subsequent entries.
    #[must_use]
    pub fn owner(mut self, uid: u64, gid: u64, uname: &str, gname: &str) -> Self {
        self.uid = uid;
        self.gid = gid;
        self.uname = uname.to_string();
        self.gname = gname.to_string();
        self
    }

    /// Sets the modification time recorded on subsequent entries.
    #[must_use]
    pub fn mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    fn header(&self, entry_type: tar::EntryType, size: u64, mode: u32) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_size(size);
        header.set_mode(mode);
        header.set_uid(self.uid);
        header.set_gid(self.gid);
        header.set_username(&self.uname).unwrap();
        header.set_groupname(&self.gname).unwrap();
        header.set_mtime(self.mtime);
        header
    }

    /// Adds a regular file to the archive.
    #[must_use]
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file_with_mode(path, data, 0o644)
    }

    /// Adds a regular file with custom mode.
    #[must_use]
    pub fn add_file_with_mode(mut self, path: &str, data: &[u8], mode: u32) -> Self {
        let mut header = self.header(tar::EntryType::Regular, data.len() as u64, mode);
        self.builder.append_data(&mut header, path, data).unwrap();
        self
    }

    /// Adds a local PAX extended header applying to the next entry.
    #[must_use]
    pub fn add_pax_extensions(mut self, records: &[(&str, &str)]) -> Self {
        let data: Vec<u8> = records
            .iter()
            .flat_map(|(key, value)| pax_record(key, value))
            .collect();
        let mut header = self.header(tar::EntryType::XHeader, data.len() as u64, 0o644);
        self.builder
            .append_data(&mut header, "././@PaxHeader", data.as_slice())
            .unwrap();
        self
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        let mut header = self.header(tar::EntryType::Directory, 0, 0o755);
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Adds a symlink to the archive.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = self.header(tar::EntryType::Symlink, 0, 0o777);
        self.builder
            .append_link(&mut header, path, target)
            .unwrap();
        self
    }

    /// Adds a hardlink to the archive.
    #[must_use]
    pub fn add_hardlink(mut self, path: &str, target: &str) -> Self {
        let mut header = self.header(tar::EntryType::Link, 0, 0o644);
        self.builder
            .append_link(&mut header, path, target)
            .unwrap();
        self
    }

    /// Builds and returns the TAR archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }
}

impl Default for TarTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One `"<len> key=value\n"` PAX record; the length counts its own digits.
fn pax_record(key: &str, value: &str) -> Vec<u8> {
    let body = format!(" {key}={value}\n");
    let mut len = body.len();
    loop {
        let total = body.len() + len.to_string().len();
        if total == len {
            break;
        }
        len = total;
    }
    format!("{len}{body}").into_bytes()
}

/// Builder for ZIP test archives.
///
/// # Examples
///
/// ```
/// use metastrip_core::test_utils::ZipTestBuilder;
///
/// let zip_data = ZipTestBuilder::new()
///     .modified(2021, 6, 1, 12, 0, 0)
///     .add_file("file.txt", b"content")
///     .add_directory("dir/")
///     .comment("made by alice")
///     .build();
/// ```
pub struct ZipTestBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
    modified: Option<DateTime>,
}

impl ZipTestBuilder {
    /// Creates a new ZIP test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
            modified: None,
        }
    }

    /// Sets the timestamp recorded on subsequent entries.
    #[must_use]
    pub fn modified(
        mut self,
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Self {
        self.modified =
            Some(DateTime::from_date_and_time(year, month, day, hour, minute, second).unwrap());
        self
    }

    /// Sets the archive-level comment.
    #[must_use]
    pub fn comment(mut self, comment: &str) -> Self {
        self.zip.set_comment(comment.to_string());
        self
    }

    fn options(&self, mode: u32) -> SimpleFileOptions {
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(mode);
        match self.modified {
            Some(dt) => options.last_modified_time(dt),
            None => options,
        }
    }

    /// Adds a regular file to the archive.
    #[must_use]
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file_with_mode(path, data, 0o644)
    }

    /// Adds a regular file with custom mode.
    #[must_use]
    pub fn add_file_with_mode(mut self, path: &str, data: &[u8], mode: u32) -> Self {
        let options = self.options(mode);
        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a regular file whose entry carries one extra-field record.
    #[must_use]
    pub fn add_file_with_extra(
        mut self,
        path: &str,
        data: &[u8],
        header_id: u16,
        extra: &[u8],
    ) -> Self {
        let mut options = FullFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .last_modified_time(self.modified.unwrap_or_default())
            .unix_permissions(0o644);
        options.add_extra_data(header_id, extra, false).unwrap();
        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a directory to the archive.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        let options = self.options(0o755);
        self.zip.add_directory(path, options).unwrap();
        self
    }

    /// Adds a symlink to the archive.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let options = self.options(0o777);
        self.zip.add_symlink(path, target, options).unwrap();
        self
    }

    /// Builds and returns the ZIP archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

impl Default for ZipTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Data of an Info-ZIP "ux" extra field (header id `0x7875`).
#[must_use]
pub fn unix_owner_extra(uid: u32, gid: u32) -> Vec<u8> {
    let mut data = vec![1, 4];
    data.extend_from_slice(&uid.to_le_bytes());
    data.push(4);
    data.extend_from_slice(&gid.to_le_bytes());
    data
}

/// Wraps `data` in a gzip stream.
#[must_use]
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Wraps `data` in a bzip2 stream.
#[must_use]
pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// One tar entry as read back by [`read_tar_headers`].
#[derive(Debug, Clone)]
pub struct TarHeaderInfo {
    /// Entry path.
    pub name: String,
    /// Permission bits.
    pub mode: u32,
    /// Owner id.
    pub uid: u64,
    /// Group id.
    pub gid: u64,
    /// Modification time.
    pub mtime: u64,
    /// Owner name.
    pub uname: String,
    /// Group name.
    pub gname: String,
    /// Entry content.
    pub data: Vec<u8>,
}

/// Reads every entry of a tar archive held in memory.
#[must_use]
pub fn read_tar_headers(bytes: &[u8], compression: TarCompression) -> Vec<TarHeaderInfo> {
    let reader: Box<dyn Read + '_> = match compression {
        TarCompression::None => Box::new(bytes),
        TarCompression::Gzip => Box::new(GzDecoder::new(bytes)),
        TarCompression::Bzip2 => Box::new(BzDecoder::new(bytes)),
    };
    let mut archive = tar::Archive::new(reader);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let header = entry.header().clone();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            TarHeaderInfo {
                name: entry.path().unwrap().to_string_lossy().into_owned(),
                mode: header.mode().unwrap(),
                uid: header.uid().unwrap(),
                gid: header.gid().unwrap(),
                mtime: header.mtime().unwrap(),
                uname: header.username().unwrap().unwrap_or_default().to_string(),
                gname: header.groupname().unwrap().unwrap_or_default().to_string(),
                data,
            }
        })
        .collect()
}

/// Names and contents of every file entry of a zip archive, in order.
#[must_use]
pub fn read_zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}

/// The archive-level comment of a zip archive.
#[must_use]
pub fn read_zip_comment(bytes: &[u8]) -> Vec<u8> {
    zip::ZipArchive::new(Cursor::new(bytes))
        .unwrap()
        .comment()
        .to_vec()
}

fn png_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&u32::try_from(data.len()).unwrap().to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}

/// A 1x1 RGB PNG with `chunks` placed between `IHDR` and `IDAT`.
#[must_use]
pub fn png_with_chunks(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
    let mut out = b"\x89PNG\r\n\x1a\n".to_vec();
    png_chunk(&mut out, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 2, 0, 0, 0]);
    for (kind, data) in chunks {
        png_chunk(&mut out, kind, data);
    }

    let mut pixels = ZlibEncoder::new(Vec::new(), Compression::default());
    pixels.write_all(&[0, 0xFF, 0x00, 0x00]).unwrap();
    png_chunk(&mut out, b"IDAT", &pixels.finish().unwrap());
    png_chunk(&mut out, b"IEND", &[]);
    out
}

/// A 1x1 PNG with one `tEXt` chunk per `(keyword, text)` pair.
#[must_use]
pub fn png_with_text(fields: &[(&str, &str)]) -> Vec<u8> {
    let texts: Vec<Vec<u8>> = fields
        .iter()
        .map(|(key, value)| [key.as_bytes(), &b"\0"[..], value.as_bytes()].concat())
        .collect();
    let chunks: Vec<(&[u8; 4], &[u8])> = texts.iter().map(|t| (b"tEXt", t.as_slice())).collect();
    png_with_chunks(&chunks)
}

/// Inserts a `tEXt` chunk right after the `IHDR` chunk of `png`.
#[must_use]
pub fn png_insert_text(png: &[u8], keyword: &str, text: &str) -> Vec<u8> {
    // Signature (8) plus IHDR (12 + 13).
    let split = 33;
    let mut out = png[..split].to_vec();
    png_chunk(
        &mut out,
        b"tEXt",
        &[keyword.as_bytes(), &b"\0"[..], text.as_bytes()].concat(),
    );
    out.extend_from_slice(&png[split..]);
    out
}

/// A JPEG with `segments` (marker, payload) between SOI and the scan.
#[must_use]
pub fn jpeg_with_segments(segments: &[(u8, &[u8])]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    for (marker, payload) in segments {
        out.extend_from_slice(&[0xFF, *marker]);
        out.extend_from_slice(&u16::try_from(payload.len() + 2).unwrap().to_be_bytes());
        out.extend_from_slice(payload);
    }
    // Start of scan, a few bytes of entropy-coded data (with a stuffed
    // 0xFF), end of image.
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    out.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56, 0x78, 0x9A, 0xBC]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

fn mp3_frames() -> Vec<u8> {
    let mut frame = vec![0xFF, 0xFB, 0x90, 0x00];
    frame.resize(417, 0);
    frame
}

/// MPEG audio with an ID3v2.3 tag holding `frames` (latin-1 text frames)
/// and, when `v1_title` is set, a trailing ID3v1 tag with that title.
#[must_use]
pub fn mp3_with_tags(frames: &[(&str, &str)], v1_title: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, text) in frames {
        body.extend_from_slice(id.as_bytes());
        body.extend_from_slice(&u32::try_from(text.len() + 1).unwrap().to_be_bytes());
        body.extend_from_slice(&[0, 0, 0]);
        body.extend_from_slice(text.as_bytes());
    }

    let size = body.len();
    let mut out = b"ID3\x03\x00\x00".to_vec();
    for shift in [21, 14, 7, 0] {
        out.push(u8::try_from((size >> shift) & 0x7F).unwrap());
    }
    out.extend_from_slice(&body);
    out.extend_from_slice(&mp3_frames());

    if let Some(title) = v1_title {
        let mut tag = b"TAG".to_vec();
        let mut field = title.as_bytes().to_vec();
        field.resize(30, 0);
        tag.extend_from_slice(&field);
        tag.resize(127, 0);
        tag.push(0xFF);
        out.extend_from_slice(&tag);
    }
    out
}

/// Audio frames placed after the metadata blocks by [`flac_with_comments`].
pub const FLAC_FRAMES: &[u8] = b"\xff\xf8\x69\x08\x00\x17\x2a frame data";

fn flac_block(out: &mut Vec<u8>, kind: u8, last: bool, body: &[u8]) {
    out.push(if last { kind | 0x80 } else { kind });
    out.extend_from_slice(&u32::try_from(body.len()).unwrap().to_be_bytes()[1..]);
    out.extend_from_slice(body);
}

/// A FLAC stream with STREAMINFO, a VORBIS_COMMENT holding `comments`,
/// and PADDING.
#[must_use]
pub fn flac_with_comments(comments: &[(&str, &str)]) -> Vec<u8> {
    let mut out = b"fLaC".to_vec();

    let mut streaminfo = vec![0x10, 0x00, 0x10, 0x00, 0, 0, 0, 0, 0, 0, 0x0A, 0xC4, 0x42, 0xF0];
    streaminfo.resize(34, 0);
    flac_block(&mut out, 0, false, &streaminfo);

    let vendor = b"metastrip test";
    let mut vorbis = Vec::new();
    vorbis.extend_from_slice(&u32::try_from(vendor.len()).unwrap().to_le_bytes());
    vorbis.extend_from_slice(vendor);
    vorbis.extend_from_slice(&u32::try_from(comments.len()).unwrap().to_le_bytes());
    for (key, value) in comments {
        let entry = format!("{key}={value}");
        vorbis.extend_from_slice(&u32::try_from(entry.len()).unwrap().to_le_bytes());
        vorbis.extend_from_slice(entry.as_bytes());
    }
    flac_block(&mut out, 4, false, &vorbis);
    flac_block(&mut out, 1, true, &[0; 16]);

    out.extend_from_slice(FLAC_FRAMES);
    out
}

fn bencode_string(out: &mut Vec<u8>, value: &[u8]) {
    out.extend_from_slice(value.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(value);
}

/// A single-file torrent with an announce URL, a creation date and one
/// extra string entry per `extras` pair.
#[must_use]
pub fn torrent_with_extras(extras: &[(&str, &str)]) -> Vec<u8> {
    let mut info = b"d6:lengthi5e4:name5:a.txt12:piece lengthi16384e6:pieces20:".to_vec();
    info.extend_from_slice(&[0xAB; 20]);
    info.push(b'e');

    let mut entries: BTreeMap<&[u8], Vec<u8>> = BTreeMap::new();
    let mut announce = Vec::new();
    bencode_string(&mut announce, b"http://tracker.example/announce");
    entries.insert(b"announce", announce);
    entries.insert(b"creation date", b"i1700000000e".to_vec());
    entries.insert(b"info", info);
    for (key, value) in extras {
        let mut encoded = Vec::new();
        bencode_string(&mut encoded, value.as_bytes());
        entries.insert(key.as_bytes(), encoded);
    }

    let mut out = vec![b'd'];
    for (key, value) in entries {
        bencode_string(&mut out, key);
        out.extend_from_slice(&value);
    }
    out.push(b'e');
    out
}

/// A one-page PDF whose trailer `/Info` dictionary holds `info`.
#[cfg(feature = "pdf")]
#[must_use]
pub fn pdf_with_info(info: &[(&str, &str)]) -> Vec<u8> {
    use lopdf::Dictionary;
    use lopdf::Document;
    use lopdf::Object;
    use lopdf::Stream;
    use lopdf::dictionary;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::from(page_id)],
        "Count" => 1_i64,
        "MediaBox" => vec![0_i64.into(), 0_i64.into(), 100_i64.into(), 100_i64.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut dict = Dictionary::new();
    for (key, value) in info {
        dict.set(*key, Object::string_literal(*value));
    }
    let info_id = doc.add_object(dict);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
