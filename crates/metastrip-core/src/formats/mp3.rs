//! MPEG audio: leading ID3v2 tags and the trailing ID3v1 tag.
//!
//! The audio frames themselves carry no identifying fields, so cleaning
//! is the same in both modes: every tag goes, every frame stays.

use std::path::Path;

use crate::Result;
use crate::StripError;
use crate::formats::ByteFormat;
use crate::formats::be_u32;
use crate::formats::insert_unique;
use crate::formats::latin1;
use crate::strip::Metadata;
use crate::strip::StripMethod;

const ID3V2_HEADER: usize = 10;
const ID3V1_LEN: usize = 128;

const FLAG_UNSYNC: u8 = 0x80;
const FLAG_EXTENDED: u8 = 0x40;
const FLAG_FOOTER: u8 = 0x10;

/// MP3 handler.
#[derive(Debug)]
pub struct Mp3;

/// 28-bit integer stored in four 7-bit bytes.
fn syncsafe(bytes: &[u8], pos: usize) -> Option<usize> {
    let b = bytes.get(pos..pos.checked_add(4)?)?;
    if b.iter().any(|&x| x & 0x80 != 0) {
        return None;
    }
    Some(b.iter().fold(0usize, |acc, &x| (acc << 7) | usize::from(x)))
}

/// Total length of the ID3v2 tag starting at `pos`, if there is one.
pub(crate) fn id3v2_len(path: &Path, bytes: &[u8], pos: usize) -> Result<Option<usize>> {
    if bytes.get(pos..pos + 3) != Some(b"ID3".as_slice()) {
        return Ok(None);
    }
    let flags = bytes.get(pos + 5).copied().unwrap_or_default();
    let size = syncsafe(bytes, pos + 6)
        .ok_or_else(|| StripError::malformed(path, "bad ID3v2 tag size"))?;
    let footer = if flags & FLAG_FOOTER == 0 { 0 } else { 10 };
    let total = ID3V2_HEADER + size + footer;
    if pos + total > bytes.len() {
        return Err(StripError::malformed(path, "ID3v2 tag runs past end of file"));
    }
    Ok(Some(total))
}

fn has_id3v1(bytes: &[u8], audio_start: usize) -> bool {
    bytes.len() >= audio_start + ID3V1_LEN && bytes[bytes.len() - ID3V1_LEN..].starts_with(b"TAG")
}

/// Undoes ID3 unsynchronisation (`FF 00` back to `FF`).
fn resync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u8;
    for &b in data {
        if !(prev == 0xFF && b == 0x00) {
            out.push(b);
        }
        prev = b;
    }
    out
}

fn utf16(data: &[u8], big_endian: bool) -> String {
    let units = data.chunks_exact(2).map(|c| {
        if big_endian {
            u16::from_be_bytes([c[0], c[1]])
        } else {
            u16::from_le_bytes([c[0], c[1]])
        }
    });
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decodes an ID3v2 encoded string: one encoding byte, then the text.
fn decode_text(data: &[u8]) -> String {
    let Some((&encoding, text)) = data.split_first() else {
        return String::new();
    };
    let decoded = match encoding {
        1 => match text {
            [0xFF, 0xFE, rest @ ..] => utf16(rest, false),
            [0xFE, 0xFF, rest @ ..] => utf16(rest, true),
            _ => utf16(text, false),
        },
        2 => utf16(text, true),
        3 => String::from_utf8_lossy(text).into_owned(),
        _ => latin1(text),
    };
    let decoded = decoded.trim_end_matches('\0');
    decoded
        .split('\0')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_frame(id: &str, data: &[u8]) -> String {
    match id {
        "WXXX" => decode_text(data),
        "COMM" | "COM" | "USLT" | "ULT" if data.len() > 4 => {
            // Encoding byte, three-letter language, then the text.
            let mut text = vec![data[0]];
            text.extend_from_slice(&data[4..]);
            decode_text(&text)
        }
        _ if id.starts_with('T') => decode_text(data),
        _ if id.starts_with('W') => latin1(data).trim_end_matches('\0').to_string(),
        _ => format!("{} bytes", data.len()),
    }
}

/// Reads the frames of the ID3v2 tag at the start of `tag`.
fn read_id3v2(tag: &[u8], meta: &mut Metadata) {
    let major = tag[3];
    let flags = tag[5];
    let body = &tag[ID3V2_HEADER..];
    let body = if flags & FLAG_UNSYNC != 0 && major < 4 {
        resync(body)
    } else {
        body.to_vec()
    };

    let mut pos = 0;
    if flags & FLAG_EXTENDED != 0 && major >= 3 {
        let ext = if major == 3 {
            be_u32(&body, 0).map(|n| n as usize + 4)
        } else {
            syncsafe(&body, 0)
        };
        pos = ext.unwrap_or(body.len());
    }

    let (id_len, header_len) = if major == 2 { (3, 6) } else { (4, 10) };
    let before = meta.len();
    while pos + header_len <= body.len() {
        let id = &body[pos..pos + id_len];
        if id[0] == 0 || !id.iter().all(u8::is_ascii_alphanumeric) {
            break;
        }
        let size = match major {
            2 => Some(
                (usize::from(body[pos + 3]) << 16)
                    | (usize::from(body[pos + 4]) << 8)
                    | usize::from(body[pos + 5]),
            ),
            3 => be_u32(&body, pos + 4).map(|n| n as usize),
            _ => syncsafe(&body, pos + 4),
        };
        let Some(size) = size.filter(|&n| pos + header_len + n <= body.len()) else {
            break;
        };

        let id = String::from_utf8_lossy(id).into_owned();
        let data = &body[pos + header_len..pos + header_len + size];
        insert_unique(meta, &id, describe_frame(&id, data));
        pos += header_len + size;
    }

    if meta.len() == before {
        insert_unique(meta, "ID3v2", "present".to_string());
    }
}

fn read_id3v1(tag: &[u8], meta: &mut Metadata) {
    let field = |range: std::ops::Range<usize>| {
        latin1(&tag[range])
            .trim_end_matches(['\0', ' '])
            .to_string()
    };
    let before = meta.len();
    for (key, range) in [
        ("title", 3..33),
        ("artist", 33..63),
        ("album", 63..93),
        ("year", 93..97),
        ("comment", 97..127),
    ] {
        let value = field(range);
        if !value.is_empty() {
            insert_unique(meta, key, value);
        }
    }
    if tag[127] != 0xFF {
        insert_unique(meta, "genre", tag[127].to_string());
    }
    if meta.len() == before {
        insert_unique(meta, "ID3v1", "present".to_string());
    }
}

/// Splits `bytes` into leading tags, audio, and trailing tag.
fn layout(path: &Path, bytes: &[u8]) -> Result<(Vec<std::ops::Range<usize>>, usize, usize)> {
    let mut tags = Vec::new();
    let mut pos = 0;
    while let Some(len) = id3v2_len(path, bytes, pos)? {
        tags.push(pos..pos + len);
        pos += len;
    }
    let end = if has_id3v1(bytes, pos) {
        bytes.len() - ID3V1_LEN
    } else {
        bytes.len()
    };
    Ok((tags, pos, end))
}

impl ByteFormat for Mp3 {
    const NAME: &'static str = "mp3";
    const SIGNATURES: &'static [&'static str] = &["audio/mpeg"];

    fn read_meta(path: &Path, bytes: &[u8]) -> Result<Metadata> {
        let (tags, _, end) = layout(path, bytes)?;
        let mut meta = Metadata::new();
        for range in tags {
            read_id3v2(&bytes[range], &mut meta);
        }
        if end < bytes.len() {
            read_id3v1(&bytes[end..], &mut meta);
        }
        Ok(meta)
    }

    fn strip(path: &Path, bytes: &[u8], _method: StripMethod) -> Result<Vec<u8>> {
        let (_, start, end) = layout(path, bytes)?;
        Ok(bytes[start..end].to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[test]
    fn test_syncsafe() {
        assert_eq!(syncsafe(&[0, 0, 2, 1], 0), Some(257));
        assert_eq!(syncsafe(&[0, 0, 0x80, 0], 0), None);
        assert_eq!(syncsafe(&[0, 0], 0), None);
    }

    #[test]
    fn test_read_both_tag_versions() {
        let mp3 = test_utils::mp3_with_tags(&[("TIT2", "Song"), ("TPE1", "alice")], Some("Old title"));
        let meta = Mp3::read_meta(Path::new("t.mp3"), &mp3).unwrap();
        assert_eq!(meta.get("TIT2"), Some(&"Song".into()));
        assert_eq!(meta.get("TPE1"), Some(&"alice".into()));
        assert_eq!(meta.get("title"), Some(&"Old title".into()));
    }

    #[test]
    fn test_strip_removes_tags_keeps_frames() {
        let mp3 = test_utils::mp3_with_tags(&[("TIT2", "Song")], Some("Old title"));
        let cleaned = Mp3::strip(Path::new("t.mp3"), &mp3, StripMethod::Normal).unwrap();
        assert!(cleaned.starts_with(&[0xFF, 0xFB]));
        assert!(Mp3::read_meta(Path::new("t.mp3"), &cleaned).unwrap().is_empty());

        let again = Mp3::strip(Path::new("t.mp3"), &cleaned, StripMethod::Ugly).unwrap();
        assert_eq!(cleaned, again);
    }

    #[test]
    fn test_empty_tag_still_reported() {
        let mp3 = test_utils::mp3_with_tags(&[], None);
        let meta = Mp3::read_meta(Path::new("t.mp3"), &mp3).unwrap();
        assert_eq!(meta.get("ID3v2"), Some(&"present".into()));
    }

    #[test]
    fn test_decode_text_encodings() {
        assert_eq!(decode_text(b"\x00caf\xe9"), "caf\u{e9}");
        assert_eq!(decode_text(b"\x01\xff\xfeh\x00i\x00"), "hi");
        assert_eq!(decode_text(b"\x02\x00h\x00i"), "hi");
        assert_eq!(decode_text(b"\x03one\x00two\x00"), "one, two");
    }

    #[test]
    fn test_comment_frame_skips_language() {
        assert_eq!(describe_frame("COMM", b"\x00eng\x00nice"), "nice");
    }

    #[test]
    fn test_tag_past_end_is_malformed() {
        let mut mp3 = test_utils::mp3_with_tags(&[("TIT2", "Song")], None);
        mp3[8] = 0x7F;
        let err = Mp3::read_meta(Path::new("t.mp3"), &mp3).unwrap_err();
        assert!(matches!(err, StripError::Malformed { .. }));
    }
}
