//! PNG images, processed chunk by chunk.

use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;

use crate::Result;
use crate::StripError;
use crate::formats::ByteFormat;
use crate::formats::be_u16;
use crate::formats::be_u32;
use crate::formats::latin1;
use crate::strip::Metadata;
use crate::strip::StripMethod;

const SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Chunks that only carry metadata.
const METADATA_CHUNKS: &[&[u8; 4]] = &[b"tEXt", b"zTXt", b"iTXt", b"tIME", b"eXIf"];

/// Chunks kept in ugly mode: the critical ones plus transparency.
const ESSENTIAL_CHUNKS: &[&[u8; 4]] = &[b"IHDR", b"PLTE", b"IDAT", b"IEND", b"tRNS"];

/// Inflated text is capped so a crafted `zTXt` cannot exhaust memory.
const MAX_TEXT: u64 = 1 << 20;

/// PNG handler.
#[derive(Debug)]
pub struct Png;

struct Chunk<'a> {
    kind: &'a [u8; 4],
    data: &'a [u8],
    /// Length, type, data and CRC exactly as stored.
    raw: &'a [u8],
}

fn chunks<'a>(path: &Path, bytes: &'a [u8]) -> Result<Vec<Chunk<'a>>> {
    if !bytes.starts_with(SIGNATURE) {
        return Err(StripError::malformed(path, "missing PNG signature"));
    }

    let mut out = Vec::new();
    let mut pos = SIGNATURE.len();
    while pos < bytes.len() {
        let truncated = || StripError::malformed(path, format!("truncated chunk at offset {pos}"));
        let len = be_u32(bytes, pos).ok_or_else(truncated)? as usize;
        let end = pos
            .checked_add(12)
            .and_then(|n| n.checked_add(len))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(truncated)?;

        let kind: &[u8; 4] = bytes[pos + 4..pos + 8].try_into().map_err(|_| truncated())?;
        out.push(Chunk {
            kind,
            data: &bytes[pos + 8..pos + 8 + len],
            raw: &bytes[pos..end],
        });
        pos = end;
        if kind == b"IEND" {
            break;
        }
    }
    Ok(out)
}

fn keep(kind: &[u8; 4], method: StripMethod) -> bool {
    match method {
        StripMethod::Normal => !METADATA_CHUNKS.contains(&kind),
        StripMethod::Ugly => ESSENTIAL_CHUNKS.contains(&kind),
    }
}

fn split_keyword(data: &[u8]) -> (String, &[u8]) {
    match data.iter().position(|&b| b == 0) {
        Some(nul) => (
            String::from_utf8_lossy(&data[..nul]).into_owned(),
            &data[nul + 1..],
        ),
        None => (
            String::from_utf8_lossy(data).into_owned(),
            &data[data.len()..],
        ),
    }
}

fn inflate(data: &[u8]) -> String {
    let mut text = Vec::new();
    match ZlibDecoder::new(data).take(MAX_TEXT).read_to_end(&mut text) {
        Ok(_) => String::from_utf8_lossy(&text).into_owned(),
        Err(_) => format!("<{} compressed bytes>", data.len()),
    }
}

fn describe(chunk: &Chunk<'_>) -> (String, String) {
    match chunk.kind {
        b"tEXt" => {
            let (key, text) = split_keyword(chunk.data);
            (key, latin1(text))
        }
        b"zTXt" => {
            let (key, rest) = split_keyword(chunk.data);
            // First byte is the compression method.
            (key, inflate(rest.get(1..).unwrap_or_default()))
        }
        b"iTXt" => {
            let (key, rest) = split_keyword(chunk.data);
            let compressed = rest.first().is_some_and(|&flag| flag == 1);
            let rest = rest.get(2..).unwrap_or_default();
            let (_language, rest) = split_keyword(rest);
            let (_translated, text) = split_keyword(rest);
            let value = if compressed {
                inflate(text)
            } else {
                String::from_utf8_lossy(text).into_owned()
            };
            (key, value)
        }
        b"tIME" => {
            let d = chunk.data;
            let value = match (be_u16(d, 0), d.get(2..7)) {
                (Some(year), Some(&[month, day, hour, minute, second])) => {
                    format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
                }
                _ => "<invalid>".to_string(),
            };
            ("modified".to_string(), value)
        }
        other => (
            String::from_utf8_lossy(other).into_owned(),
            format!("{} bytes", chunk.data.len()),
        ),
    }
}

impl ByteFormat for Png {
    const NAME: &'static str = "png";
    const SIGNATURES: &'static [&'static str] = &["image/png", "image/apng"];

    fn read_meta(path: &Path, bytes: &[u8]) -> Result<Metadata> {
        let mut meta = Metadata::new();
        for chunk in chunks(path, bytes)? {
            if METADATA_CHUNKS.contains(&chunk.kind) {
                let (key, value) = describe(&chunk);
                meta.insert(key, value.into());
            }
        }
        Ok(meta)
    }

    fn strip(path: &Path, bytes: &[u8], method: StripMethod) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(bytes.len());
        out.extend_from_slice(SIGNATURE);
        for chunk in chunks(path, bytes)? {
            if keep(chunk.kind, method) {
                out.extend_from_slice(chunk.raw);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils;

    fn kinds(bytes: &[u8]) -> Vec<String> {
        chunks(Path::new("t.png"), bytes)
            .unwrap()
            .iter()
            .map(|c| String::from_utf8_lossy(c.kind).into_owned())
            .collect()
    }

    #[test]
    fn test_read_text_chunks() {
        let png = test_utils::png_with_text(&[("Author", "alice"), ("Software", "paint")]);
        let meta = Png::read_meta(Path::new("t.png"), &png).unwrap();
        assert_eq!(meta.get("Author"), Some(&"alice".into()));
        assert_eq!(meta.get("Software"), Some(&"paint".into()));
    }

    #[test]
    fn test_strip_normal_drops_text_keeps_ancillary() {
        let png = test_utils::png_with_chunks(&[
            (b"gAMA", &[0u8, 0, 0xb1, 0x8f][..]),
            (b"tIME", &[7u8, 0xe5, 1, 2, 3, 4, 5][..]),
        ]);
        let png = test_utils::png_insert_text(&png, "Comment", "hello");

        let meta = Png::read_meta(Path::new("t.png"), &png).unwrap();
        assert_eq!(meta.get("modified"), Some(&"2021-01-02 03:04:05".into()));

        let cleaned = Png::strip(Path::new("t.png"), &png, StripMethod::Normal).unwrap();
        assert_eq!(kinds(&cleaned), ["IHDR", "gAMA", "IDAT", "IEND"]);
        assert!(Png::read_meta(Path::new("t.png"), &cleaned).unwrap().is_empty());
    }

    #[test]
    fn test_strip_ugly_keeps_only_essentials() {
        let png = test_utils::png_with_chunks(&[(b"gAMA", &[0u8, 0, 0xb1, 0x8f][..])]);
        let cleaned = Png::strip(Path::new("t.png"), &png, StripMethod::Ugly).unwrap();
        assert_eq!(kinds(&cleaned), ["IHDR", "IDAT", "IEND"]);
    }

    #[test]
    fn test_strip_is_idempotent() {
        let png = test_utils::png_with_text(&[("Author", "alice")]);
        let once = Png::strip(Path::new("t.png"), &png, StripMethod::Normal).unwrap();
        let twice = Png::strip(Path::new("t.png"), &once, StripMethod::Normal).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_truncated_chunk() {
        let mut png = test_utils::png_with_text(&[("Author", "alice")]);
        png.truncate(20);
        let err = Png::read_meta(Path::new("t.png"), &png).unwrap_err();
        assert!(matches!(err, StripError::Malformed { .. }));
    }

    #[test]
    fn test_not_a_png() {
        let err = Png::strip(Path::new("t.png"), b"GIF89a", StripMethod::Normal).unwrap_err();
        assert!(matches!(err, StripError::Malformed { .. }));
    }
}
