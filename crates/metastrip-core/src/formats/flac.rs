//! FLAC audio: metadata blocks between the stream marker and the frames.

use std::path::Path;

use crate::Result;
use crate::StripError;
use crate::formats::ByteFormat;
use crate::formats::be_u32;
use crate::formats::insert_unique;
use crate::formats::mp3::id3v2_len;
use crate::strip::Metadata;
use crate::strip::StripMethod;

const MARKER: &[u8; 4] = b"fLaC";
const LAST_BLOCK: u8 = 0x80;

const STREAMINFO: u8 = 0;
const PADDING: u8 = 1;
const APPLICATION: u8 = 2;
const SEEKTABLE: u8 = 3;
const VORBIS_COMMENT: u8 = 4;
const CUESHEET: u8 = 5;
const PICTURE: u8 = 6;
const INVALID: u8 = 127;

/// FLAC handler.
#[derive(Debug)]
pub struct Flac;

struct Block<'a> {
    kind: u8,
    /// Block body without its four-byte header.
    body: &'a [u8],
}

struct Stream<'a> {
    blocks: Vec<Block<'a>>,
    /// Leading ID3v2 tags some encoders prepend.
    id3: bool,
    frames: &'a [u8],
}

fn parse<'a>(path: &Path, bytes: &'a [u8]) -> Result<Stream<'a>> {
    let mut pos = 0;
    let mut id3 = false;
    while let Some(len) = id3v2_len(path, bytes, pos)? {
        pos += len;
        id3 = true;
    }
    if bytes.get(pos..pos + 4) != Some(MARKER.as_slice()) {
        return Err(StripError::malformed(path, "missing fLaC stream marker"));
    }
    pos += 4;

    let mut blocks = Vec::new();
    loop {
        let header = be_u32(bytes, pos)
            .ok_or_else(|| StripError::malformed(path, "truncated metadata block header"))?;
        let flags = bytes[pos];
        let kind = flags & !LAST_BLOCK;
        let len = (header & 0x00FF_FFFF) as usize;
        let start = pos + 4;
        if kind == INVALID || start + len > bytes.len() {
            return Err(StripError::malformed(
                path,
                format!("bad metadata block at offset {pos}"),
            ));
        }
        blocks.push(Block {
            kind,
            body: &bytes[start..start + len],
        });
        pos = start + len;
        if flags & LAST_BLOCK != 0 {
            break;
        }
    }

    if blocks.first().is_none_or(|b| b.kind != STREAMINFO) {
        return Err(StripError::malformed(path, "first block is not STREAMINFO"));
    }

    Ok(Stream {
        blocks,
        id3,
        frames: &bytes[pos..],
    })
}

fn keep(kind: u8, method: StripMethod) -> bool {
    match method {
        StripMethod::Normal => matches!(kind, STREAMINFO | PADDING | SEEKTABLE | CUESHEET),
        StripMethod::Ugly => matches!(kind, STREAMINFO | SEEKTABLE),
    }
}

fn le_u32(bytes: &[u8], pos: usize) -> Option<usize> {
    let b = bytes.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
}

/// Vendor string and `KEY=value` comments. Stops quietly at the first
/// inconsistency; whatever was read is still reported.
fn read_vorbis_comment(body: &[u8], meta: &mut Metadata) {
    let Some(vendor_len) = le_u32(body, 0) else {
        return;
    };
    let Some(vendor) = body.get(4..4 + vendor_len) else {
        return;
    };
    insert_unique(meta, "vendor", String::from_utf8_lossy(vendor).into_owned());

    let mut pos = 4 + vendor_len;
    let count = le_u32(body, pos).unwrap_or_default();
    pos += 4;
    for _ in 0..count {
        let Some(len) = le_u32(body, pos) else {
            return;
        };
        let Some(comment) = body.get(pos + 4..pos + 4 + len) else {
            return;
        };
        let comment = String::from_utf8_lossy(comment);
        match comment.split_once('=') {
            Some((key, value)) => {
                insert_unique(meta, &key.to_ascii_lowercase(), value.to_string());
            }
            None => insert_unique(meta, "comment", comment.into_owned()),
        }
        pos += 4 + len;
    }
}

fn describe_picture(body: &[u8]) -> String {
    // Picture type, then a length-prefixed mime string.
    let mime = be_u32(body, 4)
        .and_then(|len| body.get(8..8 + len as usize))
        .map(|m| String::from_utf8_lossy(m).into_owned())
        .unwrap_or_default();
    if mime.is_empty() {
        format!("{} bytes", body.len())
    } else {
        format!("{mime}, {} bytes", body.len())
    }
}

impl ByteFormat for Flac {
    const NAME: &'static str = "flac";
    const SIGNATURES: &'static [&'static str] = &["audio/x-flac", "audio/flac"];

    fn read_meta(path: &Path, bytes: &[u8]) -> Result<Metadata> {
        let stream = parse(path, bytes)?;
        let mut meta = Metadata::new();
        if stream.id3 {
            insert_unique(&mut meta, "ID3v2", "present".to_string());
        }
        for block in &stream.blocks {
            match block.kind {
                VORBIS_COMMENT => read_vorbis_comment(block.body, &mut meta),
                PICTURE => insert_unique(&mut meta, "picture", describe_picture(block.body)),
                APPLICATION => {
                    let id = block.body.get(..4).unwrap_or_default();
                    insert_unique(
                        &mut meta,
                        "application",
                        String::from_utf8_lossy(id).into_owned(),
                    );
                }
                kind if !keep(kind, StripMethod::Normal) => {
                    let size = format!("{} bytes", block.body.len());
                    insert_unique(&mut meta, &format!("block {kind}"), size);
                }
                _ => {}
            }
        }
        Ok(meta)
    }

    fn strip(path: &Path, bytes: &[u8], method: StripMethod) -> Result<Vec<u8>> {
        let stream = parse(path, bytes)?;
        let kept: Vec<&Block<'_>> = stream
            .blocks
            .iter()
            .filter(|b| keep(b.kind, method))
            .collect();

        let mut out = Vec::with_capacity(bytes.len());
        out.extend_from_slice(MARKER);
        for (i, block) in kept.iter().enumerate() {
            let last = if i + 1 == kept.len() { LAST_BLOCK } else { 0 };
            let len = u32::try_from(block.body.len())
                .map_err(|_| StripError::malformed(path, "metadata block too large"))?;
            out.push(block.kind | last);
            out.extend_from_slice(&len.to_be_bytes()[1..]);
            out.extend_from_slice(block.body);
        }
        out.extend_from_slice(stream.frames);
        Ok(out)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils;

    fn kinds(bytes: &[u8]) -> Vec<u8> {
        parse(Path::new("t.flac"), bytes)
            .unwrap()
            .blocks
            .iter()
            .map(|b| b.kind)
            .collect()
    }

    #[test]
    fn test_read_vorbis_comments() {
        let flac = test_utils::flac_with_comments(&[("ARTIST", "alice"), ("TITLE", "Song")]);
        let meta = Flac::read_meta(Path::new("t.flac"), &flac).unwrap();
        assert_eq!(meta.get("artist"), Some(&"alice".into()));
        assert_eq!(meta.get("title"), Some(&"Song".into()));
        assert_eq!(meta.get("vendor"), Some(&"metastrip test".into()));
    }

    #[test]
    fn test_strip_normal_keeps_padding() {
        let flac = test_utils::flac_with_comments(&[("ARTIST", "alice")]);
        assert_eq!(kinds(&flac), [STREAMINFO, VORBIS_COMMENT, PADDING]);

        let cleaned = Flac::strip(Path::new("t.flac"), &flac, StripMethod::Normal).unwrap();
        assert_eq!(kinds(&cleaned), [STREAMINFO, PADDING]);
        assert!(Flac::read_meta(Path::new("t.flac"), &cleaned).unwrap().is_empty());
        assert!(cleaned.ends_with(test_utils::FLAC_FRAMES));
    }

    #[test]
    fn test_strip_ugly_drops_padding_and_fixes_last_flag() {
        let flac = test_utils::flac_with_comments(&[("ARTIST", "alice")]);
        let cleaned = Flac::strip(Path::new("t.flac"), &flac, StripMethod::Ugly).unwrap();
        assert_eq!(kinds(&cleaned), [STREAMINFO]);
        assert_eq!(cleaned[4] & LAST_BLOCK, LAST_BLOCK);
    }

    #[test]
    fn test_strip_is_idempotent() {
        let flac = test_utils::flac_with_comments(&[("ARTIST", "alice")]);
        let once = Flac::strip(Path::new("t.flac"), &flac, StripMethod::Normal).unwrap();
        let twice = Flac::strip(Path::new("t.flac"), &once, StripMethod::Normal).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_marker() {
        let err = Flac::read_meta(Path::new("t.flac"), b"OggS....").unwrap_err();
        assert!(matches!(err, StripError::Malformed { .. }));
    }

    #[test]
    fn test_truncated_block() {
        let mut flac = test_utils::flac_with_comments(&[("ARTIST", "alice")]);
        flac.truncate(20);
        let err = Flac::strip(Path::new("t.flac"), &flac, StripMethod::Normal).unwrap_err();
        assert!(matches!(err, StripError::Malformed { .. }));
    }
}
