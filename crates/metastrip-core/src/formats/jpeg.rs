//! JPEG images, processed segment by segment up to the start of scan.

use std::path::Path;

use crate::Result;
use crate::StripError;
use crate::formats::ByteFormat;
use crate::formats::be_u16;
use crate::formats::insert_unique;
use crate::formats::latin1;
use crate::strip::Metadata;
use crate::strip::StripMethod;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const COM: u8 = 0xFE;
const APP0: u8 = 0xE0;
const APP2: u8 = 0xE2;
const APP14: u8 = 0xEE;
const APP15: u8 = 0xEF;

/// JPEG handler.
#[derive(Debug)]
pub struct Jpeg;

enum Segment<'a> {
    /// Marker with a length-prefixed payload.
    Marked {
        marker: u8,
        payload: &'a [u8],
        raw: &'a [u8],
    },
    /// Parameterless marker (`RSTn`, `TEM`).
    Bare { raw: &'a [u8] },
    /// Start of scan or end of image, and everything after it.
    Tail { raw: &'a [u8] },
}

const fn is_app(marker: u8) -> bool {
    matches!(marker, APP0..=APP15)
}

fn segments<'a>(path: &Path, bytes: &'a [u8]) -> Result<Vec<Segment<'a>>> {
    if !bytes.starts_with(&[0xFF, SOI]) {
        return Err(StripError::malformed(path, "missing JPEG start of image"));
    }

    let mut out = Vec::new();
    let mut pos = 2;
    loop {
        let start = pos;
        if bytes.get(pos) != Some(&0xFF) {
            return Err(StripError::malformed(
                path,
                format!("expected marker at offset {pos}"),
            ));
        }
        // Any number of 0xFF fill bytes may precede the marker code.
        while bytes.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = bytes.get(pos) else {
            return Err(StripError::malformed(path, "truncated marker"));
        };
        pos += 1;

        match marker {
            SOS | EOI => {
                out.push(Segment::Tail { raw: &bytes[start..] });
                return Ok(out);
            }
            0x01 | 0xD0..=0xD7 => out.push(Segment::Bare {
                raw: &bytes[start..pos],
            }),
            _ => {
                let len = be_u16(bytes, pos)
                    .map(usize::from)
                    .filter(|&len| len >= 2 && pos + len <= bytes.len())
                    .ok_or_else(|| {
                        StripError::malformed(path, format!("bad segment length at offset {pos}"))
                    })?;
                out.push(Segment::Marked {
                    marker,
                    payload: &bytes[pos + 2..pos + len],
                    raw: &bytes[start..pos + len],
                });
                pos += len;
            }
        }
    }
}

fn keep(marker: u8, method: StripMethod) -> bool {
    if marker == COM {
        return false;
    }
    match method {
        StripMethod::Normal => !is_app(marker) || matches!(marker, APP0 | APP2 | APP14),
        StripMethod::Ugly => !is_app(marker),
    }
}

fn describe(marker: u8, payload: &[u8]) -> (String, String) {
    if marker == COM {
        return ("comment".to_string(), latin1(payload));
    }

    let ident = payload
        .iter()
        .position(|&b| b == 0)
        .map_or(&[][..], |nul| &payload[..nul]);
    let kind = match ident {
        b"Exif" => "Exif",
        b"http://ns.adobe.com/xap/1.0/" => "XMP",
        b"http://ns.adobe.com/xmp/extension/" => "XMP extension",
        b"Photoshop 3.0" => "Photoshop IRB",
        b"Ducky" => "Ducky",
        _ => "",
    };
    let value = if kind.is_empty() {
        format!("{} bytes", payload.len())
    } else {
        format!("{kind}, {} bytes", payload.len())
    };
    (format!("APP{}", marker - APP0), value)
}

impl ByteFormat for Jpeg {
    const NAME: &'static str = "jpeg";
    const SIGNATURES: &'static [&'static str] = &["image/jpeg"];

    fn read_meta(path: &Path, bytes: &[u8]) -> Result<Metadata> {
        let mut meta = Metadata::new();
        for segment in segments(path, bytes)? {
            if let Segment::Marked { marker, payload, .. } = segment
                && !keep(marker, StripMethod::Normal)
            {
                let (key, value) = describe(marker, payload);
                insert_unique(&mut meta, &key, value);
            }
        }
        Ok(meta)
    }

    fn strip(path: &Path, bytes: &[u8], method: StripMethod) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(bytes.len());
        out.extend_from_slice(&[0xFF, SOI]);
        for segment in segments(path, bytes)? {
            match segment {
                Segment::Marked { marker, raw, .. } => {
                    if keep(marker, method) {
                        out.extend_from_slice(raw);
                    }
                }
                Segment::Bare { raw } | Segment::Tail { raw } => out.extend_from_slice(raw),
            }
        }
        Ok(out)
    }
}
