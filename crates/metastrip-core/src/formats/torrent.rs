//! BitTorrent metainfo files.
//!
//! Only the top-level dictionary is rewritten. Whitelisted entries are
//! copied byte for byte, so the `info` dictionary and with it the info hash
//! never change.

use std::path::Path;

use crate::Result;
use crate::StripError;
use crate::formats::ByteFormat;
use crate::strip::Metadata;
use crate::strip::StripMethod;

/// Top-level keys needed to join the swarm.
const WHITELIST: &[&[u8]] = &[
    b"announce",
    b"announce-list",
    b"info",
    b"nodes",
    b"httpseeds",
    b"url-list",
];

const MAX_DEPTH: usize = 64;

/// BitTorrent handler.
#[derive(Debug)]
pub struct Torrent;

struct Entry<'a> {
    key: &'a [u8],
    value: &'a [u8],
    /// Key and value exactly as encoded.
    raw: &'a [u8],
}

struct Decoder<'a, 'p> {
    path: &'p Path,
    bytes: &'a [u8],
}

impl<'a> Decoder<'a, '_> {
    fn error(&self, pos: usize, what: &str) -> StripError {
        StripError::malformed(self.path, format!("{what} at offset {pos}"))
    }

    /// Parses a byte string at `pos`; returns its contents and end offset.
    fn string(&self, pos: usize) -> Result<(&'a [u8], usize)> {
        let colon = self.bytes[pos..]
            .iter()
            .position(|&b| b == b':')
            .map(|i| pos + i)
            .ok_or_else(|| self.error(pos, "unterminated string length"))?;
        let digits = &self.bytes[pos..colon];
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(self.error(pos, "bad string length"));
        }
        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| self.error(pos, "bad string length"))?;
        let start = colon + 1;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| self.error(pos, "string runs past end of file"))?;
        Ok((&self.bytes[start..end], end))
    }

    /// Returns the end offset of the value starting at `pos`.
    fn skip(&self, pos: usize, depth: usize) -> Result<usize> {
        if depth > MAX_DEPTH {
            return Err(self.error(pos, "nesting too deep"));
        }
        match self.bytes.get(pos) {
            Some(b'i') => self.bytes[pos..]
                .iter()
                .position(|&b| b == b'e')
                .map(|i| pos + i + 1)
                .ok_or_else(|| self.error(pos, "unterminated integer")),
            Some(b'l') => {
                let mut pos = pos + 1;
                while self.bytes.get(pos) != Some(&b'e') {
                    pos = self.skip(pos, depth + 1)?;
                }
                Ok(pos + 1)
            }
            Some(b'd') => {
                let mut pos = pos + 1;
                while self.bytes.get(pos) != Some(&b'e') {
                    let (_, key_end) = self.string(pos)?;
                    pos = self.skip(key_end, depth + 1)?;
                }
                Ok(pos + 1)
            }
            Some(b'0'..=b'9') => self.string(pos).map(|(_, end)| end),
            Some(_) => Err(self.error(pos, "unexpected byte")),
            None => Err(self.error(pos, "unexpected end of file")),
        }
    }

    fn top_level(&self) -> Result<Vec<Entry<'a>>> {
        if self.bytes.first() != Some(&b'd') {
            return Err(self.error(0, "expected top-level dictionary"));
        }
        let mut entries = Vec::new();
        let mut pos = 1;
        while self.bytes.get(pos) != Some(&b'e') {
            let (key, key_end) = self.string(pos)?;
            let end = self.skip(key_end, 1)?;
            entries.push(Entry {
                key,
                value: &self.bytes[key_end..end],
                raw: &self.bytes[pos..end],
            });
            pos = end;
        }
        if pos + 1 != self.bytes.len() {
            return Err(self.error(pos + 1, "trailing data"));
        }
        Ok(entries)
    }
}

fn entries<'a>(path: &Path, bytes: &'a [u8]) -> Result<Vec<Entry<'a>>> {
    Decoder { path, bytes }.top_level()
}

fn describe(value: &[u8]) -> String {
    match value.first() {
        Some(b'i') => String::from_utf8_lossy(&value[1..value.len() - 1]).into_owned(),
        Some(b'l') => "<list>".to_string(),
        Some(b'd') => "<dictionary>".to_string(),
        _ => {
            let text = value
                .iter()
                .position(|&b| b == b':')
                .map_or(value, |colon| &value[colon + 1..]);
            String::from_utf8_lossy(text).into_owned()
        }
    }
}

impl ByteFormat for Torrent {
    const NAME: &'static str = "torrent";
    const SIGNATURES: &'static [&'static str] = &["application/x-bittorrent"];

    fn read_meta(path: &Path, bytes: &[u8]) -> Result<Metadata> {
        let mut meta = Metadata::new();
        for entry in entries(path, bytes)? {
            if !WHITELIST.contains(&entry.key) {
                meta.insert(
                    String::from_utf8_lossy(entry.key).into_owned(),
                    describe(entry.value).into(),
                );
            }
        }
        Ok(meta)
    }

    fn strip(path: &Path, bytes: &[u8], _method: StripMethod) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(bytes.len());
        out.push(b'd');
        for entry in entries(path, bytes)? {
            if WHITELIST.contains(&entry.key) {
                out.extend_from_slice(entry.raw);
            }
        }
        out.push(b'e');
        Ok(out)
    }
}
