//! PDF documents, through `lopdf`.

use std::path::Path;

use lopdf::Dictionary;
use lopdf::Document;
use lopdf::Object;

use crate::Result;
use crate::StripError;
use crate::formats::ByteFormat;
use crate::formats::latin1;
use crate::strip::Metadata;
use crate::strip::StripMethod;

/// PDF handler.
#[derive(Debug)]
pub struct Pdf;

fn load(path: &Path, bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| StripError::malformed(path, e.to_string()))
}

fn deref_dictionary<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn decode_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units = rest
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        _ => latin1(bytes),
    }
}

fn object_to_string(doc: &Document, obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) => decode_string(bytes),
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        Object::Integer(n) => n.to_string(),
        Object::Real(n) => n.to_string(),
        Object::Boolean(b) => b.to_string(),
        Object::Reference(id) => doc
            .get_object(*id)
            .map_or_else(|_| String::new(), |inner| object_to_string(doc, inner)),
        _ => "<object>".to_string(),
    }
}

fn catalog_mut(doc: &mut Document) -> Option<&mut Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    doc.get_object_mut(root).ok()?.as_dict_mut().ok()
}

fn catalog(doc: &Document) -> Option<&Dictionary> {
    deref_dictionary(doc, doc.trailer.get(b"Root").ok()?)
}

impl ByteFormat for Pdf {
    const NAME: &'static str = "pdf";
    const SIGNATURES: &'static [&'static str] = &["application/pdf"];

    fn read_meta(path: &Path, bytes: &[u8]) -> Result<Metadata> {
        let doc = load(path, bytes)?;
        let mut meta = Metadata::new();

        if let Ok(info) = doc.trailer.get(b"Info") {
            match deref_dictionary(&doc, info) {
                Some(dict) => {
                    for (key, value) in dict.iter() {
                        meta.insert(
                            String::from_utf8_lossy(key).into_owned(),
                            object_to_string(&doc, value).into(),
                        );
                    }
                    if dict.is_empty() {
                        meta.insert("Info".into(), "present".into());
                    }
                }
                None => {
                    meta.insert("Info".into(), "present".into());
                }
            }
        }
        if catalog(&doc).is_some_and(|c| c.has(b"Metadata")) {
            meta.insert("XMP".into(), "present".into());
        }
        Ok(meta)
    }

    fn strip(path: &Path, bytes: &[u8], method: StripMethod) -> Result<Vec<u8>> {
        let mut doc = load(path, bytes)?;
        doc.trailer.remove(b"Info");
        if method == StripMethod::Ugly {
            doc.trailer.remove(b"ID");
        }
        if let Some(catalog) = catalog_mut(&mut doc) {
            catalog.remove(b"Metadata");
            if method == StripMethod::Ugly {
                catalog.remove(b"PieceInfo");
            }
        }
        let pruned = doc.prune_objects();
        tracing::trace!(path = %path.display(), pruned = pruned.len(), "pruned unreachable objects");

        let mut out = Vec::with_capacity(bytes.len());
        doc.save_to(&mut out)
            .map_err(|e| StripError::malformed(path, e.to_string()))?;
        Ok(out)
    }
}
