//! Filename-based mimetype guessing and identifier normalization.

use std::path::Path;

/// Identifier for gzip-compressed tar archives.
pub const COMPRESSED_TAR: &str = "application/x-compressed-tar";
/// Identifier for bzip2-compressed tar archives.
pub const BZIP_COMPRESSED_TAR: &str = "application/x-bzip-compressed-tar";
/// Family identifier every OpenDocument subtype collapses to.
pub const OPENDOCUMENT: &str = "application/opendocument";
/// Family identifier every Office Open XML subtype collapses to.
pub const OFFICEOPENXML: &str = "application/officeopenxml";

const OPENDOCUMENT_PREFIX: &str = "application/vnd.oasis.opendocument";
const OFFICEOPENXML_PREFIX: &str = "application/vnd.openxmlformats-officedocument";

/// Compound suffixes, checked before the plain extension table.
const COMPOUND_SUFFIXES: &[(&str, &str)] = &[
    (".tar.gz", COMPRESSED_TAR),
    (".tar.bz2", BZIP_COMPRESSED_TAR),
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("tar", "application/x-tar"),
    ("tgz", COMPRESSED_TAR),
    ("tbz", BZIP_COMPRESSED_TAR),
    ("tbz2", BZIP_COMPRESSED_TAR),
    ("gz", "application/gzip"),
    ("bz2", "application/x-bzip2"),
    ("zip", "application/zip"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("mp3", "audio/mpeg"),
    ("flac", "audio/x-flac"),
    ("ogg", "audio/ogg"),
    ("torrent", "application/x-bittorrent"),
    ("pdf", "application/pdf"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("odg", "application/vnd.oasis.opendocument.graphics"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("xml", "application/xml"),
    ("json", "application/json"),
];

/// Guesses a mimetype from the file name alone.
///
/// # Examples
///
/// ```
/// use metastrip_core::resolver::mimetype::guess_from_name;
/// use std::path::Path;
///
/// assert_eq!(
///     guess_from_name(Path::new("backup.TAR.GZ")),
///     Some("application/x-compressed-tar")
/// );
/// assert_eq!(guess_from_name(Path::new("README")), None);
/// ```
#[must_use]
pub fn guess_from_name(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();

    if let Some(&(_, mimetype)) = COMPOUND_SUFFIXES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
    {
        return Some(mimetype);
    }

    let extension = Path::new(&name).extension()?.to_str()?;
    EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|&(_, mimetype)| mimetype)
}

/// Returns `true` for identifiers that only say "some container" and are
/// worth refining with the file name.
#[must_use]
pub fn is_generic_container(mimetype: &str) -> bool {
    matches!(
        mimetype,
        "application/zip" | "application/gzip" | "application/x-bzip2"
    )
}

/// Collapses structured-document subtypes into their family identifiers.
///
/// # Examples
///
/// ```
/// use metastrip_core::resolver::mimetype::normalize;
///
/// assert_eq!(
///     normalize("application/vnd.oasis.opendocument.text"),
///     "application/opendocument"
/// );
/// assert_eq!(normalize("image/png"), "image/png");
/// ```
#[must_use]
pub fn normalize(mimetype: &'static str) -> &'static str {
    if mimetype.starts_with(OPENDOCUMENT_PREFIX) {
        OPENDOCUMENT
    } else if mimetype.starts_with(OFFICEOPENXML_PREFIX) {
        OFFICEOPENXML
    } else {
        mimetype
    }
}
