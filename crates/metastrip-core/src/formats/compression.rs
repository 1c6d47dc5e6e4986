//! Compression layers that can wrap a tar stream.
//!
//! The same codec is used on both sides of a rewrite: the input is decoded
//! with [`TarCompression::decoder`] and the cleaned copy re-encoded with
//! [`TarCompression::encoder`], so a `.tar.gz` stays a `.tar.gz`.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

/// Compression applied around a tar archive.
///
/// # Examples
///
/// ```
/// use metastrip_core::formats::compression::TarCompression;
///
/// assert_eq!(TarCompression::Gzip.extension(), "tar.gz");
/// assert_eq!(TarCompression::None.name(), "none");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TarCompression {
    /// Uncompressed tar.
    None,
    /// Gzip (deflate).
    Gzip,
    /// Bzip2 (Burrows-Wheeler).
    Bzip2,
}

impl TarCompression {
    /// Typical file extension for a tar archive with this compression.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::None => "tar",
            Self::Gzip => "tar.gz",
            Self::Bzip2 => "tar.bz2",
        }
    }

    /// Human-readable codec name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }

    /// Wraps `file` in the matching decompressor.
    pub(crate) fn decoder(self, file: File) -> Box<dyn Read> {
        let reader = BufReader::new(file);
        match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(GzDecoder::new(reader)),
            Self::Bzip2 => Box::new(BzDecoder::new(reader)),
        }
    }

    /// Wraps `file` in the matching compressor.
    ///
    /// The gzip header is written without a file name or timestamp.
    pub(crate) fn encoder(self, file: File) -> TarWriter {
        match self {
            Self::None => TarWriter::Plain(file),
            Self::Gzip => TarWriter::Gzip(GzEncoder::new(file, flate2::Compression::default())),
            Self::Bzip2 => TarWriter::Bzip2(BzEncoder::new(file, bzip2::Compression::default())),
        }
    }
}

/// Output stream for a rewritten tar archive.
pub(crate) enum TarWriter {
    Plain(File),
    Gzip(GzEncoder<File>),
    Bzip2(BzEncoder<File>),
}

impl TarWriter {
    /// Flushes the compressor trailer and syncs the file.
    pub(crate) fn finish(self) -> io::Result<()> {
        let file = match self {
            Self::Plain(file) => file,
            Self::Gzip(encoder) => encoder.finish()?,
            Self::Bzip2(encoder) => encoder.finish()?,
        };
        file.sync_all()
    }
}

impl Write for TarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
            Self::Bzip2(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
            Self::Bzip2(w) => w.flush(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_codec_extension() {
        assert_eq!(TarCompression::None.extension(), "tar");
        assert_eq!(TarCompression::Gzip.extension(), "tar.gz");
        assert_eq!(TarCompression::Bzip2.extension(), "tar.bz2");
    }

    #[test]
    fn test_codec_name() {
        assert_eq!(TarCompression::Gzip.name(), "gzip");
        assert_eq!(TarCompression::Bzip2.name(), "bzip2");
    }

    #[test]
    fn test_encoder_decoder_pair() {
        let temp = TempDir::new().unwrap();
        for codec in [
            TarCompression::None,
            TarCompression::Gzip,
            TarCompression::Bzip2,
        ] {
            let path = temp.path().join(codec.extension());
            let mut writer = codec.encoder(File::create(&path).unwrap());
            writer.write_all(b"payload bytes").unwrap();
            writer.finish().unwrap();

            let mut decoded = Vec::new();
            codec
                .decoder(File::open(&path).unwrap())
                .read_to_end(&mut decoded)
                .unwrap();
            assert_eq!(decoded, b"payload bytes", "codec {}", codec.name());
        }
    }

    #[test]
    fn test_gzip_output_is_compressed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x.gz");
        let mut writer = TarCompression::Gzip.encoder(File::create(&path).unwrap());
        writer.write_all(&[0u8; 4096]).unwrap();
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert!(bytes.len() < 4096);
    }
}
