//! Stream decompression shared by the downloader and the extractor.
//!
//! [`GzipStream`] wraps any `Read` holding a single gzip member and yields the
//! decompressed bytes incrementally. The downloader places it in front of a
//! network body (bridged to blocking I/O), the extractor in front of a local
//! file; both see the same bytes.

use std::io::{self, Read};

use flate2::read::GzDecoder;

use crate::error::FormatError;
use crate::utils::{ends_with_ignore_case, strip_suffix_ignore_case};

/// File-name suffix of compressed artifacts
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// Whether `name` denotes a compressed file (case-insensitive `.gz`)
#[must_use]
pub fn is_compressed_name(name: &str) -> bool {
    ends_with_ignore_case(name, COMPRESSED_SUFFIX)
}

/// `name` without its compressed suffix, if it has one
#[must_use]
pub fn decompressed_name(name: &str) -> Option<&str> {
    strip_suffix_ignore_case(name, COMPRESSED_SUFFIX)
}

/// Wrap `reader` in a gzip decompressor
pub fn decompress<R: Read>(reader: R) -> GzipStream<R> {
    GzipStream::new(reader)
}

/// Decompressing reader over a gzip byte stream
///
/// Corrupt, truncated, or non-gzip input fails the read with an `io::Error`
/// whose payload is a [`FormatError::Gzip`]; errors from the wrapped reader
/// pass through untouched. Use [`Error::from_io`](crate::Error::from_io) to
/// classify them.
pub struct GzipStream<R> {
    inner: GzDecoder<R>,
}

impl<R: Read> GzipStream<R> {
    /// Wrap `reader`
    pub fn new(reader: R) -> Self {
        Self {
            inner: GzDecoder::new(reader),
        }
    }

    /// The wrapped compressed reader
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Unwrap, returning the compressed reader
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Read for GzipStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).map_err(classify_decoder_error)
    }
}

// flate2 reports bad headers, corrupt deflate data and checksum mismatches as
// InvalidInput/InvalidData, and a missing trailer as UnexpectedEof.
fn classify_decoder_error(err: io::Error) -> io::Error {
    match err.kind() {
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            FormatError::Gzip {
                reason: err.to_string(),
            }
            .into()
        }
        _ => err,
    }
}
