//! The compressed data-stream boundary, spec.md §4.C.
//!
//! PNG wraps its filtered scanline data in a single zlib stream (RFC 1950:
//! a two-byte header, a DEFLATE payload, an Adler-32 trailer). DEFLATE
//! itself is treated as a black box per spec.md §4.C; this module is only
//! its interface with the chunk pipeline, backed by `flate2`.

use std::error::Error;
use std::fmt::{self, Display};
use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

#[derive(Debug)]
pub enum ZlibError {
    Deflate(io::Error),
    Truncated,
}

impl Display for ZlibError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZlibError::Deflate(e) => write!(f, "Error: zlib/DEFLATE stream error, '{e}'"),
            ZlibError::Truncated => write!(
                f,
                "Error: compressed stream ended before all expected scanlines were produced."
            ),
        }
    }
}

impl Error for ZlibError {}

impl From<io::Error> for ZlibError {
    fn from(error: io::Error) -> Self {
        ZlibError::Deflate(error)
    }
}

/// Decompresses a complete zlib stream (the concatenation of every IDAT
/// chunk's data, in order) into the filtered scanline bytes it encodes.
///
/// The streaming decoder tolerates scanline boundaries that don't line up
/// with DEFLATE block boundaries: it just decodes the whole logical byte
/// stream and lets the filter engine slice it into scanlines afterwards.
pub fn inflate(idat: &[u8]) -> Result<Vec<u8>, ZlibError> {
    let mut decoder = ZlibDecoder::new(idat);
    let mut out = Vec::with_capacity(idat.len() * 3);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Decompresses a zlib stream but fails with [`ZlibError::Truncated`] if it
/// produced fewer than `expected_len` bytes before ending.
pub fn inflate_at_least(idat: &[u8], expected_len: usize) -> Result<Vec<u8>, ZlibError> {
    let out = inflate(idat)?;
    if out.len() < expected_len {
        return Err(ZlibError::Truncated);
    }
    Ok(out)
}

/// Compresses `data` (concatenated filtered scanlines) into a complete zlib
/// stream at the given compression level (0-9, mapped the same way
/// `flate2::Compression::new` does).
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>, ZlibError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len()), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// A streaming zlib encoder that accepts scanlines one at a time, so the
/// writer façade can push filtered rows in without buffering the whole
/// compressed stream in memory before cutting it into IDAT chunks.
pub struct StreamingDeflate {
    encoder: ZlibEncoder<Vec<u8>>,
}

impl StreamingDeflate {
    pub fn new(level: u32) -> Self {
        Self {
            encoder: ZlibEncoder::new(Vec::new(), Compression::new(level)),
        }
    }

    /// Feeds one scanline (filter-type byte included) into the encoder and
    /// drains whatever compressed bytes are ready so far.
    pub fn push(&mut self, scanline: &[u8]) -> Result<Vec<u8>, ZlibError> {
        self.encoder.write_all(scanline)?;
        Ok(std::mem::take(self.encoder.get_mut()))
    }

    /// Finishes the stream, returning any remaining compressed bytes
    /// (including the Adler-32 trailer).
    pub fn finish(self) -> Result<Vec<u8>, ZlibError> {
        Ok(self.encoder.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_small_buffer() {
        let data = b"\x00some scanline bytes here, repeated, repeated, repeated".to_vec();
        let compressed = deflate(&data, 6).unwrap();
        let back = inflate(&compressed).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn truncated_stream_is_detected() {
        let data = vec![0u8; 64];
        let compressed = deflate(&data, 6).unwrap();
        let err = inflate_at_least(&compressed, 1024).unwrap_err();
        assert!(matches!(err, ZlibError::Truncated));
    }

    #[test]
    fn streaming_encoder_matches_one_shot() {
        let scanlines: Vec<Vec<u8>> = (0..5u8)
            .map(|i| {
                let mut line = vec![0u8];
                line.extend(vec![i; 8]);
                line
            })
            .collect();
        let mut stream = StreamingDeflate::new(6);
        let mut streamed = Vec::new();
        for line in &scanlines {
            streamed.extend(stream.push(line).unwrap());
        }
        streamed.extend(stream.finish().unwrap());

        let flat: Vec<u8> = scanlines.concat();

        assert_eq!(inflate(&streamed).unwrap(), flat);
    }
}
