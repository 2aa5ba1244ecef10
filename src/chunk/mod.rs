//! Chunk framer, spec.md §4.B: reads and writes length-prefixed,
//! type-tagged, CRC-validated chunks over any byte stream.

pub mod ancillary;

use std::error::Error;
use std::fmt::{self, Display};
use std::io::{self, Read, Write};

use crate::compression::crc;

/// The 8-byte PNG signature every file must open with.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// A chunk's 4-byte ASCII type, e.g. `IHDR`, `IDAT`, `tEXt`. The case of
/// each letter encodes a classification bit per PNG 5.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: ChunkType = ChunkType(*b"IHDR");
    pub const PLTE: ChunkType = ChunkType(*b"PLTE");
    pub const IDAT: ChunkType = ChunkType(*b"IDAT");
    pub const IEND: ChunkType = ChunkType(*b"IEND");
    pub const TRNS: ChunkType = ChunkType(*b"tRNS");
    pub const GAMA: ChunkType = ChunkType(*b"gAMA");
    pub const CHRM: ChunkType = ChunkType(*b"cHRM");
    pub const SBIT: ChunkType = ChunkType(*b"sBIT");
    pub const BKGD: ChunkType = ChunkType(*b"bKGD");
    pub const PHYS: ChunkType = ChunkType(*b"pHYs");
    pub const TEXT: ChunkType = ChunkType(*b"tEXt");
    pub const ZTXT: ChunkType = ChunkType(*b"zTXt");
    pub const ITXT: ChunkType = ChunkType(*b"iTXt");
    pub const ICCP: ChunkType = ChunkType(*b"iCCP");
    pub const SRGB: ChunkType = ChunkType(*b"sRGB");
    pub const TIME: ChunkType = ChunkType(*b"tIME");

    fn bit_set(byte: u8) -> bool {
        byte & 0x20 != 0
    }

    /// True for any chunk whose name starts with a lowercase letter: safe
    /// to ignore for pixel reconstruction, but round-tripped for fidelity.
    pub fn is_ancillary(self) -> bool {
        Self::bit_set(self.0[0])
    }

    pub fn is_critical(self) -> bool {
        !self.is_ancillary()
    }

    pub fn is_private(self) -> bool {
        Self::bit_set(self.0[1])
    }

    pub fn is_public(self) -> bool {
        !self.is_private()
    }

    /// The third letter's case is reserved and must be uppercase in
    /// conforming files.
    pub fn is_reserved_valid(self) -> bool {
        !Self::bit_set(self.0[2])
    }

    pub fn is_safe_to_copy(self) -> bool {
        Self::bit_set(self.0[3])
    }

    /// A `'static` name for the handful of critical chunk types; anything
    /// else should be rendered through `Display` instead.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            ChunkType::IHDR => Some("IHDR"),
            ChunkType::PLTE => Some("PLTE"),
            ChunkType::IDAT => Some("IDAT"),
            ChunkType::IEND => Some("IEND"),
            _ => None,
        }
    }
}

impl Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if s.chars().all(|c| c.is_ascii_alphabetic()) => write!(f, "{s}"),
            _ => write!(f, "{:?}", self.0),
        }
    }
}

/// One parsed chunk: its type and data, CRC already verified (or the
/// mismatch already recorded as a warning in lenient mode).
#[derive(Debug, Clone)]
pub struct Chunk {
    pub ctype: ChunkType,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub enum ChunkError {
    MalformedSignature,
    TruncatedChunk,
    BadCrc { ctype: ChunkType, expected: u32, computed: u32 },
    UnexpectedChunk(ChunkType),
    DuplicateChunk(ChunkType),
    MissingIhdr,
    MissingIend,
    Io(io::Error),
}

impl Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkError::MalformedSignature => {
                write!(f, "Error: file does not start with the PNG signature.")
            }
            ChunkError::TruncatedChunk => {
                write!(f, "Error: chunk stream ended before a complete chunk was read.")
            }
            ChunkError::BadCrc { ctype, expected, computed } => write!(
                f,
                "Error: CRC mismatch in chunk '{ctype}': expected {expected:08X}, computed {computed:08X}."
            ),
            ChunkError::UnexpectedChunk(ct) => {
                write!(f, "Error: chunk '{ct}' appeared out of its required order.")
            }
            ChunkError::DuplicateChunk(ct) => {
                write!(f, "Error: chunk '{ct}' may appear at most once but appeared again.")
            }
            ChunkError::MissingIhdr => write!(f, "Error: file has no IHDR chunk."),
            ChunkError::MissingIend => write!(f, "Error: file has no IEND chunk."),
            ChunkError::Io(e) => write!(f, "Error: I/O error while framing chunks, '{e}'"),
        }
    }
}

impl Error for ChunkError {}

impl From<io::Error> for ChunkError {
    fn from(error: io::Error) -> Self {
        ChunkError::Io(error)
    }
}

/// A warning recorded by lenient-mode decoding instead of raising an error.
#[derive(Debug, Clone)]
pub enum ChunkWarning {
    BadCrc { ctype: ChunkType, expected: u32, computed: u32 },
}

impl Display for ChunkWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkWarning::BadCrc { ctype, expected, computed } => write!(
                f,
                "Warning: CRC mismatch in chunk '{ctype}' ignored (lenient mode): expected {expected:08X}, computed {computed:08X}."
            ),
        }
    }
}

/// Reads chunks off any `Read` stream, verifying CRCs as it goes.
pub struct ChunkReader<R: Read> {
    inner: R,
    lenient: bool,
    pub warnings: Vec<ChunkWarning>,
    seen_ihdr: bool,
    seen_iend: bool,
    seen_plte: bool,
    last_was_idat: bool,
    idat_closed: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R, lenient: bool) -> Self {
        Self {
            inner,
            lenient,
            warnings: Vec::new(),
            seen_ihdr: false,
            seen_iend: false,
            seen_plte: false,
            last_was_idat: false,
            idat_closed: false,
        }
    }

    /// Reads and validates the 8-byte PNG signature. Must be called exactly
    /// once, before the first call to [`Self::next_chunk`].
    pub fn read_signature(&mut self) -> Result<(), ChunkError> {
        let mut sig = [0u8; 8];
        self.inner
            .read_exact(&mut sig)
            .map_err(|_| ChunkError::MalformedSignature)?;
        if sig != PNG_SIGNATURE {
            return Err(ChunkError::MalformedSignature);
        }
        Ok(())
    }

    /// Reads the next chunk, or `Ok(None)` once IEND has already been
    /// consumed. Enforces: IHDR first, IEND last and exactly once, IDAT
    /// chunks contiguous, IHDR/IEND/PLTE each appear at most once.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, ChunkError> {
        if self.seen_iend {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        match self.inner.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(ChunkError::TruncatedChunk)
            }
            Err(e) => return Err(e.into()),
        }
        let length = u32::from_be_bytes(len_bytes) as usize;

        let mut type_bytes = [0u8; 4];
        self.inner
            .read_exact(&mut type_bytes)
            .map_err(|_| ChunkError::TruncatedChunk)?;
        let ctype = ChunkType(type_bytes);

        let mut data = vec![0u8; length];
        self.inner
            .read_exact(&mut data)
            .map_err(|_| ChunkError::TruncatedChunk)?;

        let mut crc_bytes = [0u8; 4];
        self.inner
            .read_exact(&mut crc_bytes)
            .map_err(|_| ChunkError::TruncatedChunk)?;
        let expected_crc = u32::from_be_bytes(crc_bytes);

        let to_hash = [&type_bytes[..], &data[..]].concat();
        let computed_crc = crc::hash(&to_hash);

        if computed_crc != expected_crc {
            if self.lenient {
                self.warnings.push(ChunkWarning::BadCrc {
                    ctype,
                    expected: expected_crc,
                    computed: computed_crc,
                });
            } else {
                return Err(ChunkError::BadCrc {
                    ctype,
                    expected: expected_crc,
                    computed: computed_crc,
                });
            }
        }

        self.validate_order(ctype)?;

        Ok(Some(Chunk { ctype, data }))
    }

    fn validate_order(&mut self, ctype: ChunkType) -> Result<(), ChunkError> {
        if !self.seen_ihdr && ctype != ChunkType::IHDR {
            return Err(ChunkError::MissingIhdr);
        }
        if ctype == ChunkType::IHDR {
            if self.seen_ihdr {
                return Err(ChunkError::DuplicateChunk(ctype));
            }
            self.seen_ihdr = true;
        } else if ctype == ChunkType::PLTE {
            if self.seen_plte {
                return Err(ChunkError::DuplicateChunk(ctype));
            }
            if self.idat_closed {
                return Err(ChunkError::UnexpectedChunk(ctype));
            }
            self.seen_plte = true;
        } else if ctype == ChunkType::IDAT {
            if self.idat_closed {
                return Err(ChunkError::UnexpectedChunk(ctype));
            }
        } else if ctype == ChunkType::IEND {
            self.seen_iend = true;
        }

        if self.last_was_idat && ctype != ChunkType::IDAT {
            self.idat_closed = true;
        }
        self.last_was_idat = ctype == ChunkType::IDAT;

        Ok(())
    }

    /// Reads every remaining chunk and confirms the stream ended with IEND.
    pub fn read_all(mut self) -> Result<(Vec<Chunk>, Vec<ChunkWarning>), ChunkError> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk()? {
            let is_iend = chunk.ctype == ChunkType::IEND;
            chunks.push(chunk);
            if is_iend {
                break;
            }
        }
        if !self.seen_iend {
            return Err(ChunkError::MissingIend);
        }
        Ok((chunks, self.warnings))
    }
}

/// Writes chunks to any `Write` stream, computing CRCs as it goes.
pub struct ChunkWriter<W: Write> {
    inner: W,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_signature(&mut self) -> io::Result<()> {
        self.inner.write_all(&PNG_SIGNATURE)
    }

    pub fn write_chunk(&mut self, ctype: ChunkType, data: &[u8]) -> io::Result<()> {
        self.inner
            .write_all(&(data.len() as u32).to_be_bytes())?;
        self.inner.write_all(&ctype.0)?;
        self.inner.write_all(data)?;
        let to_hash = [&ctype.0[..], data].concat();
        self.inner.write_all(&crc::hash(&to_hash).to_be_bytes())?;
        Ok(())
    }

    /// Splits `data` into chunks of at most `max_size` bytes (minimum 1)
    /// and writes each as its own chunk of type `ctype`, e.g. for IDAT.
    pub fn write_split(&mut self, ctype: ChunkType, data: &[u8], max_size: usize) -> io::Result<()> {
        let max_size = max_size.max(1);
        if data.is_empty() {
            return self.write_chunk(ctype, &[]);
        }
        for segment in data.chunks(max_size) {
            self.write_chunk(ctype, segment)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_bits() {
        assert!(ChunkType::IHDR.is_critical());
        assert!(ChunkType::TEXT.is_ancillary());
        assert!(ChunkType::IHDR.is_public());
        assert!(ChunkType::IHDR.is_reserved_valid());
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = Vec::new();
        {
            let mut w = ChunkWriter::new(&mut buf);
            w.write_signature().unwrap();
            w.write_chunk(ChunkType::IHDR, &[1, 2, 3, 4, 5, 6, 7, 8, 8, 2, 0, 0, 0])
                .unwrap();
            w.write_chunk(ChunkType::IDAT, &[9, 9, 9]).unwrap();
            w.write_chunk(ChunkType::IEND, &[]).unwrap();
        }

        let mut r = ChunkReader::new(buf.as_slice(), false);
        r.read_signature().unwrap();
        let (chunks, warnings) = r.read_all().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].ctype, ChunkType::IHDR);
        assert_eq!(chunks.last().unwrap().ctype, ChunkType::IEND);
    }

    #[test]
    fn bad_crc_is_fatal_in_strict_mode() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PNG_SIGNATURE);
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(b"IHDR");
        buf.extend_from_slice(&0xDEADBEEFu32.to_be_bytes());

        let mut r = ChunkReader::new(buf.as_slice(), false);
        r.read_signature().unwrap();
        let err = r.next_chunk().unwrap_err();
        assert!(matches!(err, ChunkError::BadCrc { .. }));
    }

    #[test]
    fn bad_crc_is_a_warning_in_lenient_mode() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&PNG_SIGNATURE);
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(b"IHDR");
        buf.extend_from_slice(&0xDEADBEEFu32.to_be_bytes());

        let mut r = ChunkReader::new(buf.as_slice(), true);
        r.read_signature().unwrap();
        let chunk = r.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.ctype, ChunkType::IHDR);
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn non_ihdr_first_chunk_is_rejected() {
        let mut buf = Vec::new();
        {
            let mut w = ChunkWriter::new(&mut buf);
            w.write_signature().unwrap();
            w.write_chunk(ChunkType::IDAT, &[1]).unwrap();
        }
        let mut r = ChunkReader::new(buf.as_slice(), false);
        r.read_signature().unwrap();
        let err = r.next_chunk().unwrap_err();
        assert!(matches!(err, ChunkError::MissingIhdr));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let buf = vec![0u8; 8];
        let mut r = ChunkReader::new(buf.as_slice(), false);
        let err = r.read_signature().unwrap_err();
        assert!(matches!(err, ChunkError::MalformedSignature));
    }
}
