//! Reader façade, spec.md §4.G: orchestrates the chunk framer, the zlib
//! boundary, the filter engine and the interlace engine on decode, and
//! exposes chunk iteration, the preamble, a row iterator, and
//! palette/metadata access.

use std::error::Error;
use std::fmt::{self, Display};
use std::io::Read;

use crate::adam7::{self, PASSES};
use crate::chunk::ancillary::{
    Ancillary, Background, ChunkBucket, Chromaticities, Gamma, IccProfile, PhysicalDimensions,
    SignificantBits, TimeStamp, Transparency, UnknownChunk,
};
use crate::chunk::{Chunk, ChunkError, ChunkReader, ChunkType, ChunkWarning};
use crate::compression::zlib::{self, ZlibError};
use crate::filter::{self, FilterType, UnknownFilter};
use crate::info::{ColorType, ImageInfo, Interlacing, PaletteEntry};
use crate::sample::{self, CoerceTarget, SampleError};
use crate::text::{TextCompression, TextRecord};

#[derive(Debug)]
pub enum DecodeError {
    Chunk(ChunkError),
    BadIhdr(&'static str),
    Zlib(ZlibError),
    Sample(SampleError),
    Filter(UnknownFilter),
    RowLengthMismatch { expected: usize, found: usize },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Chunk(e) => write!(f, "{e}"),
            DecodeError::BadIhdr(reason) => write!(f, "Error: malformed IHDR, {reason}."),
            DecodeError::Zlib(e) => write!(f, "{e}"),
            DecodeError::Sample(e) => write!(f, "{e}"),
            DecodeError::Filter(e) => write!(f, "{e}"),
            DecodeError::RowLengthMismatch { expected, found } => write!(
                f,
                "Error: reconstructed row has {found} bytes, expected {expected}."
            ),
        }
    }
}

impl Error for DecodeError {}

impl From<ChunkError> for DecodeError {
    fn from(e: ChunkError) -> Self {
        DecodeError::Chunk(e)
    }
}

impl From<ZlibError> for DecodeError {
    fn from(e: ZlibError) -> Self {
        DecodeError::Zlib(e)
    }
}

impl From<SampleError> for DecodeError {
    fn from(e: SampleError) -> Self {
        DecodeError::Sample(e)
    }
}

impl From<UnknownFilter> for DecodeError {
    fn from(e: UnknownFilter) -> Self {
        DecodeError::Filter(e)
    }
}

/// Metadata recovered by [`Decoder::preamble`]: the descriptor, an optional
/// palette, and every ancillary value this crate knows about.
#[derive(Debug, Clone)]
pub struct Preamble {
    pub info: ImageInfo,
    pub palette: Option<Vec<PaletteEntry>>,
    pub ancillary: Ancillary,
}

/// The PNG reader façade. Construct with [`Decoder::new`], then call
/// [`Decoder::preamble`] to get metadata and a [`Reader`] for pixel data.
pub struct Decoder<R: Read> {
    chunks: ChunkReader<R>,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R, lenient: bool) -> Self {
        Self {
            chunks: ChunkReader::new(inner, lenient),
        }
    }

    /// Returns every chunk in the file verbatim, consuming the decoder.
    /// Low-level escape hatch, spec.md §4.G `chunks()`.
    pub fn chunks(mut self) -> Result<(Vec<Chunk>, Vec<ChunkWarning>), DecodeError> {
        self.chunks.read_signature()?;
        Ok(self.chunks.read_all()?)
    }

    /// Reads the signature and every chunk up to and including all IDAT
    /// chunks, populating the descriptor, palette and ancillary state, and
    /// returns a [`Reader`] ready to produce rows. Idempotent in the sense
    /// that the data it reads is consumed exactly once here and never
    /// re-read; callers must hold onto the returned `Reader`.
    pub fn preamble(mut self) -> Result<(Preamble, Reader), DecodeError> {
        self.chunks.read_signature()?;

        let mut info: Option<ImageInfo> = None;
        let mut palette: Option<Vec<PaletteEntry>> = None;
        let mut ancillary = Ancillary::default();
        let mut idat = Vec::new();
        let mut seen_idat = false;
        let mut raw_trns: Option<Vec<u8>> = None;
        let mut raw_bkgd: Option<Vec<u8>> = None;

        while let Some(chunk) = self.chunks.next_chunk()? {
            match chunk.ctype {
                ChunkType::IHDR => info = Some(parse_ihdr(&chunk.data)?),
                ChunkType::PLTE => {
                    palette = Some(
                        chunk
                            .data
                            .chunks(3)
                            .map(|c| PaletteEntry::opaque(c[0], c[1], c[2]))
                            .collect(),
                    )
                }
                ChunkType::IDAT => {
                    seen_idat = true;
                    idat.extend_from_slice(&chunk.data);
                }
                ChunkType::IEND => break,
                ChunkType::TRNS => raw_trns = Some(chunk.data.clone()),
                ChunkType::GAMA => {
                    if chunk.data.len() == 4 {
                        ancillary.gamma = Some(Gamma(u32::from_be_bytes(
                            chunk.data[..4].try_into().unwrap(),
                        )));
                    }
                }
                ChunkType::CHRM => {
                    if chunk.data.len() == 32 {
                        let v = |i: usize| {
                            u32::from_be_bytes(chunk.data[i * 4..i * 4 + 4].try_into().unwrap())
                        };
                        ancillary.chromaticities = Some(Chromaticities {
                            white_x: v(0),
                            white_y: v(1),
                            red_x: v(2),
                            red_y: v(3),
                            green_x: v(4),
                            green_y: v(5),
                            blue_x: v(6),
                            blue_y: v(7),
                        });
                    }
                }
                ChunkType::SBIT => {
                    let mut values = [0u8; 4];
                    let len = chunk.data.len().min(4);
                    values[..len].copy_from_slice(&chunk.data[..len]);
                    ancillary.significant_bits = Some(SignificantBits {
                        values,
                        len: len as u8,
                    });
                }
                ChunkType::BKGD => raw_bkgd = Some(chunk.data.clone()),
                ChunkType::PHYS => {
                    if chunk.data.len() == 9 {
                        ancillary.physical_dimensions = Some(PhysicalDimensions {
                            pixels_per_unit_x: u32::from_be_bytes(
                                chunk.data[0..4].try_into().unwrap(),
                            ),
                            pixels_per_unit_y: u32::from_be_bytes(
                                chunk.data[4..8].try_into().unwrap(),
                            ),
                            unit_is_meter: chunk.data[8] == 1,
                        });
                    }
                }
                ChunkType::TIME => {
                    if chunk.data.len() == 7 {
                        ancillary.time = Some(TimeStamp {
                            year: u16::from_be_bytes(chunk.data[0..2].try_into().unwrap()),
                            month: chunk.data[2],
                            day: chunk.data[3],
                            hour: chunk.data[4],
                            minute: chunk.data[5],
                            second: chunk.data[6],
                        });
                    }
                }
                ChunkType::SRGB => {
                    if let Some(&intent) = chunk.data.first() {
                        ancillary.srgb_intent = Some(intent);
                    }
                }
                ChunkType::ICCP => {
                    if let Some(nul) = chunk.data.iter().position(|&b| b == 0) {
                        let name = String::from_utf8_lossy(&chunk.data[..nul]).into_owned();
                        // Byte after the null is the compression method (0),
                        // the rest is the zlib-compressed profile.
                        if chunk.data.len() > nul + 2 {
                            if let Ok(profile) = zlib::inflate(&chunk.data[nul + 2..]) {
                                ancillary.icc_profile = Some(IccProfile { name, profile });
                            }
                        }
                    }
                }
                ChunkType::TEXT => {
                    if let Some(record) = parse_text_chunk(&chunk.data) {
                        ancillary.text.push(record);
                    }
                }
                ChunkType::ZTXT => {
                    if let Some(record) = parse_ztxt_chunk(&chunk.data) {
                        ancillary.text.push(record);
                    }
                }
                ChunkType::ITXT => {
                    if let Some(record) = parse_itxt_chunk(&chunk.data) {
                        ancillary.text.push(record);
                    }
                }
                other => {
                    let bucket = if palette.is_none() {
                        ChunkBucket::BeforePlte
                    } else if !seen_idat {
                        ChunkBucket::BeforeIdat
                    } else {
                        ChunkBucket::AfterIdat
                    };
                    ancillary.unknown.push(UnknownChunk {
                        ctype: other.0,
                        data: chunk.data,
                        bucket,
                    });
                }
            }
        }

        let info = info.ok_or(DecodeError::BadIhdr("no IHDR chunk was present"))?;

        if let Some(raw) = raw_trns {
            let transparency = parse_trns(&raw, info.color_type);
            // Merge tRNS's per-entry alpha into PLTE so palette alpha has a
            // single source of truth for every downstream reader.
            if let Transparency::PaletteAlpha(alphas) = &transparency {
                if let Some(pal) = palette.as_mut() {
                    for (entry, &alpha) in pal.iter_mut().zip(alphas.iter()) {
                        entry.alpha = alpha;
                    }
                }
            }
            ancillary.transparency = Some(transparency);
        }
        if let Some(raw) = raw_bkgd {
            ancillary.background = parse_bkgd(&raw, info.color_type);
        }
        ancillary.palette = palette.clone();

        let reader = Reader::new(info.clone(), idat, self.chunks.warnings.clone())?;

        Ok((
            Preamble {
                info,
                palette,
                ancillary,
            },
            reader,
        ))
    }
}

fn parse_ihdr(data: &[u8]) -> Result<ImageInfo, DecodeError> {
    if data.len() != 13 {
        return Err(DecodeError::BadIhdr("IHDR must be exactly 13 bytes"));
    }
    let width = u32::from_be_bytes(data[0..4].try_into().unwrap());
    let height = u32::from_be_bytes(data[4..8].try_into().unwrap());
    let bit_depth = data[8];
    let color_type =
        ColorType::from_byte(data[9]).ok_or(DecodeError::BadIhdr("invalid colour type"))?;
    if data[10] != 0 {
        return Err(DecodeError::BadIhdr("compression method must be 0"));
    }
    if data[11] != 0 {
        return Err(DecodeError::BadIhdr("filter method must be 0"));
    }
    let interlacing =
        Interlacing::from_byte(data[12]).ok_or(DecodeError::BadIhdr("invalid interlace method"))?;

    ImageInfo::new(width, height, bit_depth, color_type, interlacing)
        .map_err(|_| DecodeError::BadIhdr("bit depth is incompatible with colour type"))
}

fn parse_trns(data: &[u8], color_type: ColorType) -> Transparency {
    match color_type {
        ColorType::PaletteIndex => Transparency::PaletteAlpha(data.to_vec()),
        ColorType::Grayscale => {
            Transparency::GrayscaleKey(u16::from_be_bytes([data[0], data[1]]))
        }
        _ => Transparency::RgbKey {
            red: u16::from_be_bytes([data[0], data[1]]),
            green: u16::from_be_bytes([data[2], data[3]]),
            blue: u16::from_be_bytes([data[4], data[5]]),
        },
    }
}

fn parse_bkgd(data: &[u8], color_type: ColorType) -> Option<Background> {
    match color_type {
        ColorType::Grayscale | ColorType::GrayscaleAlpha if data.len() >= 2 => Some(
            Background::Grayscale(u16::from_be_bytes([data[0], data[1]])),
        ),
        ColorType::RGB | ColorType::RGBA if data.len() >= 6 => Some(Background::Rgb {
            red: u16::from_be_bytes([data[0], data[1]]),
            green: u16::from_be_bytes([data[2], data[3]]),
            blue: u16::from_be_bytes([data[4], data[5]]),
        }),
        ColorType::PaletteIndex if !data.is_empty() => Some(Background::PaletteIndex(data[0])),
        _ => None,
    }
}

fn parse_text_chunk(data: &[u8]) -> Option<TextRecord> {
    let nul = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8_lossy(&data[..nul]).into_owned();
    let text = String::from_utf8_lossy(&data[nul + 1..]).into_owned();
    Some(TextRecord {
        keyword,
        text,
        compression: TextCompression::Uncompressed,
        language: String::new(),
        translated_keyword: String::new(),
    })
}

fn parse_ztxt_chunk(data: &[u8]) -> Option<TextRecord> {
    let nul = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8_lossy(&data[..nul]).into_owned();
    if data.len() < nul + 2 {
        return None;
    }
    let compressed = &data[nul + 2..];
    let text = zlib::inflate(compressed)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())?;
    Some(TextRecord {
        keyword,
        text,
        compression: TextCompression::Compressed,
        language: String::new(),
        translated_keyword: String::new(),
    })
}

fn parse_itxt_chunk(data: &[u8]) -> Option<TextRecord> {
    let nul1 = data.iter().position(|&b| b == 0)?;
    let keyword = String::from_utf8_lossy(&data[..nul1]).into_owned();
    let compression_flag = *data.get(nul1 + 1)?;
    let _compression_method = *data.get(nul1 + 2)?;
    let rest = &data[nul1 + 3..];
    let nul2 = rest.iter().position(|&b| b == 0)?;
    let language = String::from_utf8_lossy(&rest[..nul2]).into_owned();
    let rest = &rest[nul2 + 1..];
    let nul3 = rest.iter().position(|&b| b == 0)?;
    let translated_keyword = String::from_utf8_lossy(&rest[..nul3]).into_owned();
    let payload = &rest[nul3 + 1..];

    let (text, compression) = if compression_flag == 1 {
        let bytes = zlib::inflate(payload).ok()?;
        (String::from_utf8(bytes).ok()?, TextCompression::Compressed)
    } else {
        (String::from_utf8(payload.to_vec()).ok()?, TextCompression::Uncompressed)
    };

    Some(TextRecord {
        keyword,
        text,
        compression,
        language,
        translated_keyword,
    })
}

/// Produces pixel rows after [`Decoder::preamble`] has run. Non-interlaced
/// images are reconstructed one scanline at a time, a single previous row
/// kept as state (spec.md §4.D "prior-scanline state", §5). Interlaced
/// images are reassembled into the full grid up front, as spec.md §4.E
/// and §4.G both permit.
pub struct Reader {
    info: ImageInfo,
    decompressed: Vec<u8>,
    pub warnings: Vec<ChunkWarning>,
    state: ReaderState,
}

enum ReaderState {
    Progressive { cursor: usize, prev: Vec<u8>, row: u32 },
    Interlaced { rows: std::vec::IntoIter<Vec<u8>> },
}

impl Reader {
    fn new(info: ImageInfo, idat: Vec<u8>, warnings: Vec<ChunkWarning>) -> Result<Self, DecodeError> {
        let expected = match info.interlacing {
            Interlacing::None => (info.row_bytes() + 1) * info.height as usize,
            Interlacing::Adam7 => adam7::pass_dimensions(info.width, info.height)
                .iter()
                .map(|&(w, h)| {
                    if w == 0 || h == 0 {
                        0
                    } else {
                        (info.stored_row_bytes(w) + 1) * h as usize
                    }
                })
                .sum(),
        };

        let decompressed = zlib::inflate_at_least(&idat, expected)?;

        let state = match info.interlacing {
            Interlacing::None => ReaderState::Progressive {
                cursor: 0,
                prev: vec![0u8; info.row_bytes()],
                row: 0,
            },
            Interlacing::Adam7 => {
                let rows = reassemble_adam7(&info, &decompressed)?;
                ReaderState::Interlaced {
                    rows: rows.into_iter(),
                }
            }
        };

        Ok(Self {
            info,
            decompressed,
            warnings,
            state,
        })
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Yields the next packed scanline (spec.md §4.G `read()`), or `None`
    /// once `height` rows have been produced.
    pub fn next_packed_row(&mut self) -> Option<Result<Vec<u8>, DecodeError>> {
        match &mut self.state {
            ReaderState::Progressive { cursor, prev, row } => {
                if *row >= self.info.height {
                    return None;
                }
                let row_bytes = self.info.row_bytes();
                let stride = row_bytes + 1;
                let start = *cursor;
                if start + stride > self.decompressed.len() {
                    return Some(Err(DecodeError::Zlib(ZlibError::Truncated)));
                }
                let filter_byte = self.decompressed[start];
                let filter_type = match FilterType::from_byte(filter_byte) {
                    Some(f) => f,
                    None => return Some(Err(DecodeError::Filter(UnknownFilter(filter_byte)))),
                };
                let data = &self.decompressed[start + 1..start + stride];
                let reconstructed = filter::unfilter(filter_type, data, prev, self.info.filter_unit());
                *prev = reconstructed.clone();
                *cursor += stride;
                *row += 1;
                Some(Ok(reconstructed))
            }
            ReaderState::Interlaced { rows } => rows.next().map(Ok),
        }
    }

    /// Yields the next row unpacked into one `u16` sample per element.
    pub fn next_direct_row(&mut self) -> Option<Result<Vec<u16>, DecodeError>> {
        self.next_packed_row().map(|res| {
            res.map(|packed| {
                sample::unpack_scanline(&packed, self.info.bit_depth, self.info.width, self.info.planes())
            })
        })
    }

    /// Consumes the reader, returning every row coerced to `target`.
    pub fn coerce_all(
        mut self,
        palette: Option<&[PaletteEntry]>,
        sbit: Option<&SignificantBits>,
        transparency: Option<&Transparency>,
        target: CoerceTarget,
    ) -> Result<Vec<Vec<u16>>, DecodeError> {
        let mut rows = Vec::with_capacity(self.info.height as usize);
        while let Some(row) = self.next_direct_row() {
            let row = row?;
            rows.push(sample::coerce_row(&row, &self.info, palette, sbit, transparency, target)?);
        }
        Ok(rows)
    }

    /// Consumes the reader, returning every row as packed bytes.
    pub fn read_all_packed(mut self) -> Result<Vec<Vec<u8>>, DecodeError> {
        let mut rows = Vec::with_capacity(self.info.height as usize);
        while let Some(row) = self.next_packed_row() {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Consumes the reader, returning every row unpacked to direct samples.
    pub fn read_all_direct(mut self) -> Result<Vec<Vec<u16>>, DecodeError> {
        let mut rows = Vec::with_capacity(self.info.height as usize);
        while let Some(row) = self.next_direct_row() {
            rows.push(row?);
        }
        Ok(rows)
    }
}

fn reassemble_adam7(info: &ImageInfo, decompressed: &[u8]) -> Result<Vec<Vec<u8>>, DecodeError> {
    let planes = info.planes();
    let mut pass_grids: Vec<Vec<Vec<u16>>> = Vec::with_capacity(7);
    let mut cursor = 0usize;

    for pass in PASSES {
        let pw = pass.width(info.width);
        let ph = pass.height(info.height);
        if pw == 0 || ph == 0 {
            pass_grids.push(Vec::new());
            continue;
        }
        let row_bytes = info.stored_row_bytes(pw);
        let stride = row_bytes + 1;
        let mut prev = vec![0u8; row_bytes];
        let mut rows = Vec::with_capacity(ph as usize);

        for _ in 0..ph {
            if cursor + stride > decompressed.len() {
                return Err(DecodeError::Zlib(ZlibError::Truncated));
            }
            let filter_byte = decompressed[cursor];
            let filter_type =
                FilterType::from_byte(filter_byte).ok_or(DecodeError::Filter(UnknownFilter(filter_byte)))?;
            let data = &decompressed[cursor + 1..cursor + stride];
            let reconstructed = filter::unfilter(filter_type, data, &prev, info.filter_unit());
            let direct = sample::unpack_scanline(&reconstructed, info.bit_depth, pw, planes);
            prev = reconstructed;
            cursor += stride;
            rows.push(direct);
        }
        pass_grids.push(rows);
    }

    let passes: [Vec<Vec<u16>>; 7] = pass_grids
        .try_into()
        .map_err(|_| DecodeError::RowLengthMismatch { expected: 7, found: 0 })?;
    let grid = adam7::reassemble(&passes, info.width, info.height, planes as usize);

    Ok(grid
        .into_iter()
        .map(|row| sample::pack_scanline(&row, info.bit_depth))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkType, ChunkWriter};
    use crate::compression::zlib::deflate;
    use crate::filter::{filter, FilterType as FT};

    fn build_png(info: &ImageInfo, rows: &[Vec<u8>], palette: Option<&[u8]>) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut writer = ChunkWriter::new(&mut buf);
        writer.write_signature().unwrap();

        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&info.width.to_be_bytes());
        ihdr.extend_from_slice(&info.height.to_be_bytes());
        ihdr.push(info.bit_depth);
        ihdr.push(info.color_type.to_byte());
        ihdr.push(0);
        ihdr.push(0);
        ihdr.push(info.interlacing.to_byte());
        writer.write_chunk(ChunkType::IHDR, &ihdr).unwrap();

        if let Some(plte) = palette {
            writer.write_chunk(ChunkType::PLTE, plte).unwrap();
        }

        let mut prev = vec![0u8; info.row_bytes()];
        let mut scanlines = Vec::new();
        for row in rows {
            let filtered = filter(FT::None, row, &prev, info.filter_unit());
            scanlines.push(0u8);
            scanlines.extend_from_slice(&filtered);
            prev = row.clone();
        }
        let compressed = deflate(&scanlines, 6).unwrap();
        writer.write_chunk(ChunkType::IDAT, &compressed).unwrap();
        writer.write_chunk(ChunkType::IEND, &[]).unwrap();

        buf
    }

    #[test]
    fn decodes_minimal_grayscale_image() {
        let info = ImageInfo::new(2, 1, 8, ColorType::Grayscale, Interlacing::None).unwrap();
        let rows = vec![vec![0u8, 255]];
        let png = build_png(&info, &rows, None);

        let decoder = Decoder::new(png.as_slice(), false);
        let (preamble, reader) = decoder.preamble().unwrap();
        assert_eq!(preamble.info, info);

        let decoded_rows = reader.read_all_direct().unwrap();
        assert_eq!(decoded_rows, vec![vec![0u16, 255]]);
    }

    #[test]
    fn preserves_palette_indices_without_expansion() {
        let info = ImageInfo::new(4, 1, 8, ColorType::PaletteIndex, Interlacing::None).unwrap();
        let rows = vec![vec![0u8, 1, 2, 3]];
        let palette = [0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255];
        let png = build_png(&info, &rows, Some(&palette));

        let decoder = Decoder::new(png.as_slice(), false);
        let (preamble, reader) = decoder.preamble().unwrap();
        assert_eq!(preamble.palette.as_ref().unwrap().len(), 4);

        let decoded_rows = reader.read_all_direct().unwrap();
        for &idx in &decoded_rows[0] {
            assert!((idx as usize) < preamble.palette.as_ref().unwrap().len());
        }
    }

    #[test]
    fn rejects_corrupt_crc_in_strict_mode() {
        let info = ImageInfo::new(1, 1, 8, ColorType::Grayscale, Interlacing::None).unwrap();
        let mut png = build_png(&info, &[vec![128u8]], None);
        // Flip a bit inside the IDAT chunk's CRC (last 4 bytes before IEND's
        // own 12-byte footer).
        let iend_pos = png.len() - 12;
        png[iend_pos - 1] ^= 0x01;

        let decoder = Decoder::new(png.as_slice(), false);
        let err = decoder.preamble().unwrap_err();
        assert!(matches!(err, DecodeError::Chunk(ChunkError::BadCrc { .. })));
    }

    #[test]
    fn lenient_mode_recovers_from_corrupt_crc() {
        let info = ImageInfo::new(1, 1, 8, ColorType::Grayscale, Interlacing::None).unwrap();
        let mut png = build_png(&info, &[vec![128u8]], None);
        let iend_pos = png.len() - 12;
        png[iend_pos - 1] ^= 0x01;

        let decoder = Decoder::new(png.as_slice(), true);
        let (_, reader) = decoder.preamble().unwrap();
        assert!(!reader.warnings.is_empty());
    }
}
