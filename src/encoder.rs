//! Writer façade, spec.md §4.H: orchestrates the chunk framer, the zlib
//! boundary, the filter engine and the interlace engine on encode.

use std::error::Error;
use std::fmt::{self, Display};
use std::io::{self, Write};

use crate::adam7::PASSES;
use crate::chunk::ancillary::{
    Ancillary, Background, Chromaticities, Gamma, IccProfile, PhysicalDimensions,
    SignificantBits, TimeStamp, Transparency, UnknownChunk,
};
use crate::chunk::{ChunkType, ChunkWriter};
use crate::compression::zlib::{self, ZlibError};
use crate::filter::{self, FilterType};
use crate::info::{ColorType, ImageInfo, Interlacing, PaletteEntry};
use crate::text::{TextCompression, TextRecord};

#[derive(Debug)]
pub enum EncodeError {
    BadConfig(&'static str),
    RowLengthMismatch { expected: usize, found: usize },
    SampleOutOfRange { value: u32, bit_depth: u8 },
    Zlib(ZlibError),
    Io(io::Error),
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BadConfig(reason) => write!(f, "Error: invalid writer configuration, {reason}."),
            EncodeError::RowLengthMismatch { expected, found } => write!(
                f,
                "Error: row has {found} samples, expected {expected}."
            ),
            EncodeError::SampleOutOfRange { value, bit_depth } => write!(
                f,
                "Error: sample value {value} does not fit in {bit_depth} bits."
            ),
            EncodeError::Zlib(e) => write!(f, "{e}"),
            EncodeError::Io(e) => write!(f, "Error: I/O error while writing chunks, '{e}'"),
        }
    }
}

impl Error for EncodeError {}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> Self {
        EncodeError::Io(e)
    }
}

impl From<ZlibError> for EncodeError {
    fn from(e: ZlibError) -> Self {
        EncodeError::Zlib(e)
    }
}

/// How the writer picks a filter type for each scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPolicy {
    /// Per-scanline minimum-sum-of-absolute-deviations heuristic, spec.md §4.D.
    Adaptive,
    /// Always use this filter type.
    Fixed(FilterType),
}

/// Configuration accepted by [`Encoder::new`]. Only `width` and `height`
/// are mandatory; everything else defaults the way spec.md §4.H describes.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub color_type: ColorType,
    pub bit_depth: u8,
    pub interlacing: Interlacing,
    pub palette: Option<Vec<PaletteEntry>>,
    pub transparency: Option<Transparency>,
    pub background: Option<Background>,
    pub gamma: Option<Gamma>,
    pub chromaticities: Option<Chromaticities>,
    pub physical_dimensions: Option<PhysicalDimensions>,
    pub significant_bits: Option<SignificantBits>,
    pub icc_profile: Option<IccProfile>,
    pub srgb_intent: Option<u8>,
    pub time: Option<TimeStamp>,
    pub text: Vec<TextRecord>,
    pub unknown: Vec<UnknownChunk>,
    pub compression_level: u32,
    pub filter_policy: FilterPolicy,
    pub max_idat_size: usize,
    /// Upper bound on the total number of chunks the writer will emit
    /// (signature excluded), spec.md §4.H. `None` means unlimited.
    pub chunk_limit: Option<usize>,
}

impl EncoderConfig {
    pub fn new(width: u32, height: u32, color_type: ColorType, bit_depth: u8) -> Self {
        Self {
            width,
            height,
            color_type,
            bit_depth,
            interlacing: Interlacing::None,
            palette: None,
            transparency: None,
            background: None,
            gamma: None,
            chromaticities: None,
            physical_dimensions: None,
            significant_bits: None,
            icc_profile: None,
            srgb_intent: None,
            time: None,
            text: Vec::new(),
            unknown: Vec::new(),
            compression_level: 6,
            filter_policy: FilterPolicy::Adaptive,
            max_idat_size: 8 * 1024,
            chunk_limit: None,
        }
    }
}

/// The PNG writer façade.
pub struct Encoder {
    info: ImageInfo,
    config: EncoderConfig,
}

impl Encoder {
    /// Validates `config` (spec.md §4.H `BadConfig` conditions) and builds
    /// a writer ready to emit a complete PNG.
    pub fn new(config: EncoderConfig) -> Result<Self, EncodeError> {
        let info = ImageInfo::new(
            config.width,
            config.height,
            config.bit_depth,
            config.color_type,
            config.interlacing,
        )
        .map_err(|_| EncodeError::BadConfig("bit depth is incompatible with colour type"))?;

        if config.color_type.is_paletted() && config.palette.is_none() {
            return Err(EncodeError::BadConfig("palette colour type requires palette data"));
        }
        if !config.color_type.is_paletted() && config.palette.is_some() {
            return Err(EncodeError::BadConfig("palette data supplied for a non-palette colour type"));
        }
        if config.color_type.has_alpha() && config.transparency.is_some() {
            return Err(EncodeError::BadConfig(
                "a real alpha channel and a tRNS colour key cannot coexist",
            ));
        }
        if config.color_type.is_paletted() && config.transparency.is_some() {
            return Err(EncodeError::BadConfig(
                "palette transparency comes from PaletteEntry::alpha, not a separate tRNS value",
            ));
        }
        if let Some(palette) = &config.palette {
            if palette.is_empty() || palette.len() > 256 {
                return Err(EncodeError::BadConfig("palette must have between 1 and 256 entries"));
            }
        }
        if config.max_idat_size == 0 {
            return Err(EncodeError::BadConfig("max IDAT size must be at least 1 byte"));
        }
        if config.chunk_limit == Some(0) {
            return Err(EncodeError::BadConfig("chunk limit must be at least 1"));
        }

        Ok(Self { info, config })
    }

    /// The number of chunks this writer will emit for a compressed IDAT
    /// payload of `compressed_len` bytes (signature excluded): IHDR, every
    /// configured ancillary chunk and unknown passthrough, one chunk per
    /// `max_idat_size`-sized IDAT segment, and IEND.
    fn chunk_count(&self, compressed_len: usize) -> usize {
        let c = &self.config;
        let fixed = 1 // IHDR
            + c.unknown.len()
            + c.gamma.is_some() as usize
            + c.chromaticities.is_some() as usize
            + (c.srgb_intent.is_some() || c.icc_profile.is_some()) as usize
            + c.significant_bits.is_some() as usize
            + c.palette.is_some() as usize
            + c.background.is_some() as usize
            + self.trns_bytes().is_some() as usize
            + c.physical_dimensions.is_some() as usize
            + c.time.is_some() as usize
            + c.text.len()
            + 1; // IEND
        let idat_chunks = ((compressed_len + c.max_idat_size - 1) / c.max_idat_size).max(1);
        fixed + idat_chunks
    }

    /// The bytes a tRNS chunk would carry, or `None` if none should be
    /// written: derived from the palette's own alpha values for a palette
    /// image (spec.md §4.F), from `config.transparency` otherwise.
    fn trns_bytes(&self) -> Option<Vec<u8>> {
        if self.info.color_type == ColorType::PaletteIndex {
            self.config.palette.as_deref().and_then(palette_trns_bytes)
        } else {
            self.config.transparency.as_ref().map(transparency_bytes)
        }
    }

    /// Enforces `chunk_limit` against the chunk count an IDAT payload of
    /// `compressed_len` bytes would produce, before any byte is written.
    fn check_chunk_limit(&self, compressed_len: usize) -> Result<(), EncodeError> {
        if let Some(limit) = self.config.chunk_limit {
            let count = self.chunk_count(compressed_len);
            if count > limit {
                return Err(EncodeError::BadConfig(
                    "writing this image would exceed the configured chunk limit",
                ));
            }
        }
        Ok(())
    }

    /// Encodes `rows` (direct samples, one `Vec<u16>` per scanline, exactly
    /// `height` of them) and writes a complete PNG to `out`.
    pub fn write<W: Write>(&self, out: W, rows: &[Vec<u16>]) -> Result<(), EncodeError> {
        self.check_row_count(rows.len())?;
        let packed: Vec<Vec<u8>> = rows
            .iter()
            .map(|row| self.pack_and_validate(row, self.info.width))
            .collect::<Result<_, _>>()?;
        self.write_packed(out, &packed)
    }

    /// As [`Self::write`], but `rows` are already packed to the stored bit
    /// depth (spec.md §4.H `write_packed`).
    pub fn write_packed<W: Write>(&self, out: W, rows: &[Vec<u8>]) -> Result<(), EncodeError> {
        self.check_row_count(rows.len())?;

        let filtered = self.filter_rows(rows, self.info.width);
        let compressed = zlib::deflate(&filtered.concat(), self.config.compression_level)?;
        self.check_chunk_limit(compressed.len())?;

        self.write_png(out, &compressed)
    }

    /// The interlaced variant: `passes[n]` holds the direct-sample rows for
    /// Adam7 pass `n + 1`, spec.md §4.E/§4.H `write_passes`.
    pub fn write_passes<W: Write>(&self, out: W, passes: &[Vec<Vec<u16>>; 7]) -> Result<(), EncodeError> {
        if self.info.interlacing != Interlacing::Adam7 {
            return Err(EncodeError::BadConfig("write_passes requires Adam7 interlacing"));
        }

        let mut filtered_total = Vec::new();
        for (pass, rows) in PASSES.iter().zip(passes.iter()) {
            let pw = pass.width(self.info.width);
            let ph = pass.height(self.info.height);
            if pw == 0 || ph == 0 {
                continue;
            }
            if rows.len() != ph as usize {
                return Err(EncodeError::RowLengthMismatch {
                    expected: ph as usize,
                    found: rows.len(),
                });
            }
            let packed: Vec<Vec<u8>> = rows
                .iter()
                .map(|row| self.pack_and_validate(row, pw))
                .collect::<Result<_, _>>()?;
            filtered_total.extend(self.filter_rows(&packed, pw));
        }

        let compressed = zlib::deflate(&filtered_total.concat(), self.config.compression_level)?;
        self.check_chunk_limit(compressed.len())?;
        self.write_png(out, &compressed)
    }

    fn check_row_count(&self, found: usize) -> Result<(), EncodeError> {
        if found != self.info.height as usize {
            return Err(EncodeError::RowLengthMismatch {
                expected: self.info.height as usize,
                found,
            });
        }
        Ok(())
    }

    fn pack_and_validate(&self, row: &[u16], width: u32) -> Result<Vec<u8>, EncodeError> {
        let expected = width as usize * self.info.planes() as usize;
        if row.len() != expected {
            return Err(EncodeError::RowLengthMismatch {
                expected,
                found: row.len(),
            });
        }
        let max = (1u32 << self.info.bit_depth) - 1;
        for &v in row {
            if v as u32 > max {
                return Err(EncodeError::SampleOutOfRange {
                    value: v as u32,
                    bit_depth: self.info.bit_depth,
                });
            }
        }
        Ok(crate::sample::pack_scanline(row, self.info.bit_depth))
    }

    fn filter_rows(&self, rows: &[Vec<u8>], width: u32) -> Vec<Vec<u8>> {
        let fu = {
            let bits = self.info.planes() as usize * self.info.bit_depth as usize;
            (bits + 7) / 8
        };
        let _ = width;
        let mut prev = vec![0u8; rows.first().map(Vec::len).unwrap_or(0)];
        let mut out = Vec::with_capacity(rows.len());

        for row in rows {
            let (filter_type, filtered) = match self.config.filter_policy {
                FilterPolicy::Adaptive => filter::choose_adaptive(row, &prev, fu),
                FilterPolicy::Fixed(ft) => (ft, filter::filter(ft, row, &prev, fu)),
            };
            let mut scanline = Vec::with_capacity(filtered.len() + 1);
            scanline.push(filter_type.to_byte());
            scanline.extend(filtered);
            out.push(scanline);
            prev = row.clone();
        }

        out
    }

    fn write_png<W: Write>(&self, out: W, compressed_idat: &[u8]) -> Result<(), EncodeError> {
        let mut writer = ChunkWriter::new(out);
        writer.write_signature()?;

        let mut ihdr = Vec::with_capacity(13);
        ihdr.extend_from_slice(&self.info.width.to_be_bytes());
        ihdr.extend_from_slice(&self.info.height.to_be_bytes());
        ihdr.push(self.info.bit_depth);
        ihdr.push(self.info.color_type.to_byte());
        ihdr.push(0);
        ihdr.push(0);
        ihdr.push(self.info.interlacing.to_byte());
        writer.write_chunk(ChunkType::IHDR, &ihdr)?;

        self.write_bucket(&mut writer, crate::chunk::ancillary::ChunkBucket::BeforePlte)?;

        if let Some(gamma) = &self.config.gamma {
            writer.write_chunk(ChunkType::GAMA, &gamma.0.to_be_bytes())?;
        }
        if let Some(chrm) = &self.config.chromaticities {
            writer.write_chunk(ChunkType::CHRM, &chromaticities_bytes(chrm))?;
        }
        if let Some(intent) = self.config.srgb_intent {
            writer.write_chunk(ChunkType::SRGB, &[intent])?;
        } else if let Some(icc) = &self.config.icc_profile {
            let mut data = icc.name.clone().into_bytes();
            data.push(0);
            data.push(0); // compression method
            data.extend(zlib::deflate(&icc.profile, self.config.compression_level)?);
            writer.write_chunk(ChunkType::ICCP, &data)?;
        }
        if let Some(sbit) = &self.config.significant_bits {
            writer.write_chunk(ChunkType::SBIT, &sbit.values[..sbit.len as usize])?;
        }

        if let Some(palette) = &self.config.palette {
            let mut data = Vec::with_capacity(palette.len() * 3);
            for entry in palette {
                data.extend_from_slice(&[entry.red, entry.green, entry.blue]);
            }
            writer.write_chunk(ChunkType::PLTE, &data)?;
        }

        if let Some(background) = &self.config.background {
            writer.write_chunk(ChunkType::BKGD, &background_bytes(background))?;
        }
        if let Some(data) = self.trns_bytes() {
            writer.write_chunk(ChunkType::TRNS, &data)?;
        }
        if let Some(phys) = &self.config.physical_dimensions {
            let mut data = Vec::with_capacity(9);
            data.extend_from_slice(&phys.pixels_per_unit_x.to_be_bytes());
            data.extend_from_slice(&phys.pixels_per_unit_y.to_be_bytes());
            data.push(phys.unit_is_meter as u8);
            writer.write_chunk(ChunkType::PHYS, &data)?;
        }
        if let Some(time) = &self.config.time {
            let mut data = Vec::with_capacity(7);
            data.extend_from_slice(&time.year.to_be_bytes());
            data.extend_from_slice(&[time.month, time.day, time.hour, time.minute, time.second]);
            writer.write_chunk(ChunkType::TIME, &data)?;
        }

        self.write_bucket(&mut writer, crate::chunk::ancillary::ChunkBucket::BeforeIdat)?;

        for record in &self.config.text {
            let (ctype, data) = text_chunk_bytes(record, self.config.compression_level)?;
            writer.write_chunk(ctype, &data)?;
        }

        writer.write_split(ChunkType::IDAT, compressed_idat, self.config.max_idat_size)?;

        self.write_bucket(&mut writer, crate::chunk::ancillary::ChunkBucket::AfterIdat)?;

        writer.write_chunk(ChunkType::IEND, &[])?;
        Ok(())
    }

    fn write_bucket<W: Write>(
        &self,
        writer: &mut ChunkWriter<W>,
        bucket: crate::chunk::ancillary::ChunkBucket,
    ) -> Result<(), EncodeError> {
        for chunk in self.config.unknown.iter().filter(|c| c.bucket == bucket) {
            writer.write_chunk(ChunkType(chunk.ctype), &chunk.data)?;
        }
        Ok(())
    }
}

fn chromaticities_bytes(c: &Chromaticities) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, v) in [
        c.white_x, c.white_y, c.red_x, c.red_y, c.green_x, c.green_y, c.blue_x, c.blue_y,
    ]
    .iter()
    .enumerate()
    {
        out[i * 4..i * 4 + 4].copy_from_slice(&v.to_be_bytes());
    }
    out
}

fn background_bytes(bg: &Background) -> Vec<u8> {
    match bg {
        Background::Grayscale(v) => v.to_be_bytes().to_vec(),
        Background::Rgb { red, green, blue } => {
            [red.to_be_bytes(), green.to_be_bytes(), blue.to_be_bytes()].concat()
        }
        Background::PaletteIndex(i) => vec![*i],
    }
}

/// A palette's alpha values as tRNS bytes, trailing fully-opaque entries
/// trimmed off, or `None` if every entry is opaque (no chunk needed).
fn palette_trns_bytes(palette: &[PaletteEntry]) -> Option<Vec<u8>> {
    let mut bytes: Vec<u8> = palette.iter().map(|entry| entry.alpha).collect();
    while bytes.last() == Some(&255) {
        bytes.pop();
    }
    if bytes.is_empty() {
        None
    } else {
        Some(bytes)
    }
}

fn transparency_bytes(t: &Transparency) -> Vec<u8> {
    match t {
        Transparency::PaletteAlpha(alphas) => alphas.clone(),
        Transparency::GrayscaleKey(v) => v.to_be_bytes().to_vec(),
        Transparency::RgbKey { red, green, blue } => {
            [red.to_be_bytes(), green.to_be_bytes(), blue.to_be_bytes()].concat()
        }
    }
}

fn text_chunk_bytes(record: &TextRecord, level: u32) -> Result<(ChunkType, Vec<u8>), EncodeError> {
    if record.requires_itxt() {
        let mut data = record.keyword.clone().into_bytes();
        data.push(0);
        let compressed = record.compression == TextCompression::Compressed;
        data.push(compressed as u8);
        data.push(0); // compression method
        data.extend_from_slice(record.language.as_bytes());
        data.push(0);
        data.extend_from_slice(record.translated_keyword.as_bytes());
        data.push(0);
        if compressed {
            data.extend(zlib::deflate(record.text.as_bytes(), level)?);
        } else {
            data.extend_from_slice(record.text.as_bytes());
        }
        Ok((ChunkType::ITXT, data))
    } else if record.compression == TextCompression::Compressed {
        let mut data = record.keyword.clone().into_bytes();
        data.push(0);
        data.push(0); // compression method
        data.extend(zlib::deflate(record.text.as_bytes(), level)?);
        Ok((ChunkType::ZTXT, data))
    } else {
        let mut data = record.keyword.clone().into_bytes();
        data.push(0);
        data.extend_from_slice(record.text.as_bytes());
        Ok((ChunkType::TEXT, data))
    }
}
