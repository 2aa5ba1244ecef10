//! Thin PNG façade matching the original `Png::from_path` surface, now
//! generalised across every colour type instead of RGB8 only. The reader
//! and writer façades proper live in [`crate::decoder`] and
//! [`crate::encoder`]; this module is a convenience layer for callers who
//! just want bytes in, pixels out (or the reverse).

use std::error::Error;
use std::fmt::{self, Display};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use crate::chunk::ancillary::Background;
pub use crate::decoder::{DecodeError, Decoder, Preamble, Reader};
pub use crate::encoder::{EncodeError, Encoder, EncoderConfig, FilterPolicy};
use crate::pack;
use crate::sample::{self, CoerceTarget};

/// The error surface of the façade: a decode failure, an encode failure, or
/// the I/O that happens before either runs.
#[derive(Debug)]
pub enum PngError {
    Io(io::Error),
    Decode(DecodeError),
    Encode(EncodeError),
}

impl Display for PngError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PngError::Io(e) => write!(f, "Error: I/O error, '{e}'"),
            PngError::Decode(e) => write!(f, "{e}"),
            PngError::Encode(e) => write!(f, "{e}"),
        }
    }
}

impl Error for PngError {}

impl From<io::Error> for PngError {
    fn from(e: io::Error) -> Self {
        PngError::Io(e)
    }
}

impl From<DecodeError> for PngError {
    fn from(e: DecodeError) -> Self {
        PngError::Decode(e)
    }
}

impl From<EncodeError> for PngError {
    fn from(e: EncodeError) -> Self {
        PngError::Encode(e)
    }
}

/// A decoded PNG file: metadata plus a row source, consumed once.
pub struct Png {
    pub preamble: Preamble,
    reader: Option<Reader>,
}

impl Png {
    /// Reads and fully parses the preamble of a PNG file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PngError> {
        let bytes = fs::read(path)?;
        Self::from_reader(bytes.as_slice(), false)
    }

    /// As [`Self::from_path`], but `lenient` downgrades CRC/checksum
    /// mismatches to warnings rather than errors (spec.md §7).
    pub fn from_reader<R: Read>(inner: R, lenient: bool) -> Result<Self, PngError> {
        let decoder = Decoder::new(inner, lenient);
        let (preamble, reader) = decoder.preamble()?;
        Ok(Self { preamble, reader: Some(reader) })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.preamble.info.width as usize, self.preamble.info.height as usize)
    }

    /// Converts the image into a flat vector of RGB triples, the teacher's
    /// original `rgb()` surface. Consumes the row source; calling this or
    /// [`Self::rgba`] a second time panics.
    pub fn rgb(&mut self) -> Result<Vec<(u8, u8, u8)>, PngError> {
        let rows = self.coerce(CoerceTarget::Rgb8)?;
        Ok(rows
            .chunks(3)
            .map(|c| (c[0] as u8, c[1] as u8, c[2] as u8))
            .collect())
    }

    /// As [`Self::rgb`], with a synthesised or tRNS-derived alpha channel.
    pub fn rgba(&mut self) -> Result<Vec<(u8, u8, u8, u8)>, PngError> {
        let rows = self.coerce(CoerceTarget::Rgba8)?;
        Ok(rows
            .chunks(4)
            .map(|c| (c[0] as u8, c[1] as u8, c[2] as u8, c[3] as u8))
            .collect())
    }

    fn coerce(&mut self, target: CoerceTarget) -> Result<Vec<u16>, PngError> {
        let reader = self
            .reader
            .take()
            .expect("Png::rgb()/rgba() may only be called once");
        let palette = self.preamble.palette.clone();
        let sbit = self.preamble.ancillary.significant_bits;
        let transparency = self.preamble.ancillary.transparency.clone();
        let rows = reader.coerce_all(palette.as_deref(), sbit.as_ref(), transparency.as_ref(), target)?;
        Ok(rows.concat())
    }

    /// Resolves the bKGD ancillary value, if present, to an 8-bit RGB
    /// triple, expanding through the palette and rescaling from the image's
    /// own bit depth as needed.
    pub fn background_rgb8(&self) -> Result<Option<(u8, u8, u8)>, PngError> {
        let background = match &self.preamble.ancillary.background {
            Some(background) => background,
            None => return Ok(None),
        };
        let palette = self.preamble.palette.as_deref();
        let (r, g, b) =
            sample::resolve_background(background, palette).map_err(DecodeError::from)?;

        let source_depth = if matches!(background, Background::PaletteIndex(_)) {
            8
        } else {
            self.preamble.info.bit_depth
        };
        let to_rgb8 = |v: u16| pack::rescale(v as u32, source_depth, 8) as u8;
        Ok(Some((to_rgb8(r), to_rgb8(g), to_rgb8(b))))
    }
}

/// Encodes `rows` (direct samples) as a complete, non-interlaced PNG.
pub fn encode<W: Write>(out: W, config: EncoderConfig, rows: &[Vec<u16>]) -> Result<(), PngError> {
    let encoder = Encoder::new(config)?;
    encoder.write(out, rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{ColorType, PaletteEntry};

    #[test]
    fn rgba_honors_palette_transparency_end_to_end() {
        let palette = vec![
            PaletteEntry { red: 10, green: 20, blue: 30, alpha: 0 },
            PaletteEntry::opaque(40, 50, 60),
        ];
        let mut config = EncoderConfig::new(2, 1, ColorType::PaletteIndex, 8);
        config.palette = Some(palette);
        let mut buf = Vec::new();
        encode(&mut buf, config, &[vec![0u16, 1]]).unwrap();

        let mut png = Png::from_reader(buf.as_slice(), false).unwrap();
        let rgba = png.rgba().unwrap();
        assert_eq!(rgba, vec![(10, 20, 30, 0), (40, 50, 60, 255)]);
    }

    #[test]
    fn background_rgb8_is_none_without_bkgd() {
        let config = EncoderConfig::new(1, 1, ColorType::Grayscale, 8);
        let mut buf = Vec::new();
        encode(&mut buf, config, &[vec![0u16]]).unwrap();

        let png = Png::from_reader(buf.as_slice(), false).unwrap();
        assert_eq!(png.background_rgb8().unwrap(), None);
    }

    #[test]
    fn background_rgb8_rescales_from_stored_bit_depth() {
        let mut config = EncoderConfig::new(1, 1, ColorType::Grayscale, 4);
        config.background = Some(crate::chunk::ancillary::Background::Grayscale(15));
        let mut buf = Vec::new();
        encode(&mut buf, config, &[vec![0u16]]).unwrap();

        let png = Png::from_reader(buf.as_slice(), false).unwrap();
        assert_eq!(png.background_rgb8().unwrap(), Some((255, 255, 255)));
    }

    #[test]
    fn background_rgb8_resolves_through_palette() {
        let palette = vec![PaletteEntry::opaque(1, 2, 3), PaletteEntry::opaque(9, 8, 7)];
        let mut config = EncoderConfig::new(1, 1, ColorType::PaletteIndex, 8);
        config.palette = Some(palette);
        config.background = Some(crate::chunk::ancillary::Background::PaletteIndex(1));
        let mut buf = Vec::new();
        encode(&mut buf, config, &[vec![0u16]]).unwrap();

        let png = Png::from_reader(buf.as_slice(), false).unwrap();
        assert_eq!(png.background_rgb8().unwrap(), Some((9, 8, 7)));
    }
}
