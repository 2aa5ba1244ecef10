//! Shared image descriptor used by both the reader and writer façades.

use std::fmt::{self, Display};

/// The five PNG colour types, named as in section 11.2.2 of the PNG
/// specification (ISO/IEC 15948).
///
/// # Members
///
/// * 'Grayscale' - One sample per pixel.
/// * 'RGB' - Three samples per pixel (red, green, blue).
/// * 'PaletteIndex' - One sample per pixel, indexing into a PLTE palette.
/// * 'GrayscaleAlpha' - Two samples per pixel (grey, alpha).
/// * 'RGBA' - Four samples per pixel (red, green, blue, alpha).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Grayscale,
    RGB,
    PaletteIndex,
    GrayscaleAlpha,
    RGBA,
}

impl ColorType {
    /// The number of channels ("planes" in spec terms) a pixel of this
    /// colour type carries.
    pub fn planes(self) -> u8 {
        match self {
            ColorType::Grayscale => 1,
            ColorType::RGB => 3,
            ColorType::PaletteIndex => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::RGBA => 4,
        }
    }

    /// Whether this colour type carries an alpha channel of its own.
    pub fn has_alpha(self) -> bool {
        matches!(self, ColorType::GrayscaleAlpha | ColorType::RGBA)
    }

    /// Whether this colour type is indexed into a palette.
    pub fn is_paletted(self) -> bool {
        matches!(self, ColorType::PaletteIndex)
    }

    /// The IHDR colour-type byte for this value.
    pub fn to_byte(self) -> u8 {
        match self {
            ColorType::Grayscale => 0,
            ColorType::RGB => 2,
            ColorType::PaletteIndex => 3,
            ColorType::GrayscaleAlpha => 4,
            ColorType::RGBA => 6,
        }
    }

    /// Parses an IHDR colour-type byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ColorType::Grayscale),
            2 => Some(ColorType::RGB),
            3 => Some(ColorType::PaletteIndex),
            4 => Some(ColorType::GrayscaleAlpha),
            6 => Some(ColorType::RGBA),
            _ => None,
        }
    }

    /// The bit depths this colour type permits, per PNG 11.2.2.
    pub fn allowed_depths(self) -> &'static [u8] {
        match self {
            ColorType::Grayscale => &[1, 2, 4, 8, 16],
            ColorType::PaletteIndex => &[1, 2, 4, 8],
            ColorType::RGB | ColorType::GrayscaleAlpha | ColorType::RGBA => &[8, 16],
        }
    }
}

impl Display for ColorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorType::Grayscale => "grayscale",
            ColorType::RGB => "RGB",
            ColorType::PaletteIndex => "palette",
            ColorType::GrayscaleAlpha => "grayscale+alpha",
            ColorType::RGBA => "RGBA",
        };
        write!(f, "{name}")
    }
}

/// Whether an image is stored progressively (Adam7) or as a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interlacing {
    None,
    Adam7,
}

impl Interlacing {
    pub fn to_byte(self) -> u8 {
        match self {
            Interlacing::None => 0,
            Interlacing::Adam7 => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Interlacing::None),
            1 => Some(Interlacing::Adam7),
            _ => None,
        }
    }
}

/// A single palette entry: an 8-bit RGB triple plus an optional alpha value
/// contributed by a matching tRNS entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl PaletteEntry {
    pub fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 255,
        }
    }
}

/// The image descriptor established by IHDR on decode, or by constructor
/// arguments on encode. Immutable once built; see spec.md §3 "Lifecycle".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub interlacing: Interlacing,
}

impl ImageInfo {
    /// Validates and constructs a descriptor, enforcing the invariants from
    /// spec.md §3: depth/colour-type compatibility, non-zero dimensions.
    pub fn new(
        width: u32,
        height: u32,
        bit_depth: u8,
        color_type: ColorType,
        interlacing: Interlacing,
    ) -> Result<Self, InfoError> {
        if width == 0 || height == 0 {
            return Err(InfoError::ZeroDimension);
        }
        if !color_type.allowed_depths().contains(&bit_depth) {
            return Err(InfoError::IncompatibleDepth(color_type, bit_depth));
        }
        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            interlacing,
        })
    }

    /// Number of channels per pixel.
    pub fn planes(&self) -> u8 {
        self.color_type.planes()
    }

    /// Bytes-per-pixel rounded up, i.e. the filter unit from spec.md §4.D.
    /// Always at least 1, even when the stored bit depth is sub-byte.
    pub fn filter_unit(&self) -> usize {
        let bits = self.planes() as usize * self.bit_depth as usize;
        (bits + 7) / 8
    }

    /// Number of bytes a single packed scanline of width `width` occupies,
    /// not including the leading filter-type byte.
    pub fn stored_row_bytes(&self, width: u32) -> usize {
        let bits = width as usize * self.planes() as usize * self.bit_depth as usize;
        (bits + 7) / 8
    }

    /// Number of bytes a packed scanline for the *whole* image occupies.
    pub fn row_bytes(&self) -> usize {
        self.stored_row_bytes(self.width)
    }
}

#[derive(Debug)]
pub enum InfoError {
    ZeroDimension,
    IncompatibleDepth(ColorType, u8),
}

impl Display for InfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoError::ZeroDimension => write!(f, "Error: width and height must both be >= 1."),
            InfoError::IncompatibleDepth(ct, bd) => write!(
                f,
                "Error: bit depth {bd} is not valid for colour type {ct}, see PNG Specification 11.2.2."
            ),
        }
    }
}

impl std::error::Error for InfoError {}
