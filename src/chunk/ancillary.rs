//! Typed payloads for the ancillary chunks this crate round-trips, plus the
//! catch-all for the ones it doesn't understand. spec.md §3 "Ancillary
//! state", §6 "Ancillary chunks implemented with round-trip fidelity".

use crate::info::PaletteEntry;
use crate::text::TextRecord;

/// Image gamma, stored fixed-point times 100000 per PNG 11.3.3.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gamma(pub u32);

/// The eight fixed-point (×100000) chromaticity values of PNG 11.3.3.3:
/// white point x/y, red x/y, green x/y, blue x/y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chromaticities {
    pub white_x: u32,
    pub white_y: u32,
    pub red_x: u32,
    pub red_y: u32,
    pub green_x: u32,
    pub green_y: u32,
    pub blue_x: u32,
    pub blue_y: u32,
}

/// Significant bits per channel, up to 4 values depending on colour type
/// (PNG 11.3.3.4). Only the leading `len` entries are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignificantBits {
    pub values: [u8; 4],
    pub len: u8,
}

/// Background colour (PNG 11.3.5.1); which variant is meaningful depends on
/// the image's colour type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Grayscale(u16),
    Rgb { red: u16, green: u16, blue: u16 },
    PaletteIndex(u8),
}

/// Transparency information (PNG 11.3.2.1): either a vector of per-palette-
/// entry alpha values, or a single colour treated as fully transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transparency {
    PaletteAlpha(Vec<u8>),
    GrayscaleKey(u16),
    RgbKey { red: u16, green: u16, blue: u16 },
}

/// Physical pixel dimensions (PNG 11.3.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalDimensions {
    pub pixels_per_unit_x: u32,
    pub pixels_per_unit_y: u32,
    pub unit_is_meter: bool,
}

/// The last-modification timestamp (PNG 11.3.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// An embedded ICC profile (PNG 11.3.3.5), kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IccProfile {
    pub name: String,
    pub profile: Vec<u8>,
}

/// Where an unrecognised ancillary chunk sat relative to the mandatory
/// chunks, so it can be re-emitted in the same bucket (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkBucket {
    BeforePlte,
    BeforeIdat,
    AfterIdat,
}

/// An ancillary chunk this crate doesn't interpret, preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChunk {
    pub ctype: [u8; 4],
    pub data: Vec<u8>,
    pub bucket: ChunkBucket,
}

/// Every piece of ancillary state a decode can recover, and everything an
/// encode can be configured with.
#[derive(Debug, Clone, Default)]
pub struct Ancillary {
    pub gamma: Option<Gamma>,
    pub chromaticities: Option<Chromaticities>,
    pub significant_bits: Option<SignificantBits>,
    pub background: Option<Background>,
    pub transparency: Option<Transparency>,
    pub physical_dimensions: Option<PhysicalDimensions>,
    pub time: Option<TimeStamp>,
    pub icc_profile: Option<IccProfile>,
    pub srgb_intent: Option<u8>,
    pub text: Vec<TextRecord>,
    pub palette: Option<Vec<PaletteEntry>>,
    pub unknown: Vec<UnknownChunk>,
}
