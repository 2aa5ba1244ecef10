//! Sample normaliser, spec.md §4.F: conversion between stored bit-depths /
//! channel counts and the caller-visible row format, plus tRNS, sBIT and
//! palette expansion.
//!
//! A "direct" row is represented as `Vec<u16>`, one element per sample,
//! channels interleaved — wide enough to hold any of the five legal bit
//! depths without losing precision. A "packed" row is the `Vec<u8>` form
//! PNG actually stores on the wire (see [`crate::pack`]).

use std::error::Error;
use std::fmt::{self, Display};

use crate::chunk::ancillary::{Background, SignificantBits, Transparency};
use crate::info::{ColorType, ImageInfo, PaletteEntry};
use crate::pack;

#[derive(Debug)]
pub enum SampleError {
    PaletteRequired,
    PaletteOutOfRange(usize),
    SampleOutOfRange { value: u32, bit_depth: u8 },
    RowLengthMismatch { expected: usize, found: usize },
    LossyConversionRefused(&'static str),
}

impl Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::PaletteRequired => {
                write!(f, "Error: this operation requires a palette but none was supplied.")
            }
            SampleError::PaletteOutOfRange(i) => {
                write!(f, "Error: palette index {i} is out of range for the PLTE table.")
            }
            SampleError::SampleOutOfRange { value, bit_depth } => write!(
                f,
                "Error: sample value {value} does not fit in {bit_depth} bits."
            ),
            SampleError::RowLengthMismatch { expected, found } => write!(
                f,
                "Error: row has {found} samples, expected {expected}."
            ),
            SampleError::LossyConversionRefused(reason) => {
                write!(f, "Error: refusing lossy conversion, {reason}.")
            }
        }
    }
}

impl Error for SampleError {}

/// Unpacks one stored scanline (filter-type byte already stripped) of
/// `width * planes` samples at `bit_depth` into direct `u16` samples.
pub fn unpack_scanline(bytes: &[u8], bit_depth: u8, width: u32, planes: u8) -> Vec<u16> {
    let count = width as usize * planes as usize;
    if bit_depth == 16 {
        bytes[..count * 2]
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    } else {
        pack::unpack(bytes, bit_depth, count)
            .into_iter()
            .map(u16::from)
            .collect()
    }
}

/// The inverse of [`unpack_scanline`]: packs direct `u16` samples into the
/// stored byte form for `bit_depth`.
pub fn pack_scanline(samples: &[u16], bit_depth: u8) -> Vec<u8> {
    if bit_depth == 16 {
        let mut out = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            out.extend_from_slice(&s.to_be_bytes());
        }
        out
    } else {
        let narrow: Vec<u8> = samples.iter().map(|&s| s as u8).collect();
        pack::pack(&narrow, bit_depth)
    }
}

/// Rescales every sample in a row from one bit depth to another, exact at
/// both endpoints (spec.md §4.F, §8 property 7).
pub fn rescale_row(samples: &[u16], from: u8, to: u8) -> Vec<u16> {
    samples
        .iter()
        .map(|&v| pack::rescale(v as u32, from, to) as u16)
        .collect()
}

/// Applies sBIT honouring: when `sbit < bit_depth`, the low
/// `bit_depth - sbit` bits are noise. This right-shifts them away before
/// any further rescaling, per spec.md §4.F.
pub fn apply_sbit(samples: &[u16], bit_depth: u8, sbit: u8) -> Vec<u16> {
    if sbit >= bit_depth || sbit == 0 {
        return samples.to_vec();
    }
    let shift = bit_depth - sbit;
    samples
        .iter()
        .map(|&v| {
            let significant = v >> shift;
            pack::rescale(significant as u32, sbit, bit_depth) as u16
        })
        .collect()
}

/// Expands a row of palette indices into RGB (or RGBA, if `with_alpha`)
/// samples at 8-bit depth.
pub fn expand_palette(
    indices: &[u16],
    palette: &[PaletteEntry],
    with_alpha: bool,
) -> Result<Vec<u16>, SampleError> {
    let mut out = Vec::with_capacity(indices.len() * if with_alpha { 4 } else { 3 });
    for &idx in indices {
        let entry = palette
            .get(idx as usize)
            .ok_or(SampleError::PaletteOutOfRange(idx as usize))?;
        out.push(entry.red as u16);
        out.push(entry.green as u16);
        out.push(entry.blue as u16);
        if with_alpha {
            out.push(entry.alpha as u16);
        }
    }
    Ok(out)
}

/// Replicates a greyscale (optionally +alpha) row into RGB(+alpha).
pub fn replicate_gray(samples: &[u16], has_alpha: bool) -> Vec<u16> {
    let step = if has_alpha { 2 } else { 1 };
    let mut out = Vec::with_capacity(samples.len() / step * if has_alpha { 4 } else { 3 });
    for chunk in samples.chunks(step) {
        let gray = chunk[0];
        out.push(gray);
        out.push(gray);
        out.push(gray);
        if has_alpha {
            out.push(chunk[1]);
        }
    }
    out
}

/// Flags which stored grayscale samples match a tRNS colour key, before any
/// rescale or RGB replication collapses the original colour type away.
fn gray_key_mask(samples: &[u16], transparency: Option<&Transparency>) -> Vec<bool> {
    match transparency {
        Some(Transparency::GrayscaleKey(key)) => samples.iter().map(|&v| v == *key).collect(),
        _ => vec![false; samples.len()],
    }
}

/// As [`gray_key_mask`], for a tRNS RGB colour key over the stored samples.
fn rgb_key_mask(samples: &[u16], transparency: Option<&Transparency>) -> Vec<bool> {
    match transparency {
        Some(Transparency::RgbKey { red, green, blue }) => samples
            .chunks(3)
            .map(|px| px[0] == *red && px[1] == *green && px[2] == *blue)
            .collect(),
        _ => vec![false; samples.len() / 3],
    }
}

/// Appends an alpha channel to a row of `planes`-wide pixels: 0 where `mask`
/// marks a tRNS colour-key match, `max_value` (opaque) everywhere else.
fn append_alpha(samples: &[u16], planes: usize, max_value: u16, mask: &[bool]) -> Vec<u16> {
    let mut out = Vec::with_capacity(samples.len() / planes * (planes + 1));
    for (pixel, &transparent) in samples.chunks(planes).zip(mask) {
        out.extend_from_slice(pixel);
        out.push(if transparent { 0 } else { max_value });
    }
    out
}

/// Canonical coercion targets for the `as*` reader methods, spec.md §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceTarget {
    Rgb8,
    Rgba8,
    Rgb16,
    Rgba16,
}

impl CoerceTarget {
    pub fn bit_depth(self) -> u8 {
        match self {
            CoerceTarget::Rgb8 | CoerceTarget::Rgba8 => 8,
            CoerceTarget::Rgb16 | CoerceTarget::Rgba16 => 16,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, CoerceTarget::Rgba8 | CoerceTarget::Rgba16)
    }

    pub fn planes(self) -> u8 {
        if self.has_alpha() {
            4
        } else {
            3
        }
    }
}

/// Value-preserving coercion of a direct row into one of the four RGB(A)
/// canonical forms, per spec.md §4.F. Refuses to expand a palette row
/// unless `palette` is supplied (maps to `PaletteRequired`).
pub fn coerce_row(
    samples: &[u16],
    info: &ImageInfo,
    palette: Option<&[PaletteEntry]>,
    sbit: Option<&SignificantBits>,
    transparency: Option<&Transparency>,
    target: CoerceTarget,
) -> Result<Vec<u16>, SampleError> {
    let stored_depth = info.bit_depth;
    let max_value = max_sample(target.bit_depth());

    match info.color_type {
        ColorType::PaletteIndex => {
            let palette = palette.ok_or(SampleError::PaletteRequired)?;
            // Palette alpha (merged in from tRNS, if any) rides along here;
            // entries are always 8-bit, rescale up for a 16-bit target.
            let mut rgb = expand_palette(samples, palette, target.has_alpha())?;
            if target.bit_depth() != 8 {
                rgb = rescale_row(&rgb, 8, target.bit_depth());
            }
            Ok(rgb)
        }
        ColorType::Grayscale => {
            // The colour key is defined over the stored sample, not the
            // rescaled/replicated RGB this branch ends in.
            let mask = gray_key_mask(samples, transparency);
            let honored = honor_sbit(samples, stored_depth, sbit, 0);
            let rescaled = rescale_row(&honored, stored_depth, target.bit_depth());
            let rgb = replicate_gray(&rescaled, false);
            if target.has_alpha() {
                Ok(append_alpha(&rgb, 3, max_value, &mask))
            } else {
                Ok(rgb)
            }
        }
        ColorType::GrayscaleAlpha => {
            let honored = honor_sbit(samples, stored_depth, sbit, 0);
            let rescaled = rescale_row(&honored, stored_depth, target.bit_depth());
            Ok(finish_alpha(replicate_gray(&rescaled, true), target, rescaled.len()))
        }
        ColorType::RGB => {
            let mask = rgb_key_mask(samples, transparency);
            let honored = honor_sbit(samples, stored_depth, sbit, 0);
            let rescaled = rescale_row(&honored, stored_depth, target.bit_depth());
            if target.has_alpha() {
                Ok(append_alpha(&rescaled, 3, max_value, &mask))
            } else {
                Ok(rescaled)
            }
        }
        ColorType::RGBA => {
            let honored = honor_sbit(samples, stored_depth, sbit, 0);
            let rescaled = rescale_row(&honored, stored_depth, target.bit_depth());
            Ok(finish_alpha(rescaled, target, rescaled.len()))
        }
    }
}

fn finish_alpha(mut samples: Vec<u16>, target: CoerceTarget, _len: usize) -> Vec<u16> {
    if !target.has_alpha() {
        // Drop every 4th sample (the alpha channel) to go from GA/RGBA -> G/RGB.
        let planes = 4;
        samples = samples
            .chunks(planes)
            .flat_map(|px| px[..planes - 1].to_vec())
            .collect();
    }
    samples
}

fn honor_sbit(
    samples: &[u16],
    bit_depth: u8,
    sbit: Option<&SignificantBits>,
    channel: usize,
) -> Vec<u16> {
    match sbit.and_then(|s| s.values.get(channel)).copied() {
        Some(bits) if bits > 0 && bits < bit_depth => apply_sbit(samples, bit_depth, bits),
        _ => samples.to_vec(),
    }
}

fn max_sample(bit_depth: u8) -> u16 {
    ((1u32 << bit_depth) - 1) as u16
}

/// Resolves a [`Background`] ancillary value into an RGB triple at the
/// target bit depth, expanding through the palette if needed.
pub fn resolve_background(
    background: &Background,
    palette: Option<&[PaletteEntry]>,
) -> Result<(u16, u16, u16), SampleError> {
    match background {
        Background::Grayscale(v) => Ok((*v, *v, *v)),
        Background::Rgb { red, green, blue } => Ok((*red, *green, *blue)),
        Background::PaletteIndex(idx) => {
            let palette = palette.ok_or(SampleError::PaletteRequired)?;
            let entry = palette
                .get(*idx as usize)
                .ok_or(SampleError::PaletteOutOfRange(*idx as usize))?;
            Ok((entry.red as u16, entry.green as u16, entry.blue as u16))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_scanline_eight_bit() {
        let samples = [0u16, 128, 255, 64];
        let packed = pack_scanline(&samples, 8);
        let back = unpack_scanline(&packed, 8, 4, 1);
        assert_eq!(back, samples);
    }

    #[test]
    fn pack_unpack_scanline_sixteen_bit() {
        let samples = [65535u16, 0, 32768, 1];
        let packed = pack_scanline(&samples, 16);
        let back = unpack_scanline(&packed, 16, 4, 1);
        assert_eq!(back, samples);
    }

    #[test]
    fn one_bit_row_of_seven_samples() {
        let samples = [1u16, 0, 1, 1, 0, 1, 1];
        let packed = pack_scanline(&samples, 1);
        assert_eq!(packed.len(), 1);
        let back = unpack_scanline(&packed, 1, 7, 1);
        assert_eq!(back, samples);
    }

    #[test]
    fn palette_expansion_yields_in_range_indices() {
        let palette = vec![
            PaletteEntry::opaque(0, 0, 0),
            PaletteEntry::opaque(255, 0, 0),
        ];
        let rgb = expand_palette(&[0, 1], &palette, false).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 0, 0]);
    }

    #[test]
    fn palette_out_of_range_is_an_error() {
        let palette = vec![PaletteEntry::opaque(0, 0, 0)];
        let err = expand_palette(&[5], &palette, false).unwrap_err();
        assert!(matches!(err, SampleError::PaletteOutOfRange(5)));
    }

    #[test]
    fn append_alpha_is_opaque_without_a_match() {
        let rgb = [10u16, 20, 30, 40, 50, 60];
        let rgba = append_alpha(&rgb, 3, 255, &[false, false]);
        assert_eq!(rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn rgb_key_mask_flags_matching_pixels() {
        let rgb = [1u16, 2, 3, 4, 5, 6];
        let trns = Transparency::RgbKey { red: 1, green: 2, blue: 3 };
        assert_eq!(rgb_key_mask(&rgb, Some(&trns)), vec![true, false]);
    }

    #[test]
    fn coerce_grayscale_honors_trns_colour_key() {
        let info = ImageInfo::new(2, 1, 8, ColorType::Grayscale, crate::info::Interlacing::None)
            .unwrap();
        let trns = Transparency::GrayscaleKey(0);
        let out =
            coerce_row(&[0, 255], &info, None, None, Some(&trns), CoerceTarget::Rgba8).unwrap();
        assert_eq!(out, vec![0, 0, 0, 0, 255, 255, 255, 255]);
    }

    #[test]
    fn coerce_rgb_honors_trns_colour_key() {
        let info =
            ImageInfo::new(2, 1, 8, ColorType::RGB, crate::info::Interlacing::None).unwrap();
        let trns = Transparency::RgbKey { red: 1, green: 2, blue: 3 };
        let samples = [1u16, 2, 3, 4, 5, 6];
        let out =
            coerce_row(&samples, &info, None, None, Some(&trns), CoerceTarget::Rgba8).unwrap();
        assert_eq!(out, vec![1, 2, 3, 0, 4, 5, 6, 255]);
    }

    #[test]
    fn coerce_palette_honors_merged_trns_alpha() {
        let palette = vec![
            PaletteEntry { red: 10, green: 20, blue: 30, alpha: 0 },
            PaletteEntry::opaque(40, 50, 60),
        ];
        let info = ImageInfo::new(2, 1, 8, ColorType::PaletteIndex, crate::info::Interlacing::None)
            .unwrap();
        let out = coerce_row(&[0, 1], &info, Some(&palette), None, None, CoerceTarget::Rgba8)
            .unwrap();
        assert_eq!(out, vec![10, 20, 30, 0, 40, 50, 60, 255]);
    }

    #[test]
    fn coerce_honors_sbit_on_grayscale() {
        let info =
            ImageInfo::new(1, 1, 8, ColorType::Grayscale, crate::info::Interlacing::None).unwrap();
        let sbit = SignificantBits { values: [4, 0, 0, 0], len: 1 };
        let out = coerce_row(&[0b1111_0101], &info, None, Some(&sbit), None, CoerceTarget::Rgb8)
            .unwrap();
        assert_eq!(out, vec![255, 255, 255]);
    }

    #[test]
    fn coerce_grayscale_to_rgb8() {
        let info = ImageInfo::new(2, 1, 8, ColorType::Grayscale, crate::info::Interlacing::None)
            .unwrap();
        let out = coerce_row(&[0, 255], &info, None, None, None, CoerceTarget::Rgb8).unwrap();
        assert_eq!(out, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn coerce_palette_without_palette_fails() {
        let info =
            ImageInfo::new(1, 1, 8, ColorType::PaletteIndex, crate::info::Interlacing::None)
                .unwrap();
        let err = coerce_row(&[0], &info, None, None, None, CoerceTarget::Rgb8).unwrap_err();
        assert!(matches!(err, SampleError::PaletteRequired));
    }
}
