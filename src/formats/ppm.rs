//! NetPBM peer format bridge, spec.md §6 "Peer format – NetPBM PAM/PNM":
//! specified only at the boundary. Two paths are supported: the simple
//! binary PPM (P6, always RGB, kept for compatibility with the teacher's
//! original writer-only surface) and the general-purpose PAM (P7), which
//! carries arbitrary tuple types through an explicit header.

use std::error::Error;
use std::fmt::{self, Display};
use std::io::{self, Read, Write};

#[derive(Debug)]
pub enum NetpbmError {
    BadHeader(&'static str),
    UnsupportedMaxval(u32),
    TruncatedData,
    Io(io::Error),
}

impl Display for NetpbmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetpbmError::BadHeader(reason) => write!(f, "Error: malformed NetPBM header, {reason}."),
            NetpbmError::UnsupportedMaxval(m) => write!(
                f,
                "Error: MAXVAL {m} is not of the form 2^k - 1, see spec.md §6."
            ),
            NetpbmError::TruncatedData => {
                write!(f, "Error: raster data ended before width * height * depth samples were read.")
            }
            NetpbmError::Io(e) => write!(f, "Error: I/O error while reading/writing NetPBM data, '{e}'"),
        }
    }
}

impl Error for NetpbmError {}

impl From<io::Error> for NetpbmError {
    fn from(e: io::Error) -> Self {
        NetpbmError::Io(e)
    }
}

/// spec.md §6: "MAXVAL other than 2^k - 1 is rejected."
fn is_valid_maxval(maxval: u32) -> bool {
    (1..=16).any(|k| maxval == (1u32 << k) - 1)
}

/// Reads one whitespace-delimited token from a raw NetPBM header, skipping
/// `#`-to-end-of-line comments, the way every PNM/PAM reader must.
fn next_token<R: Read>(bytes: &mut io::Bytes<R>) -> Result<String, NetpbmError> {
    let mut token = String::new();
    let mut in_comment = false;
    loop {
        let b = match bytes.next() {
            Some(Ok(b)) => b,
            Some(Err(e)) => return Err(NetpbmError::Io(e)),
            None => {
                if token.is_empty() {
                    return Err(NetpbmError::TruncatedData);
                }
                return Ok(token);
            }
        };
        if in_comment {
            if b == b'\n' {
                in_comment = false;
            }
            continue;
        }
        if b == b'#' {
            in_comment = true;
            continue;
        }
        if b.is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            return Ok(token);
        }
        token.push(b as char);
    }
}

fn read_raster<R: Read>(bytes: &mut io::Bytes<R>, len: usize) -> Result<Vec<u8>, NetpbmError> {
    let mut raw = vec![0u8; len];
    for slot in raw.iter_mut() {
        *slot = match bytes.next() {
            Some(Ok(b)) => b,
            Some(Err(e)) => return Err(NetpbmError::Io(e)),
            None => return Err(NetpbmError::TruncatedData),
        };
    }
    Ok(raw)
}

fn samples_from_raster(raw: &[u8], maxval: u32) -> Vec<u16> {
    if maxval > 255 {
        raw.chunks(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect()
    } else {
        raw.iter().map(|&b| b as u16).collect()
    }
}

fn raster_from_samples(samples: &[u16], maxval: u32) -> Vec<u8> {
    if maxval > 255 {
        let mut out = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            out.extend_from_slice(&s.to_be_bytes());
        }
        out
    } else {
        samples.iter().map(|&s| s as u8).collect()
    }
}

/// A binary (P6) PPM image: always three samples (RGB) per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ppm {
    pub width: usize,
    pub height: usize,
    pub maxval: u32,
    /// Interleaved RGB samples, row-major, `width * height * 3` long.
    pub samples: Vec<u16>,
}

impl Ppm {
    /// Builds an 8-bit PPM from flat RGB triples, the teacher's original
    /// `Ppm::build` shape.
    pub fn build(rgb: &[(u8, u8, u8)], width: usize, height: usize) -> Self {
        let samples = rgb
            .iter()
            .flat_map(|&(r, g, b)| [r as u16, g as u16, b as u16])
            .collect();
        Self { width, height, maxval: 255, samples }
    }

    pub fn read<R: Read>(r: R) -> Result<Self, NetpbmError> {
        let mut bytes = r.bytes();
        let magic = next_token(&mut bytes)?;
        if magic != "P6" {
            return Err(NetpbmError::BadHeader("expected 'P6' magic number"));
        }
        let width: usize = next_token(&mut bytes)?
            .parse()
            .map_err(|_| NetpbmError::BadHeader("WIDTH is not a valid integer"))?;
        let height: usize = next_token(&mut bytes)?
            .parse()
            .map_err(|_| NetpbmError::BadHeader("HEIGHT is not a valid integer"))?;
        let maxval: u32 = next_token(&mut bytes)?
            .parse()
            .map_err(|_| NetpbmError::BadHeader("MAXVAL is not a valid integer"))?;
        if !is_valid_maxval(maxval) {
            return Err(NetpbmError::UnsupportedMaxval(maxval));
        }

        let bytes_per_sample = if maxval > 255 { 2 } else { 1 };
        let raw = read_raster(&mut bytes, width * height * 3 * bytes_per_sample)?;

        Ok(Self {
            width,
            height,
            maxval,
            samples: samples_from_raster(&raw, maxval),
        })
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<(), NetpbmError> {
        write!(w, "P6\n{} {}\n{}\n", self.width, self.height, self.maxval)?;
        w.write_all(&raster_from_samples(&self.samples, self.maxval))?;
        Ok(())
    }

    /// One `Vec<u16>` per scanline, `width * 3` samples each.
    pub fn rows(&self) -> Vec<Vec<u16>> {
        self.samples.chunks(self.width * 3).map(<[u16]>::to_vec).collect()
    }
}

/// The four tuple types this crate round-trips through PAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleType {
    Grayscale,
    GrayscaleAlpha,
    Rgb,
    RgbAlpha,
}

impl TupleType {
    pub fn depth(self) -> usize {
        match self {
            TupleType::Grayscale => 1,
            TupleType::GrayscaleAlpha => 2,
            TupleType::Rgb => 3,
            TupleType::RgbAlpha => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TupleType::Grayscale => "GRAYSCALE",
            TupleType::GrayscaleAlpha => "GRAYSCALE_ALPHA",
            TupleType::Rgb => "RGB",
            TupleType::RgbAlpha => "RGB_ALPHA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GRAYSCALE" => Some(TupleType::Grayscale),
            "GRAYSCALE_ALPHA" => Some(TupleType::GrayscaleAlpha),
            "RGB" => Some(TupleType::Rgb),
            "RGB_ALPHA" => Some(TupleType::RgbAlpha),
            _ => None,
        }
    }
}

/// A PAM (P7) image: `WIDTH`/`HEIGHT`/`DEPTH`/`MAXVAL`/`TUPLTYPE` header,
/// terminated by `ENDHDR`, followed by raw raster data. General-purpose
/// enough to carry any of the four tuple types this crate understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pam {
    pub width: usize,
    pub height: usize,
    pub maxval: u32,
    pub tuple_type: TupleType,
    pub samples: Vec<u16>,
}

impl Pam {
    pub fn build(rows: &[Vec<u16>], width: usize, height: usize, tuple_type: TupleType, maxval: u32) -> Self {
        Self {
            width,
            height,
            maxval,
            tuple_type,
            samples: rows.concat(),
        }
    }

    pub fn read<R: Read>(r: R) -> Result<Self, NetpbmError> {
        let mut bytes = r.bytes();
        let magic = next_token(&mut bytes)?;
        if magic != "P7" {
            return Err(NetpbmError::BadHeader("expected 'P7' magic number"));
        }

        let mut width = None;
        let mut height = None;
        let mut depth = None;
        let mut maxval = None;
        let mut tuple_type = None;

        loop {
            let key = next_token(&mut bytes)?;
            if key == "ENDHDR" {
                break;
            }
            let value = next_token(&mut bytes)?;
            match key.as_str() {
                "WIDTH" => {
                    width = Some(
                        value
                            .parse()
                            .map_err(|_| NetpbmError::BadHeader("WIDTH is not a valid integer"))?,
                    )
                }
                "HEIGHT" => {
                    height = Some(
                        value
                            .parse()
                            .map_err(|_| NetpbmError::BadHeader("HEIGHT is not a valid integer"))?,
                    )
                }
                "DEPTH" => {
                    depth = Some(
                        value
                            .parse::<usize>()
                            .map_err(|_| NetpbmError::BadHeader("DEPTH is not a valid integer"))?,
                    )
                }
                "MAXVAL" => {
                    maxval = Some(
                        value
                            .parse()
                            .map_err(|_| NetpbmError::BadHeader("MAXVAL is not a valid integer"))?,
                    )
                }
                "TUPLTYPE" => {
                    tuple_type = Some(
                        TupleType::parse(&value)
                            .ok_or(NetpbmError::BadHeader("unrecognised TUPLTYPE"))?,
                    )
                }
                _ => {}
            }
        }

        let width: usize = width.ok_or(NetpbmError::BadHeader("header has no WIDTH"))?;
        let height: usize = height.ok_or(NetpbmError::BadHeader("header has no HEIGHT"))?;
        let depth: usize = depth.ok_or(NetpbmError::BadHeader("header has no DEPTH"))?;
        let maxval: u32 = maxval.ok_or(NetpbmError::BadHeader("header has no MAXVAL"))?;
        let tuple_type: TupleType =
            tuple_type.ok_or(NetpbmError::BadHeader("header has no TUPLTYPE"))?;

        if !is_valid_maxval(maxval) {
            return Err(NetpbmError::UnsupportedMaxval(maxval));
        }
        if tuple_type.depth() != depth {
            return Err(NetpbmError::BadHeader("DEPTH does not match TUPLTYPE"));
        }

        let bytes_per_sample = if maxval > 255 { 2 } else { 1 };
        let raw = read_raster(&mut bytes, width * height * depth * bytes_per_sample)?;

        Ok(Self {
            width,
            height,
            maxval,
            tuple_type,
            samples: samples_from_raster(&raw, maxval),
        })
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<(), NetpbmError> {
        write!(
            w,
            "P7\nWIDTH {}\nHEIGHT {}\nDEPTH {}\nMAXVAL {}\nTUPLTYPE {}\nENDHDR\n",
            self.width,
            self.height,
            self.tuple_type.depth(),
            self.maxval,
            self.tuple_type.name()
        )?;
        w.write_all(&raster_from_samples(&self.samples, self.maxval))?;
        Ok(())
    }

    /// One `Vec<u16>` per scanline, `width * tuple_type.depth()` samples each.
    pub fn rows(&self) -> Vec<Vec<u16>> {
        let stride = self.width * self.tuple_type.depth();
        self.samples.chunks(stride).map(<[u16]>::to_vec).collect()
    }

    /// spec.md §6: "MAXVAL 1 materialises an sBIT chunk of 1 per channel."
    pub fn implied_sbit(&self) -> Option<crate::chunk::ancillary::SignificantBits> {
        if self.maxval != 1 {
            return None;
        }
        let depth = self.tuple_type.depth();
        let mut values = [0u8; 4];
        values[..depth].fill(1);
        Some(crate::chunk::ancillary::SignificantBits {
            values,
            len: depth as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ppm_round_trips() {
        let rgb = vec![(0u8, 0, 0), (255, 128, 64), (1, 2, 3), (9, 8, 7)];
        let ppm = Ppm::build(&rgb, 2, 2);
        let mut buf = Vec::new();
        ppm.write(&mut buf).unwrap();

        let back = Ppm::read(buf.as_slice()).unwrap();
        assert_eq!(back, ppm);
    }

    #[test]
    fn ppm_rejects_non_p6_magic() {
        let err = Ppm::read(b"P5\n1 1\n255\n\x00".as_slice()).unwrap_err();
        assert!(matches!(err, NetpbmError::BadHeader(_)));
    }

    #[test]
    fn ppm_rejects_bad_maxval() {
        let err = Ppm::read(b"P6\n1 1\n200\n\x00\x00\x00".as_slice()).unwrap_err();
        assert!(matches!(err, NetpbmError::UnsupportedMaxval(200)));
    }

    #[test]
    fn pam_round_trips_rgba() {
        let rows = vec![vec![1u16, 2, 3, 4, 5, 6, 7, 8]];
        let pam = Pam::build(&rows, 2, 1, TupleType::RgbAlpha, 255);
        let mut buf = Vec::new();
        pam.write(&mut buf).unwrap();

        let back = Pam::read(buf.as_slice()).unwrap();
        assert_eq!(back, pam);
        assert_eq!(back.rows(), rows);
    }

    #[test]
    fn pam_round_trips_sixteen_bit_grayscale() {
        let rows = vec![vec![0u16, 65535], vec![32768, 1]];
        let pam = Pam::build(&rows, 2, 2, TupleType::Grayscale, 65535);
        let mut buf = Vec::new();
        pam.write(&mut buf).unwrap();

        let back = Pam::read(buf.as_slice()).unwrap();
        assert_eq!(back.rows(), rows);
    }

    #[test]
    fn pam_maxval_one_implies_sbit_of_one_per_channel() {
        let rows = vec![vec![0u16, 1, 1, 0]];
        let pam = Pam::build(&rows, 2, 1, TupleType::GrayscaleAlpha, 1);
        let sbit = pam.implied_sbit().unwrap();
        assert_eq!(sbit.len, 2);
        assert_eq!(&sbit.values[..2], &[1, 1]);
    }

    #[test]
    fn pam_rejects_depth_tupltype_mismatch() {
        let mut buf = Vec::new();
        write!(
            buf,
            "P7\nWIDTH 1\nHEIGHT 1\nDEPTH 4\nMAXVAL 255\nTUPLTYPE RGB\nENDHDR\n\x00\x00\x00"
        )
        .unwrap();
        let err = Pam::read(buf.as_slice()).unwrap_err();
        assert!(matches!(err, NetpbmError::BadHeader(_)));
    }
}
