//! Per-scanline filter engine, spec.md §4.D.
//!
//! Inverse filtering reconstructs a scanline from the bytes stored in the
//! zlib stream plus the previously reconstructed scanline. Forward filtering
//! picks, for each scanline, whichever of the five filter types minimises
//! the "sum of absolute signed deviations" heuristic.

use std::fmt::{self, Display};

/// The five filter types a scanline may use, tagged by the byte PNG stores
/// immediately before the scanline's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    None,
    Sub,
    Up,
    Average,
    Paeth,
}

impl FilterType {
    pub fn to_byte(self) -> u8 {
        match self {
            FilterType::None => 0,
            FilterType::Sub => 1,
            FilterType::Up => 2,
            FilterType::Average => 3,
            FilterType::Paeth => 4,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(FilterType::None),
            1 => Some(FilterType::Sub),
            2 => Some(FilterType::Up),
            3 => Some(FilterType::Average),
            4 => Some(FilterType::Paeth),
            _ => None,
        }
    }

    const ALL: [FilterType; 5] = [
        FilterType::None,
        FilterType::Sub,
        FilterType::Up,
        FilterType::Average,
        FilterType::Paeth,
    ];
}

#[derive(Debug)]
pub struct UnknownFilter(pub u8);

impl Display for UnknownFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error: unknown scanline filter type byte {}, only 0-4 are valid.",
            self.0
        )
    }
}

impl std::error::Error for UnknownFilter {}

/// Reconstructs one scanline. `data` is the filtered bytes (filter-type byte
/// already stripped), `prev` is the previously reconstructed scanline (all
/// zeros for the first scanline of a pass), and `fu` is the filter unit
/// (`max(1, bytes-per-pixel)`).
pub fn unfilter(filter: FilterType, data: &[u8], prev: &[u8], fu: usize) -> Vec<u8> {
    let len = data.len();
    let mut out = vec![0u8; len];

    match filter {
        FilterType::None => out.copy_from_slice(data),
        FilterType::Sub => {
            for i in 0..len {
                let a = if i >= fu { out[i - fu] } else { 0 };
                out[i] = data[i].wrapping_add(a);
            }
        }
        FilterType::Up => {
            for i in 0..len {
                let b = prev[i];
                out[i] = data[i].wrapping_add(b);
            }
        }
        FilterType::Average => {
            for i in 0..len {
                let a = if i >= fu { out[i - fu] as u16 } else { 0 };
                let b = prev[i] as u16;
                out[i] = data[i].wrapping_add(((a + b) / 2) as u8);
            }
        }
        FilterType::Paeth => {
            for i in 0..len {
                let a = if i >= fu { out[i - fu] } else { 0 };
                let b = prev[i];
                let c = if i >= fu { prev[i - fu] } else { 0 };
                out[i] = data[i].wrapping_add(paeth_predictor(a, b, c));
            }
        }
    }

    out
}

/// Applies one forward filter to `data` given the previous reconstructed
/// scanline, producing the bytes that would be stored in the zlib stream.
pub fn filter(filter: FilterType, data: &[u8], prev: &[u8], fu: usize) -> Vec<u8> {
    let len = data.len();
    let mut out = vec![0u8; len];

    match filter {
        FilterType::None => out.copy_from_slice(data),
        FilterType::Sub => {
            for i in 0..len {
                let a = if i >= fu { data[i - fu] } else { 0 };
                out[i] = data[i].wrapping_sub(a);
            }
        }
        FilterType::Up => {
            for i in 0..len {
                out[i] = data[i].wrapping_sub(prev[i]);
            }
        }
        FilterType::Average => {
            for i in 0..len {
                let a = if i >= fu { data[i - fu] as u16 } else { 0 };
                let b = prev[i] as u16;
                out[i] = data[i].wrapping_sub(((a + b) / 2) as u8);
            }
        }
        FilterType::Paeth => {
            for i in 0..len {
                let a = if i >= fu { data[i - fu] } else { 0 };
                let b = prev[i];
                let c = if i >= fu { prev[i - fu] } else { 0 };
                out[i] = data[i].wrapping_sub(paeth_predictor(a, b, c));
            }
        }
    }

    out
}

/// The Paeth predictor, spec.md §4.D, with its exact tie-break ordering:
/// `a` wins ties with `b` and `c`; failing that `b` wins ties with `c`.
fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let (ai, bi, ci) = (a as i16, b as i16, c as i16);
    let p = ai + bi - ci;
    let pa = (p - ai).abs();
    let pb = (p - bi).abs();
    let pc = (p - ci).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Picks the filter minimising the sum of absolute signed deviations
/// (spec.md §4.D), treating each filtered output byte as signed in
/// `[-128, 127]`. Applied per scanline, never globally across the image.
pub fn choose_adaptive(data: &[u8], prev: &[u8], fu: usize) -> (FilterType, Vec<u8>) {
    FilterType::ALL
        .iter()
        .map(|&ft| {
            let candidate = filter(ft, data, prev, fu);
            let cost: u32 = candidate
                .iter()
                .map(|&b| (b as i8).unsigned_abs() as u32)
                .sum();
            (ft, candidate, cost)
        })
        .min_by_key(|(_, _, cost)| *cost)
        .map(|(ft, candidate, _)| (ft, candidate))
        .expect("FilterType::ALL is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ft: FilterType, data: &[u8], prev: &[u8], fu: usize) {
        let filtered = filter(ft, data, prev, fu);
        let back = unfilter(ft, &filtered, prev, fu);
        assert_eq!(back, data, "filter {:?} did not invert", ft);
    }

    #[test]
    fn every_filter_is_invertible() {
        let data: Vec<u8> = (0..32u8).collect();
        let prev: Vec<u8> = (100..132u8).collect();
        for fu in [1usize, 3, 4] {
            for &ft in &FilterType::ALL {
                roundtrip(ft, &data, &prev, fu);
            }
        }
    }

    #[test]
    fn first_scanline_up_reduces_to_none() {
        let data = [10u8, 20, 30, 40];
        let prev = vec![0u8; data.len()];
        assert_eq!(filter(FilterType::Up, &data, &prev, 1), data.to_vec());
    }

    #[test]
    fn first_scanline_paeth_reduces_to_sub() {
        let data = [10u8, 20, 30, 40];
        let prev = vec![0u8; data.len()];
        let fu = 1;
        let paeth = filter(FilterType::Paeth, &data, &prev, fu);
        let sub = filter(FilterType::Sub, &data, &prev, fu);
        assert_eq!(paeth, sub);
    }

    #[test]
    fn paeth_tie_break_prefers_a_then_b() {
        // a == b == c makes pa == pb == pc == 0, so `a` must win.
        assert_eq!(paeth_predictor(5, 5, 5), 5);
        // a=0,b=1,c=0 gives p=1, pa=1, pb=0, pc=1 -> b wins.
        assert_eq!(paeth_predictor(0, 1, 0), 1);
    }

    #[test]
    fn unknown_filter_byte_is_rejected() {
        assert!(FilterType::from_byte(5).is_none());
        assert!(FilterType::from_byte(0).is_some());
    }

    #[test]
    fn adaptive_choice_is_invertible() {
        let data: Vec<u8> = vec![5, 5, 5, 5, 200, 200, 200, 200];
        let prev = vec![0u8; data.len()];
        let (ft, filtered) = choose_adaptive(&data, &prev, 4);
        let back = unfilter(ft, &filtered, &prev, 4);
        assert_eq!(back, data);
    }
}
