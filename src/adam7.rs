//! Adam7 interlace engine, spec.md §4.E.
//!
//! Decomposes an image into seven interleaved passes on encode and
//! reassembles them into the final grid on decode.

/// One of the seven Adam7 passes: starting offset and stride, both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pass {
    pub x_offset: u32,
    pub y_offset: u32,
    pub x_stride: u32,
    pub y_stride: u32,
}

/// The seven passes in encode/decode order, spec.md §4.E.
pub const PASSES: [Pass; 7] = [
    Pass { x_offset: 0, y_offset: 0, x_stride: 8, y_stride: 8 },
    Pass { x_offset: 4, y_offset: 0, x_stride: 8, y_stride: 8 },
    Pass { x_offset: 0, y_offset: 4, x_stride: 4, y_stride: 8 },
    Pass { x_offset: 2, y_offset: 0, x_stride: 4, y_stride: 4 },
    Pass { x_offset: 0, y_offset: 2, x_stride: 2, y_stride: 4 },
    Pass { x_offset: 1, y_offset: 0, x_stride: 2, y_stride: 2 },
    Pass { x_offset: 0, y_offset: 1, x_stride: 1, y_stride: 2 },
];

fn ceil_div(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

impl Pass {
    /// The width of this pass against an image of the given full width.
    /// Zero when the offset is already past the last column.
    pub fn width(self, full_width: u32) -> u32 {
        if self.x_offset >= full_width {
            0
        } else {
            ceil_div(full_width - self.x_offset, self.x_stride)
        }
    }

    /// The height of this pass against an image of the given full height.
    pub fn height(self, full_height: u32) -> u32 {
        if self.y_offset >= full_height {
            0
        } else {
            ceil_div(full_height - self.y_offset, self.y_stride)
        }
    }

    /// Maps a pixel at `(px, py)` within this pass to its coordinates in the
    /// full image grid.
    pub fn to_image_coords(self, px: u32, py: u32) -> (u32, u32) {
        (
            self.x_offset + px * self.x_stride,
            self.y_offset + py * self.y_stride,
        )
    }
}

/// Returns the (width, height) of each of the seven passes against an image
/// of the given full dimensions. Passes with zero width or height are
/// skipped entirely by callers that iterate this list.
pub fn pass_dimensions(width: u32, height: u32) -> [(u32, u32); 7] {
    let mut dims = [(0u32, 0u32); 7];
    for (i, pass) in PASSES.iter().enumerate() {
        dims[i] = (pass.width(width), pass.height(height));
    }
    dims
}

/// Splits a full-resolution grid of `planes`-interleaved samples (one
/// `Vec<T>` row per scanline, row-major, `width * planes` elements per row)
/// into the seven Adam7 pass grids, each returned the same shape.
pub fn deinterlace<T: Copy + Default>(
    grid: &[Vec<T>],
    width: u32,
    height: u32,
    planes: usize,
) -> Vec<Vec<Vec<T>>> {
    PASSES
        .iter()
        .map(|pass| {
            let (pw, ph) = (pass.width(width), pass.height(height));
            let mut rows = Vec::with_capacity(ph as usize);
            for py in 0..ph {
                let mut row = vec![T::default(); pw as usize * planes];
                let (_, src_y) = pass.to_image_coords(0, py);
                for px in 0..pw {
                    let (src_x, _) = pass.to_image_coords(px, 0);
                    let src_start = src_x as usize * planes;
                    let dst_start = px as usize * planes;
                    row[dst_start..dst_start + planes]
                        .copy_from_slice(&grid[src_y as usize][src_start..src_start + planes]);
                }
                rows.push(row);
            }
            rows
        })
        .collect()
}

/// The inverse of [`deinterlace`]: reassembles seven pass grids into a
/// full-resolution grid. Every pixel of the full grid must be covered by
/// exactly one (pass, position) pair (spec.md §8 property 5); pixels from
/// passes with zero width/height simply never run their inner loop.
pub fn reassemble<T: Copy + Default>(
    passes: &[Vec<Vec<T>>; 7],
    width: u32,
    height: u32,
    planes: usize,
) -> Vec<Vec<T>> {
    let mut grid = vec![vec![T::default(); width as usize * planes]; height as usize];

    for (pass, rows) in PASSES.iter().zip(passes.iter()) {
        for (py, row) in rows.iter().enumerate() {
            let (_, src_y) = pass.to_image_coords(0, py as u32);
            let pw = pass.width(width);
            for px in 0..pw {
                let (dst_x, _) = pass.to_image_coords(px, 0);
                let src_start = px as usize * planes;
                let dst_start = dst_x as usize * planes;
                grid[src_y as usize][dst_start..dst_start + planes]
                    .copy_from_slice(&row[src_start..src_start + planes]);
            }
        }
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tiling_covers_every_pixel_exactly_once() {
        let (w, h) = (9u32, 9u32);
        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut count = 0;
        for pass in PASSES {
            let (pw, ph) = (pass.width(w), pass.height(h));
            for py in 0..ph {
                for px in 0..pw {
                    let coord = pass.to_image_coords(px, py);
                    assert!(seen.insert(coord), "pixel {:?} covered twice", coord);
                    count += 1;
                }
            }
        }
        assert_eq!(count, (w * h) as usize);
        for x in 0..w {
            for y in 0..h {
                assert!(seen.contains(&(x, y)));
            }
        }
    }

    #[test]
    fn tiny_images_skip_zero_sized_passes() {
        // A 1x1 image: only pass 1 (offset 0,0) has any pixels.
        let dims = pass_dimensions(1, 1);
        assert_eq!(dims[0], (1, 1));
        for d in &dims[1..] {
            assert_eq!(*d, (0, 0));
        }
    }

    #[test]
    fn deinterlace_reassemble_roundtrip() {
        let (w, h, planes) = (9u32, 9u32, 3usize);
        let grid: Vec<Vec<u8>> = (0..h)
            .map(|y| {
                (0..w)
                    .flat_map(|x| {
                        let v = ((x + y * w) % 251) as u8;
                        [v, v.wrapping_add(1), v.wrapping_add(2)]
                    })
                    .collect()
            })
            .collect();

        let passes = deinterlace(&grid, w, h, planes);
        let passes: [Vec<Vec<u8>>; 7] = passes.try_into().unwrap();
        let back = reassemble(&passes, w, h, planes);

        assert_eq!(back, grid);
    }
}
