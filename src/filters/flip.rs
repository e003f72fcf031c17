//! Orientation operations: mirror flips and right-angle rotations.
//!
//! H and V mirror rows or columns using two scratch rows; HV and 180 are
//! the same operation. The 90 degree pair allocates a destination with
//! swapped dimensions and is parallelised by partitioning the output's
//! rows, each of which is one source column.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

use crate::exec;
use crate::filter::Filter;
use crate::raster::Raster;

/// The flip/rotate operation to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipOperation {
    /// Mirror left-right.
    FlipH,
    /// Mirror top-bottom.
    FlipV,
    /// Mirror both ways; identical to a 180 degree rotation.
    FlipHV,
    /// Rotate 90 degrees clockwise.
    Rotate90Cw,
    /// Rotate 90 degrees counter-clockwise.
    Rotate90Ccw,
    /// Rotate 180 degrees.
    Rotate180,
}

#[derive(Clone, Copy, Debug)]
pub struct FlipFilter {
    operation: FlipOperation,
}

impl FlipFilter {
    pub fn new(operation: FlipOperation) -> FlipFilter {
        FlipFilter { operation }
    }

    pub fn set_operation(&mut self, operation: FlipOperation) {
        self.operation = operation;
    }

    pub fn operation(&self) -> FlipOperation {
        self.operation
    }

    fn run_packed(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (w, h) = (src.width(), src.height());
        let inp = src.to_packed();
        match self.operation {
            FlipOperation::FlipH => {
                let mut dst = take_dst(src, dst, w, h);
                flip_h(&inp, &mut dst);
                dst
            }
            FlipOperation::FlipV => {
                let mut dst = take_dst(src, dst, w, h);
                flip_v(&inp, &mut dst);
                dst
            }
            FlipOperation::FlipHV | FlipOperation::Rotate180 => {
                let mut dst = take_dst(src, dst, w, h);
                flip_180(&inp, &mut dst);
                dst
            }
            FlipOperation::Rotate90Cw => {
                let mut dst = take_dst(src, dst, h, w);
                let out = rotate_90_cw(&inp);
                dst.set_packed(&out);
                dst
            }
            FlipOperation::Rotate90Ccw => {
                let mut dst = take_dst(src, dst, h, w);
                let out = rotate_90_ccw(&inp);
                dst.set_packed(&out);
                dst
            }
        }
    }
}

fn take_dst(src: &Raster, dst: Option<Raster>, w: usize, h: usize) -> Raster {
    match dst {
        Some(d) if d.width() == w && d.height() == h => d,
        _ => src.compatible(w, h),
    }
}

/// Mirror rows in place, two scratch rows at a time.
fn flip_h(inp: &Array2<u32>, dst: &mut Raster) {
    let (h, w) = inp.dim();
    let mut row = vec![0u32; w];
    for y in 0..h {
        for x in 0..w {
            row[w - x - 1] = inp[[y, x]];
        }
        dst.set_row(0, y, w, &row);
    }
}

/// Swap rows top-for-bottom.
fn flip_v(inp: &Array2<u32>, dst: &mut Raster) {
    let (h, w) = inp.dim();
    let mut row1 = vec![0u32; w];
    let mut row2 = vec![0u32; w];
    for y in 0..(h + 1) / 2 {
        let opposite = h - y - 1;
        row1.copy_from_slice(inp.row(y).as_slice().expect("rows are contiguous"));
        row2.copy_from_slice(inp.row(opposite).as_slice().expect("rows are contiguous"));
        dst.set_row(0, y, w, &row2);
        dst.set_row(0, opposite, w, &row1);
    }
}

/// Reverse rows and columns together.
fn flip_180(inp: &Array2<u32>, dst: &mut Raster) {
    let (h, w) = inp.dim();
    let mut row3 = vec![0u32; w];
    let mut row4 = vec![0u32; w];
    for y in 0..(h + 1) / 2 {
        let opposite = h - y - 1;
        for x in 0..w {
            row3[w - x - 1] = inp[[y, x]];
            row4[w - x - 1] = inp[[opposite, x]];
        }
        dst.set_row(0, y, w, &row4);
        dst.set_row(0, opposite, w, &row3);
    }
}

/// Transpose-and-reverse; output row `x` is source column `x` read upward.
fn rotate_90_cw(inp: &Array2<u32>) -> Array2<u32> {
    let (h, w) = inp.dim();
    let mut out = Array2::<u32>::zeros((w, h));
    let chunk = exec::chunk_rows(h, w * h);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dx, mut out_row) in band.outer_iter_mut().enumerate() {
                let x = ci * chunk + dx;
                for y in 0..h {
                    out_row[h - y - 1] = inp[[y, x]];
                }
            }
        });
    out
}

/// Transpose-and-reverse the other way; output row `i` is source column
/// `w - 1 - i` read downward.
fn rotate_90_ccw(inp: &Array2<u32>) -> Array2<u32> {
    let (h, w) = inp.dim();
    let mut out = Array2::<u32>::zeros((w, h));
    let chunk = exec::chunk_rows(h, w * h);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (di, mut out_row) in band.outer_iter_mut().enumerate() {
                let x = w - 1 - (ci * chunk + di);
                for y in 0..h {
                    out_row[y] = inp[[y, x]];
                }
            }
        });
    out
}

impl Filter for FlipFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.run_packed(src, dst)
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        // Byte-plane fast path for plain grey; grey+alpha runs packed.
        let plane = match src.gray_plane() {
            Some(p) => p,
            None => return self.run_packed(src, dst),
        };
        let (h, w) = plane.dim();
        let (out, dst_w, dst_h) = match self.operation {
            FlipOperation::FlipH => {
                let mut out = plane.clone();
                for mut row in out.outer_iter_mut() {
                    row.as_slice_mut().expect("rows are contiguous").reverse();
                }
                (out, w, h)
            }
            FlipOperation::FlipV => {
                let mut out = Array2::<u8>::zeros((h, w));
                for y in 0..h {
                    out.row_mut(y).assign(&plane.row(h - y - 1));
                }
                (out, w, h)
            }
            FlipOperation::FlipHV | FlipOperation::Rotate180 => {
                let mut out = Array2::<u8>::zeros((h, w));
                for y in 0..h {
                    for x in 0..w {
                        out[[h - y - 1, w - x - 1]] = plane[[y, x]];
                    }
                }
                (out, w, h)
            }
            FlipOperation::Rotate90Cw => {
                let mut out = Array2::<u8>::zeros((w, h));
                for y in 0..h {
                    for x in 0..w {
                        out[[x, h - y - 1]] = plane[[y, x]];
                    }
                }
                (out, h, w)
            }
            FlipOperation::Rotate90Ccw => {
                let mut out = Array2::<u8>::zeros((w, h));
                for y in 0..h {
                    for x in 0..w {
                        out[[w - x - 1, y]] = plane[[y, x]];
                    }
                }
                (out, h, w)
            }
        };
        let mut dst = take_dst(src, dst, dst_w, dst_h);
        dst.set_gray_plane(&out);
        dst
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelFormat;

    fn raster_2x2() -> Raster {
        // S2 fixture: red, green / blue, white.
        let data = vec![0xffff0000u32, 0xff00ff00, 0xff0000ff, 0xffffffff];
        Raster::from_packed(2, 2, true, data).unwrap()
    }

    #[test]
    fn test_flip_180_2x2() {
        let src = raster_2x2();
        let out = FlipFilter::new(FlipOperation::Rotate180).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xffffffff);
        assert_eq!(out.pixel(1, 0), 0xff0000ff);
        assert_eq!(out.pixel(0, 1), 0xff00ff00);
        assert_eq!(out.pixel(1, 1), 0xffff0000);
    }

    #[test]
    fn test_flips_are_involutions() {
        let data: Vec<u32> = (0..15).map(|i| 0xff000000 | i).collect();
        let src = Raster::from_packed(5, 3, true, data).unwrap();
        for op in [
            FlipOperation::FlipH,
            FlipOperation::FlipV,
            FlipOperation::Rotate180,
            FlipOperation::FlipHV,
        ] {
            let f = FlipFilter::new(op);
            let back = f.filter(&f.filter(&src, None), None);
            assert_eq!(back.to_packed(), src.to_packed(), "{op:?}");
        }
    }

    #[test]
    fn test_rotate_90_dimensions_swap() {
        let src = Raster::from_packed(5, 3, true, vec![0xff101010; 15]).unwrap();
        let cw = FlipFilter::new(FlipOperation::Rotate90Cw).filter(&src, None);
        assert_eq!((cw.width(), cw.height()), (3, 5));
    }

    #[test]
    fn test_rotate_90_cw_corner_mapping() {
        let src = raster_2x2();
        let out = FlipFilter::new(FlipOperation::Rotate90Cw).filter(&src, None);
        // Top-left goes to top-right.
        assert_eq!(out.pixel(1, 0), 0xffff0000);
        // Bottom-left goes to top-left.
        assert_eq!(out.pixel(0, 0), 0xff0000ff);
    }

    #[test]
    fn test_ccw_undoes_cw() {
        let data: Vec<u32> = (0..15).map(|i| 0xff000000 | i * 3).collect();
        let src = Raster::from_packed(5, 3, true, data).unwrap();
        let cw = FlipFilter::new(FlipOperation::Rotate90Cw).filter(&src, None);
        let back = FlipFilter::new(FlipOperation::Rotate90Ccw).filter(&cw, None);
        assert_eq!((back.width(), back.height()), (5, 3));
        assert_eq!(back.to_packed(), src.to_packed());
    }

    #[test]
    fn test_gray_flip_h() {
        let src =
            Raster::from_bytes(3, 1, PixelFormat::Gray8, vec![1, 2, 3]).unwrap();
        let out = FlipFilter::new(FlipOperation::FlipH).filter(&src, None);
        assert_eq!(out.format(), PixelFormat::Gray8);
        assert_eq!(out.pixel(0, 0) & 0xff, 3);
        assert_eq!(out.pixel(2, 0) & 0xff, 1);
    }

    #[test]
    fn test_gray_rotate_90_cw() {
        let src =
            Raster::from_bytes(2, 2, PixelFormat::Gray8, vec![1, 2, 3, 4]).unwrap();
        let out = FlipFilter::new(FlipOperation::Rotate90Cw).filter(&src, None);
        assert_eq!(out.pixel(0, 0) & 0xff, 3);
        assert_eq!(out.pixel(1, 0) & 0xff, 1);
        assert_eq!(out.pixel(0, 1) & 0xff, 4);
        assert_eq!(out.pixel(1, 1) & 0xff, 2);
    }
}
