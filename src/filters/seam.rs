//! Content-aware resizing by seam carving.
//!
//! Width shrinks by repeatedly removing the lowest-energy vertical seam;
//! height shrinks by transposing, shrinking width, and transposing back.
//! Seams are traced greedily from every start column: at each row the
//! path steps to whichever of the three neighbours below has the least
//! energy. After a removal, energy and paths are recomputed only inside
//! the column band the seam touched.

use log::debug;

use ndarray::Array2;

use crate::filter::Filter;
use crate::raster::Raster;

#[derive(Clone)]
struct SeamPath {
    energy: i64,
    /// Step (-1, 0, +1) taken between each row and the next.
    direction: Vec<i8>,
    /// Leftmost excursion relative to the start column.
    lowest: i32,
    /// Rightmost excursion relative to the start column.
    highest: i32,
}

impl SeamPath {
    fn new(height: usize) -> SeamPath {
        SeamPath {
            energy: 0,
            direction: vec![0; height],
            lowest: 0,
            highest: 0,
        }
    }
}

/// Shrinks an image to a target size by removing low-energy seams.
#[derive(Clone, Copy, Debug)]
pub struct SeamCarvingFilter {
    dst_width: usize,
    dst_height: usize,
}

impl SeamCarvingFilter {
    pub fn new(dst_width: usize, dst_height: usize) -> SeamCarvingFilter {
        SeamCarvingFilter {
            dst_width,
            dst_height,
        }
    }
}

impl Filter for SeamCarvingFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let sw = src.width();
        let sh = src.height();
        // Seam carving only shrinks; larger targets pass through.
        let dw = self.dst_width.clamp(1, sw);
        let dh = self.dst_height.clamp(1, sh);
        if (dw, dh) != (self.dst_width, self.dst_height) {
            debug!(
                "seam carving target {}x{} clamped to {}x{}",
                self.dst_width, self.dst_height, dw, dh
            );
        }

        let packed = src.to_packed();
        let mut pixels: Vec<u32> = packed.iter().copied().collect();
        let mut w = sw;
        let mut h = sh;

        if dw < w {
            seam_filter(&mut pixels, sw, h, w, dw);
            let mut compact = vec![0u32; dw * h];
            for y in 0..h {
                compact[y * dw..(y + 1) * dw].copy_from_slice(&pixels[y * sw..y * sw + dw]);
            }
            pixels = compact;
            w = dw;
        }

        if dh < h {
            let mut transposed = vec![0u32; w * h];
            for y in 0..h {
                for x in 0..w {
                    transposed[x * h + y] = pixels[y * w + x];
                }
            }
            seam_filter(&mut transposed, h, w, h, dh);
            let mut out = vec![0u32; w * dh];
            for x in 0..w {
                for y in 0..dh {
                    out[y * w + x] = transposed[x * h + y];
                }
            }
            pixels = out;
            h = dh;
        }

        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };
        let out =
            Array2::from_shape_vec((h, w), pixels).expect("carved buffer matches target size");
        dst.set_packed(&out);
        dst
    }
}

/// Remove `src_width - dst_width` vertical seams from a buffer whose rows
/// have `stride` pixels. Rows keep their stride; only the logical width
/// shrinks, with live pixels shifted left past each removed seam.
fn seam_filter(pixels: &mut [u32], stride: usize, height: usize, src_width: usize, dst_width: usize) {
    let mut energy = vec![0i32; stride * height];
    compute_energy(pixels, &mut energy, stride, height, 0, src_width, src_width);

    let mut w = src_width;
    let mut paths: Vec<SeamPath> = (0..src_width)
        .map(|x| {
            let mut path = SeamPath::new(height);
            compute_vertical_path(&energy, stride, height, &mut path, x, w);
            path
        })
        .collect();

    for _ in 0..src_width - dst_width {
        let path_id = best_path_id(&paths, w);
        let path = paths[path_id].clone();

        // Shift everything left of the seam's track, row by row.
        let mut x = path_id;
        for y in 0..height {
            let row = y * stride;
            energy.copy_within(row + x + 1..row + w, row + x);
            pixels.copy_within(row + x + 1..row + w, row + x);
            x = (x as i64 + path.direction[y] as i64) as usize;
        }

        w -= 1;
        paths.remove(path_id);

        // Recompute only the column band the seam disturbed.
        let x_min = (path_id as i32 - path.lowest - 1).max(0) as usize;
        let x_max = (path_id as i32 + path.highest + 1).min(w as i32) as usize;
        compute_energy(pixels, &mut energy, stride, height, x_min, x_max, w);

        for (x, p) in paths.iter_mut().enumerate().take(w) {
            if x as i32 + p.highest >= x_min as i32 && x as i32 - p.lowest <= x_max as i32 {
                compute_vertical_path(&energy, stride, height, p, x, w);
            }
        }
    }
}

/// Channel-max Sobel gradient magnitude over the columns `x_min..x_max`.
/// Neighbours clamp to the live `width`-column region.
fn compute_energy(
    pixels: &[u32],
    energy: &mut [i32],
    stride: usize,
    height: usize,
    x_min: usize,
    x_max: usize,
    width: usize,
) {
    for y in 0..height {
        for x in x_min..x_max {
            let px = x.saturating_sub(1);
            let nx = (x + 1).min(width - 1);
            let py = y.saturating_sub(1);
            let ny = (y + 1).min(height - 1);

            let p = [
                pixels[py * stride + px],
                pixels[py * stride + x],
                pixels[py * stride + nx],
                pixels[y * stride + px],
                pixels[y * stride + nx],
                pixels[ny * stride + px],
                pixels[ny * stride + x],
                pixels[ny * stride + nx],
            ];

            let mut best = 0i32;
            for shift in [16, 8, 0] {
                let mut c = [0i32; 8];
                for (k, &v) in p.iter().enumerate() {
                    c[k] = ((v >> shift) & 0xff) as i32;
                }
                let grad_y = 2 * (c[6] - c[1]) + (c[5] - c[0]) + (c[7] - c[2]);
                let grad_x = 2 * (c[4] - c[3]) + (c[2] - c[0]) + (c[7] - c[5]);
                let grad = grad_x * grad_x + grad_y * grad_y;
                best = best.max(grad);
            }
            energy[y * stride + x] = best;
        }
    }
}

/// Greedy downward trace from `x_start`: at each row pick the cheapest of
/// the three neighbours in the next row.
fn compute_vertical_path(
    energy: &[i32],
    stride: usize,
    height: usize,
    path: &mut SeamPath,
    x_start: usize,
    width: usize,
) {
    path.energy = 0;
    let mut x = x_start;
    let mut min_x = x_start;
    let mut max_x = x_start;

    for y in 0..height.saturating_sub(1) {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        path.energy += i64::from(energy[y * stride + x]);

        let next = (y + 1) * stride;
        let left = if x > 0 {
            energy[next + x - 1]
        } else {
            i32::MAX
        };
        let centre = energy[next + x];
        let right = if x < width - 1 {
            energy[next + x + 1]
        } else {
            i32::MAX
        };

        if left < right && left < centre {
            x -= 1;
            path.direction[y] = -1;
        } else if right < centre {
            x += 1;
            path.direction[y] = 1;
        } else {
            path.direction[y] = 0;
        }
    }

    path.lowest = (x_start - min_x) as i32;
    path.highest = (max_x - x_start) as i32;
}

fn best_path_id(paths: &[SeamPath], width: usize) -> usize {
    let mut best = 0;
    let mut best_energy = i64::MAX;
    for (x, path) in paths.iter().enumerate().take(width) {
        if path.energy < best_energy {
            best_energy = path.energy;
            best = x;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_has_target_dimensions() {
        let src = Raster::from_packed(6, 4, true, vec![0xff808080; 24]).unwrap();
        let out = SeamCarvingFilter::new(4, 3).filter(&src, None);
        assert_eq!((out.width(), out.height()), (4, 3));
    }

    #[test]
    fn test_same_size_passes_through() {
        let data: Vec<u32> = (0..12).map(|i| 0xff000000 | i * 5).collect();
        let src = Raster::from_packed(4, 3, true, data).unwrap();
        let out = SeamCarvingFilter::new(4, 3).filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }

    #[test]
    fn test_larger_target_is_clamped() {
        let src = Raster::from_packed(4, 3, true, vec![0xff112233; 12]).unwrap();
        let out = SeamCarvingFilter::new(10, 10).filter(&src, None);
        assert_eq!((out.width(), out.height()), (4, 3));
    }

    #[test]
    fn test_constant_image_stays_constant() {
        let src = Raster::from_packed(8, 5, true, vec![0xff446688; 40]).unwrap();
        let out = SeamCarvingFilter::new(5, 4).filter(&src, None);
        for y in 0..4 {
            for x in 0..5 {
                assert_eq!(out.pixel(x, y), 0xff446688);
            }
        }
    }

    #[test]
    fn test_high_energy_stripe_survives() {
        // Flat black image with a white column: the seams should remove
        // flat columns and keep the stripe.
        let mut data = vec![0xff000000u32; 7 * 4];
        for y in 0..4 {
            data[y * 7 + 3] = 0xffffffff;
        }
        let src = Raster::from_packed(7, 4, true, data).unwrap();
        let out = SeamCarvingFilter::new(5, 4).filter(&src, None);
        assert_eq!((out.width(), out.height()), (5, 4));
        for y in 0..4 {
            let stripe = (0..5).any(|x| out.pixel(x, y) == 0xffffffff);
            assert!(stripe, "stripe lost in row {y}");
        }
    }
}
