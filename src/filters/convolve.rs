//! Dense and separable convolution.
//!
//! Kernels with a single row or column take the dedicated 1D paths, which
//! skip the missing dimension entirely. Accumulation happens in four f32
//! channels; results are rounded to nearest and clamped before repacking.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

use crate::exec;
use crate::filter::{EdgeMode, Filter};
use crate::kernel::Kernel;
use crate::math::{clamp8, modulo, premultiply, unpremultiply};
use crate::raster::Raster;

/// Convolves the image with an arbitrary odd-sized kernel.
#[derive(Clone)]
pub struct ConvolveFilter {
    kernel: Kernel,
    edge_mode: EdgeMode,
    use_alpha: bool,
    premultiply_alpha: bool,
    iterations: usize,
}

impl ConvolveFilter {
    pub fn new(kernel: Kernel) -> ConvolveFilter {
        ConvolveFilter {
            kernel,
            edge_mode: EdgeMode::Clamp,
            use_alpha: true,
            premultiply_alpha: true,
            iterations: 1,
        }
    }

    /// The fixed 3x3 averaging kernel of the editor's "average blur".
    pub fn average() -> ConvolveFilter {
        let coeffs = vec![0.1, 0.1, 0.1, 0.1, 0.2, 0.1, 0.1, 0.1, 0.1];
        ConvolveFilter::new(Kernel::new(3, 3, coeffs).expect("3x3 preset is a valid kernel"))
    }

    pub fn set_kernel(&mut self, kernel: Kernel) {
        self.kernel = kernel;
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn set_edge_mode(&mut self, edge_mode: EdgeMode) {
        self.edge_mode = edge_mode;
    }

    /// Whether the alpha channel is convolved along with the colours.
    pub fn set_use_alpha(&mut self, use_alpha: bool) {
        self.use_alpha = use_alpha;
    }

    pub fn set_premultiply_alpha(&mut self, premultiply_alpha: bool) {
        self.premultiply_alpha = premultiply_alpha;
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }
}

impl Filter for ConvolveFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (w, h) = (src.width(), src.height());
        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };

        let mut inp = src.to_packed();
        let premul = self.premultiply_alpha && src.has_alpha() && !src.is_premultiplied();
        if premul {
            premultiply(inp.as_slice_mut().expect("packed image is contiguous"));
        }

        let mut out = Array2::<u32>::zeros((h, w));
        for _ in 0..self.iterations.max(1) {
            convolve(&self.kernel, &inp, &mut out, self.use_alpha, self.edge_mode);
            std::mem::swap(&mut inp, &mut out);
        }

        if premul {
            unpremultiply(inp.as_slice_mut().expect("packed image is contiguous"));
        }
        dst.set_packed(&inp);
        dst
    }
}

/// Convolve `inp` into `out`, picking the 1D paths for separable kernels.
pub(crate) fn convolve(
    kernel: &Kernel,
    inp: &Array2<u32>,
    out: &mut Array2<u32>,
    alpha: bool,
    edge_mode: EdgeMode,
) {
    if kernel.rows() == 1 {
        convolve_h(kernel, inp, out, alpha, edge_mode);
    } else if kernel.cols() == 1 {
        convolve_v(kernel, inp, out, alpha, edge_mode);
    } else {
        convolve_hv(kernel, inp, out, alpha, edge_mode);
    }
}

#[inline]
fn pack(a: f32, r: f32, g: f32, b: f32, alpha: bool) -> u32 {
    let ia = if alpha {
        clamp8((a + 0.5) as i32) as u32
    } else {
        0xff
    };
    let ir = clamp8((r + 0.5) as i32) as u32;
    let ig = clamp8((g + 0.5) as i32) as u32;
    let ib = clamp8((b + 0.5) as i32) as u32;
    (ia << 24) | (ir << 16) | (ig << 8) | ib
}

fn convolve_hv(
    kernel: &Kernel,
    inp: &Array2<u32>,
    out: &mut Array2<u32>,
    alpha: bool,
    edge_mode: EdgeMode,
) {
    let (h, w) = inp.dim();
    let rows2 = (kernel.rows() / 2) as i32;
    let cols2 = (kernel.cols() / 2) as i32;
    let chunk = exec::chunk_rows(w, w * h);

    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = (ci * chunk + dy) as i32;
                for x in 0..w as i32 {
                    let mut a = 0f32;
                    let mut r = 0f32;
                    let mut g = 0f32;
                    let mut b = 0f32;
                    for row in -rows2..=rows2 {
                        let iy = match resolve(y + row, h as i32, edge_mode) {
                            Some(iy) => iy,
                            None => continue,
                        };
                        for col in -cols2..=cols2 {
                            let f = kernel.get((row + rows2) as usize, (col + cols2) as usize);
                            if f == 0.0 {
                                continue;
                            }
                            let ix = match resolve(x + col, w as i32, edge_mode) {
                                Some(ix) => ix,
                                None => continue,
                            };
                            let rgb = inp[[iy, ix]];
                            a += f * ((rgb >> 24) & 0xff) as f32;
                            r += f * ((rgb >> 16) & 0xff) as f32;
                            g += f * ((rgb >> 8) & 0xff) as f32;
                            b += f * (rgb & 0xff) as f32;
                        }
                    }
                    out_row[x as usize] = pack(a, r, g, b, alpha);
                }
            }
        });
}

fn convolve_h(
    kernel: &Kernel,
    inp: &Array2<u32>,
    out: &mut Array2<u32>,
    alpha: bool,
    edge_mode: EdgeMode,
) {
    let (h, w) = inp.dim();
    let cols2 = (kernel.coeffs().len() / 2) as i32;
    let matrix = kernel.coeffs();
    let chunk = exec::chunk_rows(w, w * h);

    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = ci * chunk + dy;
                for x in 0..w as i32 {
                    let mut a = 0f32;
                    let mut r = 0f32;
                    let mut g = 0f32;
                    let mut b = 0f32;
                    for col in -cols2..=cols2 {
                        let f = matrix[(cols2 + col) as usize];
                        if f == 0.0 {
                            continue;
                        }
                        let ix = match resolve(x + col, w as i32, edge_mode) {
                            Some(ix) => ix,
                            None => continue,
                        };
                        let rgb = inp[[y, ix]];
                        a += f * ((rgb >> 24) & 0xff) as f32;
                        r += f * ((rgb >> 16) & 0xff) as f32;
                        g += f * ((rgb >> 8) & 0xff) as f32;
                        b += f * (rgb & 0xff) as f32;
                    }
                    out_row[x as usize] = pack(a, r, g, b, alpha);
                }
            }
        });
}

fn convolve_v(
    kernel: &Kernel,
    inp: &Array2<u32>,
    out: &mut Array2<u32>,
    alpha: bool,
    edge_mode: EdgeMode,
) {
    let (h, w) = inp.dim();
    let rows2 = (kernel.coeffs().len() / 2) as i32;
    let matrix = kernel.coeffs();
    let chunk = exec::chunk_rows(w, w * h);

    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = (ci * chunk + dy) as i32;
                for x in 0..w {
                    let mut a = 0f32;
                    let mut r = 0f32;
                    let mut g = 0f32;
                    let mut b = 0f32;
                    for row in -rows2..=rows2 {
                        let f = matrix[(rows2 + row) as usize];
                        if f == 0.0 {
                            continue;
                        }
                        let iy = match resolve(y + row, h as i32, edge_mode) {
                            Some(iy) => iy,
                            None => continue,
                        };
                        let rgb = inp[[iy, x]];
                        a += f * ((rgb >> 24) & 0xff) as f32;
                        r += f * ((rgb >> 16) & 0xff) as f32;
                        g += f * ((rgb >> 8) & 0xff) as f32;
                        b += f * (rgb & 0xff) as f32;
                    }
                    out_row[x] = pack(a, r, g, b, alpha);
                }
            }
        });
}

/// Map a possibly out-of-range coordinate to an index under the edge
/// policy, or `None` when ZERO drops the sample.
#[inline]
fn resolve(i: i32, extent: i32, edge_mode: EdgeMode) -> Option<usize> {
    if (0..extent).contains(&i) {
        return Some(i as usize);
    }
    match edge_mode {
        EdgeMode::Zero => None,
        EdgeMode::Clamp => Some(i.clamp(0, extent - 1) as usize),
        EdgeMode::Wrap => Some(modulo(i, extent) as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_kernel() -> Kernel {
        Kernel::new(3, 3, vec![1.0 / 9.0; 9]).unwrap()
    }

    fn raster_3x3() -> Raster {
        let data: Vec<u32> = (1..=9).map(|v| 0xff000000 | v * 10).collect();
        Raster::from_packed(3, 3, true, data).unwrap()
    }

    fn blue(p: u32) -> f32 {
        (p & 0xff) as f32
    }

    #[test]
    fn test_clamp_border_mean() {
        // Under CLAMP the corner output is the mean of the 9 samples with
        // each out-of-bounds neighbour snapped to the nearest edge pixel.
        let src = raster_3x3();
        let mut f = ConvolveFilter::new(mean_kernel());
        f.set_edge_mode(EdgeMode::Clamp);
        let out = f.filter(&src, None);
        // Corner (0,0): clamped neighbourhood is 10,10,20,10,10,20,40,40,50.
        let expected = (10 + 10 + 20 + 10 + 10 + 20 + 40 + 40 + 50) as f32 / 9.0;
        assert!((blue(out.pixel(0, 0)) - expected).abs() <= 1.0);
    }

    #[test]
    fn test_wrap_border_mean() {
        let src = raster_3x3();
        let mut f = ConvolveFilter::new(mean_kernel());
        f.set_edge_mode(EdgeMode::Wrap);
        let out = f.filter(&src, None);
        // Under WRAP every pixel sees all nine values once.
        let expected = (10..=90).step_by(10).sum::<usize>() as f32 / 9.0;
        for y in 0..3 {
            for x in 0..3 {
                assert!((blue(out.pixel(x, y)) - expected).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn test_zero_border_drops_samples() {
        let src = raster_3x3();
        let mut f = ConvolveFilter::new(mean_kernel());
        f.set_edge_mode(EdgeMode::Zero);
        let out = f.filter(&src, None);
        // Corner (0,0) keeps only the 4 in-bounds samples.
        let expected = (10 + 20 + 40 + 50) as f32 / 9.0;
        assert!((blue(out.pixel(0, 0)) - expected).abs() <= 1.0);
    }

    #[test]
    fn test_separable_matches_dense() {
        let row = Kernel::row(vec![0.25, 0.5, 0.25]).unwrap();
        let col = Kernel::column(vec![0.25, 0.5, 0.25]).unwrap();
        let dense = Kernel::outer(&col, &row).unwrap();

        let src = raster_3x3();
        let inp = src.to_packed();
        let (h, w) = inp.dim();

        let mut tmp = Array2::<u32>::zeros((h, w));
        let mut separable = Array2::<u32>::zeros((h, w));
        convolve(&row, &inp, &mut tmp, true, EdgeMode::Clamp);
        convolve(&col, &tmp, &mut separable, true, EdgeMode::Clamp);

        let mut direct = Array2::<u32>::zeros((h, w));
        convolve(&dense, &inp, &mut direct, true, EdgeMode::Clamp);

        for (a, b) in separable.iter().zip(direct.iter()) {
            for shift in [24, 16, 8, 0] {
                let ca = (a >> shift) & 0xff;
                let cb = (b >> shift) & 0xff;
                assert!((ca as i32 - cb as i32).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_average_preserves_constant_region() {
        let src = Raster::from_packed(4, 4, true, vec![0xff646464; 16]).unwrap();
        let out = ConvolveFilter::average().filter(&src, None);
        for y in 0..4 {
            for x in 0..4 {
                let p = out.pixel(x, y);
                for shift in [16, 8, 0] {
                    let c = (p >> shift) & 0xff;
                    assert!((c as i32 - 0x64).abs() <= 1);
                }
            }
        }
    }

    #[test]
    fn test_identity_kernel() {
        let mut coeffs = vec![0.0; 9];
        coeffs[4] = 1.0;
        let src = raster_3x3();
        let out = ConvolveFilter::new(Kernel::new(3, 3, coeffs).unwrap()).filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }
}
