//! Gaussian blur and the sharpen/glow filters built on it.
//!
//! The blur runs as two separable passes implemented together as
//! convolve-and-transpose: the first pass reads rows of the source and
//! writes columns of a scratch buffer, so the second pass is again
//! row-wise over the scratch and restores the original orientation.
//! When the source needs it, alpha is premultiplied on entry to the first
//! pass and unpremultiplied on exit of the second, never in between.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

use crate::exec;
use crate::filter::{EdgeMode, Filter};
use crate::kernel::Kernel;
use crate::math::{clamp8, modulo};
use crate::raster::Raster;

/// Build the 1D Gaussian kernel for the given radius: `r = ceil(radius)`,
/// `sigma = radius / 3`, weights `exp(-k^2 / 2 sigma^2) / sqrt(2 pi sigma)`
/// zeroed beyond the radius and renormalised to sum one.
pub fn make_kernel(radius: f32) -> Kernel {
    if radius <= 0.0 {
        return Kernel::row(vec![1.0]).expect("one-tap kernel is valid");
    }
    let r = radius.ceil() as i32;
    let sigma = radius / 3.0;
    let sigma22 = 2.0 * sigma * sigma;
    let sqrt_sigma_pi2 = (2.0 * std::f32::consts::PI * sigma).sqrt();
    let radius2 = radius * radius;

    let mut matrix = Vec::with_capacity((2 * r + 1) as usize);
    let mut total = 0.0f32;
    for row in -r..=r {
        let distance = (row * row) as f32;
        let weight = if distance > radius2 {
            0.0
        } else {
            (-distance / sigma22).exp() / sqrt_sigma_pi2
        };
        total += weight;
        matrix.push(weight);
    }
    for w in matrix.iter_mut() {
        *w /= total;
    }
    Kernel::row(matrix).expect("2r+1 taps form a valid kernel")
}

/// Convolve rows of `inp` with a 1D kernel, writing the result transposed
/// into `out` (whose dimensions are the swap of `inp`'s).
#[allow(clippy::too_many_arguments)]
pub(crate) fn convolve_and_transpose(
    kernel: &Kernel,
    inp: &Array2<u32>,
    out: &mut Array2<u32>,
    alpha: bool,
    premultiply: bool,
    unpremultiply: bool,
    edge_mode: EdgeMode,
) {
    let (h, w) = inp.dim();
    debug_assert_eq!(out.dim(), (w, h));
    let matrix = kernel.coeffs();
    let cols2 = (matrix.len() / 2) as i32;
    let chunk = exec::chunk_rows(w, w * h);

    out.axis_chunks_iter_mut(Axis(1), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            let rows = band.dim().1;
            for dy in 0..rows {
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
                        let mut ix = x + col;
                        if !(0..w as i32).contains(&ix) {
                            match edge_mode {
                                EdgeMode::Clamp => ix = ix.clamp(0, w as i32 - 1),
                                EdgeMode::Wrap => ix = modulo(ix, w as i32),
                                EdgeMode::Zero => continue,
                            }
                        }
                        let rgb = inp[[y, ix as usize]];
                        let pa = ((rgb >> 24) & 0xff) as f32;
                        let mut pr = ((rgb >> 16) & 0xff) as f32;
                        let mut pg = ((rgb >> 8) & 0xff) as f32;
                        let mut pb = (rgb & 0xff) as f32;
                        if premultiply {
                            let a255 = pa * (1.0 / 255.0);
                            pr *= a255;
                            pg *= a255;
                            pb *= a255;
                        }
                        a += f * pa;
                        r += f * pr;
                        g += f * pg;
                        b += f * pb;
                    }
                    if unpremultiply && a != 0.0 && a != 255.0 {
                        let f = 255.0 / a;
                        r *= f;
                        g *= f;
                        b *= f;
                    }
                    let ia = if alpha {
                        clamp8((a + 0.5) as i32) as u32
                    } else {
                        0xff
                    };
                    let ir = clamp8((r + 0.5) as i32) as u32;
                    let ig = clamp8((g + 0.5) as i32) as u32;
                    let ib = clamp8((b + 0.5) as i32) as u32;
                    band[[x as usize, dy]] = (ia << 24) | (ir << 16) | (ig << 8) | ib;
                }
            }
        });
}

/// Two-pass blur over a packed image; the result has the original
/// orientation. `premul` brackets the passes when set.
pub(crate) fn blur_packed(
    kernel: &Kernel,
    inp: &Array2<u32>,
    alpha: bool,
    premul: bool,
    edge_mode: EdgeMode,
) -> Array2<u32> {
    let (h, w) = inp.dim();
    let mut tmp = Array2::<u32>::zeros((w, h));
    let mut out = Array2::<u32>::zeros((h, w));
    convolve_and_transpose(kernel, inp, &mut tmp, alpha, premul, false, edge_mode);
    convolve_and_transpose(kernel, &tmp, &mut out, alpha, false, premul, edge_mode);
    out
}

/// Gaussian blur with a configurable radius.
#[derive(Clone)]
pub struct GaussianFilter {
    radius: f32,
    kernel: Kernel,
    use_alpha: bool,
    premultiply_alpha: bool,
    edge_mode: EdgeMode,
}

impl GaussianFilter {
    pub fn new(radius: f32) -> GaussianFilter {
        GaussianFilter {
            radius,
            kernel: make_kernel(radius),
            use_alpha: true,
            premultiply_alpha: true,
            edge_mode: EdgeMode::Clamp,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.kernel = make_kernel(radius);
    }

    pub fn set_use_alpha(&mut self, use_alpha: bool) {
        self.use_alpha = use_alpha;
    }

    pub fn set_premultiply_alpha(&mut self, premultiply_alpha: bool) {
        self.premultiply_alpha = premultiply_alpha;
    }

    pub fn set_edge_mode(&mut self, edge_mode: EdgeMode) {
        self.edge_mode = edge_mode;
    }
}

impl Default for GaussianFilter {
    fn default() -> Self {
        GaussianFilter::new(2.0)
    }
}

impl Filter for GaussianFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (w, h) = (src.width(), src.height());
        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };
        let inp = src.to_packed();
        if self.radius > 0.0 {
            let premul = self.premultiply_alpha && src.has_alpha() && !src.is_premultiplied();
            let out = blur_packed(&self.kernel, &inp, self.use_alpha, premul, self.edge_mode);
            dst.set_packed(&out);
        } else {
            dst.set_packed(&inp);
        }
        dst
    }
}

/// Unsharp mask: subtracts Gaussian blur from the image, sharpening it.
/// Channels whose difference from the blur stays under the threshold are
/// left alone.
#[derive(Clone)]
pub struct UnsharpFilter {
    radius: f32,
    kernel: Kernel,
    amount: f32,
    threshold: i32,
    use_alpha: bool,
    premultiply_alpha: bool,
}

impl UnsharpFilter {
    pub fn new(radius: f32, amount: f32, threshold: i32) -> UnsharpFilter {
        UnsharpFilter {
            radius,
            kernel: make_kernel(radius),
            amount,
            threshold,
            use_alpha: true,
            premultiply_alpha: true,
        }
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.kernel = make_kernel(radius);
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount;
    }

    pub fn set_threshold(&mut self, threshold: i32) {
        self.threshold = threshold;
    }
}

impl Default for UnsharpFilter {
    fn default() -> Self {
        UnsharpFilter::new(2.0, 0.5, 1)
    }
}

impl Filter for UnsharpFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (w, h) = (src.width(), src.height());
        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };
        let inp = src.to_packed();
        let blurred = if self.radius > 0.0 {
            let premul = self.premultiply_alpha && src.has_alpha() && !src.is_premultiplied();
            blur_packed(&self.kernel, &inp, self.use_alpha, premul, EdgeMode::Clamp)
        } else {
            inp.clone()
        };

        let a = 4.0 * self.amount;
        let threshold = self.threshold;
        let out = combine_rows(&inp, &blurred, move |c1, c2| {
            if (c1 - c2).abs() >= threshold {
                clamp8(((a + 1.0) * (c1 - c2) as f32 + c2 as f32) as i32)
            } else {
                c1
            }
        });
        dst.set_packed(&out);
        dst
    }
}

/// Glow: adds Gaussian blur back onto the image without thresholding.
#[derive(Clone)]
pub struct GlowFilter {
    radius: f32,
    kernel: Kernel,
    amount: f32,
    use_alpha: bool,
    premultiply_alpha: bool,
}

impl GlowFilter {
    pub fn new(radius: f32, amount: f32) -> GlowFilter {
        GlowFilter {
            radius,
            kernel: make_kernel(radius),
            amount,
            use_alpha: true,
            premultiply_alpha: true,
        }
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.kernel = make_kernel(radius);
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount;
    }
}

impl Default for GlowFilter {
    fn default() -> Self {
        GlowFilter::new(2.0, 0.5)
    }
}

impl Filter for GlowFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (w, h) = (src.width(), src.height());
        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };
        let inp = src.to_packed();
        let blurred = if self.radius > 0.0 {
            let premul = self.premultiply_alpha && src.has_alpha() && !src.is_premultiplied();
            blur_packed(&self.kernel, &inp, self.use_alpha, premul, EdgeMode::Clamp)
        } else {
            inp.clone()
        };

        let a = 4.0 * self.amount;
        let out = combine_rows(&inp, &blurred, move |c1, c2| {
            clamp8((c1 as f32 + a * c2 as f32) as i32)
        });
        dst.set_packed(&out);
        dst
    }
}

/// Combine original and blurred images channel-wise in parallel row bands.
/// Alpha is taken from the original.
fn combine_rows<F>(orig: &Array2<u32>, blurred: &Array2<u32>, combine: F) -> Array2<u32>
where
    F: Fn(i32, i32) -> i32 + Sync,
{
    let (h, w) = orig.dim();
    let mut out = Array2::<u32>::zeros((h, w));
    let chunk = exec::chunk_rows(w, w * h);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = ci * chunk + dy;
                for x in 0..w {
                    let rgb1 = orig[[y, x]];
                    let rgb2 = blurred[[y, x]];
                    let r = combine(((rgb1 >> 16) & 0xff) as i32, ((rgb2 >> 16) & 0xff) as i32);
                    let g = combine(((rgb1 >> 8) & 0xff) as i32, ((rgb2 >> 8) & 0xff) as i32);
                    let b = combine((rgb1 & 0xff) as i32, (rgb2 & 0xff) as i32);
                    out_row[x] =
                        (rgb1 & 0xff00_0000) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
                }
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalised() {
        let k = make_kernel(2.5);
        assert_eq!(k.cols(), 7);
        let sum: f32 = k.coeffs().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let data: Vec<u32> = (0..16).map(|i| 0xff000000 | i * 0x10203).collect();
        let src = Raster::from_packed(4, 4, true, data).unwrap();
        let out = GaussianFilter::new(0.0).filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }

    #[test]
    fn test_blur_preserves_constant_image() {
        let src = Raster::from_packed(8, 8, true, vec![0xff_64_96_c8; 64]).unwrap();
        let out = GaussianFilter::new(3.0).filter(&src, None);
        for y in 0..8 {
            for x in 0..8 {
                let p = out.pixel(x, y);
                for shift in [24, 16, 8, 0] {
                    let expected = (0xff_64_96_c8u32 >> shift) & 0xff;
                    let got = (p >> shift) & 0xff;
                    assert!((got as i32 - expected as i32).abs() <= 1);
                }
            }
        }
    }

    #[test]
    fn test_blur_smooths_edge() {
        // A black/white step must produce intermediate values at the seam.
        let mut data = vec![0xff000000u32; 64];
        for y in 0..8 {
            for x in 4..8 {
                data[y * 8 + x] = 0xffffffff;
            }
        }
        let src = Raster::from_packed(8, 8, true, data).unwrap();
        let out = GaussianFilter::new(2.0).filter(&src, None);
        let seam = out.pixel(3, 4) & 0xff;
        assert!(seam > 0 && seam < 255, "seam value {seam}");
    }

    #[test]
    fn test_unsharp_constant_region_unchanged() {
        // S5: sharpening cannot change a constant image.
        let src = Raster::from_packed(5, 1, true, vec![0xff808080; 5]).unwrap();
        let out = UnsharpFilter::new(1.0, 0.5, 0).filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }

    #[test]
    fn test_unsharp_increases_edge_contrast() {
        let mut data = vec![0xff404040u32; 16];
        for row in data.chunks_mut(4) {
            row[2] = 0xffc0c0c0;
            row[3] = 0xffc0c0c0;
        }
        let src = Raster::from_packed(4, 4, true, data).unwrap();
        let out = UnsharpFilter::new(1.0, 1.0, 0).filter(&src, None);
        // The dark side of the edge gets darker, the bright side brighter.
        assert!(out.pixel(1, 1) & 0xff <= 0x40);
        assert!(out.pixel(2, 1) & 0xff >= 0xc0);
    }

    #[test]
    fn test_glow_brightens() {
        let src = Raster::from_packed(4, 4, true, vec![0xff404040; 16]).unwrap();
        let out = GlowFilter::new(1.0, 0.5).filter(&src, None);
        for y in 0..4 {
            for x in 0..4 {
                assert!(out.pixel(x, y) & 0xff > 0x40);
            }
        }
    }

    #[test]
    fn test_transpose_pass_shapes() {
        let inp = Array2::<u32>::from_elem((2, 5), 0xff101010);
        let mut out = Array2::<u32>::zeros((5, 2));
        convolve_and_transpose(
            &make_kernel(1.0),
            &inp,
            &mut out,
            true,
            false,
            false,
            EdgeMode::Clamp,
        );
        for &p in out.iter() {
            for shift in [16, 8, 0] {
                let c = (p >> shift) & 0xff;
                assert!((c as i32 - 0x10).abs() <= 1);
            }
        }
    }
}
