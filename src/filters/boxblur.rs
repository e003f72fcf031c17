//! Iterated box blur.
//!
//! Each pass is a running-sum mean over a `2r + 1` window, written
//! transposed so the next pass is again row-wise. Several iterations
//! approximate a Gaussian. A radius with a fractional part gets a final
//! weighted 3-tap pass per axis. Division by the window size goes through
//! a precomputed table of `256 * (2r + 1)` rounded quotients.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

use crate::exec;
use crate::filter::Filter;
use crate::math::{premultiply, unpremultiply};
use crate::raster::Raster;

/// Box blur with independent horizontal and vertical radii.
#[derive(Clone, Copy, Debug)]
pub struct BoxBlurFilter {
    h_radius: f32,
    v_radius: f32,
    iterations: usize,
    premultiply_alpha: bool,
}

impl BoxBlurFilter {
    pub fn new(h_radius: f32, v_radius: f32, iterations: usize) -> BoxBlurFilter {
        BoxBlurFilter {
            h_radius,
            v_radius,
            iterations,
            premultiply_alpha: true,
        }
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.h_radius = radius;
        self.v_radius = radius;
    }

    pub fn set_h_radius(&mut self, h_radius: f32) {
        self.h_radius = h_radius;
    }

    pub fn set_v_radius(&mut self, v_radius: f32) {
        self.v_radius = v_radius;
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations;
    }

    pub fn set_premultiply_alpha(&mut self, premultiply_alpha: bool) {
        self.premultiply_alpha = premultiply_alpha;
    }
}

impl Default for BoxBlurFilter {
    fn default() -> Self {
        BoxBlurFilter::new(2.0, 2.0, 1)
    }
}

impl Filter for BoxBlurFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (w, h) = (src.width(), src.height());
        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };

        let mut inp = src.to_packed();
        let mut out = Array2::<u32>::zeros((w, h));

        let premul = self.premultiply_alpha && src.has_alpha() && !src.is_premultiplied();
        if premul {
            premultiply(inp.as_slice_mut().expect("packed image is contiguous"));
        }

        for _ in 0..self.iterations {
            blur(&inp, &mut out, self.h_radius);
            blur(&out, &mut inp, self.v_radius);
        }

        if self.h_radius.fract() > 0.001 || self.v_radius.fract() > 0.001 {
            blur_fractional(&inp, &mut out, self.h_radius);
            blur_fractional(&out, &mut inp, self.v_radius);
        }

        if premul {
            unpremultiply(inp.as_slice_mut().expect("packed image is contiguous"));
        }
        dst.set_packed(&inp);
        dst
    }
}

/// One running-sum pass over the rows of `inp`, written transposed into
/// `out`. The integer part of `radius` drives the window; fractions are
/// handled separately by [`blur_fractional`].
pub(crate) fn blur(inp: &Array2<u32>, out: &mut Array2<u32>, radius: f32) {
    let (h, w) = inp.dim();
    debug_assert_eq!(out.dim(), (w, h));
    let r = radius.max(0.0) as usize;
    let table_size = 2 * r + 1;
    let divide: Vec<u32> = (0..256 * table_size)
        .map(|i| ((i + r) / table_size) as u32)
        .collect();

    let w1 = w - 1;
    let chunk = exec::chunk_rows(w, w * h);
    out.axis_chunks_iter_mut(Axis(1), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            let rows = band.dim().1;
            for dy in 0..rows {
                let y = ci * chunk + dy;
                let mut ta = 0usize;
                let mut tr = 0usize;
                let mut tg = 0usize;
                let mut tb = 0usize;

                for i in -(r as i32)..=(r as i32) {
                    let rgb = inp[[y, i.clamp(0, w1 as i32) as usize]];
                    ta += ((rgb >> 24) & 0xff) as usize;
                    tr += ((rgb >> 16) & 0xff) as usize;
                    tg += ((rgb >> 8) & 0xff) as usize;
                    tb += (rgb & 0xff) as usize;
                }

                for x in 0..w {
                    band[[x, dy]] = (divide[ta] << 24)
                        | (divide[tr] << 16)
                        | (divide[tg] << 8)
                        | divide[tb];

                    let i1 = (x + r + 1).min(w1);
                    let i2 = x.saturating_sub(r);
                    let rgb1 = inp[[y, i1]];
                    let rgb2 = inp[[y, i2]];

                    ta = ta + ((rgb1 >> 24) & 0xff) as usize - ((rgb2 >> 24) & 0xff) as usize;
                    tr = tr + ((rgb1 >> 16) & 0xff) as usize - ((rgb2 >> 16) & 0xff) as usize;
                    tg = tg + ((rgb1 >> 8) & 0xff) as usize - ((rgb2 >> 8) & 0xff) as usize;
                    tb = tb + (rgb1 & 0xff) as usize - (rgb2 & 0xff) as usize;
                }
            }
        });
}

/// Weighted 3-tap pass for the fractional part of the radius, written
/// transposed like [`blur`]. The end pixels of each row are copied.
pub(crate) fn blur_fractional(inp: &Array2<u32>, out: &mut Array2<u32>, radius: f32) {
    let (h, w) = inp.dim();
    debug_assert_eq!(out.dim(), (w, h));
    let frac = radius.fract().max(0.0);
    let f = 1.0 / (1.0 + 2.0 * frac);

    let chunk = exec::chunk_rows(w, w * h);
    out.axis_chunks_iter_mut(Axis(1), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            let rows = band.dim().1;
            for dy in 0..rows {
                let y = ci * chunk + dy;
                band[[0, dy]] = inp[[y, 0]];
                if w == 1 {
                    continue;
                }
                for x in 1..w - 1 {
                    let rgb1 = inp[[y, x - 1]];
                    let rgb2 = inp[[y, x]];
                    let rgb3 = inp[[y, x + 1]];
                    let mut px = 0u32;
                    for shift in [24, 16, 8, 0] {
                        let c1 = ((rgb1 >> shift) & 0xff) as f32;
                        let c2 = ((rgb2 >> shift) & 0xff) as i32;
                        let c3 = ((rgb3 >> shift) & 0xff) as f32;
                        let c = c2 + ((c1 + c3) * frac) as i32;
                        let c = (c as f32 * f) as u32 & 0xff;
                        px |= c << shift;
                    }
                    band[[x, dy]] = px;
                }
                band[[w - 1, dy]] = inp[[y, w - 1]];
            }
        });
}
