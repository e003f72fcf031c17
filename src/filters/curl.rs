//! Page-curl effect.
//!
//! The inverse mapping models the page rolled around a cylinder whose
//! position follows the transition amount. Pixels on the curl's back face
//! are shaded darker and composited over the flat page with straight
//! alpha, so the effect reads as a lifted corner.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

use crate::exec;
use crate::filter::{EdgeMode, Filter};
use crate::math::{bilinear_interpolate, composite_over};
use crate::raster::Raster;

#[derive(Clone, Copy, Debug)]
pub struct CurlFilter {
    angle: f32,
    transition: f32,
    radius: f32,
    edge_mode: EdgeMode,
}

/// Result of the curl inverse map for one pixel.
struct CurlSample {
    sx: f32,
    sy: f32,
    shade: f32,
    on_curl: bool,
    outside: bool,
}

impl CurlFilter {
    /// `transition` runs from 0 (flat page) to 1 (fully curled);
    /// `radius` is the cylinder radius in pixels.
    pub fn new(angle: f32, transition: f32, radius: f32) -> CurlFilter {
        CurlFilter {
            angle,
            transition,
            radius,
            edge_mode: EdgeMode::Zero,
        }
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn set_transition(&mut self, transition: f32) {
        self.transition = transition;
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    fn transform_inverse(&self, x: i32, y: i32, width: f32, height: f32) -> CurlSample {
        let (s, c) = self.angle.sin_cos();
        let tx = self.transition * (width * width + height * height).sqrt();

        // Start from the corner the curl is pulled towards.
        let x_offset = if c < 0.0 { width } else { 0.0 };
        let y_offset = if s < 0.0 { height } else { 0.0 };

        let mut px = x as f32 - x_offset;
        let mut py = y as f32 - y_offset;

        let qx = px * c + py * s;
        let qy = -px * s + py * c;

        let outside = qx < tx;
        let unfolded = qx > tx * 2.0;
        let on_curl = !(outside || unfolded);

        let qx = if unfolded { qx } else { 2.0 * tx - qx };

        px = qx * c - qy * s + x_offset;
        py = qx * s + qy * c + y_offset;

        let off_page = px < 0.0 || py < 0.0 || px >= width || py >= height;
        if off_page && on_curl {
            px = x as f32;
            py = y as f32;
        }

        let shade = if !off_page && on_curl && self.radius > 0.0 {
            1.9 * (1.0 - ((qx - tx) / self.radius).exp().cos())
        } else {
            0.0
        };

        CurlSample {
            sx: if outside { -1.0 } else { px },
            sy: if outside { -1.0 } else { py },
            shade: 1.0 - shade,
            on_curl: !off_page && on_curl,
            outside,
        }
    }
}

impl Filter for CurlFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (w, h) = (src.width(), src.height());
        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };
        let inp = src.to_packed();
        if self.transition <= 0.0 {
            dst.set_packed(&inp);
            return dst;
        }
        let (wf, hf) = (w as f32, h as f32);
        let edge_mode = self.edge_mode;

        let mut out = Array2::<u32>::zeros((h, w));
        let chunk = exec::chunk_rows(w, w * h);
        out.axis_chunks_iter_mut(Axis(0), chunk)
            .into_par_iter()
            .enumerate()
            .for_each(|(ci, mut band)| {
                for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                    let y = ci * chunk + dy;
                    for x in 0..w {
                        let sample = self.transform_inverse(x as i32, y as i32, wf, hf);
                        let ix = sample.sx.floor() as i32;
                        let iy = sample.sy.floor() as i32;
                        let fx = sample.sx - ix as f32;
                        let fy = sample.sy - iy as f32;

                        let rgb = if sample.outside {
                            0
                        } else if ix >= 0
                            && ix < w as i32 - 1
                            && iy >= 0
                            && iy < h as i32 - 1
                        {
                            let (ix, iy) = (ix as usize, iy as usize);
                            bilinear_interpolate(
                                fx,
                                fy,
                                inp[[iy, ix]],
                                inp[[iy, ix + 1]],
                                inp[[iy + 1, ix]],
                                inp[[iy + 1, ix + 1]],
                            )
                        } else {
                            bilinear_interpolate(
                                fx,
                                fy,
                                edge_sample(&inp, ix, iy, edge_mode),
                                edge_sample(&inp, ix + 1, iy, edge_mode),
                                edge_sample(&inp, ix, iy + 1, edge_mode),
                                edge_sample(&inp, ix + 1, iy + 1, edge_mode),
                            )
                        };

                        let r = (((rgb >> 16) & 0xff) as f32 * sample.shade) as u32;
                        let g = (((rgb >> 8) & 0xff) as f32 * sample.shade) as u32;
                        let b = ((rgb & 0xff) as f32 * sample.shade) as u32;
                        let shaded = (rgb & 0xff00_0000) | (r << 16) | (g << 8) | b;

                        out_row[x] = if sample.on_curl {
                            composite_over(shaded, inp[[y, x]])
                        } else {
                            shaded
                        };
                    }
                }
            });
        dst.set_packed(&out);
        dst
    }
}

#[inline]
fn edge_sample(inp: &Array2<u32>, x: i32, y: i32, edge_mode: EdgeMode) -> u32 {
    let (h, w) = inp.dim();
    if x < 0 || x >= w as i32 || y < 0 || y >= h as i32 {
        return match edge_mode {
            EdgeMode::Zero => 0,
            EdgeMode::Wrap => inp[[
                crate::math::modulo(y, h as i32) as usize,
                crate::math::modulo(x, w as i32) as usize,
            ]],
            EdgeMode::Clamp => {
                inp[[y.clamp(0, h as i32 - 1) as usize, x.clamp(0, w as i32 - 1) as usize]]
            }
        };
    }
    inp[[y as usize, x as usize]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_transition_is_identity() {
        let data: Vec<u32> = (0..16).map(|i| 0xff000000 | i * 0x050403).collect();
        let src = Raster::from_packed(4, 4, true, data).unwrap();
        let out = CurlFilter::new(0.5, 0.0, 10.0).filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }

    #[test]
    fn test_curl_clears_the_turned_region() {
        let src = Raster::from_packed(8, 8, true, vec![0xffffffff; 64]).unwrap();
        // Angle 0 pulls the left edge; a large transition turns most of
        // the page, leaving the region before the fold transparent.
        let out = CurlFilter::new(0.0, 0.9, 4.0).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0);
    }

    #[test]
    fn test_unfolded_region_keeps_page() {
        let src = Raster::from_packed(8, 8, true, vec![0xff808080; 64]).unwrap();
        let out = CurlFilter::new(0.0, 0.1, 4.0).filter(&src, None);
        // Far side of the page is past the curl and keeps its pixels.
        assert_eq!(out.pixel(7, 7), 0xff808080);
    }
}
