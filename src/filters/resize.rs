//! Resizing: direct samplers plus progressive multi-step area averaging.
//!
//! NEAREST, BILINEAR and BICUBIC sample the source directly. MULTISTEP
//! halves the larger dimension repeatedly with area averaging, reusing one
//! scratch buffer across iterations, and blits the final region into the
//! destination when sizes differ. Before scaling, the filter consults the
//! colour-space adapter so that scaling happens in a standard space and
//! the caller's colour space is restored on exit.

use ndarray::parallel::prelude::*;
use ndarray::{s, Array2, ArrayView2, Axis};

use crate::exec;
use crate::filter::{EdgeMode, Filter};
use crate::filters::transform::{apply_rgb32, Interpolation, Rect};
use crate::math::clamp8;
use crate::raster::{ColorTag, Raster};

/// Interpolation strategy for [`ResizeFilter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeMode {
    Nearest,
    Bilinear,
    Bicubic,
    Multistep,
}

/// Contract of the host's colour-management collaborator.
pub trait ColorSpaceAdapter: Send + Sync {
    fn is_srgb(&self, raster: &Raster) -> bool;
    fn is_sgray(&self, raster: &Raster) -> bool;
    fn apply_color_space(&self, raster: Raster, target: ColorTag) -> Raster;
}

/// Adapter that only tracks tags; pixel values are left alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThroughAdapter;

impl ColorSpaceAdapter for PassThroughAdapter {
    fn is_srgb(&self, raster: &Raster) -> bool {
        raster.color_tag() == ColorTag::SRgb
    }

    fn is_sgray(&self, raster: &Raster) -> bool {
        raster.color_tag() == ColorTag::SGray
    }

    fn apply_color_space(&self, mut raster: Raster, target: ColorTag) -> Raster {
        raster.set_color_tag(target);
        raster
    }
}

pub struct ResizeFilter {
    dst_width: usize,
    dst_height: usize,
    mode: ResizeMode,
    adapter: Box<dyn ColorSpaceAdapter>,
}

impl ResizeFilter {
    pub fn new(dst_width: usize, dst_height: usize, mode: ResizeMode) -> ResizeFilter {
        ResizeFilter {
            dst_width: dst_width.max(1),
            dst_height: dst_height.max(1),
            mode,
            adapter: Box::new(PassThroughAdapter),
        }
    }

    pub fn set_adapter(&mut self, adapter: Box<dyn ColorSpaceAdapter>) {
        self.adapter = adapter;
    }

    fn scale(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (dw, dh) = (self.dst_width, self.dst_height);
        let mut dst = match dst {
            Some(d) if d.width() == dw && d.height() == dh => d,
            _ => src.compatible(dw, dh),
        };
        match self.mode {
            ResizeMode::Nearest | ResizeMode::Bilinear => {
                let scale_x = src.width() as f32 / dw as f32;
                let scale_y = src.height() as f32 / dh as f32;
                let rect = Rect {
                    x: 0,
                    y: 0,
                    width: dw,
                    height: dh,
                };
                if self.mode == ResizeMode::Nearest {
                    let map =
                        move |x: i32, y: i32| (x as f32 * scale_x, y as f32 * scale_y);
                    apply_rgb32(
                        src,
                        Some(dst),
                        rect,
                        EdgeMode::Clamp,
                        Interpolation::NearestNeighbour,
                        &map,
                    )
                } else {
                    // Pixel-centre mapping keeps the bilinear grid aligned.
                    let map = move |x: i32, y: i32| {
                        (
                            (x as f32 + 0.5) * scale_x - 0.5,
                            (y as f32 + 0.5) * scale_y - 0.5,
                        )
                    };
                    apply_rgb32(
                        src,
                        Some(dst),
                        rect,
                        EdgeMode::Clamp,
                        Interpolation::Bilinear,
                        &map,
                    )
                }
            }
            ResizeMode::Bicubic => {
                let out = bicubic(&src.to_packed(), dw, dh);
                dst.set_packed(&out);
                dst
            }
            ResizeMode::Multistep => {
                let out = multistep(&src.to_packed(), dw, dh);
                dst.set_packed(&out);
                dst
            }
        }
    }
}

impl Filter for ResizeFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        if self.adapter.is_srgb(src) {
            self.scale(src, dst)
        } else {
            let tag = src.color_tag();
            let converted = self.adapter.apply_color_space(src.clone(), ColorTag::SRgb);
            let out = self.scale(&converted, dst);
            self.adapter.apply_color_space(out, tag)
        }
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        if self.adapter.is_sgray(src) {
            self.scale(src, dst)
        } else {
            let tag = src.color_tag();
            let converted = self.adapter.apply_color_space(src.clone(), ColorTag::SGray);
            let out = self.scale(&converted, dst);
            self.adapter.apply_color_space(out, tag)
        }
    }
}

/// Catmull-Rom weight.
fn cubic(t: f32) -> f32 {
    let t = t.abs();
    if t < 1.0 {
        1.5 * t * t * t - 2.5 * t * t + 1.0
    } else if t < 2.0 {
        -0.5 * t * t * t + 2.5 * t * t - 4.0 * t + 2.0
    } else {
        0.0
    }
}

fn bicubic(inp: &Array2<u32>, dw: usize, dh: usize) -> Array2<u32> {
    let (sh, sw) = inp.dim();
    let scale_x = sw as f32 / dw as f32;
    let scale_y = sh as f32 / dh as f32;

    let mut out = Array2::<u32>::zeros((dh, dw));
    let chunk = exec::chunk_rows(dw, dw * dh);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = ci * chunk + dy;
                let sy = (y as f32 + 0.5) * scale_y - 0.5;
                let iy = sy.floor() as i32;
                let fy = sy - iy as f32;
                for (x, out_px) in out_row.iter_mut().enumerate() {
                    let sx = (x as f32 + 0.5) * scale_x - 0.5;
                    let ix = sx.floor() as i32;
                    let fx = sx - ix as f32;

                    let mut acc = [0f32; 4];
                    let mut total = 0f32;
                    for j in -1..=2 {
                        let wy = cubic(j as f32 - fy);
                        if wy == 0.0 {
                            continue;
                        }
                        let cy = (iy + j).clamp(0, sh as i32 - 1) as usize;
                        for i in -1..=2 {
                            let wx = cubic(i as f32 - fx);
                            if wx == 0.0 {
                                continue;
                            }
                            let cx = (ix + i).clamp(0, sw as i32 - 1) as usize;
                            let weight = wx * wy;
                            let rgb = inp[[cy, cx]];
                            acc[0] += weight * ((rgb >> 24) & 0xff) as f32;
                            acc[1] += weight * ((rgb >> 16) & 0xff) as f32;
                            acc[2] += weight * ((rgb >> 8) & 0xff) as f32;
                            acc[3] += weight * (rgb & 0xff) as f32;
                            total += weight;
                        }
                    }
                    let mut px = 0u32;
                    for (k, shift) in [24, 16, 8, 0].into_iter().enumerate() {
                        px |= (clamp8((acc[k] / total + 0.5) as i32) as u32) << shift;
                    }
                    *out_px = px;
                }
            }
        });
    out
}

/// Area-averaging resample: every output pixel is the coverage-weighted
/// mean of the source rectangle it projects onto. Handles reduction and
/// enlargement alike.
fn area_average(inp: &ArrayView2<u32>, dw: usize, dh: usize) -> Array2<u32> {
    let (sh, sw) = inp.dim();
    let scale_x = sw as f64 / dw as f64;
    let scale_y = sh as f64 / dh as f64;

    let mut out = Array2::<u32>::zeros((dh, dw));
    let chunk = exec::chunk_rows(dw, dw * dh);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = ci * chunk + dy;
                for (x, out_px) in out_row.iter_mut().enumerate() {
                    *out_px = area_sample(inp, x, y, scale_x, scale_y, sw, sh);
                }
            }
        });
    out
}

#[inline]
fn area_sample(
    inp: &ArrayView2<u32>,
    x: usize,
    y: usize,
    scale_x: f64,
    scale_y: f64,
    sw: usize,
    sh: usize,
) -> u32 {
    let x0 = x as f64 * scale_x;
    let x1 = (x as f64 + 1.0) * scale_x;
    let y0 = y as f64 * scale_y;
    let y1 = (y as f64 + 1.0) * scale_y;

    let mut acc = [0f64; 4];
    let mut area = 0f64;
    let row_start = y0.floor() as usize;
    let row_end = (y1.ceil() as usize).min(sh);
    let col_start = x0.floor() as usize;
    let col_end = (x1.ceil() as usize).min(sw);

    for cy in row_start..row_end {
        let wy = (y1.min(cy as f64 + 1.0) - y0.max(cy as f64)).max(0.0);
        if wy == 0.0 {
            continue;
        }
        for cx in col_start..col_end {
            let wx = (x1.min(cx as f64 + 1.0) - x0.max(cx as f64)).max(0.0);
            if wx == 0.0 {
                continue;
            }
            let weight = wx * wy;
            let rgb = inp[[cy, cx]];
            acc[0] += weight * ((rgb >> 24) & 0xff) as f64;
            acc[1] += weight * ((rgb >> 16) & 0xff) as f64;
            acc[2] += weight * ((rgb >> 8) & 0xff) as f64;
            acc[3] += weight * (rgb & 0xff) as f64;
            area += weight;
        }
    }

    let mut px = 0u32;
    for (k, shift) in [24, 16, 8, 0].into_iter().enumerate() {
        let v = if area > 0.0 { acc[k] / area } else { 0.0 };
        px |= (clamp8((v + 0.5) as i32) as u32) << shift;
    }
    px
}

fn half_step(current: &mut usize, target: usize) {
    if *current > target {
        *current /= 2;
        if *current < target {
            *current = target;
        }
    }
}

/// Progressive halving with area averaging. One scratch buffer, allocated
/// at the first intermediate size, hosts every later step in its top-left
/// region; the final region is blitted out if it is smaller than the
/// scratch.
fn multistep(inp: &Array2<u32>, dw: usize, dh: usize) -> Array2<u32> {
    let (sh, sw) = inp.dim();
    if dw >= sw || dh >= sh {
        // Enlarging either dimension: one area-averaging step suffices.
        return area_average(&inp.view(), dw, dh);
    }

    let mut w = sw;
    let mut h = sh;
    half_step(&mut w, dw);
    half_step(&mut h, dh);
    let mut scratch = area_average(&inp.view(), w, h);

    while w != dw || h != dh {
        let (pw, ph) = (w, h);
        half_step(&mut w, dw);
        half_step(&mut h, dh);
        area_average_in_place(&mut scratch, pw, ph, w, h);
    }

    if scratch.dim() == (dh, dw) {
        scratch
    } else {
        scratch.slice(s![..dh, ..dw]).to_owned()
    }
}

/// Downscale the `(ph, pw)` region of `scratch` into its `(nh, nw)`
/// corner. Output rows are built in a temporary row first; every source
/// row an output row needs lies at or below it, so the in-place update
/// never reads stale data.
fn area_average_in_place(scratch: &mut Array2<u32>, pw: usize, ph: usize, nw: usize, nh: usize) {
    let scale_x = pw as f64 / nw as f64;
    let scale_y = ph as f64 / nh as f64;
    let mut row = vec![0u32; nw];
    for y in 0..nh {
        {
            let region = scratch.slice(s![..ph, ..pw]);
            for (x, px) in row.iter_mut().enumerate() {
                *px = area_sample(&region, x, y, scale_x, scale_y, pw, ph);
            }
        }
        for (x, &px) in row.iter().enumerate() {
            scratch[[y, x]] = px;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelFormat;

    fn quads_4x4() -> Raster {
        // Four 2x2 blocks of distinct constant colours.
        let (a, b, c, d) = (0xff000000u32, 0xff404040, 0xff808080, 0xffc0c0c0);
        let data = vec![
            a, a, b, b, //
            a, a, b, b, //
            c, c, d, d, //
            c, c, d, d,
        ];
        Raster::from_packed(4, 4, true, data).unwrap()
    }

    #[test]
    fn test_multistep_halving_averages_quads() {
        let src = quads_4x4();
        let out = ResizeFilter::new(2, 2, ResizeMode::Multistep).filter(&src, None);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.pixel(0, 0), 0xff000000);
        assert_eq!(out.pixel(1, 0), 0xff404040);
        assert_eq!(out.pixel(0, 1), 0xff808080);
        assert_eq!(out.pixel(1, 1), 0xffc0c0c0);
    }

    #[test]
    fn test_multistep_to_single_pixel_is_global_mean() {
        let src = quads_4x4();
        let out = ResizeFilter::new(1, 1, ResizeMode::Multistep).filter(&src, None);
        // Mean of the four block values.
        assert_eq!(out.pixel(0, 0), 0xff606060);
    }

    #[test]
    fn test_nearest_doubling_replicates_pixels() {
        let data = vec![0xff110000u32, 0xff002200, 0xff000033, 0xff445566];
        let src = Raster::from_packed(2, 2, true, data).unwrap();
        let out = ResizeFilter::new(4, 4, ResizeMode::Nearest).filter(&src, None);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.pixel(x, y), src.pixel(x / 2, y / 2));
            }
        }
    }

    #[test]
    fn test_bilinear_constant_preserved() {
        let src = Raster::from_packed(3, 3, true, vec![0xff123456; 9]).unwrap();
        let out = ResizeFilter::new(5, 7, ResizeMode::Bilinear).filter(&src, None);
        assert_eq!((out.width(), out.height()), (5, 7));
        for y in 0..7 {
            for x in 0..5 {
                assert_eq!(out.pixel(x, y), 0xff123456);
            }
        }
    }

    #[test]
    fn test_bicubic_constant_preserved() {
        let src = Raster::from_packed(4, 4, true, vec![0xff654321; 16]).unwrap();
        let out = ResizeFilter::new(6, 3, ResizeMode::Bicubic).filter(&src, None);
        assert_eq!((out.width(), out.height()), (6, 3));
        for y in 0..3 {
            for x in 0..6 {
                assert_eq!(out.pixel(x, y), 0xff654321);
            }
        }
    }

    #[test]
    fn test_gray_resize_keeps_format_and_tag() {
        let src =
            Raster::from_bytes(4, 4, PixelFormat::Gray8, vec![100; 16]).unwrap();
        let out = ResizeFilter::new(2, 2, ResizeMode::Multistep).filter(&src, None);
        assert_eq!(out.format(), PixelFormat::Gray8);
        assert_eq!(out.color_tag(), ColorTag::SGray);
        assert_eq!(out.pixel(0, 0) & 0xff, 100);
    }
}
