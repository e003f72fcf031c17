//! Inverse-mapping geometric transforms.
//!
//! A transform filter supplies a mapping from destination coordinates to
//! (possibly fractional) source coordinates plus an output rectangle. The
//! engine walks the output row by row, samples the source with nearest or
//! bilinear interpolation and applies the edge policy to out-of-range
//! coordinates.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

use crate::exec;
use crate::filter::{EdgeMode, Filter};
use crate::math::{bilinear_interpolate, bilinear_interpolate_gray, modulo};
use crate::raster::{PixelFormat, Raster};

/// Interpolation used when sampling fractional source coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    NearestNeighbour,
    Bilinear,
}

/// Output rectangle of a transform, in source coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn of(width: usize, height: usize) -> Rect {
        Rect {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

#[inline]
fn get_pixel(inp: &Array2<u32>, x: i32, y: i32, edge_mode: EdgeMode) -> u32 {
    let (h, w) = inp.dim();
    if x < 0 || x >= w as i32 || y < 0 || y >= h as i32 {
        return match edge_mode {
            EdgeMode::Zero => 0,
            EdgeMode::Wrap => inp[[modulo(y, h as i32) as usize, modulo(x, w as i32) as usize]],
            EdgeMode::Clamp => {
                inp[[y.clamp(0, h as i32 - 1) as usize, x.clamp(0, w as i32 - 1) as usize]]
            }
        };
    }
    inp[[y as usize, x as usize]]
}

#[inline]
fn get_gray(inp: &Array2<u8>, x: i32, y: i32, edge_mode: EdgeMode) -> u8 {
    let (h, w) = inp.dim();
    if x < 0 || x >= w as i32 || y < 0 || y >= h as i32 {
        return match edge_mode {
            EdgeMode::Zero => 0,
            EdgeMode::Wrap => inp[[modulo(y, h as i32) as usize, modulo(x, w as i32) as usize]],
            EdgeMode::Clamp => {
                inp[[y.clamp(0, h as i32 - 1) as usize, x.clamp(0, w as i32 - 1) as usize]]
            }
        };
    }
    inp[[y as usize, x as usize]]
}

/// Run an inverse mapping over the packed RGB path.
pub(crate) fn apply_rgb32<M>(
    src: &Raster,
    dst: Option<Raster>,
    rect: Rect,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
    map: &M,
) -> Raster
where
    M: Fn(i32, i32) -> (f32, f32) + Sync,
{
    let inp = src.to_packed();
    let (sh, sw) = inp.dim();
    let mut dst = match dst {
        Some(d) if d.width() == rect.width && d.height() == rect.height => d,
        _ => src.compatible(rect.width, rect.height),
    };
    let (ow, oh) = (dst.width(), dst.height());

    let mut out = Array2::<u32>::zeros((oh, ow));
    let chunk = exec::chunk_rows(ow, ow * oh);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = rect.y + (ci * chunk + dy) as i32;
                for x in 0..ow {
                    let (sx, sy) = map(rect.x + x as i32, y);
                    out_row[x] = match interpolation {
                        Interpolation::NearestNeighbour => {
                            // Truncation rounds towards zero, so test the
                            // float against zero, not the cast value.
                            let ix = sx as i32;
                            let iy = sy as i32;
                            if sx < 0.0 || ix >= sw as i32 || sy < 0.0 || iy >= sh as i32 {
                                match edge_mode {
                                    EdgeMode::Zero => 0,
                                    EdgeMode::Wrap => inp[[
                                        modulo(iy, sh as i32) as usize,
                                        modulo(ix, sw as i32) as usize,
                                    ]],
                                    EdgeMode::Clamp => inp[[
                                        iy.clamp(0, sh as i32 - 1) as usize,
                                        ix.clamp(0, sw as i32 - 1) as usize,
                                    ]],
                                }
                            } else {
                                inp[[iy as usize, ix as usize]]
                            }
                        }
                        Interpolation::Bilinear => {
                            let ix = sx.floor() as i32;
                            let iy = sy.floor() as i32;
                            let fx = sx - ix as f32;
                            let fy = sy - iy as f32;
                            if ix >= 0 && ix < sw as i32 - 1 && iy >= 0 && iy < sh as i32 - 1 {
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
                                    get_pixel(&inp, ix, iy, edge_mode),
                                    get_pixel(&inp, ix + 1, iy, edge_mode),
                                    get_pixel(&inp, ix, iy + 1, edge_mode),
                                    get_pixel(&inp, ix + 1, iy + 1, edge_mode),
                                )
                            }
                        }
                    };
                }
            }
        });
    dst.set_packed(&out);
    dst
}

/// Run an inverse mapping over the native grey path. Non-Gray8 sources
/// fall back to the packed path, which handles every format.
pub(crate) fn apply_gray8<M>(
    src: &Raster,
    dst: Option<Raster>,
    rect: Rect,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
    map: &M,
) -> Raster
where
    M: Fn(i32, i32) -> (f32, f32) + Sync,
{
    let plane = match src.gray_plane() {
        Some(p) => p,
        None => return apply_rgb32(src, dst, rect, edge_mode, interpolation, map),
    };
    let (sh, sw) = plane.dim();
    let mut dst = match dst {
        Some(d)
            if d.format() == PixelFormat::Gray8
                && d.width() == rect.width
                && d.height() == rect.height =>
        {
            d
        }
        _ => src.compatible(rect.width, rect.height),
    };
    let (ow, oh) = (dst.width(), dst.height());

    let mut out = Array2::<u8>::zeros((oh, ow));
    let chunk = exec::chunk_rows(ow, ow * oh);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = rect.y + (ci * chunk + dy) as i32;
                for x in 0..ow {
                    let (sx, sy) = map(rect.x + x as i32, y);
                    out_row[x] = match interpolation {
                        Interpolation::NearestNeighbour => {
                            let ix = sx as i32;
                            let iy = sy as i32;
                            if sx < 0.0 || ix >= sw as i32 || sy < 0.0 || iy >= sh as i32 {
                                match edge_mode {
                                    EdgeMode::Zero => 0,
                                    EdgeMode::Wrap => plane[[
                                        modulo(iy, sh as i32) as usize,
                                        modulo(ix, sw as i32) as usize,
                                    ]],
                                    EdgeMode::Clamp => plane[[
                                        iy.clamp(0, sh as i32 - 1) as usize,
                                        ix.clamp(0, sw as i32 - 1) as usize,
                                    ]],
                                }
                            } else {
                                plane[[iy as usize, ix as usize]]
                            }
                        }
                        Interpolation::Bilinear => {
                            let ix = sx.floor() as i32;
                            let iy = sy.floor() as i32;
                            let fx = sx - ix as f32;
                            let fy = sy - iy as f32;
                            bilinear_interpolate_gray(
                                fx,
                                fy,
                                get_gray(&plane, ix, iy, edge_mode),
                                get_gray(&plane, ix + 1, iy, edge_mode),
                                get_gray(&plane, ix, iy + 1, edge_mode),
                                get_gray(&plane, ix + 1, iy + 1, edge_mode),
                            )
                        }
                    };
                }
            }
        });
    dst.set_gray_plane(&out);
    dst
}

/// Snap sines and cosines of right angles onto exact values so that 90 and
/// 180 degree rotations map pixels one-to-one.
fn snap(v: f32) -> f32 {
    if v.abs() < 1e-6 {
        0.0
    } else if (v - 1.0).abs() < 1e-6 {
        1.0
    } else if (v + 1.0).abs() < 1e-6 {
        -1.0
    } else {
        v
    }
}

fn bbox(corners: [(f32, f32); 4]) -> (f32, f32, f32, f32) {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (x, y) in corners {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    (min_x, min_y, max_x, max_y)
}

/// Rotation by an arbitrary angle. With `resize` the output rectangle
/// grows to the axis-aligned bounding box of the rotated image; without it
/// the original rectangle is kept and corners are cut.
#[derive(Clone, Copy, Debug)]
pub struct RotateFilter {
    angle: f32,
    resize: bool,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
}

impl RotateFilter {
    pub fn new(angle: f32, resize: bool) -> RotateFilter {
        RotateFilter {
            angle,
            resize,
            edge_mode: EdgeMode::Zero,
            interpolation: Interpolation::Bilinear,
        }
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn set_edge_mode(&mut self, edge_mode: EdgeMode) {
        self.edge_mode = edge_mode;
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    fn setup(&self, w: usize, h: usize) -> (Rect, impl Fn(i32, i32) -> (f32, f32) + Sync) {
        let cos = snap(self.angle.cos());
        let sin = snap(self.angle.sin());
        let rect = if self.resize {
            let (w, h) = (w as f32, h as f32);
            let fwd = |x: f32, y: f32| (x * cos - y * sin, x * sin + y * cos);
            let (min_x, min_y, max_x, max_y) =
                bbox([fwd(0.0, 0.0), fwd(w, 0.0), fwd(0.0, h), fwd(w, h)]);
            Rect {
                x: min_x.round() as i32,
                y: min_y.round() as i32,
                width: (max_x - min_x).round().max(1.0) as usize,
                height: (max_y - min_y).round().max(1.0) as usize,
            }
        } else {
            Rect::of(w, h)
        };
        let map = move |x: i32, y: i32| {
            let xc = x as f32 + 0.5;
            let yc = y as f32 + 0.5;
            (
                xc * cos + yc * sin - 0.5,
                yc * cos - xc * sin - 0.5,
            )
        };
        (rect, map)
    }
}

impl Filter for RotateFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_rgb32(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_gray8(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

/// Horizon straightening: rotates by a small angle and, when `keep_size`
/// is set, scales the content so the rotated image still fills the
/// original rectangle.
#[derive(Clone, Copy, Debug)]
pub struct StraightenFilter {
    angle: f32,
    keep_size: bool,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
}

impl StraightenFilter {
    pub fn new(angle: f32, keep_size: bool) -> StraightenFilter {
        StraightenFilter {
            angle,
            keep_size,
            edge_mode: EdgeMode::Zero,
            interpolation: Interpolation::Bilinear,
        }
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn set_edge_mode(&mut self, edge_mode: EdgeMode) {
        self.edge_mode = edge_mode;
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    /// Scale keeping the rotated content inside the original rectangle:
    /// `min(h*h / (w*|sin| + h*cos), h*w / (w*cos + h*|sin|)) / h`.
    fn content_scale(&self, w: usize, h: usize) -> f32 {
        let a = self.angle.abs();
        let c = a.cos();
        let s = a.sin();
        let (w, h) = (w as f32, h as f32);
        let ha = h * h / (w * s + h * c);
        let hb = h * w / (w * c + h * s);
        ha.min(hb) / h
    }

    fn setup(&self, w: usize, h: usize) -> (Rect, impl Fn(i32, i32) -> (f32, f32) + Sync) {
        let cos = snap(self.angle.cos());
        let sin = snap(self.angle.sin());
        let scale = if self.keep_size {
            self.content_scale(w, h)
        } else {
            1.0
        };

        let (fw, fh) = (w as f32 / scale, h as f32 / scale);
        let fwd = |x: f32, y: f32| (x * cos + y * sin, y * cos - x * sin);
        let (min_x, min_y, max_x, max_y) =
            bbox([fwd(0.0, 0.0), fwd(fw, 0.0), fwd(0.0, fh), fwd(fw, fh)]);

        let rect = if self.keep_size {
            // Keep the original dimensions, centred in the rotated bounds.
            let ww = fw * scale;
            let hh = fh * scale;
            Rect {
                x: (min_x + (max_x - min_x - ww) / 2.0).round() as i32,
                y: (min_y + (max_y - min_y - hh) / 2.0).round() as i32,
                width: ww.round().max(1.0) as usize,
                height: hh.round().max(1.0) as usize,
            }
        } else {
            Rect {
                x: min_x.round() as i32,
                y: min_y.round() as i32,
                width: (max_x - min_x).round().max(1.0) as usize,
                height: (max_y - min_y).round().max(1.0) as usize,
            }
        };

        let map = move |x: i32, y: i32| {
            let (x, y) = (x as f32, y as f32);
            ((x * cos - y * sin) * scale, (y * cos + x * sin) * scale)
        };
        (rect, map)
    }
}

impl Filter for StraightenFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_rgb32(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_gray8(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

/// Swirls the image around a centre point; the twist angle decays linearly
/// to zero at the configured radius.
#[derive(Clone, Copy, Debug)]
pub struct TwirlFilter {
    angle: f32,
    centre_x: f32,
    centre_y: f32,
    radius: f32,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
}

impl TwirlFilter {
    /// `centre_x`/`centre_y` are fractions of the image dimensions.
    pub fn new(angle: f32, centre_x: f32, centre_y: f32, radius: f32) -> TwirlFilter {
        TwirlFilter {
            angle,
            centre_x,
            centre_y,
            radius,
            edge_mode: EdgeMode::Clamp,
            interpolation: Interpolation::Bilinear,
        }
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    pub fn set_centre(&mut self, centre_x: f32, centre_y: f32) {
        self.centre_x = centre_x;
        self.centre_y = centre_y;
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }
}

impl Filter for TwirlFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_rgb32(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_gray8(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

impl TwirlFilter {
    fn setup(&self, w: usize, h: usize) -> (Rect, impl Fn(i32, i32) -> (f32, f32) + Sync) {
        let icx = self.centre_x * w as f32;
        let icy = self.centre_y * h as f32;
        let radius = self.radius;
        let radius2 = radius * radius;
        let angle = self.angle;
        let map = move |x: i32, y: i32| {
            let dx = x as f32 - icx;
            let dy = y as f32 - icy;
            let d2 = dx * dx + dy * dy;
            if d2 > radius2 || radius <= 0.0 {
                (x as f32, y as f32)
            } else {
                let d = d2.sqrt();
                let a = angle * (1.0 - d / radius);
                let (s, c) = a.sin_cos();
                (icx + c * dx - s * dy, icy + s * dx + c * dy)
            }
        };
        (Rect::of(w, h), map)
    }
}

/// Radial sinusoidal ripple around a centre point, zero beyond the radius.
#[derive(Clone, Copy, Debug)]
pub struct WaterFilter {
    wavelength: f32,
    amplitude: f32,
    phase: f32,
    centre_x: f32,
    centre_y: f32,
    radius: f32,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
}

impl WaterFilter {
    pub fn new(wavelength: f32, amplitude: f32, radius: f32) -> WaterFilter {
        WaterFilter {
            wavelength,
            amplitude,
            phase: 0.0,
            centre_x: 0.5,
            centre_y: 0.5,
            radius,
            edge_mode: EdgeMode::Clamp,
            interpolation: Interpolation::Bilinear,
        }
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase;
    }

    pub fn set_centre(&mut self, centre_x: f32, centre_y: f32) {
        self.centre_x = centre_x;
        self.centre_y = centre_y;
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    fn setup(&self, w: usize, h: usize) -> (Rect, impl Fn(i32, i32) -> (f32, f32) + Sync) {
        let icx = self.centre_x * w as f32;
        let icy = self.centre_y * h as f32;
        let radius = self.radius;
        let wavelength = self.wavelength;
        let amplitude = self.amplitude;
        let phase = self.phase;
        let map = move |x: i32, y: i32| {
            let dx = x as f32 - icx;
            let dy = y as f32 - icy;
            let r = (dx * dx + dy * dy).sqrt();
            if r >= radius || r == 0.0 || wavelength == 0.0 {
                (x as f32, y as f32)
            } else {
                let d = amplitude
                    * (2.0 * std::f32::consts::PI * r / wavelength + phase).sin();
                (x as f32 + d * dx / r, y as f32 + d * dy / r)
            }
        };
        (Rect::of(w, h), map)
    }
}

impl Filter for WaterFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_rgb32(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_gray8(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

/// Shear along one or both axes; the output rectangle is enlarged to hold
/// the sheared content.
#[derive(Clone, Copy, Debug)]
pub struct ShearFilter {
    x_angle: f32,
    y_angle: f32,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
}

impl ShearFilter {
    pub fn new(x_angle: f32, y_angle: f32) -> ShearFilter {
        ShearFilter {
            x_angle,
            y_angle,
            edge_mode: EdgeMode::Zero,
            interpolation: Interpolation::Bilinear,
        }
    }

    pub fn set_x_angle(&mut self, x_angle: f32) {
        self.x_angle = x_angle;
    }

    pub fn set_y_angle(&mut self, y_angle: f32) {
        self.y_angle = y_angle;
    }

    fn setup(&self, w: usize, h: usize) -> (Rect, impl Fn(i32, i32) -> (f32, f32) + Sync) {
        let tan_x = self.x_angle.tan();
        let tan_y = self.y_angle.tan();
        let x_offset = -(h as f32) * tan_x;
        let width = (h as f32 * tan_x.abs() + w as f32 + 0.999_999) as usize;
        let y_offset = -(width as f32) * tan_y;
        let height = (width as f32 * tan_y.abs() + h as f32 + 0.999_999) as usize;
        let rect = Rect {
            x: 0,
            y: 0,
            width,
            height,
        };
        let map = move |x: i32, y: i32| {
            (
                x as f32 + x_offset + y as f32 * tan_x,
                y as f32 + y_offset + x as f32 * tan_y,
            )
        };
        (rect, map)
    }
}

impl Filter for ShearFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_rgb32(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_gray8(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

/// Translation, either wrapping around the edges or exposing transparent
/// black.
#[derive(Clone, Copy, Debug)]
pub struct OffsetFilter {
    x_offset: i32,
    y_offset: i32,
    wrap: bool,
}

impl OffsetFilter {
    pub fn new(x_offset: i32, y_offset: i32, wrap: bool) -> OffsetFilter {
        OffsetFilter {
            x_offset,
            y_offset,
            wrap,
        }
    }

    fn setup(&self, w: usize, h: usize) -> (Rect, impl Fn(i32, i32) -> (f32, f32) + Sync) {
        let (w_i, h_i) = (w as i32, h as i32);
        let (x_offset, y_offset) = if self.wrap {
            (modulo(self.x_offset, w_i), modulo(self.y_offset, h_i))
        } else {
            (self.x_offset, self.y_offset)
        };
        let wrap = self.wrap;
        let map = move |x: i32, y: i32| {
            if wrap {
                (
                    ((x + w_i - x_offset) % w_i) as f32,
                    ((y + h_i - y_offset) % h_i) as f32,
                )
            } else {
                ((x - x_offset) as f32, (y - y_offset) as f32)
            }
        };
        (Rect::of(w, h), map)
    }
}

impl Filter for OffsetFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_rgb32(
            src,
            dst,
            rect,
            EdgeMode::Zero,
            Interpolation::NearestNeighbour,
            &map,
        )
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (rect, map) = self.setup(src.width(), src.height());
        apply_gray8(
            src,
            dst,
            rect,
            EdgeMode::Zero,
            Interpolation::NearestNeighbour,
            &map,
        )
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

/// Distorts through caller-supplied coordinate maps. The maps receive
/// destination pixel coordinates and return normalised source positions
/// in `[0, 1]`, which are scaled by the output rectangle.
pub struct MapFilter {
    x_map: Box<dyn Fn(f32, f32) -> f32 + Send + Sync>,
    y_map: Box<dyn Fn(f32, f32) -> f32 + Send + Sync>,
    edge_mode: EdgeMode,
    interpolation: Interpolation,
}

impl MapFilter {
    pub fn new(
        x_map: impl Fn(f32, f32) -> f32 + Send + Sync + 'static,
        y_map: impl Fn(f32, f32) -> f32 + Send + Sync + 'static,
    ) -> MapFilter {
        MapFilter {
            x_map: Box::new(x_map),
            y_map: Box::new(y_map),
            edge_mode: EdgeMode::Zero,
            interpolation: Interpolation::Bilinear,
        }
    }

    pub fn set_edge_mode(&mut self, edge_mode: EdgeMode) {
        self.edge_mode = edge_mode;
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }
}

impl Filter for MapFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let rect = Rect::of(src.width(), src.height());
        let (w, h) = (rect.width as f32, rect.height as f32);
        let map = |x: i32, y: i32| {
            let (xf, yf) = (x as f32, y as f32);
            ((self.x_map)(xf, yf) * w, (self.y_map)(xf, yf) * h)
        };
        apply_rgb32(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let rect = Rect::of(src.width(), src.height());
        let (w, h) = (rect.width as f32, rect.height as f32);
        let map = |x: i32, y: i32| {
            let (xf, yf) = (x as f32, y as f32);
            ((self.x_map)(xf, yf) * w, (self.y_map)(xf, yf) * h)
        };
        apply_gray8(src, dst, rect, self.edge_mode, self.interpolation, &map)
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_4x4() -> Raster {
        let data: Vec<u32> = (0..16).map(|i| 0xff000000 | (i * 16) * 0x10101).collect();
        Raster::from_packed(4, 4, true, data).unwrap()
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let src = raster_4x4();
        for resize in [true, false] {
            let out = RotateFilter::new(0.0, resize).filter(&src, None);
            assert_eq!(out.to_packed(), src.to_packed());
        }
    }

    #[test]
    fn test_rotate_quarter_roundtrip() {
        // S6: rotating +90 then -90 with resize restores the image.
        let src = raster_4x4();
        let once = RotateFilter::new(std::f32::consts::FRAC_PI_2, true).filter(&src, None);
        assert_eq!(once.width(), 4);
        assert_eq!(once.height(), 4);
        let back =
            RotateFilter::new(-std::f32::consts::FRAC_PI_2, true).filter(&once, None);
        let orig = src.to_packed();
        let round = back.to_packed();
        for (a, b) in orig.iter().zip(round.iter()) {
            for shift in [24, 16, 8, 0] {
                let ca = ((a >> shift) & 0xff) as i32;
                let cb = ((b >> shift) & 0xff) as i32;
                assert!((ca - cb).abs() <= 1, "{a:08x} vs {b:08x}");
            }
        }
    }

    #[test]
    fn test_rotate_quarter_swaps_rect_of_non_square() {
        let src = Raster::from_packed(6, 3, true, vec![0xff123456; 18]).unwrap();
        let out = RotateFilter::new(std::f32::consts::FRAC_PI_2, true).filter(&src, None);
        assert_eq!((out.width(), out.height()), (3, 6));
    }

    #[test]
    fn test_straighten_zero_is_identity() {
        let src = raster_4x4();
        let out = StraightenFilter::new(0.0, true).filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }

    #[test]
    fn test_straighten_keep_size_keeps_dimensions() {
        let src = Raster::from_packed(8, 6, true, vec![0xff808080; 48]).unwrap();
        let out = StraightenFilter::new(0.2, true).filter(&src, None);
        assert_eq!((out.width(), out.height()), (8, 6));
    }

    #[test]
    fn test_twirl_identity_outside_radius() {
        let src = raster_4x4();
        let out = TwirlFilter::new(1.0, 0.5, 0.5, 0.5).filter(&src, None);
        // Radius 0.5 pixels only reaches the immediate centre; corners are
        // untouched.
        assert_eq!(out.pixel(0, 0), src.pixel(0, 0));
        assert_eq!(out.pixel(3, 3), src.pixel(3, 3));
    }

    #[test]
    fn test_water_zero_amplitude_is_identity() {
        let src = raster_4x4();
        let out = WaterFilter::new(4.0, 0.0, 10.0).filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }

    #[test]
    fn test_offset_wrap_roundtrip() {
        let src = raster_4x4();
        let out = OffsetFilter::new(1, 2, true).filter(&src, None);
        // (0,0) of the output shows the pixel that was at (3, 2).
        assert_eq!(out.pixel(0, 0), src.pixel(3, 2));
        let back = OffsetFilter::new(-1, -2, true).filter(&out, None);
        assert_eq!(back.to_packed(), src.to_packed());
    }

    #[test]
    fn test_offset_zero_is_identity() {
        let src = raster_4x4();
        for wrap in [true, false] {
            let out = OffsetFilter::new(0, 0, wrap).filter(&src, None);
            assert_eq!(out.to_packed(), src.to_packed(), "wrap {wrap}");
        }
    }

    #[test]
    fn test_offset_without_wrap_exposes_zero() {
        let src = raster_4x4();
        let out = OffsetFilter::new(2, 0, false).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0);
        assert_eq!(out.pixel(2, 0), src.pixel(0, 0));
    }

    #[test]
    fn test_shear_expands_rect() {
        let src = raster_4x4();
        let out = ShearFilter::new(0.5, 0.0).filter(&src, None);
        assert!(out.width() > 4);
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn test_map_filter_identity() {
        let src = raster_4x4();
        let f = MapFilter::new(|x, _| x / 4.0, |_, y| y / 4.0);
        let out = f.filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }

    #[test]
    fn test_gray_transform_stays_gray() {
        let src =
            Raster::from_bytes(2, 2, PixelFormat::Gray8, vec![10, 20, 30, 40]).unwrap();
        let out = OffsetFilter::new(1, 0, true).filter(&src, None);
        assert_eq!(out.format(), PixelFormat::Gray8);
        assert_eq!(out.pixel(0, 0) & 0xff, 20);
        assert_eq!(out.pixel(1, 0) & 0xff, 10);
    }
}
