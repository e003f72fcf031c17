//! Point filters: scalar per-pixel transforms.
//!
//! The framework partitions the image into row bands, widens each row to
//! packed ARGB, rewrites every pixel through a `(x, y, argb) -> argb`
//! function and narrows the result back into the destination's format.
//! Concrete filters only supply the per-pixel function.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};

use crate::exec;
use crate::filter::Filter;
use crate::math::{clamp8, hsb_to_rgb, rgb_to_hsb};
use crate::raster::Raster;

/// Run a per-pixel function over every pixel of `src`, writing into `dst`
/// (or a compatible new raster) in the destination's own format.
pub(crate) fn map_rows<F>(src: &Raster, dst: Option<Raster>, f: &F) -> Raster
where
    F: Fn(usize, usize, u32) -> u32 + Sync,
{
    let (w, h) = (src.width(), src.height());
    let mut dst = match dst {
        Some(d) if d.width() == w && d.height() == h => d,
        _ => src.compatible(w, h),
    };
    let mut out = Array2::<u32>::zeros((h, w));
    let chunk = exec::chunk_rows(w, w * h);
    out.axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .for_each(|(ci, mut band)| {
            let mut row = vec![0u32; w];
            for (dy, mut out_row) in band.outer_iter_mut().enumerate() {
                let y = ci * chunk + dy;
                src.get_row(0, y, w, &mut row);
                for x in 0..w {
                    out_row[x] = f(x, y, row[x]);
                }
            }
        });
    dst.set_packed(&out);
    dst
}

/// Adds configured deltas to hue, saturation and brightness. Hue wraps
/// modulo one full turn; saturation and brightness clamp to `[0, 1]`.
/// Alpha passes through bit-for-bit.
#[derive(Clone, Copy, Debug, Default)]
pub struct HsbAdjustFilter {
    h_factor: f32,
    s_factor: f32,
    b_factor: f32,
}

impl HsbAdjustFilter {
    pub fn new(h_factor: f32, s_factor: f32, b_factor: f32) -> HsbAdjustFilter {
        HsbAdjustFilter {
            h_factor,
            s_factor,
            b_factor,
        }
    }

    pub fn set_h_factor(&mut self, h_factor: f32) {
        self.h_factor = h_factor;
    }

    pub fn set_s_factor(&mut self, s_factor: f32) {
        self.s_factor = s_factor;
    }

    pub fn set_b_factor(&mut self, b_factor: f32) {
        self.b_factor = b_factor;
    }
}

impl Filter for HsbAdjustFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            let a = rgb & 0xff00_0000;
            let (mut hue, mut sat, mut bri) = rgb_to_hsb(
                ((rgb >> 16) & 0xff) as i32,
                ((rgb >> 8) & 0xff) as i32,
                (rgb & 0xff) as i32,
            );
            hue += self.h_factor;
            hue -= hue.floor();
            sat = (sat + self.s_factor).clamp(0.0, 1.0);
            bri = (bri + self.b_factor).clamp(0.0, 1.0);
            a | hsb_to_rgb(hue, sat, bri)
        })
    }
}

/// Inverts the RGB channels; alpha is preserved.
#[derive(Clone, Copy, Debug, Default)]
pub struct InvertFilter;

impl Filter for InvertFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            (rgb & 0xff00_0000) | (!rgb & 0x00ff_ffff)
        })
    }
}

/// Tints towards sepia by pushing red up and blue down around the
/// per-pixel channel average.
#[derive(Clone, Copy, Debug)]
pub struct SepiaFilter {
    amount: i32,
}

impl SepiaFilter {
    pub fn new(amount: i32) -> SepiaFilter {
        SepiaFilter { amount }
    }

    pub fn set_amount(&mut self, amount: i32) {
        self.amount = amount;
    }
}

impl Default for SepiaFilter {
    fn default() -> Self {
        SepiaFilter::new(30)
    }
}

impl Filter for SepiaFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            let a = rgb & 0xff00_0000;
            let r = ((rgb >> 16) & 0xff) as i32;
            let g = ((rgb >> 8) & 0xff) as i32;
            let b = (rgb & 0xff) as i32;
            let average = (r + g + b) / 3;
            let red = clamp8(average + self.amount) as u32;
            let green = average as u32;
            let blue = clamp8(average - self.amount) as u32;
            a | (red << 16) | (green << 8) | blue
        })
    }
}

/// Suppresses strongly red pixels, pulling them towards the green/blue
/// average.
#[derive(Clone, Copy, Debug, Default)]
pub struct RedEyeFilter;

impl Filter for RedEyeFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            let a = rgb & 0xff00_0000;
            let mut r = ((rgb >> 16) & 0xff) as i32;
            let mut g = ((rgb >> 8) & 0xff) as i32;
            let mut b = (rgb & 0xff) as i32;
            if r > g * 3 || r > b * 3 {
                r = (g + b) / 2;
            } else if r > g * 2 && r > b * 2 {
                r = (g + b) / 2;
                g = g * 3 / 2;
                b = b * 3 / 2;
            }
            a | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
        })
    }
}

/// Replaces the alpha channel with a fixed value.
#[derive(Clone, Copy, Debug)]
pub struct OpacityFilter {
    opacity: u32,
}

impl OpacityFilter {
    /// `opacity` in 0..=255.
    pub fn new(opacity: u32) -> OpacityFilter {
        OpacityFilter {
            opacity: opacity.min(255),
        }
    }

    pub fn set_opacity(&mut self, opacity: u32) {
        self.opacity = opacity.min(255);
    }
}

impl Filter for OpacityFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            (rgb & 0x00ff_ffff) | (self.opacity << 24)
        })
    }
}

/// Bitwise-ANDs every pixel with a 32-bit mask.
#[derive(Clone, Copy, Debug)]
pub struct MaskFilter {
    mask: u32,
}

impl MaskFilter {
    pub fn new(mask: u32) -> MaskFilter {
        MaskFilter { mask }
    }

    pub fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }
}

impl Filter for MaskFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| rgb & self.mask)
    }
}

/// Scales the colour channels by alpha/255, leaving alpha itself alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct PremultiplyFilter;

impl Filter for PremultiplyFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            let a = (rgb >> 24) & 0xff;
            let f = a as f32 * (1.0 / 255.0);
            let r = (((rgb >> 16) & 0xff) as f32 * f) as u32;
            let g = (((rgb >> 8) & 0xff) as f32 * f) as u32;
            let b = ((rgb & 0xff) as f32 * f) as u32;
            (a << 24) | (r << 16) | (g << 8) | b
        })
    }
}

/// Scales each channel relative to its own value: a factor of `0.0` leaves
/// the channel alone, `1.0` doubles it, `-1.0` zeroes it.
#[derive(Clone, Copy, Debug, Default)]
pub struct RgbAdjustFilter {
    r_factor: f32,
    g_factor: f32,
    b_factor: f32,
}

impl RgbAdjustFilter {
    pub fn new(r_factor: f32, g_factor: f32, b_factor: f32) -> RgbAdjustFilter {
        RgbAdjustFilter {
            r_factor,
            g_factor,
            b_factor,
        }
    }

    pub fn set_factors(&mut self, r_factor: f32, g_factor: f32, b_factor: f32) {
        self.r_factor = r_factor;
        self.g_factor = g_factor;
        self.b_factor = b_factor;
    }
}

impl Filter for RgbAdjustFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            let a = rgb & 0xff00_0000;
            let r = ((rgb >> 16) & 0xff) as f32;
            let g = ((rgb >> 8) & 0xff) as f32;
            let b = (rgb & 0xff) as f32;
            let r = clamp8((r * (1.0 + self.r_factor)) as i32) as u32;
            let g = clamp8((g * (1.0 + self.g_factor)) as i32) as u32;
            let b = clamp8((b * (1.0 + self.b_factor)) as i32) as u32;
            a | (r << 16) | (g << 8) | b
        })
    }
}

/// Multiplies every colour channel by a scalar and clamps.
#[derive(Clone, Copy, Debug)]
pub struct RescaleFilter {
    scale: f32,
}

impl RescaleFilter {
    pub fn new(scale: f32) -> RescaleFilter {
        RescaleFilter { scale }
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }
}

impl Default for RescaleFilter {
    fn default() -> Self {
        RescaleFilter::new(1.0)
    }
}

impl Filter for RescaleFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            let a = rgb & 0xff00_0000;
            let r = clamp8((((rgb >> 16) & 0xff) as f32 * self.scale) as i32) as u32;
            let g = clamp8((((rgb >> 8) & 0xff) as f32 * self.scale) as i32) as u32;
            let b = clamp8(((rgb & 0xff) as f32 * self.scale) as i32) as u32;
            a | (r << 16) | (g << 8) | b
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::PixelFormat;

    fn packed_3x3_gradient() -> Raster {
        // Pixel (x, y) = ARGB (0xff, x * 80, y * 80, 0).
        let mut data = Vec::new();
        for y in 0..3u32 {
            for x in 0..3u32 {
                data.push(0xff00_0000 | (x * 80) << 16 | (y * 80) << 8);
            }
        }
        Raster::from_packed(3, 3, true, data).unwrap()
    }

    #[test]
    fn test_invert_gradient() {
        let src = packed_3x3_gradient();
        let out = InvertFilter.filter(&src, None);
        for y in 0..3 {
            for x in 0..3 {
                let p = out.pixel(x, y);
                assert_eq!((p >> 24) & 0xff, 0xff);
                assert_eq!((p >> 16) & 0xff, 255 - 80 * x as u32);
                assert_eq!((p >> 8) & 0xff, 255 - 80 * y as u32);
                assert_eq!(p & 0xff, 255);
            }
        }
    }

    #[test]
    fn test_invert_is_involution() {
        let src = packed_3x3_gradient();
        let once = InvertFilter.filter(&src, None);
        let twice = InvertFilter.filter(&once, None);
        assert_eq!(twice.to_packed(), src.to_packed());
    }

    #[test]
    fn test_sepia_splits_around_average() {
        let src = Raster::from_packed(1, 1, true, vec![0xff_60_60_60]).unwrap();
        let out = SepiaFilter::new(30).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_7e_60_42);
    }

    #[test]
    fn test_red_eye_strong_red() {
        // r > 3g and r > 3b: red collapses to the g/b average.
        let src = Raster::from_packed(1, 1, true, vec![0xff_c8_20_10]).unwrap();
        let out = RedEyeFilter.filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_18_20_10);
    }

    #[test]
    fn test_red_eye_moderate_red_boosts_gb() {
        // 2g < r < 3g: green and blue are boosted by half.
        let src = Raster::from_packed(1, 1, true, vec![0xff_64_28_28]).unwrap();
        let out = RedEyeFilter.filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_28_3c_3c);
    }

    #[test]
    fn test_opacity_replaces_alpha_only() {
        let src = Raster::from_packed(1, 1, true, vec![0xff_11_22_33]).unwrap();
        let out = OpacityFilter::new(0x40).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0x40_11_22_33);
    }

    #[test]
    fn test_mask_ands_word() {
        let src = Raster::from_packed(1, 1, true, vec![0xff_ff_ff_ff]).unwrap();
        let out = MaskFilter::new(0xff_00ff00).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_00_ff_00);
    }

    #[test]
    fn test_premultiply_scales_by_alpha() {
        let src = Raster::from_packed(1, 1, true, vec![0x80_ff_80_00]).unwrap();
        let out = PremultiplyFilter.filter(&src, None);
        let p = out.pixel(0, 0);
        assert_eq!((p >> 24) & 0xff, 0x80);
        assert_eq!((p >> 16) & 0xff, 0x80);
        assert_eq!((p >> 8) & 0xff, 0x40);
        assert_eq!(p & 0xff, 0);
    }

    #[test]
    fn test_rgb_adjust_doubles_and_zeroes() {
        let src = Raster::from_packed(1, 1, true, vec![0xff_40_40_40]).unwrap();
        let out = RgbAdjustFilter::new(1.0, 0.0, -1.0).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_80_40_00);
    }

    #[test]
    fn test_rescale_clamps() {
        let src = Raster::from_packed(1, 1, true, vec![0xff_80_80_80]).unwrap();
        let out = RescaleFilter::new(4.0).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_ff_ff_ff);
    }

    #[test]
    fn test_hsb_zero_deltas_is_identity() {
        let src = Raster::from_packed(1, 1, true, vec![0xff_c8_64_32]).unwrap();
        let out = HsbAdjustFilter::new(0.0, 0.0, 0.0).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_c8_64_32);
    }

    #[test]
    fn test_hsb_brightness_clamps() {
        let src = Raster::from_packed(1, 1, true, vec![0xff_80_80_80]).unwrap();
        let out = HsbAdjustFilter::new(0.0, 0.0, 10.0).filter(&src, None);
        assert_eq!(out.pixel(0, 0), 0xff_ff_ff_ff);
    }

    #[test]
    fn test_point_filter_preserves_gray_format() {
        let src = Raster::from_bytes(2, 1, PixelFormat::Gray8, vec![100, 200]).unwrap();
        let out = InvertFilter.filter(&src, None);
        assert_eq!(out.format(), PixelFormat::Gray8);
        assert_eq!(out.pixel(0, 0), 0xff9b9b9b);
        assert_eq!(out.pixel(1, 0), 0xff373737);
    }
}
