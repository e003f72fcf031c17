//! Cropping and the identity pass-through.

use crate::filter::Filter;
use crate::raster::{PixelFormat, Raster};

/// Copies a sub-rectangle of the source. An origin past the image snaps
/// back to zero; an oversized or non-positive extent truncates to the
/// remainder of the image.
#[derive(Clone, Copy, Debug)]
pub struct CropFilter {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl CropFilter {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> CropFilter {
        CropFilter {
            x,
            y,
            width,
            height,
        }
    }

    pub fn set_origin(&mut self, x: usize, y: usize) {
        self.x = x;
        self.y = y;
    }

    pub fn set_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    /// Clamp the configured rectangle against the source dimensions.
    fn clip(&self, sw: usize, sh: usize) -> (usize, usize, usize, usize) {
        let x = if self.x >= sw { 0 } else { self.x };
        let y = if self.y >= sh { 0 } else { self.y };
        let mut w = self.width.min(sw - x);
        let mut h = self.height.min(sh - y);
        if w == 0 {
            w = sw - x;
        }
        if h == 0 {
            h = sh - y;
        }
        (x, y, w, h)
    }
}

impl Default for CropFilter {
    fn default() -> Self {
        CropFilter::new(0, 0, 32, 32)
    }
}

impl Filter for CropFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }

    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let (x, y, w, h) = self.clip(src.width(), src.height());
        let mut dst = match dst {
            Some(d) if d.width() == w && d.height() == h => d,
            _ => src.compatible(w, h),
        };
        let mut row = vec![0u32; w];
        for i in 0..h {
            src.get_row(x, y + i, w, &mut row);
            dst.set_row(0, i, w, &row);
        }
        dst
    }

    fn filter_gray8(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let plane = match src.gray_plane() {
            Some(p) => p,
            None => return self.filter_rgb32(src, dst),
        };
        let (x, y, w, h) = self.clip(src.width(), src.height());
        let mut dst = match dst {
            Some(d)
                if d.format() == PixelFormat::Gray8 && d.width() == w && d.height() == h =>
            {
                d
            }
            _ => src.compatible(w, h),
        };
        let region = plane.slice(ndarray::s![y..y + h, x..x + w]).to_owned();
        dst.set_gray_plane(&region);
        dst
    }

    fn filter_cmyk32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        self.filter_rgb32(src, dst)
    }
}

/// Returns the source unchanged on every path.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityFilter;

impl Filter for IdentityFilter {
    fn gray_supported(&self) -> bool {
        true
    }

    fn cmyk_supported(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_4x3() -> Raster {
        let data: Vec<u32> = (0..12).map(|i| 0xff000000 | i).collect();
        Raster::from_packed(4, 3, true, data).unwrap()
    }

    #[test]
    fn test_basic_crop() {
        let src = raster_4x3();
        let out = CropFilter::new(1, 1, 2, 2).filter(&src, None);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.pixel(0, 0), src.pixel(1, 1));
        assert_eq!(out.pixel(1, 1), src.pixel(2, 2));
    }

    #[test]
    fn test_origin_past_image_snaps_to_zero() {
        let src = raster_4x3();
        let out = CropFilter::new(10, 10, 2, 2).filter(&src, None);
        assert_eq!(out.pixel(0, 0), src.pixel(0, 0));
    }

    #[test]
    fn test_oversized_extent_truncates() {
        let src = raster_4x3();
        let out = CropFilter::new(2, 1, 100, 100).filter(&src, None);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.pixel(0, 0), src.pixel(2, 1));
    }

    #[test]
    fn test_zero_extent_takes_remainder() {
        let src = raster_4x3();
        let out = CropFilter::new(1, 0, 0, 0).filter(&src, None);
        assert_eq!((out.width(), out.height()), (3, 3));
    }

    #[test]
    fn test_gray_crop() {
        let src = Raster::from_bytes(
            3,
            2,
            PixelFormat::Gray8,
            vec![1, 2, 3, 4, 5, 6],
        )
        .unwrap();
        let out = CropFilter::new(1, 0, 2, 2).filter(&src, None);
        assert_eq!(out.format(), PixelFormat::Gray8);
        assert_eq!(out.pixel(0, 0) & 0xff, 2);
        assert_eq!(out.pixel(1, 1) & 0xff, 6);
    }

    #[test]
    fn test_identity_returns_source() {
        let src = raster_4x3();
        let out = IdentityFilter.filter(&src, None);
        assert_eq!(out.to_packed(), src.to_packed());
    }
}
