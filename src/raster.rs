//! The raster abstraction: typed pixel buffers with per-format row access.
//!
//! A [`Raster`] owns a rectangular pixel buffer in one of the supported
//! layouts. Filters read and write rows through the accessors below, which
//! widen every format to packed `AARRGGBB` words on read and narrow them
//! back on write. That keeps the filter kernels format-agnostic: they all
//! run on packed 32-bit pixels and only the accessors know the layout.
//!
//! ## Supported Formats
//!
//! | Format | Storage | Widening rule |
//! |--------|---------|---------------|
//! | Rgb32 | one `u32` word per pixel | copied verbatim |
//! | Gray8 | one byte per pixel | `0xFF << 24 \| v<<16 \| v<<8 \| v` |
//! | GrayAlpha8 | `[gray, alpha]` bytes | `a<<24 \| v<<16 \| v<<8 \| v` |
//! | Rgb24 | `[r, g, b]` bytes | packed into the low 24 bits |
//! | Argb8 | `[a, r, g, b]` bytes | packed into all 32 bits |
//! | Cmyk8 | `[c, m, y, k]` bytes | packed into all 32 bits |
//!
//! Narrowing to Gray8 stores the unweighted mean of R, G and B rounded to
//! nearest, matching the behaviour of the editor's grey destinations.

use ndarray::Array2;

use crate::error::{Error, Result};

/// Pixel layout tag of a raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed RGB or ARGB words, one `u32` per pixel.
    Rgb32,
    /// Planar grey, one byte per pixel.
    Gray8,
    /// Grey plus alpha, two bytes per pixel.
    GrayAlpha8,
    /// Interleaved RGB, three bytes per pixel.
    Rgb24,
    /// Interleaved ARGB, four bytes per pixel.
    Argb8,
    /// Interleaved CMYK, four bytes per pixel.
    Cmyk8,
    /// Unrecognised layout; only produced by dispatch, never stored.
    Unknown,
}

impl PixelFormat {
    /// Bytes per pixel for the byte-backed formats, words for Rgb32.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb32 | PixelFormat::Gray8 => 1,
            PixelFormat::GrayAlpha8 => 2,
            PixelFormat::Rgb24 => 3,
            PixelFormat::Argb8 | PixelFormat::Cmyk8 => 4,
            PixelFormat::Unknown => 0,
        }
    }

    /// Whether the layout carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::GrayAlpha8 | PixelFormat::Argb8)
    }

    fn is_bytes(self) -> bool {
        !matches!(self, PixelFormat::Rgb32 | PixelFormat::Unknown)
    }
}

/// Opaque colour-space tag, forwarded to the host's colour-management
/// collaborator. The filter core never interprets `Tagged` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorTag {
    SRgb,
    SGray,
    Tagged(u32),
}

#[derive(Clone, Debug)]
enum Pixels {
    Packed(Vec<u32>),
    Bytes(Vec<u8>),
}

/// An owned rectangular pixel buffer.
#[derive(Clone, Debug)]
pub struct Raster {
    width: usize,
    height: usize,
    format: PixelFormat,
    alpha: bool,
    premultiplied: bool,
    color: ColorTag,
    data: Pixels,
}

const INV3: f32 = 1.0 / 3.0;

#[inline]
fn gray_of(rgb: u32) -> u8 {
    let sum = ((rgb >> 16) & 0xff) + ((rgb >> 8) & 0xff) + (rgb & 0xff);
    (sum as f32 * INV3 + 0.5) as u8
}

impl Raster {
    fn check_dims(width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyRaster { width, height });
        }
        Ok(())
    }

    /// A zeroed packed raster. `alpha` records whether the colour model
    /// carries an alpha channel in the high byte.
    pub fn packed(width: usize, height: usize, alpha: bool) -> Result<Raster> {
        Self::check_dims(width, height)?;
        Ok(Raster {
            width,
            height,
            format: PixelFormat::Rgb32,
            alpha,
            premultiplied: false,
            color: ColorTag::SRgb,
            data: Pixels::Packed(vec![0; width * height]),
        })
    }

    /// A zeroed byte-backed raster of the given format.
    pub fn planar(width: usize, height: usize, format: PixelFormat) -> Result<Raster> {
        Self::check_dims(width, height)?;
        if !format.is_bytes() {
            return Err(Error::FormatMismatch("byte formats only"));
        }
        let color = match format {
            PixelFormat::Gray8 | PixelFormat::GrayAlpha8 => ColorTag::SGray,
            _ => ColorTag::SRgb,
        };
        Ok(Raster {
            width,
            height,
            format,
            alpha: format.has_alpha(),
            premultiplied: false,
            color,
            data: Pixels::Bytes(vec![0; width * height * format.channels()]),
        })
    }

    /// Wrap an existing packed buffer.
    pub fn from_packed(width: usize, height: usize, alpha: bool, data: Vec<u32>) -> Result<Raster> {
        Self::check_dims(width, height)?;
        let expected = width * height;
        if data.len() != expected {
            return Err(Error::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        let mut r = Raster::packed(width, height, alpha)?;
        r.data = Pixels::Packed(data);
        Ok(r)
    }

    /// Wrap an existing byte buffer of the given format.
    pub fn from_bytes(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Raster> {
        let mut r = Raster::planar(width, height, format)?;
        let expected = width * height * format.channels();
        if data.len() != expected {
            return Err(Error::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        r.data = Pixels::Bytes(data);
        Ok(r)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Whether the colour model carries alpha.
    pub fn has_alpha(&self) -> bool {
        self.alpha
    }

    pub fn is_premultiplied(&self) -> bool {
        self.premultiplied
    }

    pub fn set_premultiplied(&mut self, premultiplied: bool) {
        self.premultiplied = premultiplied;
    }

    pub fn color_tag(&self) -> ColorTag {
        self.color
    }

    pub fn set_color_tag(&mut self, color: ColorTag) {
        self.color = color;
    }

    /// A zeroed raster with the same format, alpha and colour tag as `self`
    /// but the given dimensions. Degenerate dimensions snap to one pixel.
    pub fn compatible(&self, width: usize, height: usize) -> Raster {
        let width = width.max(1);
        let height = height.max(1);
        let data = match self.data {
            Pixels::Packed(_) => Pixels::Packed(vec![0; width * height]),
            Pixels::Bytes(_) => Pixels::Bytes(vec![0; width * height * self.format.channels()]),
        };
        Raster {
            width,
            height,
            format: self.format,
            alpha: self.alpha,
            premultiplied: self.premultiplied,
            color: self.color,
            data,
        }
    }

    /// Read `w` pixels starting at `(x, y)` as packed ARGB words.
    pub fn get_row(&self, x: usize, y: usize, w: usize, out: &mut [u32]) {
        debug_assert!(x + w <= self.width && y < self.height);
        match (&self.data, self.format) {
            (Pixels::Packed(px), _) => {
                let start = y * self.width + x;
                out[..w].copy_from_slice(&px[start..start + w]);
            }
            (Pixels::Bytes(bytes), PixelFormat::Gray8) => {
                let start = y * self.width + x;
                for (o, &v) in out[..w].iter_mut().zip(&bytes[start..start + w]) {
                    *o = 0xff00_0000 | u32::from(v) * 0x0001_0101;
                }
            }
            (Pixels::Bytes(bytes), PixelFormat::GrayAlpha8) => {
                let start = (y * self.width + x) * 2;
                for (o, px) in out[..w].iter_mut().zip(bytes[start..start + w * 2].chunks(2)) {
                    let v = u32::from(px[0]);
                    *o = u32::from(px[1]) << 24 | v * 0x0001_0101;
                }
            }
            (Pixels::Bytes(bytes), PixelFormat::Rgb24) => {
                let start = (y * self.width + x) * 3;
                for (o, px) in out[..w].iter_mut().zip(bytes[start..start + w * 3].chunks(3)) {
                    *o = u32::from(px[0]) << 16 | u32::from(px[1]) << 8 | u32::from(px[2]);
                }
            }
            (Pixels::Bytes(bytes), _) => {
                let start = (y * self.width + x) * 4;
                for (o, px) in out[..w].iter_mut().zip(bytes[start..start + w * 4].chunks(4)) {
                    *o = u32::from(px[0]) << 24
                        | u32::from(px[1]) << 16
                        | u32::from(px[2]) << 8
                        | u32::from(px[3]);
                }
            }
        }
    }

    /// Write `w` packed ARGB words starting at `(x, y)`, narrowing to the
    /// raster's own format.
    pub fn set_row(&mut self, x: usize, y: usize, w: usize, px: &[u32]) {
        debug_assert!(x + w <= self.width && y < self.height);
        let width = self.width;
        match (&mut self.data, self.format) {
            (Pixels::Packed(buf), _) => {
                let start = y * width + x;
                buf[start..start + w].copy_from_slice(&px[..w]);
            }
            (Pixels::Bytes(buf), PixelFormat::Gray8) => {
                let start = y * width + x;
                for (o, &rgb) in buf[start..start + w].iter_mut().zip(&px[..w]) {
                    *o = gray_of(rgb);
                }
            }
            (Pixels::Bytes(buf), PixelFormat::GrayAlpha8) => {
                let start = (y * width + x) * 2;
                for (o, &rgb) in buf[start..start + w * 2].chunks_mut(2).zip(&px[..w]) {
                    o[0] = gray_of(rgb);
                    o[1] = (rgb >> 24) as u8;
                }
            }
            (Pixels::Bytes(buf), PixelFormat::Rgb24) => {
                let start = (y * width + x) * 3;
                for (o, &rgb) in buf[start..start + w * 3].chunks_mut(3).zip(&px[..w]) {
                    o[0] = (rgb >> 16) as u8;
                    o[1] = (rgb >> 8) as u8;
                    o[2] = rgb as u8;
                }
            }
            (Pixels::Bytes(buf), _) => {
                let start = (y * width + x) * 4;
                for (o, &rgb) in buf[start..start + w * 4].chunks_mut(4).zip(&px[..w]) {
                    o[0] = (rgb >> 24) as u8;
                    o[1] = (rgb >> 16) as u8;
                    o[2] = (rgb >> 8) as u8;
                    o[3] = rgb as u8;
                }
            }
        }
    }

    /// Read `h` pixels of the column at `x` starting at row `y`.
    pub fn get_col(&self, x: usize, y: usize, h: usize, out: &mut [u32]) {
        debug_assert!(x < self.width && y + h <= self.height);
        let mut one = [0u32; 1];
        for (i, o) in out[..h].iter_mut().enumerate() {
            self.get_row(x, y + i, 1, &mut one);
            *o = one[0];
        }
    }

    /// Write `h` packed pixels down the column at `x` starting at row `y`.
    pub fn set_col(&mut self, x: usize, y: usize, h: usize, px: &[u32]) {
        debug_assert!(x < self.width && y + h <= self.height);
        for (i, &p) in px[..h].iter().enumerate() {
            self.set_row(x, y + i, 1, &[p]);
        }
    }

    /// Single widened pixel; mainly useful in tests and diagnostics.
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        let mut one = [0u32; 1];
        self.get_row(x, y, 1, &mut one);
        one[0]
    }

    /// The whole image widened to packed ARGB, laid out `(height, width)`.
    pub fn to_packed(&self) -> Array2<u32> {
        let mut v = vec![0u32; self.width * self.height];
        for (y, row) in v.chunks_mut(self.width).enumerate() {
            self.get_row(0, y, self.width, row);
        }
        Array2::from_shape_vec((self.height, self.width), v)
            .expect("pixel buffer matches raster dimensions")
    }

    /// Narrow a full packed image back into this raster. Dimensions must
    /// match; mismatched writes are ignored with a log line.
    pub fn set_packed(&mut self, px: &Array2<u32>) {
        let (h, w) = px.dim();
        if h != self.height || w != self.width {
            log::warn!(
                "set_packed: {}x{} buffer does not fit {}x{} raster",
                w,
                h,
                self.width,
                self.height
            );
            return;
        }
        if let Pixels::Packed(buf) = &mut self.data {
            if let Some(s) = px.as_slice() {
                buf.copy_from_slice(s);
                return;
            }
        }
        for (y, row) in px.outer_iter().enumerate() {
            let row = row.as_slice().expect("packed rows are contiguous");
            self.set_row(0, y, w, row);
        }
    }

    /// Copy of the grey plane for a Gray8 raster, `(height, width)`.
    /// Returns `None` for every other format.
    pub fn gray_plane(&self) -> Option<Array2<u8>> {
        if self.format != PixelFormat::Gray8 {
            return None;
        }
        match &self.data {
            Pixels::Bytes(bytes) => Some(
                Array2::from_shape_vec((self.height, self.width), bytes.clone())
                    .expect("gray buffer matches raster dimensions"),
            ),
            Pixels::Packed(_) => None,
        }
    }

    /// Store a full grey plane into a Gray8 raster. Other formats and
    /// mismatched dimensions are ignored with a log line.
    pub fn set_gray_plane(&mut self, plane: &Array2<u8>) {
        let (h, w) = plane.dim();
        if self.format != PixelFormat::Gray8 || h != self.height || w != self.width {
            log::warn!("set_gray_plane: incompatible target raster");
            return;
        }
        if let Pixels::Bytes(buf) = &mut self.data {
            for (dst, src) in buf.chunks_mut(w).zip(plane.outer_iter()) {
                dst.copy_from_slice(src.as_slice().expect("gray rows are contiguous"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray8_widens_with_opaque_alpha() {
        let r = Raster::from_bytes(2, 1, PixelFormat::Gray8, vec![10, 200]).unwrap();
        assert_eq!(r.pixel(0, 0), 0xff0a0a0a);
        assert_eq!(r.pixel(1, 0), 0xffc8c8c8);
    }

    #[test]
    fn test_gray8_narrow_takes_rounded_mean() {
        let mut r = Raster::planar(1, 1, PixelFormat::Gray8).unwrap();
        r.set_row(0, 0, 1, &[0xff_0a_0b_0c]);
        // (10 + 11 + 12) / 3 = 11
        assert_eq!(r.pixel(0, 0), 0xff0b0b0b);
        r.set_row(0, 0, 1, &[0xff_00_00_01]);
        // 1/3 rounds to 0
        assert_eq!(r.pixel(0, 0), 0xff000000);
    }

    #[test]
    fn test_rgb24_has_no_alpha_bits() {
        let r = Raster::from_bytes(1, 1, PixelFormat::Rgb24, vec![1, 2, 3]).unwrap();
        assert_eq!(r.pixel(0, 0), 0x00010203);
        assert!(!r.has_alpha());
    }

    #[test]
    fn test_argb8_roundtrip() {
        let mut r = Raster::planar(2, 2, PixelFormat::Argb8).unwrap();
        r.set_row(0, 1, 2, &[0x01020304, 0xfffefdfc]);
        let mut row = [0u32; 2];
        r.get_row(0, 1, 2, &mut row);
        assert_eq!(row, [0x01020304, 0xfffefdfc]);
    }

    #[test]
    fn test_gray_alpha_preserves_alpha() {
        let mut r = Raster::planar(1, 1, PixelFormat::GrayAlpha8).unwrap();
        r.set_row(0, 0, 1, &[0x80_64_64_64]);
        assert_eq!(r.pixel(0, 0), 0x80646464);
        assert!(r.has_alpha());
    }

    #[test]
    fn test_from_packed_rejects_bad_length() {
        assert!(matches!(
            Raster::from_packed(2, 2, true, vec![0; 3]),
            Err(Error::BufferSize { expected: 4, .. })
        ));
    }

    #[test]
    fn test_empty_raster_rejected() {
        assert!(Raster::packed(0, 4, true).is_err());
        assert!(Raster::planar(4, 0, PixelFormat::Gray8).is_err());
    }

    #[test]
    fn test_to_packed_set_packed_roundtrip() {
        let data: Vec<u32> = (0..12).map(|i| 0xff000000 | i).collect();
        let r = Raster::from_packed(4, 3, true, data.clone()).unwrap();
        let arr = r.to_packed();
        let mut copy = r.compatible(4, 3);
        copy.set_packed(&arr);
        assert_eq!(copy.to_packed(), arr);
    }

    #[test]
    fn test_columns_match_rows() {
        let data: Vec<u32> = (0..6).collect();
        let r = Raster::from_packed(2, 3, false, data).unwrap();
        let mut col = [0u32; 3];
        r.get_col(1, 0, 3, &mut col);
        assert_eq!(col, [1, 3, 5]);
    }
}
