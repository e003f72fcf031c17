//! The uniform filter interface and its pixel-format dispatch.

use log::debug;

use crate::raster::{PixelFormat, Raster};

/// Sampling rule for coordinates outside the image rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeMode {
    /// Treat pixels off the edge as transparent black.
    Zero,
    /// Snap to the nearest edge pixel.
    Clamp,
    /// Wrap to the opposite edge.
    Wrap,
}

/// A configured image operation. The entry point is [`Filter::filter`],
/// which inspects the source format and routes to the per-format methods.
///
/// Implementations override the paths they support; the defaults pass the
/// source through unchanged, which is also the documented behaviour for
/// unrecognised formats.
pub trait Filter {
    /// Whether the filter has a native grey (8-bit) path.
    fn gray_supported(&self) -> bool {
        false
    }

    /// Whether the filter has a native CMYK (4x8-bit) path.
    fn cmyk_supported(&self) -> bool {
        false
    }

    /// Run the filter. If `dst` is supplied it must match the source's
    /// pixel format; otherwise the pipeline treats the pair as unknown and
    /// falls back to the packed RGB path.
    fn filter(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        let mut format = src.format();
        if let Some(d) = &dst {
            if d.format() != format {
                debug!(
                    "destination format {:?} does not match source {:?}; treating as unknown",
                    d.format(),
                    format
                );
                format = PixelFormat::Unknown;
            }
        }
        match format {
            PixelFormat::Gray8 | PixelFormat::GrayAlpha8 if self.gray_supported() => {
                self.filter_gray8(src, dst)
            }
            PixelFormat::Cmyk8 if self.cmyk_supported() => self.filter_cmyk32(src, dst),
            _ => self.filter_rgb32(src, dst),
        }
    }

    /// The packed RGB path. Accessors widen narrower formats on read and
    /// narrow them on write, so this path handles every format.
    fn filter_rgb32(&self, src: &Raster, _dst: Option<Raster>) -> Raster {
        debug!("default filter_rgb32: returning source unchanged");
        src.clone()
    }

    /// The native grey path.
    fn filter_gray8(&self, src: &Raster, _dst: Option<Raster>) -> Raster {
        debug!("default filter_gray8: returning source unchanged");
        src.clone()
    }

    /// The native CMYK path. CMYK words are carried as four packed bytes,
    /// so this typically delegates to [`Filter::filter_rgb32`].
    fn filter_cmyk32(&self, src: &Raster, _dst: Option<Raster>) -> Raster {
        debug!("default filter_cmyk32: returning source unchanged");
        src.clone()
    }
}
