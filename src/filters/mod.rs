//! The filter library.
//!
//! Three families share the execution substrate:
//!
//! - **Point filters** rewrite pixels independently ([`point`],
//!   [`transfer`]).
//! - **Convolution filters** accumulate weighted neighbourhoods
//!   ([`convolve`], [`gaussian`], [`boxblur`]).
//! - **Transform filters** inverse-map destination coordinates into the
//!   source ([`transform`], [`curl`], [`flip`], [`seam`], [`crop`],
//!   [`resize`]).

pub mod boxblur;
pub mod convolve;
pub mod crop;
pub mod curl;
pub mod flip;
pub mod gaussian;
pub mod point;
pub mod resize;
pub mod seam;
pub mod transfer;
pub mod transform;

pub use boxblur::BoxBlurFilter;
pub use convolve::ConvolveFilter;
pub use crop::{CropFilter, IdentityFilter};
pub use curl::CurlFilter;
pub use flip::{FlipFilter, FlipOperation};
pub use gaussian::{GaussianFilter, GlowFilter, UnsharpFilter};
pub use point::{
    HsbAdjustFilter, InvertFilter, MaskFilter, OpacityFilter, PremultiplyFilter, RedEyeFilter,
    RescaleFilter, RgbAdjustFilter, SepiaFilter,
};
pub use resize::{ColorSpaceAdapter, PassThroughAdapter, ResizeFilter, ResizeMode};
pub use seam::SeamCarvingFilter;
pub use transfer::TransferFilter;
pub use transform::{
    Interpolation, MapFilter, OffsetFilter, Rect, RotateFilter, ShearFilter, StraightenFilter,
    TwirlFilter, WaterFilter,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::raster::{PixelFormat, Raster};

    fn rasters_of_every_format() -> Vec<Raster> {
        let mut rasters = vec![Raster::packed(4, 4, true).unwrap()];
        for format in [
            PixelFormat::Gray8,
            PixelFormat::GrayAlpha8,
            PixelFormat::Rgb24,
            PixelFormat::Argb8,
            PixelFormat::Cmyk8,
        ] {
            rasters.push(Raster::planar(4, 4, format).unwrap());
        }
        for (i, r) in rasters.iter_mut().enumerate() {
            let seed = 0xff00_0000 | (i as u32 + 1) * 0x0b1621;
            for y in 0..4 {
                r.set_row(0, y, 4, &[seed, seed ^ 0xffffff, seed >> 1, seed | 0x7f]);
            }
        }
        rasters
    }

    #[test]
    fn test_filters_preserve_pixel_format() {
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(InvertFilter),
            Box::new(TransferFilter::exposure(1.3)),
            Box::new(ConvolveFilter::average()),
            Box::new(GaussianFilter::new(1.0)),
            Box::new(BoxBlurFilter::new(1.0, 1.0, 1)),
            Box::new(TwirlFilter::new(0.5, 0.5, 0.5, 2.0)),
            Box::new(OffsetFilter::new(1, 1, true)),
            Box::new(IdentityFilter),
        ];
        for src in rasters_of_every_format() {
            for filter in &filters {
                let out = filter.filter(&src, None);
                assert_eq!(out.format(), src.format());
                assert_eq!((out.width(), out.height()), (4, 4));
            }
        }
    }

    #[test]
    fn test_dimension_changing_filters_keep_format() {
        for src in rasters_of_every_format() {
            let cropped = CropFilter::new(1, 1, 2, 2).filter(&src, None);
            assert_eq!(cropped.format(), src.format());
            assert_eq!((cropped.width(), cropped.height()), (2, 2));

            let rotated = FlipFilter::new(FlipOperation::Rotate90Cw).filter(&src, None);
            assert_eq!(rotated.format(), src.format());
        }
    }
}
