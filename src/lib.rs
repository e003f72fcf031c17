//! rasterkit: the CPU filter core of a desktop image editor.
//!
//! The crate transforms typed raster images through a uniform pipeline:
//! a filter value is configured with scalar parameters, handed a source
//! [`Raster`] (and optionally a destination), and returns the filtered
//! raster. Pixel-format dispatch, row widening/narrowing and the parallel
//! execution substrate are shared by every filter.
//!
//! ## Layout
//!
//! - [`raster`] — typed pixel buffers and per-format row accessors
//! - [`filter`] — the `filter(src, dst)` entry point and format dispatch
//! - [`exec`] — work partitioning over the process-wide thread pool
//! - [`kernel`], [`math`] — convolution kernels and packed-pixel math
//! - [`filters`] — the point, convolution and transform filter families
//!
//! ## Example
//!
//! ```
//! use rasterkit::{Filter, Raster};
//! use rasterkit::filters::GaussianFilter;
//!
//! let src = Raster::from_packed(2, 2, true, vec![0xff336699; 4]).unwrap();
//! let blurred = GaussianFilter::new(1.5).filter(&src, None);
//! assert_eq!(blurred.width(), 2);
//! ```

pub mod error;
pub mod exec;
pub mod filter;
pub mod filters;
pub mod kernel;
pub mod math;
pub mod raster;

pub use error::{Error, Result};
pub use filter::{EdgeMode, Filter};
pub use kernel::Kernel;
pub use raster::{ColorTag, PixelFormat, Raster};
