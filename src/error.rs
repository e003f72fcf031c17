//! Error types for raster and kernel construction.
//!
//! Filters themselves are total: bad parameters degrade to identity or
//! clamped behaviour and never fail. Errors only arise when building a
//! [`Raster`](crate::Raster) or [`Kernel`](crate::Kernel) from caller-owned
//! data whose shape does not match.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The supplied buffer does not match `width * height * channels`.
    #[error("buffer length {actual} does not match {width}x{height} raster ({expected} elements expected)")]
    BufferSize {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    /// Rasters must have at least one pixel.
    #[error("raster dimensions {width}x{height} are empty")]
    EmptyRaster { width: usize, height: usize },

    /// The constructor does not accept this pixel format.
    #[error("pixel format {0} does not match the supplied buffer type")]
    FormatMismatch(&'static str),

    /// Kernels must be odd-sized in both dimensions and match their data.
    #[error("kernel shape {rows}x{cols} is invalid for {len} coefficients")]
    KernelShape { rows: usize, cols: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
