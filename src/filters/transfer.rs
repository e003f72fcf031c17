//! Transfer filters: point filters driven by three 256-entry lookup tables.
//!
//! A table is computed once from a transfer function `f: [0,1] -> [0,1]`
//! (or a closed-form per-channel rule) and shared across channels whenever
//! the per-channel parameters coincide.

use crate::filter::Filter;
use crate::filters::point::map_rows;
use crate::math::clamp8;
use crate::raster::Raster;

type Table = [u8; 256];

fn make_table<F: Fn(f32) -> f32>(f: F) -> Table {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = clamp8((255.0 * f(i as f32 / 255.0) + 0.5) as i32) as u8;
    }
    table
}

fn gamma_table(gamma: f32, brightness: f32, contrast: f32) -> Table {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let v = clamp8(
            (255.0 * ((i as f32 / 255.0 * brightness - 0.5) * contrast + 0.5)).round() as i32,
        );
        let v = ((255.0 * (v as f32 / 255.0).powf(1.0 / gamma)) + 0.5) as i32;
        *entry = v.min(255) as u8;
    }
    table
}

/// A point filter configured by three per-channel lookup tables.
#[derive(Clone)]
pub struct TransferFilter {
    r_table: Table,
    g_table: Table,
    b_table: Table,
}

impl TransferFilter {
    /// One transfer function shared by all three channels.
    pub fn from_fn<F: Fn(f32) -> f32>(f: F) -> TransferFilter {
        let table = make_table(f);
        TransferFilter {
            r_table: table,
            g_table: table,
            b_table: table,
        }
    }

    /// Brightness, contrast and a single gamma applied to every channel:
    /// `f(v) = pow(clamp((v * brightness - 1/2) * contrast + 1/2), 1/gamma)`.
    pub fn gamma_contrast(gamma: f32, contrast: f32, brightness: f32) -> TransferFilter {
        TransferFilter::gamma_contrast_rgb(gamma, gamma, gamma, contrast, brightness)
    }

    /// Gamma-contrast with separate gammas per channel. Channels with equal
    /// gammas share one table.
    pub fn gamma_contrast_rgb(
        r_gamma: f32,
        g_gamma: f32,
        b_gamma: f32,
        contrast: f32,
        brightness: f32,
    ) -> TransferFilter {
        let r_table = gamma_table(r_gamma, brightness, contrast);
        let g_table = if g_gamma == r_gamma {
            r_table
        } else {
            gamma_table(g_gamma, brightness, contrast)
        };
        let b_table = if b_gamma == r_gamma {
            r_table
        } else if b_gamma == g_gamma {
            g_table
        } else {
            gamma_table(b_gamma, brightness, contrast)
        };
        TransferFilter {
            r_table,
            g_table,
            b_table,
        }
    }

    /// Perlin gain curve: with `p = log(1 - c) / log(1/2)`,
    /// `gain(a) = (2a)^p / 2` below the midpoint and mirrored above it.
    /// `c = 1/2` is the identity.
    pub fn perlin_contrast(contrast: f32) -> TransferFilter {
        let p = (1.0f64 - contrast as f64).ln() / 0.5f64.ln();
        let mut table = [0u8; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let a = i as f64 / 255.0;
            let gain = if a < 0.5 {
                (2.0 * a).powf(p) / 2.0
            } else {
                1.0 - (2.0 * (1.0 - a)).powf(p) / 2.0
            };
            *entry = ((255.0 * gain).round() as i32).min(255) as u8;
        }
        TransferFilter {
            r_table: table,
            g_table: table,
            b_table: table,
        }
    }

    /// Exposure: multiply every channel by a scalar, then clamp.
    pub fn exposure(exposure: f32) -> TransferFilter {
        TransferFilter::from_fn(|v| v * exposure)
    }

    /// The grey-ramp lookup table this filter applies, useful for previews.
    pub fn lut(&self) -> [u32; 256] {
        let mut lut = [0u32; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = (u32::from(self.r_table[i]) << 16)
                | (u32::from(self.g_table[i]) << 8)
                | u32::from(self.b_table[i]);
        }
        lut
    }
}

impl Filter for TransferFilter {
    fn filter_rgb32(&self, src: &Raster, dst: Option<Raster>) -> Raster {
        map_rows(src, dst, &|_, _, rgb| {
            let a = rgb & 0xff00_0000;
            let r = u32::from(self.r_table[((rgb >> 16) & 0xff) as usize]);
            let g = u32::from(self.g_table[((rgb >> 8) & 0xff) as usize]);
            let b = u32::from(self.b_table[(rgb & 0xff) as usize]);
            a | (r << 16) | (g << 8) | b
        })
    }
}
