//! Parallel execution substrate.
//!
//! All filters run on rayon's process-wide work-stealing pool, partitioned
//! into row (or column) bands whose extent in pixels stays under a
//! threshold. The threshold grows with the image so that small images are
//! processed inline and large ones split into roughly `10 * procs` leaves,
//! matching the editor's historical fork/join tuning. Band iteration uses
//! ndarray's `axis_chunks_iter_mut`, which rayon drives with recursive
//! halving and joins before returning, so rows are written disjointly and
//! the finished raster is visible to the caller as soon as a filter returns.

/// Minimum pixels per leaf task.
pub const THRESHOLD: usize = 200_000;

/// Pixel-count threshold under which a task runs inline rather than
/// splitting: `max(THRESHOLD, total / (procs * 10))`.
pub fn pixel_threshold(total_pixels: usize) -> usize {
    let procs = rayon::current_num_threads().max(1);
    THRESHOLD.max(total_pixels / (procs * 10))
}

/// Rows per leaf band for an image whose rows hold `row_pixels` pixels.
pub fn chunk_rows(row_pixels: usize, total_pixels: usize) -> usize {
    (pixel_threshold(total_pixels) / row_pixels.max(1)).max(1)
}
