//! Pure calculation functions for bounded decoding.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Calculate the power-of-two downsampling factor for decoding an image
/// whose full size is `source` so that it still covers `req_width` x `req_height`.
///
/// Returns `1` when the source already fits within the requested bounds.
/// Otherwise returns the largest power of two `n` such that both
/// `(height / 2) / n >= req_height` and `(width / 2) / n >= req_width`
/// still held before the final doubling, i.e. the decoded image is never
/// smaller than the requested bounds.
///
/// A requested bound of zero is treated as one pixel.
///
/// # Examples
/// ```
/// # use compressor::imaging::{calculate_in_sample_size, Dimensions};
/// let source = Dimensions { width: 4000, height: 3000 };
/// assert_eq!(calculate_in_sample_size(source, 612, 816), 2);
/// assert_eq!(calculate_in_sample_size(source, 100, 100), 16);
/// assert_eq!(calculate_in_sample_size(source, 4000, 3000), 1);
/// ```
pub fn calculate_in_sample_size(source: Dimensions, req_width: u32, req_height: u32) -> u32 {
    let req_width = req_width.max(1);
    let req_height = req_height.max(1);
    let mut in_sample_size: u32 = 1;

    if source.height > req_height || source.width > req_width {
        let half_height = source.height / 2;
        let half_width = source.width / 2;

        while half_height / in_sample_size >= req_height
            && half_width / in_sample_size >= req_width
        {
            in_sample_size = match in_sample_size.checked_mul(2) {
                Some(next) => next,
                None => break,
            };
        }
    }

    in_sample_size
}

/// Dimensions produced by decoding `source` with the given sample size.
///
/// Each edge is divided and rounded up, never below one pixel.
pub fn sampled_dimensions(source: Dimensions, sample_size: u32) -> Dimensions {
    let sample_size = sample_size.max(1);
    Dimensions {
        width: source.width.div_ceil(sample_size).max(1),
        height: source.height.div_ceil(sample_size).max(1),
    }
}
