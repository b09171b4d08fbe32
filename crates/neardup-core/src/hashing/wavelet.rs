//! Haar-wavelet hash.
//!
//! The grayscale grid is decomposed through repeated 2x2 Haar averaging
//! steps; each step halves both dimensions and keeps the approximation (LL)
//! band, discarding detail coefficients. After a fixed number of levels the
//! LL band is exactly `hash_size x hash_size` and is median-thresholded into
//! bits. Working from a fixed multiple of the hash size keeps the output
//! length `hash_size²` for any hash size, power of two or not.

use image::DynamicImage;
use ndarray::Array2;

use super::{luma_grid, median, threshold_bits, Fingerprint};

/// Number of Haar decomposition levels applied to the input grid
const LEVELS: u32 = 3;

pub(crate) fn wavelet_hash(img: &DynamicImage, hash_size: u32) -> Fingerprint {
    let scale = hash_size << LEVELS;
    let mut band = luma_grid(img, scale, scale);
    for _ in 0..LEVELS {
        band = haar_ll(&band);
    }

    debug_assert_eq!(band.dim(), (hash_size as usize, hash_size as usize));
    let pivot = median(&band);
    threshold_bits(&band, pivot)
}

/// One Haar approximation step: average each 2x2 block
fn haar_ll(grid: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = grid.dim();
    Array2::from_shape_fn((rows / 2, cols / 2), |(y, x)| {
        (grid[[2 * y, 2 * x]]
            + grid[[2 * y, 2 * x + 1]]
            + grid[[2 * y + 1, 2 * x]]
            + grid[[2 * y + 1, 2 * x + 1]])
            / 4.0
    })
}
