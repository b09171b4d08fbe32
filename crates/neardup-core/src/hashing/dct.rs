//! DCT-based perceptual hash.
//!
//! The image is reduced to a grayscale grid four times the hash size, a 2D
//! DCT-II concentrates the visual structure into the low-frequency corner,
//! and the hash is the median threshold of the top-left `hash_size²` block.

use image::DynamicImage;
use ndarray::Array2;
use rustdct::DctPlanner;

use super::{luma_grid, median, threshold_bits, Fingerprint};

/// Oversampling factor between the hash grid and the DCT input grid
const HIGHFREQ_FACTOR: u32 = 4;

pub(crate) fn perceptual_hash(img: &DynamicImage, hash_size: u32) -> Fingerprint {
    let img_size = hash_size * HIGHFREQ_FACTOR;
    let mut grid = luma_grid(img, img_size, img_size);
    dct2_in_place(&mut grid);

    let low_freq = grid.slice(ndarray::s![..hash_size as usize, ..hash_size as usize]);
    let low_freq = low_freq.to_owned();
    let pivot = median(&low_freq);
    threshold_bits(&low_freq, pivot)
}

/// Separable 2D DCT-II: transform every row, then every column
fn dct2_in_place(grid: &mut Array2<f32>) {
    let (rows, cols) = grid.dim();
    let mut planner = DctPlanner::<f32>::new();

    let row_dct = planner.plan_dct2(cols);
    let mut buffer = vec![0.0f32; cols];
    for mut row in grid.rows_mut() {
        buffer.clear();
        buffer.extend(row.iter());
        row_dct.process_dct2(&mut buffer);
        for (dst, src) in row.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }

    let col_dct = planner.plan_dct2(rows);
    let mut buffer = vec![0.0f32; rows];
    for mut col in grid.columns_mut() {
        buffer.clear();
        buffer.extend(col.iter());
        col_dct.process_dct2(&mut buffer);
        for (dst, src) in col.iter_mut().zip(&buffer) {
            *dst = *src;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dct_of_constant_grid_has_energy_only_in_dc_term() {
        let mut grid = Array2::from_elem((4, 4), 1.0f32);
        dct2_in_place(&mut grid);

        assert!(grid[[0, 0]] > 0.0);
        for ((y, x), &v) in grid.indexed_iter() {
            if (y, x) != (0, 0) {
                assert!(v.abs() < 1e-4, "expected ~0 at ({y},{x}), got {v}");
            }
        }
    }

    #[test]
    fn phash_length_and_determinism() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(32, 32, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        }));
        let a = perceptual_hash(&img, 8);
        let b = perceptual_hash(&img, 8);
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }
}
