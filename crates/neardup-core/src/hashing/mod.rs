//! # Perceptual fingerprinting
//!
//! Turns an image into a fixed-length bit vector such that visually similar
//! images land close to each other under a Minkowski distance.
//!
//! Four algorithms are available with different speed/accuracy tradeoffs:
//!
//! 1. Average hash: mean-threshold over a downscaled grayscale grid (fastest)
//! 2. Difference hash: horizontal gradient signs (fast, robust to brightness)
//! 3. Perceptual hash: median-threshold over low-frequency DCT coefficients
//!    (slowest but most resilient to transformations)
//! 4. Wavelet hash: median-threshold over the Haar approximation band
//!
//! Every algorithm produces `hash_size²` bits for a given hash size, so all
//! fingerprints in one run have identical length and can share one spatial
//! index.

mod dct;
mod wavelet;

use image::DynamicImage;
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Selectable perceptual-hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Mean-threshold average hash
    Average,
    /// Horizontal-gradient difference hash
    Difference,
    /// DCT-based perceptual hash
    #[default]
    Perceptual,
    /// Haar-wavelet hash
    Wavelet,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Average => write!(f, "average_hash"),
            Self::Difference => write!(f, "dhash"),
            Self::Perceptual => write!(f, "phash"),
            Self::Wavelet => write!(f, "whash"),
        }
    }
}

/// A fixed-length ordered sequence of bits summarizing an image's visual
/// content. Each bit is stored as a 0/1 byte so the spatial index can treat
/// the fingerprint as a point in `{0,1}^n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    bits: Vec<u8>,
}

impl Fingerprint {
    pub fn from_bits(bits: Vec<u8>) -> Self {
        debug_assert!(bits.iter().all(|&b| b <= 1));
        Self { bits }
    }

    /// Number of bits in the fingerprint
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// The raw 0/1 bit values, in order
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// Coordinate view of one bit for distance computation
    #[inline]
    pub fn coord(&self, i: usize) -> f64 {
        self.bits[i] as f64
    }
}

/// Computes fingerprints for images under one `(algorithm, hash_size)`
/// configuration. Pure: the same image and configuration always yield the
/// same fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintEncoder {
    algorithm: HashAlgorithm,
    hash_size: u32,
}

impl FingerprintEncoder {
    pub fn new(algorithm: HashAlgorithm, hash_size: u32) -> Self {
        assert!(hash_size >= 2, "hash_size below 2 is rejected by Config");
        Self {
            algorithm,
            hash_size,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Fingerprint length for this configuration, constant across images
    pub fn fingerprint_len(&self) -> usize {
        (self.hash_size * self.hash_size) as usize
    }

    /// Compute the fingerprint of a decoded image
    pub fn encode(&self, img: &DynamicImage) -> Fingerprint {
        let size = self.hash_size;
        match self.algorithm {
            HashAlgorithm::Average => average_hash(img, size),
            HashAlgorithm::Difference => difference_hash(img, size),
            HashAlgorithm::Perceptual => dct::perceptual_hash(img, size),
            HashAlgorithm::Wavelet => wavelet::wavelet_hash(img, size),
        }
    }

    /// Decode an image file and fingerprint it.
    ///
    /// Decode failures surface as `Error::Decode` so the caller can decide
    /// between skipping and aborting; they are never silently dropped, which
    /// would shift position indices downstream.
    pub fn encode_file(&self, path: &PathBuf) -> Result<Fingerprint> {
        let img = image::open(path).map_err(|source| Error::Decode {
            path: path.clone(),
            source,
        })?;
        Ok(self.encode(&img))
    }

    /// Fingerprint a list of files, optionally across a rayon worker pool.
    ///
    /// The output order always matches the input order regardless of worker
    /// completion order: parallel batches are collected positionally, never
    /// in arrival order.
    pub fn encode_batch(
        &self,
        paths: &[PathBuf],
        parallel: bool,
        batch_size: usize,
    ) -> Result<Vec<Fingerprint>> {
        if parallel {
            let batches: Vec<Vec<Fingerprint>> = paths
                .par_chunks(batch_size.max(1))
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|path| self.encode_file(path))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(batches.into_iter().flatten().collect())
        } else {
            paths.iter().map(|path| self.encode_file(path)).collect()
        }
    }
}

/// Downscale to a grayscale grid of the given dimensions.
///
/// Triangle filtering keeps the hash stable under rescaling, unlike nearest
/// neighbor sampling which aliases badly on high-frequency content.
pub(crate) fn luma_grid(img: &DynamicImage, width: u32, height: u32) -> Array2<f32> {
    let small = img
        .resize_exact(width, height, image::imageops::FilterType::Triangle)
        .to_luma8();

    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        small.get_pixel(x as u32, y as u32)[0] as f32
    })
}

/// Threshold a grid of values against a pivot, row-major bit order
pub(crate) fn threshold_bits(values: &Array2<f32>, pivot: f32) -> Fingerprint {
    let bits = values.iter().map(|&v| u8::from(v > pivot)).collect();
    Fingerprint::from_bits(bits)
}

/// Median of a value grid; the midpoint of the two central elements for an
/// even count, matching the usual definition
pub(crate) fn median(values: &Array2<f32>) -> f32 {
    let mut sorted: Vec<f32> = values.iter().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn average_hash(img: &DynamicImage, size: u32) -> Fingerprint {
    let grid = luma_grid(img, size, size);
    let mean = grid.mean().unwrap_or(0.0);
    threshold_bits(&grid, mean)
}

fn difference_hash(img: &DynamicImage, size: u32) -> Fingerprint {
    // One extra column so each output bit compares a horizontally adjacent
    // pair, yielding size x size bits
    let grid = luma_grid(img, size + 1, size);
    let mut bits = Vec::with_capacity((size * size) as usize);
    for y in 0..size as usize {
        for x in 0..size as usize {
            bits.push(u8::from(grid[[y, x + 1]] > grid[[y, x]]));
        }
    }
    Fingerprint::from_bits(bits)
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    /// A horizontal luminance gradient, visually structured enough that all
    /// four algorithms produce a mix of 0 and 1 bits
    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, _| {
            let v = (x * 255 / width.max(1)) as u8;
            image::Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17)).wrapping_add(seed) % 256) as u8;
            image::Rgb([v, v, v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn fingerprint_length_is_hash_size_squared() {
        let img = gradient_image(64, 64);
        for algorithm in [
            HashAlgorithm::Average,
            HashAlgorithm::Difference,
            HashAlgorithm::Perceptual,
            HashAlgorithm::Wavelet,
        ] {
            for size in [2u32, 8, 16] {
                let encoder = FingerprintEncoder::new(algorithm, size);
                let fp = encoder.encode(&img);
                assert_eq!(fp.len(), (size * size) as usize, "{algorithm} size {size}");
                assert_eq!(fp.len(), encoder.fingerprint_len());
            }
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let img = noise_image(40, 30, 7);
        for algorithm in [
            HashAlgorithm::Average,
            HashAlgorithm::Difference,
            HashAlgorithm::Perceptual,
            HashAlgorithm::Wavelet,
        ] {
            let encoder = FingerprintEncoder::new(algorithm, 8);
            assert_eq!(encoder.encode(&img), encoder.encode(&img));
        }
    }

    #[test]
    fn similar_images_hash_closer_than_different_ones() {
        let base = gradient_image(64, 64);
        let rescaled = gradient_image(96, 96);
        let unrelated = noise_image(64, 64, 99);

        let encoder = FingerprintEncoder::new(HashAlgorithm::Average, 8);
        let fp_base = encoder.encode(&base);
        let fp_rescaled = encoder.encode(&rescaled);
        let fp_unrelated = encoder.encode(&unrelated);

        let hamming = |a: &Fingerprint, b: &Fingerprint| -> u32 {
            a.bits()
                .iter()
                .zip(b.bits())
                .map(|(x, y)| u32::from(x != y))
                .sum()
        };

        assert!(hamming(&fp_base, &fp_rescaled) < hamming(&fp_base, &fp_unrelated));
    }

    #[test]
    fn bits_are_binary() {
        let encoder = FingerprintEncoder::new(HashAlgorithm::Wavelet, 8);
        let fp = encoder.encode(&noise_image(50, 50, 3));
        assert!(fp.bits().iter().all(|&b| b <= 1));
    }

    #[test]
    fn encode_file_reports_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();

        let encoder = FingerprintEncoder::new(HashAlgorithm::Perceptual, 8);
        let err = encoder.encode_file(&path).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn batch_order_matches_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..6u32 {
            let path = dir.path().join(format!("img{}.png", i));
            noise_image(24, 24, i).to_rgb8().save(&path).unwrap();
            paths.push(path);
        }

        let encoder = FingerprintEncoder::new(HashAlgorithm::Difference, 8);
        let sequential = encoder.encode_batch(&paths, false, 2).unwrap();
        let parallel = encoder.encode_batch(&paths, true, 2).unwrap();
        assert_eq!(sequential, parallel);
    }
}
