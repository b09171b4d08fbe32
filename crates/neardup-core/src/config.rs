use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hashing::HashAlgorithm;
use crate::index::Metric;

/// Configuration for a deduplication run.
///
/// One validated struct passed by value into the engine entry points; there
/// is no module-level configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Perceptual hash algorithm used for fingerprinting
    pub algorithm: HashAlgorithm,

    /// Side length of the hash grid; fingerprints carry hash_size² bits
    pub hash_size: u32,

    /// Minkowski distance family used by the spatial index
    pub metric: Metric,

    /// Number of nearest neighbors fetched per query, self-match included
    pub nearest_neighbors: usize,

    /// Leaf bucket size of the k-d tree
    pub leaf_size: usize,

    /// Maximum distance under which two fingerprints count as duplicates
    pub max_distance: f64,

    /// Whether to fan expensive stages out over a rayon worker pool
    pub parallel: bool,

    /// Number of items handed to the pool per batch
    pub batch_size: usize,

    /// Where to copy the retained images and write the report
    pub output_dir: PathBuf,

    /// Whether to run without touching the file system
    pub dry_run: bool,

    /// Whether cluster representatives are deleted along with their
    /// duplicates, leaving only images that had no match at all
    pub delete_keep: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Perceptual,
            hash_size: 8,
            metric: Metric::Manhattan,
            nearest_neighbors: 5,
            leaf_size: 40,
            max_distance: 25.0,
            parallel: false,
            batch_size: 32,
            output_dir: PathBuf::from("output"),
            dry_run: true,
            delete_keep: false,
        }
    }
}

impl Config {
    /// Validate the configuration before any processing starts
    pub fn validate(&self) -> Result<()> {
        if self.hash_size < 2 {
            return Err(Error::Configuration(format!(
                "hash_size must be at least 2, got {}",
                self.hash_size
            )));
        }
        if self.nearest_neighbors == 0 {
            return Err(Error::Configuration(
                "nearest_neighbors must be at least 1".to_string(),
            ));
        }
        if self.leaf_size == 0 {
            return Err(Error::Configuration(
                "leaf_size must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(self.max_distance >= 0.0) {
            return Err(Error::Configuration(format!(
                "max_distance must be non-negative, got {}",
                self.max_distance
            )));
        }
        if let Metric::Minkowski(p) = self.metric {
            if !(p >= 1.0) || !p.is_finite() {
                return Err(Error::Configuration(format!(
                    "Minkowski exponent must be a finite value >= 1, got {}",
                    p
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }
}

// -- Tests --
