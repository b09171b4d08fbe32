//! Core engine for finding near-duplicate images.
//!
//! The pipeline turns a directory of images into a duplicate partition:
//! - File discovery in natural-sort order
//! - Perceptual fingerprinting (average / difference / DCT / wavelet hash)
//! - k-d tree nearest-neighbor queries under a Minkowski metric
//! - Greedy resolution into `keep`, `remove` and `survived` sets
//!
//! Stages run strictly one after another; expensive stages fan out over a
//! rayon pool when configured, and every parallel stage re-assembles its
//! output in input order so position indices stay aligned across the
//! fingerprint table, the spatial index and the partition.

use std::path::{Path, PathBuf};

use log::info;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::Config;
pub use error::{Error, Result};
pub use hashing::{Fingerprint, FingerprintEncoder, HashAlgorithm};
pub use index::{KdTree, Metric, NearestNeighborIndex, Neighbor, NeighborResult};
pub use report::{DedupReport, DuplicateRecord};
pub use resolver::{DuplicatePartition, DuplicateResolver};
pub use table::FingerprintTable;

// -- Public Modules --
pub mod action;
pub mod config;
pub mod discovery;
pub mod hashing;
pub mod index;
pub mod report;
pub mod resolver;
pub mod table;

/// Main entry point for the near-duplicate search process
pub struct NearDupFinder {
    config: Config,
}

impl NearDupFinder {
    /// Create a new finder with a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline over a directory and return its report.
    ///
    /// Discovery, fingerprinting, indexing and resolution run as a strict
    /// pipeline; no stage starts before the previous one completed. The run
    /// either produces a complete, internally consistent partition or fails
    /// with the stage and item that caused it.
    pub fn run(&self, directory: &Path) -> Result<DedupReport> {
        let files = discovery::discover_images(directory)?;
        let table = self.build_table(files)?;
        let results = self.query_neighbors(&table)?;

        let resolver = DuplicateResolver::new(table.len(), self.config.nearest_neighbors);
        let partition = resolver.resolve(&results)?;

        Ok(DedupReport {
            files: table
                .rows()
                .iter()
                .map(|row| row.path.clone())
                .collect(),
            partition,
            hash_size: self.config.hash_size,
            max_distance: self.config.max_distance,
        })
    }

    /// Neighbors of a single image already present under `directory`.
    ///
    /// Returns the `(distance, path)` pairs within the threshold, nearest
    /// first, self-match excluded. A query path that is not in the table
    /// fails with `QueryNotFound` before any partitioning side effect.
    pub fn search(&self, directory: &Path, query: &Path) -> Result<Vec<(f64, PathBuf)>> {
        let files = discovery::discover_images(directory)?;
        let table = self.build_table(files)?;
        let position = table.position_of(query)?;

        let index = KdTree::build(
            &table,
            self.config.metric,
            self.config.leaf_size,
            self.config.parallel,
        );
        let result = index.query(
            position,
            self.config.nearest_neighbors,
            self.config.max_distance,
        )?;

        result
            .matches(table.len())
            .map(|n| Ok((n.distance, table.path(n.index)?.to_path_buf())))
            .collect()
    }

    fn build_table(&self, files: Vec<PathBuf>) -> Result<FingerprintTable> {
        let encoder = FingerprintEncoder::new(self.config.algorithm, self.config.hash_size);
        FingerprintTable::build(
            files,
            &encoder,
            self.config.parallel,
            self.config.batch_size,
        )
    }

    fn query_neighbors(&self, table: &FingerprintTable) -> Result<Vec<NeighborResult>> {
        info!(
            "Building k-d tree over {} fingerprints ({} dims, metric {})",
            table.len(),
            table.fingerprint_len(),
            self.config.metric
        );
        let index = KdTree::build(
            table,
            self.config.metric,
            self.config.leaf_size,
            self.config.parallel,
        );
        index.query_all(self.config.nearest_neighbors, self.config.max_distance)
    }
}
