//! Run results and report persistence.
//!
//! A `DedupReport` bundles the partition with the file list it refers to,
//! so downstream consumers never need to re-derive the position-index
//! correspondence. The JSON report lists one record per (keeper, duplicate)
//! pair together with the configuration that produced it.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::DuplicatePartition;

/// Everything a run produced: the ordered file list, its duplicate
/// partition and the configuration echo needed to interpret the distances.
#[derive(Debug, Clone)]
pub struct DedupReport {
    /// Input files in table order; position index i is files[i]
    pub files: Vec<PathBuf>,

    /// The keep / remove / survived classification
    pub partition: DuplicatePartition,

    /// Hash size the fingerprints were computed with
    pub hash_size: u32,

    /// Distance threshold the partition was resolved under
    pub max_distance: f64,
}

/// One (keeper, duplicate) pair in the persisted report
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DuplicateRecord {
    pub file: PathBuf,
    pub duplicate: PathBuf,
    pub hash_size: u32,
    pub max_distance: f64,
}

impl DedupReport {
    /// Flatten the keep -> duplicates map into persistable records
    pub fn records(&self) -> Vec<DuplicateRecord> {
        self.partition
            .duplicates
            .iter()
            .flat_map(|(&keep, removals)| {
                removals.iter().map(move |&removed| DuplicateRecord {
                    file: self.files[keep].clone(),
                    duplicate: self.files[removed].clone(),
                    hash_size: self.hash_size,
                    max_distance: self.max_distance,
                })
            })
            .collect()
    }

    /// Paths classified as keep
    pub fn keep_paths(&self) -> Vec<&Path> {
        self.partition.keep.iter().map(|&i| self.files[i].as_path()).collect()
    }

    /// Paths classified as remove
    pub fn remove_paths(&self) -> Vec<&Path> {
        self.partition.remove.iter().map(|&i| self.files[i].as_path()).collect()
    }

    /// Paths that matched nothing
    pub fn survived_paths(&self) -> Vec<&Path> {
        self.partition
            .survived
            .iter()
            .map(|&i| self.files[i].as_path())
            .collect()
    }

    /// Write the duplicate records as a JSON report
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &self.records())
            .map_err(|e| Error::Configuration(format!("failed to write report: {e}")))?;
        info!("Report written to {}", path.display());
        Ok(())
    }

    /// Log the headline numbers of the run
    pub fn log_summary(&self, config: &Config) {
        info!(
            "{} images: {} kept, {} marked for removal, {} survived (algorithm: {}, hash size {}, metric {}, threshold {})",
            self.files.len(),
            self.partition.keep.len(),
            self.partition.remove.len(),
            self.partition.survived.len(),
            config.algorithm,
            config.hash_size,
            config.metric,
            config.max_distance,
        );
    }
}

// -- Tests --
