//! Ordered fingerprint table.
//!
//! Row *i* of the table, node *i* of the spatial index and row *i* of any
//! downstream distance matrix all refer to the same image. That positional
//! correspondence is the central invariant of the engine; everything here is
//! written to preserve it, including the parallel build path.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

use crate::error::{Error, Result};
use crate::hashing::{Fingerprint, FingerprintEncoder};

/// One (position index, image reference, fingerprint) record
#[derive(Debug, Clone)]
pub struct TableRow {
    /// Zero-based position assigned by insertion order, never reused
    pub position: usize,

    /// Stable identifier of the image
    pub path: PathBuf,

    /// Perceptual fingerprint of the image
    pub fingerprint: Fingerprint,
}

/// An ordered collection mapping each input file to its fingerprint.
///
/// Built once per run; read-only afterwards.
#[derive(Debug)]
pub struct FingerprintTable {
    rows: Vec<TableRow>,
    fingerprint_len: usize,
}

impl FingerprintTable {
    /// Fingerprint every file in `files` and assemble the table.
    ///
    /// Files are processed in batches of `batch_size`; with `parallel` set
    /// each batch group fans out over the rayon pool. Batch outputs are
    /// re-assembled in input order before rows are appended, so row *i*
    /// always corresponds to `files[i]` regardless of worker arrival order.
    pub fn build(
        files: Vec<PathBuf>,
        encoder: &FingerprintEncoder,
        parallel: bool,
        batch_size: usize,
    ) -> Result<Self> {
        if files.is_empty() {
            return Err(Error::EmptyInput);
        }

        info!(
            "Fingerprinting {} images ({}, parallel: {})",
            files.len(),
            encoder.algorithm(),
            parallel
        );

        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        progress.set_message("hashing");

        // Each group holds one batch per worker so the pool stays saturated
        let group_size = batch_size.max(1) * num_cpus::get().max(1);

        let mut fingerprints = Vec::with_capacity(files.len());
        for group in files.chunks(group_size) {
            let batch = encoder.encode_batch(group, parallel, batch_size)?;
            progress.inc(batch.len() as u64);
            fingerprints.extend(batch);
        }
        progress.finish_and_clear();

        let fingerprint_len = encoder.fingerprint_len();
        if fingerprints.len() != files.len() {
            return Err(Error::InvariantViolation(format!(
                "fingerprint count {} does not match file count {}",
                fingerprints.len(),
                files.len()
            )));
        }
        if let Some(row) = fingerprints.iter().position(|fp| fp.len() != fingerprint_len) {
            return Err(Error::InvariantViolation(format!(
                "fingerprint at row {} has length {}, expected {}",
                row,
                fingerprints[row].len(),
                fingerprint_len
            )));
        }

        let rows = files
            .into_iter()
            .zip(fingerprints)
            .enumerate()
            .map(|(position, (path, fingerprint))| TableRow {
                position,
                path,
                fingerprint,
            })
            .collect();

        debug!("Fingerprint table built, {} bits per row", fingerprint_len);
        Ok(Self {
            rows,
            fingerprint_len,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bits per fingerprint, constant across all rows
    pub fn fingerprint_len(&self) -> usize {
        self.fingerprint_len
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Row at a position index
    pub fn row(&self, position: usize) -> Result<&TableRow> {
        self.rows.get(position).ok_or(Error::OutOfRange {
            index: position,
            len: self.rows.len(),
        })
    }

    /// Path of the image at a position index
    pub fn path(&self, position: usize) -> Result<&Path> {
        Ok(&self.row(position)?.path)
    }

    /// Position index of a path already present in the table
    pub fn position_of(&self, path: &Path) -> Result<usize> {
        self.rows
            .iter()
            .find(|row| row.path == path)
            .map(|row| row.position)
            .ok_or_else(|| Error::QueryNotFound(path.to_path_buf()))
    }
}

// -- Tests --
