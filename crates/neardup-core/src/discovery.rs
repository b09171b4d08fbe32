//! Image discovery.
//!
//! Walks a directory tree, keeps raster-image files by extension and sorts
//! them in natural order (`img2.png` before `img10.png`). The engine assigns
//! position indices by this order, so the sort has to be reproducible across
//! platforms and file systems.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use log::info;
use walkdir::WalkDir;

use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp"];

/// Discover image files under `directory`, natural-sort ordered
pub fn discover_images(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.exists() {
        return Err(Error::FileNotFound(directory.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| is_image_path(path))
        .collect();

    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    info!("Found {} images under {}", files.len(), directory.display());
    Ok(files)
}

/// Returns if the given path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Natural-order string comparison: runs of digits compare numerically,
/// everything else byte-wise
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.as_bytes().iter().peekable();
    let mut bi = b.as_bytes().iter().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(&x), Some(&y)) => {
                if x.is_ascii_digit() && y.is_ascii_digit() {
                    let na = take_number(&mut ai);
                    let nb = take_number(&mut bi);
                    match na.cmp(&nb) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                match x.cmp(&y) {
                    Ordering::Equal => {
                        ai.next();
                        bi.next();
                    }
                    other => return other,
                }
            }
        }
    }
}

fn take_number<'a, I: Iterator<Item = &'a u8>>(iter: &mut std::iter::Peekable<I>) -> u64 {
    let mut value = 0u64;
    while let Some(&&c) = iter.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add((c - b'0') as u64);
        iter.next();
    }
    value
}

// -- Tests --
