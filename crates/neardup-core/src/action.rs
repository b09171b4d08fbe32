//! File-system actions derived from a finished partition.
//!
//! Planning is separated from execution: `plan` turns a report into the
//! list of copies and deletions it implies, and `execute` applies them,
//! gated by the `dry_run` flag. File-system writes only ever happen here,
//! strictly after resolution has completed.

use std::fs;
use std::path::PathBuf;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::report::DedupReport;

/// Types of actions that can be performed on classified images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    /// Copy a retained image into the output directory
    Copy,

    /// Delete a redundant image
    Delete,
}

/// One pending file operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub action: ActionType,
    pub source: PathBuf,
    /// Target path for copies; deletions have none
    pub destination: Option<PathBuf>,
}

/// Result of one executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: ActionType,
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

/// Derive the file operations a report implies under the given config.
///
/// Survivors are always retained. Cluster representatives are retained
/// unless `delete_keep` is set, in which case they are deleted with their
/// duplicates and only unmatched images remain — the explicit resolution of
/// the ambiguous delete-the-origin behavior some tools have.
pub fn plan(report: &DedupReport, config: &Config) -> Vec<PlannedAction> {
    let mut actions = Vec::new();

    let mut retained: Vec<&std::path::Path> = report.survived_paths();
    let mut deleted: Vec<&std::path::Path> = report.remove_paths();
    if config.delete_keep {
        deleted.extend(report.keep_paths());
        deleted.sort();
    } else {
        retained.extend(report.keep_paths());
        retained.sort();
    }

    for path in retained {
        let file_name = path.file_name().map(PathBuf::from).unwrap_or_default();
        actions.push(PlannedAction {
            action: ActionType::Copy,
            source: path.to_path_buf(),
            destination: Some(config.output_dir.join(file_name)),
        });
    }
    for path in deleted {
        actions.push(PlannedAction {
            action: ActionType::Delete,
            source: path.to_path_buf(),
            destination: None,
        });
    }
    actions
}

/// Apply a plan. With `dry_run` every operation is logged and skipped.
pub fn execute(actions: &[PlannedAction], config: &Config) -> Result<Vec<ActionResult>> {
    if config.dry_run {
        for action in actions {
            match action.action {
                ActionType::Copy => {
                    if let Some(destination) = &action.destination {
                        info!(
                            "dry run: would copy {} -> {}",
                            action.source.display(),
                            destination.display()
                        );
                    }
                }
                ActionType::Delete => {
                    info!("dry run: would delete {}", action.source.display())
                }
            }
        }
        return Ok(Vec::new());
    }

    if actions.iter().any(|a| a.action == ActionType::Copy) {
        fs::create_dir_all(&config.output_dir)?;
    }

    let mut results = Vec::with_capacity(actions.len());
    for action in actions {
        let outcome = match (action.action, &action.destination) {
            (ActionType::Copy, Some(destination)) => {
                fs::copy(&action.source, destination).map(|_| ())
            }
            (ActionType::Copy, None) => {
                warn!("copy without destination: {}", action.source.display());
                continue;
            }
            (ActionType::Delete, _) => fs::remove_file(&action.source),
        };

        match outcome {
            Ok(()) => {
                info!("{:?} {}", action.action, action.source.display());
                results.push(ActionResult {
                    action: action.action,
                    path: action.source.clone(),
                    success: true,
                    error: None,
                });
            }
            Err(e) => {
                error!("{:?} {} failed: {}", action.action, action.source.display(), e);
                results.push(ActionResult {
                    action: action.action,
                    path: action.source.clone(),
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    Ok(results)
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DuplicatePartition;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::Path;

    fn report_in(dir: &Path) -> DedupReport {
        let files: Vec<PathBuf> = ["keep.png", "dupe.png", "lone.png"]
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"img").unwrap();
                path
            })
            .collect();

        DedupReport {
            files,
            partition: DuplicatePartition {
                keep: BTreeSet::from([0]),
                remove: BTreeSet::from([1]),
                survived: BTreeSet::from([2]),
                duplicates: BTreeMap::from([(0, vec![1])]),
            },
            hash_size: 8,
            max_distance: 10.0,
        }
    }

    #[test]
    fn plan_retains_keepers_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let report = report_in(dir.path());
        let config = Config {
            output_dir: dir.path().join("out"),
            ..Config::default()
        };

        let actions = plan(&report, &config);
        let copies: Vec<_> = actions
            .iter()
            .filter(|a| a.action == ActionType::Copy)
            .collect();
        let deletions: Vec<_> = actions
            .iter()
            .filter(|a| a.action == ActionType::Delete)
            .collect();

        assert_eq!(copies.len(), 2); // keep.png and lone.png
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].source, report.files[1]);
    }

    #[test]
    fn delete_keep_removes_representatives_too() {
        let dir = tempfile::tempdir().unwrap();
        let report = report_in(dir.path());
        let config = Config {
            output_dir: dir.path().join("out"),
            delete_keep: true,
            ..Config::default()
        };

        let actions = plan(&report, &config);
        let deleted: Vec<&PathBuf> = actions
            .iter()
            .filter(|a| a.action == ActionType::Delete)
            .map(|a| &a.source)
            .collect();

        assert_eq!(deleted.len(), 2);
        assert!(deleted.contains(&&report.files[0]));
        assert!(deleted.contains(&&report.files[1]));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let report = report_in(dir.path());
        let config = Config {
            output_dir: dir.path().join("out"),
            dry_run: true,
            ..Config::default()
        };

        let actions = plan(&report, &config);
        let results = execute(&actions, &config).unwrap();

        assert!(results.is_empty());
        assert!(report.files.iter().all(|f| f.exists()));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn execute_copies_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let report = report_in(dir.path());
        let config = Config {
            output_dir: dir.path().join("out"),
            dry_run: false,
            ..Config::default()
        };

        let actions = plan(&report, &config);
        let results = execute(&actions, &config).unwrap();

        assert!(results.iter().all(|r| r.success));
        assert!(config.output_dir.join("keep.png").exists());
        assert!(config.output_dir.join("lone.png").exists());
        assert!(!report.files[1].exists());
        assert!(report.files[0].exists());
    }
}
