//! Duplicate resolution.
//!
//! Turns the all-pairs neighbor results into a partition of position
//! indices: `keep` (one representative per duplicate cluster), `remove`
//! (every other cluster member) and `survived` (no neighbor within the
//! threshold).
//!
//! The clustering is a single greedy left-to-right pass, O(n·k). It is a
//! deterministic policy, not a globally optimal clustering: indices are
//! visited in ascending table order (natural-sort file order), the first
//! unassigned member of a cluster becomes its representative, and clusters
//! never merge retroactively. A union-find merge would produce tighter
//! clusters but any replacement must preserve the ascending-index tie-break
//! for reproducibility.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::error::{Error, Result};
use crate::index::NeighborResult;

/// The `keep` / `remove` / `survived` classification of all images in a run.
///
/// The three sets are pairwise disjoint and their union covers every
/// position index. Built once per resolver invocation; immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePartition {
    /// One canonical representative per duplicate cluster
    pub keep: BTreeSet<usize>,

    /// All non-representative cluster members
    pub remove: BTreeSet<usize>,

    /// Images with no neighbor within the threshold
    pub survived: BTreeSet<usize>,

    /// Representative -> its duplicates, in neighbor order
    pub duplicates: BTreeMap<usize, Vec<usize>>,
}

impl DuplicatePartition {
    /// Total number of classified indices
    pub fn len(&self) -> usize {
        self.keep.len() + self.remove.len() + self.survived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts all-pairs neighbor results into a deterministic duplicate
/// partition.
pub struct DuplicateResolver {
    table_len: usize,
    k: usize,
}

impl DuplicateResolver {
    pub fn new(table_len: usize, k: usize) -> Self {
        Self { table_len, k }
    }

    /// Partition the table's indices from one `NeighborResult` per row.
    ///
    /// Malformed input (wrong result count, wrong k, out-of-range or
    /// misattributed indices, unsorted distances) fails with
    /// `InvariantViolation` and no partial partition is returned.
    pub fn resolve(&self, results: &[NeighborResult]) -> Result<DuplicatePartition> {
        self.validate(results)?;

        let n = self.table_len;
        let mut assigned = vec![false; n];
        let mut keep = BTreeSet::new();
        let mut remove = BTreeSet::new();
        let mut survived = BTreeSet::new();
        let mut duplicates: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

        // Ascending table order fixes representative selection: the lowest
        // unassigned index of each cluster becomes its keeper
        for i in 0..n {
            if assigned[i] {
                continue;
            }

            let matches: Vec<usize> = results[i].matches(n).map(|m| m.index).collect();
            if matches.is_empty() {
                assigned[i] = true;
                survived.insert(i);
                continue;
            }

            assigned[i] = true;
            keep.insert(i);
            let cluster = duplicates.entry(i).or_default();
            for j in matches {
                // Members of earlier clusters stay where they are
                if !assigned[j] {
                    assigned[j] = true;
                    remove.insert(j);
                    cluster.push(j);
                }
            }
            // Every neighbor may already belong to an earlier cluster, in
            // which case this image keeps only itself
            if cluster.is_empty() {
                duplicates.remove(&i);
            }
        }

        debug!(
            "Partition: {} keep, {} remove, {} survived",
            keep.len(),
            remove.len(),
            survived.len()
        );

        Ok(DuplicatePartition {
            keep,
            remove,
            survived,
            duplicates,
        })
    }

    fn validate(&self, results: &[NeighborResult]) -> Result<()> {
        if results.len() != self.table_len {
            return Err(Error::InvariantViolation(format!(
                "{} neighbor results for a table of {} rows",
                results.len(),
                self.table_len
            )));
        }

        for (i, result) in results.iter().enumerate() {
            if result.query != i {
                return Err(Error::InvariantViolation(format!(
                    "result at row {} claims query index {}",
                    i, result.query
                )));
            }
            if result.neighbors.len() != self.k {
                return Err(Error::InvariantViolation(format!(
                    "result for row {} has {} slots, expected k = {}",
                    i,
                    result.neighbors.len(),
                    self.k
                )));
            }
            let mut previous = f64::NEG_INFINITY;
            for neighbor in &result.neighbors {
                if neighbor.index > self.table_len {
                    return Err(Error::InvariantViolation(format!(
                        "result for row {} references index {} beyond the table",
                        i, neighbor.index
                    )));
                }
                if neighbor.is_sentinel(self.table_len) && neighbor.distance.is_finite() {
                    return Err(Error::InvariantViolation(format!(
                        "result for row {} has a finite-distance sentinel slot",
                        i
                    )));
                }
                if neighbor.distance < previous {
                    return Err(Error::InvariantViolation(format!(
                        "result for row {} is not sorted by distance",
                        i
                    )));
                }
                previous = neighbor.distance;
            }
        }
        Ok(())
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Neighbor;

    /// Assemble one NeighborResult with the self-match first and sentinel
    /// padding up to k
    fn result(query: usize, k: usize, n: usize, matches: &[(f64, usize)]) -> NeighborResult {
        let mut neighbors = vec![Neighbor {
            distance: 0.0,
            index: query,
        }];
        neighbors.extend(matches.iter().map(|&(distance, index)| Neighbor {
            distance,
            index,
        }));
        neighbors.resize(k, Neighbor::sentinel(n));
        NeighborResult { query, neighbors }
    }

    fn assert_partition_complete(partition: &DuplicatePartition, n: usize) {
        let mut all = BTreeSet::new();
        all.extend(&partition.keep);
        all.extend(&partition.remove);
        all.extend(&partition.survived);
        assert_eq!(all.len(), n, "sets overlap or leave gaps");
        assert_eq!(all, (0..n).collect());
    }

    #[test]
    fn pair_within_threshold_and_two_singletons() {
        // {0,1} are mutual neighbors, {2,3} match nothing
        let n = 4;
        let k = 3;
        let results = vec![
            result(0, k, n, &[(1.0, 1)]),
            result(1, k, n, &[(1.0, 0)]),
            result(2, k, n, &[]),
            result(3, k, n, &[]),
        ];

        let partition = DuplicateResolver::new(n, k).resolve(&results).unwrap();
        assert_eq!(partition.keep, BTreeSet::from([0]));
        assert_eq!(partition.remove, BTreeSet::from([1]));
        assert_eq!(partition.survived, BTreeSet::from([2, 3]));
        assert_eq!(partition.duplicates[&0], vec![1]);
        assert_partition_complete(&partition, n);
    }

    #[test]
    fn all_distinct_fingerprints_survive() {
        // k = 1 returns only the self-match, so nothing clusters
        let n = 3;
        let results = vec![
            result(0, 1, n, &[]),
            result(1, 1, n, &[]),
            result(2, 1, n, &[]),
        ];

        let partition = DuplicateResolver::new(n, 1).resolve(&results).unwrap();
        assert!(partition.keep.is_empty());
        assert!(partition.remove.is_empty());
        assert_eq!(partition.survived, (0..n).collect());
        assert!(partition.duplicates.is_empty());
    }

    #[test]
    fn clusters_do_not_merge_retroactively() {
        // 1 is near both 0 and 2, but 0 claims it first; 2 then has no
        // unassigned neighbor left and keeps only itself
        let n = 3;
        let k = 3;
        let results = vec![
            result(0, k, n, &[(1.0, 1)]),
            result(1, k, n, &[(1.0, 0), (1.0, 2)]),
            result(2, k, n, &[(1.0, 1)]),
        ];

        let partition = DuplicateResolver::new(n, k).resolve(&results).unwrap();
        assert_eq!(partition.keep, BTreeSet::from([0, 2]));
        assert_eq!(partition.remove, BTreeSet::from([1]));
        assert_eq!(partition.duplicates[&0], vec![1]);
        assert!(!partition.duplicates.contains_key(&2));
        assert_partition_complete(&partition, n);
    }

    #[test]
    fn every_removal_belongs_to_exactly_one_cluster() {
        let n = 5;
        let k = 4;
        let results = vec![
            result(0, k, n, &[(1.0, 1), (2.0, 2)]),
            result(1, k, n, &[(1.0, 0)]),
            result(2, k, n, &[(2.0, 0)]),
            result(3, k, n, &[(1.0, 4)]),
            result(4, k, n, &[(1.0, 3)]),
        ];

        let partition = DuplicateResolver::new(n, k).resolve(&results).unwrap();
        for &removed in &partition.remove {
            let owners: Vec<usize> = partition
                .duplicates
                .iter()
                .filter(|(_, members)| members.contains(&removed))
                .map(|(&keep, _)| keep)
                .collect();
            assert_eq!(owners.len(), 1, "index {removed} owned by {owners:?}");
        }
        assert_partition_complete(&partition, n);
    }

    #[test]
    fn resolution_is_deterministic() {
        let n = 4;
        let k = 2;
        let results = vec![
            result(0, k, n, &[(1.0, 3)]),
            result(1, k, n, &[]),
            result(2, k, n, &[]),
            result(3, k, n, &[(1.0, 0)]),
        ];

        let resolver = DuplicateResolver::new(n, k);
        let first = resolver.resolve(&results).unwrap();
        let second = resolver.resolve(&results).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn wrong_result_count_aborts() {
        let results = vec![result(0, 1, 2, &[])];
        let err = DuplicateResolver::new(2, 1).resolve(&results).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn wrong_k_aborts() {
        let results = vec![result(0, 3, 1, &[])];
        let err = DuplicateResolver::new(1, 2).resolve(&results).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn out_of_table_index_aborts() {
        let mut bad = result(0, 2, 2, &[]);
        bad.neighbors[1] = Neighbor {
            distance: 1.0,
            index: 9,
        };
        let results = vec![bad, result(1, 2, 2, &[])];
        let err = DuplicateResolver::new(2, 2).resolve(&results).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn unsorted_distances_abort() {
        let mut bad = result(0, 3, 3, &[(2.0, 1), (2.0, 2)]);
        bad.neighbors[1].distance = 5.0;
        let results = vec![bad, result(1, 3, 3, &[]), result(2, 3, 3, &[])];
        let err = DuplicateResolver::new(3, 3).resolve(&results).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }
}
