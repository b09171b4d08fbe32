//! Nearest-neighbor indexing over fingerprints.
//!
//! The engine's contract is the [`NearestNeighborIndex`] trait; [`KdTree`]
//! is the concrete implementation. Both speak [`NeighborResult`], which
//! follows the classic k-d tree query convention: exactly `k` slots per
//! query, missing neighbors padded with an infinite-distance sentinel whose
//! index is the table length.

mod kdtree;

pub use kdtree::KdTree;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Minkowski distance family used for fingerprint comparison.
///
/// On 0/1 fingerprint coordinates Manhattan distance coincides with the
/// Hamming distance; Euclidean is its square root and Chebyshev collapses to
/// 0-or-1. The same metric must be used for every query in a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// L1, sum of absolute coordinate differences
    Manhattan,
    /// L2
    Euclidean,
    /// L∞, maximum coordinate difference
    Chebyshev,
    /// General Lp for a finite exponent p >= 1
    Minkowski(f64),
}

impl Metric {
    /// Distance between two points of equal dimension
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        match *self {
            Metric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Metric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            Metric::Chebyshev => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs())
                .fold(0.0, f64::max),
            Metric::Minkowski(p) => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs().powf(p))
                .sum::<f64>()
                .powf(1.0 / p),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Manhattan => write!(f, "manhattan"),
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Chebyshev => write!(f, "chebyshev"),
            Metric::Minkowski(p) => write!(f, "minkowski(p={p})"),
        }
    }
}

/// One `(distance, position index)` pair from a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub index: usize,
}

impl Neighbor {
    /// Sentinel for an unmatched slot: infinite distance, index one past the
    /// last table row
    pub fn sentinel(table_len: usize) -> Self {
        Self {
            distance: f64::INFINITY,
            index: table_len,
        }
    }

    pub fn is_sentinel(&self, table_len: usize) -> bool {
        self.index == table_len
    }
}

/// Neighbors of one query point, sorted ascending by `(distance, index)`
/// and truncated at `k` entries. Contains the self-match at distance 0;
/// consumers must exclude it.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborResult {
    /// Position index of the query point
    pub query: usize,
    /// Exactly `k` entries, sentinel-padded
    pub neighbors: Vec<Neighbor>,
}

impl NeighborResult {
    /// Real matches only: sentinel slots and the self-match removed
    pub fn matches(&self, table_len: usize) -> impl Iterator<Item = &Neighbor> {
        self.neighbors
            .iter()
            .filter(move |n| !n.is_sentinel(table_len) && n.index != self.query)
    }
}

/// Capability abstracting over any concrete spatial-index implementation.
///
/// Implementations are built from a `FingerprintTable` and keep its
/// positional correspondence: node *i* of the index is row *i* of the table.
pub trait NearestNeighborIndex {
    /// Number of indexed points
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// k nearest neighbors of the point at `position`, truncated at
    /// `max_distance`. Deterministic for a fixed table and metric; ties in
    /// distance break by ascending position index.
    fn query(&self, position: usize, k: usize, max_distance: f64) -> Result<NeighborResult>;

    /// One `NeighborResult` per table row, in row order
    fn query_all(&self, k: usize, max_distance: f64) -> Result<Vec<NeighborResult>>;
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_distances_on_binary_points() {
        let a = [1.0, 0.0, 1.0, 0.0];
        let b = [0.0, 0.0, 1.0, 1.0];

        assert_eq!(Metric::Manhattan.distance(&a, &b), 2.0);
        assert!((Metric::Euclidean.distance(&a, &b) - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(Metric::Chebyshev.distance(&a, &b), 1.0);
        // p = 1 must agree with Manhattan
        assert!((Metric::Minkowski(1.0).distance(&a, &b) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_distance_to_self() {
        let a = [1.0, 1.0, 0.0];
        for metric in [
            Metric::Manhattan,
            Metric::Euclidean,
            Metric::Chebyshev,
            Metric::Minkowski(3.0),
        ] {
            assert_eq!(metric.distance(&a, &a), 0.0);
        }
    }

    #[test]
    fn sentinel_roundtrip() {
        let s = Neighbor::sentinel(10);
        assert!(s.is_sentinel(10));
        assert!(s.distance.is_infinite());

        let real = Neighbor {
            distance: 1.0,
            index: 3,
        };
        assert!(!real.is_sentinel(10));
    }

    #[test]
    fn matches_excludes_self_and_sentinels() {
        let result = NeighborResult {
            query: 1,
            neighbors: vec![
                Neighbor { distance: 0.0, index: 1 },
                Neighbor { distance: 2.0, index: 0 },
                Neighbor::sentinel(4),
            ],
        };
        let matches: Vec<usize> = result.matches(4).map(|n| n.index).collect();
        assert_eq!(matches, vec![0]);
    }
}
