//! k-d tree over fingerprint points.
//!
//! Nodes are stored in a flat array and each leaf holds a contiguous bucket
//! of up to `leaf_size` point ids in a shared permutation vector, so the
//! tree costs O(n) memory on top of the copied coordinates. Axes cycle with
//! depth and each split sorts its id range by `(coordinate, id)`, which
//! makes construction fully deterministic.
//!
//! Queries are branch-and-bound: the near side of a split is descended
//! first, and the far side is visited only when the axis gap could still
//! beat the current worst candidate. The per-axis gap `|q[axis] - split|`
//! lower-bounds every Minkowski-p distance (including Chebyshev) to points
//! beyond the split, so pruning is exact for all supported metrics.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::index::{Metric, Neighbor, NeighborResult, NearestNeighborIndex};
use crate::table::FingerprintTable;

enum Node {
    Internal {
        axis: usize,
        split: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        start: usize,
        end: usize,
    },
}

/// k-d tree index over all fingerprints of one table.
///
/// Built once from a table; read-only afterwards. Point *i* is row *i* of
/// the source table.
pub struct KdTree {
    dims: usize,
    len: usize,
    metric: Metric,
    parallel: bool,
    /// Row-major coordinate buffer: point i is `points[i*dims..(i+1)*dims]`
    points: Vec<f64>,
    /// Permutation of point ids referenced by leaf buckets
    ids: Vec<usize>,
    nodes: Vec<Node>,
}

impl KdTree {
    /// Build the tree over every row of `table`.
    ///
    /// `metric` is fixed for the lifetime of the index; `parallel` controls
    /// whether `query_all` fans out over the rayon pool.
    pub fn build(table: &FingerprintTable, metric: Metric, leaf_size: usize, parallel: bool) -> Self {
        let dims = table.fingerprint_len();
        let len = table.len();

        let mut points = Vec::with_capacity(len * dims);
        for row in table.rows() {
            for i in 0..dims {
                points.push(row.fingerprint.coord(i));
            }
        }

        let mut tree = Self {
            dims,
            len,
            metric,
            parallel,
            points,
            ids: (0..len).collect(),
            nodes: Vec::new(),
        };
        if len > 0 {
            tree.split_range(0, len, 0, leaf_size.max(1));
        }
        tree
    }

    fn coord(&self, id: usize, axis: usize) -> f64 {
        self.points[id * self.dims + axis]
    }

    fn point(&self, id: usize) -> &[f64] {
        &self.points[id * self.dims..(id + 1) * self.dims]
    }

    /// Recursively partition `ids[start..end]`, returning the node index
    fn split_range(&mut self, start: usize, end: usize, depth: usize, leaf_size: usize) -> usize {
        let n = end - start;
        let node_idx = self.nodes.len();

        if n <= leaf_size {
            self.nodes.push(Node::Leaf { start, end });
            return node_idx;
        }

        let axis = depth % self.dims;
        // Deterministic median split; (coordinate, id) ordering fixes the
        // layout even when many coordinates are equal, which is the common
        // case for binary fingerprints
        let dims = self.dims;
        let points = &self.points;
        self.ids[start..end].sort_unstable_by(|&a, &b| {
            points[a * dims + axis]
                .total_cmp(&points[b * dims + axis])
                .then(a.cmp(&b))
        });
        let mid = start + n / 2;
        let split = self.coord(self.ids[mid], axis);

        // Placeholder, patched after both children exist
        self.nodes.push(Node::Leaf { start, end });
        let left = self.split_range(start, mid, depth + 1, leaf_size);
        let right = self.split_range(mid, end, depth + 1, leaf_size);
        self.nodes[node_idx] = Node::Internal {
            axis,
            split,
            left,
            right,
        };
        node_idx
    }

    fn knn(&self, query_id: usize, k: usize, max_distance: f64) -> Vec<Neighbor> {
        let query = self.point(query_id);
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        self.search(0, query, k, max_distance, &mut heap);

        let mut neighbors: Vec<Neighbor> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                distance: c.distance,
                index: c.index,
            })
            .collect();
        neighbors.resize(k, Neighbor::sentinel(self.len));
        neighbors
    }

    fn search(
        &self,
        node: usize,
        query: &[f64],
        k: usize,
        max_distance: f64,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &id in &self.ids[start..end] {
                    let distance = self.metric.distance(query, self.point(id));
                    if distance > max_distance {
                        continue;
                    }
                    let candidate = Candidate {
                        distance,
                        index: id,
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if candidate < *heap.peek().unwrap() {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Internal {
                axis,
                split,
                left,
                right,
            } => {
                let gap = query[axis] - split;
                let (near, far) = if gap < 0.0 { (left, right) } else { (right, left) };
                self.search(near, query, k, max_distance, heap);

                // The far side can only improve the result if the axis gap
                // beats both the cutoff and the current worst candidate.
                // Non-strict comparison keeps equal-distance candidates
                // reachable so index tie-breaking stays exact.
                let mut bound = max_distance;
                if heap.len() == k {
                    bound = bound.min(heap.peek().unwrap().distance);
                }
                if gap.abs() <= bound {
                    self.search(far, query, k, max_distance, heap);
                }
            }
        }
    }
}

impl NearestNeighborIndex for KdTree {
    fn len(&self) -> usize {
        self.len
    }

    fn query(&self, position: usize, k: usize, max_distance: f64) -> Result<NeighborResult> {
        if position >= self.len {
            return Err(Error::OutOfRange {
                index: position,
                len: self.len,
            });
        }
        Ok(NeighborResult {
            query: position,
            neighbors: self.knn(position, k, max_distance),
        })
    }

    fn query_all(&self, k: usize, max_distance: f64) -> Result<Vec<NeighborResult>> {
        if self.parallel {
            // Positional collect keeps result order independent of worker
            // arrival order
            (0..self.len)
                .into_par_iter()
                .map(|position| self.query(position, k, max_distance))
                .collect()
        } else {
            (0..self.len)
                .map(|position| self.query(position, k, max_distance))
                .collect()
        }
    }
}

/// Heap entry ordered by `(distance, index)`; the heap keeps the worst
/// candidate on top so it can be evicted in O(log k)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance: f64,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Distances are finite and non-negative here, total_cmp is safe
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// -- Tests --
