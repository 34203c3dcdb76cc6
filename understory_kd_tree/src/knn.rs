// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exact k-nearest-neighbor search.

use alloc::vec::Vec;
use core::cmp::Ordering;

use smallvec::smallvec;

use crate::error::KdTreeError;
use crate::tree::{KdTree, NodeId, Stack};
use crate::types::{KdPoint, Point3};

#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance_sq: f64,
    point: Point3,
    id: NodeId,
}

impl Candidate {
    /// Nearer first, then by point order, then by slot so duplicates stay distinct.
    fn rank(&self, other: &Self) -> Ordering {
        self.distance_sq
            .partial_cmp(&other.distance_sq)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.point.lexicographic_cmp(&other.point))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Best candidates seen so far, kept sorted by [`Candidate::rank`].
///
/// Holds `wanted` entries, plus any extra entries that tie the worst distance
/// exactly.
#[derive(Debug)]
struct Candidates {
    wanted: usize,
    items: Vec<Candidate>,
}

impl Candidates {
    fn new(wanted: usize) -> Self {
        Self {
            wanted,
            items: Vec::with_capacity(wanted.min(64) + 1),
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.wanted
    }

    /// Squared distance of the farthest candidate.
    fn worst(&self) -> Option<f64> {
        self.items.last().map(|c| c.distance_sq)
    }

    fn contains(&self, id: NodeId) -> bool {
        self.items.iter().any(|c| c.id == id)
    }

    fn offer(&mut self, candidate: Candidate) {
        if self.contains(candidate.id) {
            return;
        }
        match self.worst() {
            Some(worst) if self.is_full() => {
                if candidate.distance_sq < worst {
                    self.insert(candidate);
                    self.evict_past_cutoff();
                } else if candidate.distance_sq == worst {
                    self.insert(candidate);
                }
            }
            _ => self.insert(candidate),
        }
    }

    fn insert(&mut self, candidate: Candidate) {
        let at = self
            .items
            .partition_point(|c| c.rank(&candidate) == Ordering::Less);
        self.items.insert(at, candidate);
    }

    /// Drop everything strictly farther than the `wanted`-th candidate.
    fn evict_past_cutoff(&mut self) {
        if self.items.len() <= self.wanted {
            return;
        }
        let cutoff = self.items[self.wanted - 1].distance_sq;
        let keep = self.items.partition_point(|c| c.distance_sq <= cutoff);
        self.items.truncate(keep);
    }

    /// Whether a subtree whose points are all at least `bound_sq` away could
    /// still contribute.
    fn admits(&self, bound_sq: f64) -> bool {
        !self.is_full() || self.worst().is_none_or(|worst| bound_sq <= worst)
    }
}

impl<P: KdPoint> KdTree<P> {
    /// Return the `k` values nearest to `target`, nearest first.
    ///
    /// Distances are Euclidean. Equidistant values are ordered by
    /// [`Point3::lexicographic_cmp`]. When several values tie the `k`-th
    /// distance exactly, all of them are returned, so the result can be longer
    /// than `k`. Asking for more values than the tree holds returns them all.
    ///
    /// The search descends to the node where `target` would be inserted, then
    /// walks back up through every ancestor. At each one it explores the
    /// subtree the walk did not come from, skipping any child whose splitting
    /// plane is farther from `target` than the current worst candidate.
    ///
    /// # Errors
    ///
    /// - [`KdTreeError::ZeroNeighbors`] if `k` is 0.
    /// - [`KdTreeError::NonFinitePoint`] if `target` has a NaN or infinite coordinate.
    /// - [`KdTreeError::EmptyTree`] if the tree holds no values.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use understory_kd_tree::{KdTree, Point3};
    ///
    /// let tree = KdTree::from_points([
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(-1.0, 0.0, 0.0),
    ///     Point3::new(0.0, 0.0, 5.0),
    /// ]);
    ///
    /// // Both unit points tie for nearest, so both come back.
    /// let near = tree.nearest_neighbors(1, Point3::ORIGIN).unwrap();
    /// assert_eq!(near, [&Point3::new(-1.0, 0.0, 0.0), &Point3::new(1.0, 0.0, 0.0)]);
    /// ```
    pub fn nearest_neighbors(
        &self,
        k: usize,
        target: impl Into<Point3>,
    ) -> Result<Vec<&P>, KdTreeError> {
        let target = target.into();
        if k == 0 {
            return Err(KdTreeError::ZeroNeighbors);
        }
        if !target.is_finite() {
            return Err(KdTreeError::NonFinitePoint);
        }
        let start = self.descend(target).ok_or(KdTreeError::EmptyTree)?;

        let mut candidates = Candidates::new(k);
        let mut examined = 0;
        let mut came_from = None;
        let mut current = Some(start);
        while let Some(id) = current {
            examined += self.search_subtree(id, came_from, target, &mut candidates);
            came_from = Some(id);
            current = self.node(id).parent;
        }
        log::trace!(
            "knn k={k}: examined {examined} of {} nodes, {} results",
            self.len(),
            candidates.items.len()
        );

        Ok(candidates
            .items
            .iter()
            .map(|c| &self.node(c.id).value)
            .collect())
    }

    /// The value nearest to `target`.
    ///
    /// When several values are equally near, the first in
    /// [`Point3::lexicographic_cmp`] order wins.
    ///
    /// # Errors
    ///
    /// As for [`KdTree::nearest_neighbors`].
    pub fn nearest(&self, target: impl Into<Point3>) -> Result<&P, KdTreeError> {
        self.nearest_neighbors(1, target)?
            .into_iter()
            .next()
            .ok_or(KdTreeError::EmptyTree)
    }

    /// Offer `top` and its subtree to `candidates`, except the subtree rooted
    /// at `skip`. Returns the number of nodes examined.
    fn search_subtree(
        &self,
        top: NodeId,
        skip: Option<NodeId>,
        target: Point3,
        candidates: &mut Candidates,
    ) -> usize {
        let mut examined = 0;
        // Each entry carries a lower bound on the squared distance from
        // `target` to anything in that subtree.
        let mut stack: Stack<(NodeId, f64)> = smallvec![(top, 0.0)];
        while let Some((id, bound_sq)) = stack.pop() {
            if !candidates.admits(bound_sq) {
                continue;
            }
            let node = self.node(id);
            candidates.offer(Candidate {
                distance_sq: node.point.distance_squared(target),
                point: node.point,
                id,
            });
            examined += 1;

            let axis = self.axis_of(node);
            let delta = target.coord(axis) - node.point.coord(axis);
            let (near, far) = if delta > 0.0 {
                (node.greater, node.lesser)
            } else {
                (node.lesser, node.greater)
            };
            let far_bound = bound_sq.max(delta * delta);
            // Far first, so the near side is popped and tightens the bound first.
            for (child, bound) in [(far, far_bound), (near, bound_sq)] {
                if let Some(child) = child
                    && Some(child) != skip
                    && candidates.admits(bound)
                {
                    stack.push((child, bound));
                }
            }
        }
        examined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{assert_invariants, random_points};
    use alloc::vec;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Every point within the `k`-th smallest distance, ordered like the search.
    fn brute_force(points: &[Point3], k: usize, target: Point3) -> Vec<Point3> {
        let mut all = points.to_vec();
        all.sort_by(|a, b| {
            a.distance_squared(target)
                .partial_cmp(&b.distance_squared(target))
                .unwrap()
                .then_with(|| a.lexicographic_cmp(b))
        });
        let cutoff = all[k.min(all.len()) - 1].distance_squared(target);
        all.retain(|p| p.distance_squared(target) <= cutoff);
        all
    }

    fn search(tree: &KdTree, k: usize, target: Point3) -> Vec<Point3> {
        tree.nearest_neighbors(k, target)
            .unwrap()
            .into_iter()
            .copied()
            .collect()
    }

    fn wikipedia_tree() -> KdTree {
        KdTree::from_points([
            Point3::new_2d(2.0, 3.0),
            Point3::new_2d(5.0, 4.0),
            Point3::new_2d(9.0, 6.0),
            Point3::new_2d(4.0, 7.0),
            Point3::new_2d(8.0, 1.0),
            Point3::new_2d(7.0, 2.0),
        ])
    }

    #[test]
    fn nearest_of_six_planar_points() {
        let tree = wikipedia_tree();
        assert_eq!(
            search(&tree, 1, Point3::new_2d(9.0, 2.0)),
            vec![Point3::new_2d(8.0, 1.0)]
        );

        let planar = KdTree::from_points_with_dimensions(tree.iter().copied(), 2).unwrap();
        assert_eq!(
            search(&planar, 1, Point3::new_2d(9.0, 2.0)),
            vec![Point3::new_2d(8.0, 1.0)]
        );
        assert_eq!(
            search(&planar, 3, Point3::new_2d(9.0, 2.0)),
            vec![
                Point3::new_2d(8.0, 1.0),
                Point3::new_2d(7.0, 2.0),
                Point3::new_2d(9.0, 6.0),
            ]
        );
    }

    #[test]
    fn stored_target_comes_first() {
        let tree = wikipedia_tree();
        for p in tree.iter().copied() {
            let near = search(&tree, 1, p);
            assert_eq!(near, vec![p], "{p} is its own nearest neighbor");
            assert_eq!(*tree.nearest(p).unwrap(), p);
        }
    }

    #[test]
    fn k_larger_than_tree_returns_everything() {
        let tree = wikipedia_tree();
        let target = Point3::new_2d(0.0, 0.0);
        let all = search(&tree, 100, target);
        assert_eq!(all.len(), 6);
        let points: Vec<Point3> = tree.iter().copied().collect();
        assert_eq!(all, brute_force(&points, 100, target));
    }

    #[test]
    fn ties_at_the_cutoff_extend_the_result() {
        let tree = KdTree::from_points([
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(0.0, 0.5, 0.0),
        ]);
        assert_eq!(
            search(&tree, 2, Point3::ORIGIN),
            vec![
                Point3::new(0.0, 0.5, 0.0),
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
            ]
        );
        assert_eq!(
            search(&tree, 1, Point3::ORIGIN),
            vec![Point3::new(0.0, 0.5, 0.0)]
        );
    }

    #[test]
    fn nearer_candidate_evicts_every_tied_worst() {
        // Three equidistant points fill the set past k, then nearer ones arrive.
        let mut c = Candidates::new(2);
        let far = [
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(-2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        for (i, p) in far.into_iter().enumerate() {
            c.offer(Candidate {
                distance_sq: p.distance_squared(Point3::ORIGIN),
                point: p,
                id: NodeId::new(i),
            });
        }
        assert_eq!(c.items.len(), 3);
        c.offer(Candidate {
            distance_sq: 1.0,
            point: Point3::new(1.0, 0.0, 0.0),
            id: NodeId::new(9),
        });
        assert_eq!(c.items.len(), 4, "second-best distance still ties three points");
        c.offer(Candidate {
            distance_sq: 0.25,
            point: Point3::new(0.5, 0.0, 0.0),
            id: NodeId::new(10),
        });
        assert_eq!(c.items.len(), 2);
        assert_eq!(c.worst(), Some(1.0));
        // Re-offering a held node is ignored.
        c.offer(Candidate {
            distance_sq: 1.0,
            point: Point3::new(1.0, 0.0, 0.0),
            id: NodeId::new(9),
        });
        assert_eq!(c.items.len(), 2);
    }

    #[test]
    fn duplicates_are_distinct_neighbors() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let mut tree = KdTree::new();
        tree.add(p);
        tree.add(p);
        tree.add(Point3::new(5.0, 5.0, 5.0));
        assert_eq!(search(&tree, 2, Point3::ORIGIN), vec![p, p]);
        assert_eq!(search(&tree, 1, Point3::ORIGIN), vec![p, p]);
    }

    #[test]
    fn errors_are_reported() {
        let empty: KdTree = KdTree::new();
        assert_eq!(
            empty.nearest_neighbors(1, Point3::ORIGIN).unwrap_err(),
            KdTreeError::EmptyTree
        );
        assert_eq!(empty.nearest(Point3::ORIGIN).unwrap_err(), KdTreeError::EmptyTree);

        let tree = wikipedia_tree();
        assert_eq!(
            tree.nearest_neighbors(0, Point3::ORIGIN).unwrap_err(),
            KdTreeError::ZeroNeighbors
        );
        assert_eq!(
            tree.nearest_neighbors(1, Point3::new(f64::NAN, 0.0, 0.0))
                .unwrap_err(),
            KdTreeError::NonFinitePoint
        );
    }

    #[test]
    fn matches_brute_force_on_random_data() {
        let mut rng = StdRng::seed_from_u64(42);
        for k_dims in 1..=3 {
            for &(n, span) in &[(1, 10), (7, 10), (150, 1000), (400, 5)] {
                let points = random_points(&mut rng, n, span);
                let tree = KdTree::from_points_with_dimensions(points.clone(), k_dims).unwrap();
                for _ in 0..25 {
                    let target = Point3::new(
                        f64::from(rng.gen_range(-span - 2..=span + 2)),
                        f64::from(rng.gen_range(-span - 2..=span + 2)),
                        f64::from(rng.gen_range(-span - 2..=span + 2)),
                    );
                    for k in [1, 2, 5, 16] {
                        assert_eq!(
                            search(&tree, k, target),
                            brute_force(&points, k, target),
                            "k={k} target={target} n={n} dims={k_dims}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn matches_brute_force_after_inserts_and_removals() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut points = random_points(&mut rng, 120, 8);
        let mut tree = KdTree::new();
        tree.extend(points.iter().copied());
        for _ in 0..60 {
            let victim = points.swap_remove(rng.gen_range(0..points.len()));
            assert!(tree.remove(victim));
        }
        for p in random_points(&mut rng, 40, 8) {
            tree.add(p);
            points.push(p);
        }
        assert_invariants(&tree);

        for target in random_points(&mut rng, 40, 10) {
            for k in [1, 3, 8] {
                assert_eq!(search(&tree, k, target), brute_force(&points, k, target));
            }
        }
    }

    #[test]
    fn search_on_degenerate_chain() {
        let mut tree = KdTree::with_dimensions(1).unwrap();
        for i in 0..3_000_i32 {
            tree.add(Point3::new(f64::from(i), 0.0, 0.0));
        }
        assert_eq!(
            search(&tree, 2, Point3::new(1_500.2, 0.0, 0.0)),
            vec![Point3::new(1_500.0, 0.0, 0.0), Point3::new(1_501.0, 0.0, 0.0)]
        );
        assert_eq!(
            search(&tree, 1, Point3::new(-10.0, 0.0, 0.0)),
            vec![Point3::ORIGIN]
        );
    }
}
