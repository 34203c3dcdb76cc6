// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: arena, bulk build, insert, lookup, removal.

use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use smallvec::{SmallVec, smallvec};

use crate::error::KdTreeError;
use crate::types::{Axis, KdPoint, Point3, compare};

/// Dimensionality used by [`KdTree::new`].
pub const DEFAULT_DIMENSIONS: usize = 3;

/// Largest dimensionality a tree can be built with.
pub const MAX_DIMENSIONS: usize = 3;

/// Traversal stack; spills to the heap for trees deeper than the inline capacity.
pub(crate) type Stack<T> = SmallVec<[T; 32]>;

/// Index of a node slot in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "NodeId uses 32-bit indices by design."
    )]
    pub(crate) const fn new(idx: usize) -> Self {
        Self(idx as u32)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Which child slot of a parent a node hangs from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Lesser,
    Greater,
}

/// Where a freshly built or detached subtree is attached.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Link {
    Root,
    Child(NodeId, Side),
}

impl Link {
    fn parent(self) -> Option<NodeId> {
        match self {
            Self::Root => None,
            Self::Child(parent, _) => Some(parent),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node<P> {
    pub(crate) value: P,
    /// Cached `value.position()`.
    pub(crate) point: Point3,
    pub(crate) depth: usize,
    pub(crate) parent: Option<NodeId>,
    pub(crate) lesser: Option<NodeId>,
    pub(crate) greater: Option<NodeId>,
}

impl<P> Node<P> {
    pub(crate) fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Lesser => self.lesser,
            Side::Greater => self.greater,
        }
    }

    fn child_slot_mut(&mut self, side: Side) -> &mut Option<NodeId> {
        match side {
            Side::Lesser => &mut self.lesser,
            Side::Greater => &mut self.greater,
        }
    }

    /// The side `child` hangs from; `child` must be one of this node's children.
    pub(crate) fn side_of(&self, child: NodeId) -> Side {
        if self.lesser == Some(child) {
            Side::Lesser
        } else {
            debug_assert_eq!(self.greater, Some(child), "not a child of this node");
            Side::Greater
        }
    }
}

/// A k-d tree over 3D points.
///
/// Nodes live in an arena of slots addressed by index, so every node can reach
/// its parent without shared ownership. Freed slots are reused by later
/// insertions.
///
/// The splitting axis of a node is its depth modulo the tree's dimensionality
/// (1 to 3, fixed at construction). For a node on axis `a`, every point in its
/// lesser subtree is `<=` the node on `a` and every point in its greater
/// subtree is `>` it. Duplicate points are allowed.
///
/// Values are any [`KdPoint`]; queries take anything convertible into a
/// [`Point3`].
///
/// ## Example
///
/// ```rust
/// use understory_kd_tree::{KdTree, Point3};
///
/// let mut tree = KdTree::from_points([
///     Point3::new_2d(2.0, 3.0),
///     Point3::new_2d(5.0, 4.0),
///     Point3::new_2d(9.0, 6.0),
/// ]);
/// assert!(tree.add(Point3::new_2d(8.0, 1.0)));
/// assert!(tree.contains(Point3::new_2d(5.0, 4.0)));
///
/// let near = tree.nearest_neighbors(1, Point3::new_2d(9.0, 2.0)).unwrap();
/// assert_eq!(near, [&Point3::new_2d(8.0, 1.0)]);
///
/// assert!(tree.remove(Point3::new_2d(5.0, 4.0)));
/// assert_eq!(tree.len(), 3);
/// ```
#[derive(Clone)]
pub struct KdTree<P = Point3> {
    /// slots
    nodes: Vec<Option<Node<P>>>,
    free_list: Vec<usize>,
    root: Option<NodeId>,
    dimensions: usize,
    len: usize,
}

impl<P> fmt::Debug for KdTree<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdTree")
            .field("dimensions", &self.dimensions)
            .field("len", &self.len)
            .field("nodes_total", &self.nodes.len())
            .field("free_list", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl<P: KdPoint> Default for KdTree<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: KdPoint> KdTree<P> {
    /// Create an empty three-dimensional tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: None,
            dimensions: DEFAULT_DIMENSIONS,
            len: 0,
        }
    }

    /// Create an empty tree splitting on the first `dimensions` axes.
    ///
    /// Use `2` for planar data (all `z = 0`) so no level is spent splitting on `z`.
    pub fn with_dimensions(dimensions: usize) -> Result<Self, KdTreeError> {
        if !(1..=MAX_DIMENSIONS).contains(&dimensions) {
            return Err(KdTreeError::InvalidDimensions { found: dimensions });
        }
        Ok(Self {
            dimensions,
            ..Self::new()
        })
    }

    /// Build a three-dimensional tree from a collection of values.
    ///
    /// Each subtree is rooted at the median of its points along the split axis.
    /// Values with a non-finite coordinate are skipped.
    pub fn from_points(points: impl IntoIterator<Item = P>) -> Self {
        let mut tree = Self::new();
        tree.bulk_load(points);
        tree
    }

    /// Build a tree with the given dimensionality from a collection of values.
    ///
    /// See [`KdTree::from_points`] and [`KdTree::with_dimensions`].
    pub fn from_points_with_dimensions(
        points: impl IntoIterator<Item = P>,
        dimensions: usize,
    ) -> Result<Self, KdTreeError> {
        let mut tree = Self::with_dimensions(dimensions)?;
        tree.bulk_load(points);
        Ok(tree)
    }

    fn bulk_load(&mut self, points: impl IntoIterator<Item = P>) {
        let mut skipped = 0_usize;
        let values: Vec<P> = points
            .into_iter()
            .filter(|value| {
                let finite = value.position().is_finite();
                skipped += usize::from(!finite);
                finite
            })
            .collect();
        self.nodes.reserve(values.len());
        self.build_subtree(values, 0, Link::Root);
        log::debug!(
            "built k-d tree of {} points ({skipped} non-finite skipped)",
            self.len
        );
    }

    /// Number of splitting axes (1 to 3).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored values, duplicates included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree stores no values.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of levels (0 for an empty tree, 1 for a lone root).
    pub fn height(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .map(|node| node.depth + 1)
            .max()
            .unwrap_or(0)
    }

    /// Drop every value. The dimensionality is kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
        self.root = None;
        self.len = 0;
    }

    /// Insert a value.
    ///
    /// Descends from the root, going lesser when the new point is `<=` the node
    /// on the node's axis and greater otherwise, and attaches a new leaf where
    /// the descent runs out. Equal points are kept as duplicates.
    ///
    /// Returns false, leaving the tree untouched, if the value's position has a
    /// non-finite coordinate.
    pub fn add(&mut self, value: P) -> bool {
        let point = value.position();
        if !point.is_finite() {
            return false;
        }
        let Some(mut current) = self.root else {
            self.alloc(value, 0, Link::Root);
            return true;
        };
        loop {
            let node = self.node(current);
            let side = self.route(node, point);
            match node.child(side) {
                Some(next) => current = next,
                None => {
                    let depth = node.depth + 1;
                    self.alloc(value, depth, Link::Child(current, side));
                    return true;
                }
            }
        }
    }

    /// Returns true if a value at exactly `point` is stored.
    pub fn contains(&self, point: impl Into<Point3>) -> bool {
        self.find_node(point.into()).is_some()
    }

    /// Find a stored value at exactly `point`.
    ///
    /// With duplicates, the one closest to the root is returned.
    pub fn find(&self, point: impl Into<Point3>) -> Option<&P> {
        self.find_node(point.into())
            .map(|id| &self.node(id).value)
    }

    /// Remove one value at exactly `point`. Returns true if one was found.
    ///
    /// See [`KdTree::take`].
    pub fn remove(&mut self, point: impl Into<Point3>) -> bool {
        self.take(point).is_some()
    }

    /// Remove one value at exactly `point` and return it.
    ///
    /// The removed node's whole subtree is detached, and the remaining values
    /// of that subtree are rebuilt by median split at the same depth and
    /// reattached where the removed node was. This costs `O(s log s)` in the
    /// subtree size `s`, and keeps the axis invariant without any rotation.
    pub fn take(&mut self, point: impl Into<Point3>) -> Option<P> {
        let id = self.find_node(point.into())?;
        let node = self.node(id);
        let depth = node.depth;
        let link = match node.parent {
            None => Link::Root,
            Some(parent) => Link::Child(parent, self.node(parent).side_of(id)),
        };
        self.detach(link);
        let (value, rest) = self.drain_subtree(id);
        if !rest.is_empty() {
            log::debug!("rebuilding k-d subtree of {} points at depth {depth}", rest.len());
        }
        self.build_subtree(rest, depth, link);
        Some(value)
    }

    /// Iterate values in pre-order: a node, then its lesser subtree, then its
    /// greater subtree.
    pub fn iter(&self) -> Iter<'_, P> {
        Iter {
            tree: self,
            stack: self.root.into_iter().collect(),
        }
    }

    /// A read-only view of the root node, or `None` for an empty tree.
    pub fn root_view(&self) -> Option<NodeView<'_, P>> {
        self.root.map(|id| NodeView { tree: self, id })
    }

    // --- internals ---

    /// The axis `node` splits on.
    #[inline]
    pub(crate) fn axis_of(&self, node: &Node<P>) -> Axis {
        Axis::for_depth(node.depth, self.dimensions)
    }

    /// The child slot a descent for `point` takes at `node`.
    ///
    /// Ties on the node's axis go lesser.
    #[inline]
    fn route(&self, node: &Node<P>, point: Point3) -> Side {
        match compare(self.axis_of(node), &point, &node.point) {
            Ordering::Greater => Side::Greater,
            Ordering::Less | Ordering::Equal => Side::Lesser,
        }
    }

    fn find_node(&self, point: Point3) -> Option<NodeId> {
        if !point.is_finite() {
            return None;
        }
        let mut current = self.root?;
        loop {
            let node = self.node(current);
            if node.point == point {
                return Some(current);
            }
            current = node.child(self.route(node, point))?;
        }
    }

    /// Descend towards `point` and return the exact match, or the last node
    /// reached before the needed child is missing.
    pub(crate) fn descend(&self, point: Point3) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            let node = self.node(current);
            if node.point == point {
                return Some(current);
            }
            match node.child(self.route(node, point)) {
                Some(next) => current = next,
                None => return Some(current),
            }
        }
    }

    /// Access a node; panics if `id` is stale.
    pub(crate) fn node(&self, id: NodeId) -> &Node<P> {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    /// Access a node mutably; panics if `id` is stale.
    fn node_mut(&mut self, id: NodeId) -> &mut Node<P> {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    pub(crate) fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Store `value` in a free slot and hang it from `link`.
    fn alloc(&mut self, value: P, depth: usize, link: Link) -> NodeId {
        let node = Node {
            point: value.position(),
            value,
            depth,
            parent: link.parent(),
            lesser: None,
            greater: None,
        };
        let id = if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = Some(node);
            NodeId::new(idx)
        } else {
            self.nodes.push(Some(node));
            NodeId::new(self.nodes.len() - 1)
        };
        match link {
            Link::Root => self.root = Some(id),
            Link::Child(parent, side) => *self.node_mut(parent).child_slot_mut(side) = Some(id),
        }
        self.len += 1;
        id
    }

    /// Release a slot and hand back its node.
    fn free(&mut self, id: NodeId) -> Node<P> {
        let node = self.nodes[id.idx()].take().expect("dangling NodeId");
        self.free_list.push(id.idx());
        self.len -= 1;
        node
    }

    /// Clear whatever `link` points at, without freeing it.
    fn detach(&mut self, link: Link) {
        match link {
            Link::Root => self.root = None,
            Link::Child(parent, side) => *self.node_mut(parent).child_slot_mut(side) = None,
        }
    }

    /// Free every slot of the subtree rooted at `top`.
    ///
    /// Returns the value of `top` and the values of its descendants in
    /// pre-order (lesser child and its subtree, then greater child and its
    /// subtree).
    fn drain_subtree(&mut self, top: NodeId) -> (P, Vec<P>) {
        let head = self.free(top);
        let mut rest = Vec::new();
        let mut stack: Stack<NodeId> = head.greater.into_iter().collect();
        stack.extend(head.lesser);
        while let Some(id) = stack.pop() {
            let node = self.free(id);
            stack.extend(node.greater);
            stack.extend(node.lesser);
            rest.push(node.value);
        }
        (head.value, rest)
    }

    /// Build a subtree over `values` rooted at `depth` and hang it from `link`.
    ///
    /// Each level stable-sorts its values along the level's axis and picks the
    /// lower median (`len / 2`). If values after the median tie it on that
    /// axis, the median moves right past them so that every tie lands in the
    /// lesser subtree. Empty input attaches nothing.
    fn build_subtree(&mut self, values: Vec<P>, depth: usize, link: Link) {
        let mut work: Stack<(Vec<P>, usize, Link)> = smallvec![(values, depth, link)];
        while let Some((mut values, depth, link)) = work.pop() {
            if values.is_empty() {
                continue;
            }
            let axis = Axis::for_depth(depth, self.dimensions);
            values.sort_by(|a, b| compare(axis, &a.position(), &b.position()));

            let mut median = values.len() / 2;
            while median + 1 < values.len()
                && compare(
                    axis,
                    &values[median + 1].position(),
                    &values[median].position(),
                ) == Ordering::Equal
            {
                median += 1;
            }

            let greater = values.split_off(median + 1);
            let Some(value) = values.pop() else {
                unreachable!("median index is within bounds");
            };
            let id = self.alloc(value, depth, link);
            work.push((greater, depth + 1, Link::Child(id, Side::Greater)));
            work.push((values, depth + 1, Link::Child(id, Side::Lesser)));
        }
    }
}

impl<P: KdPoint> FromIterator<P> for KdTree<P> {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::from_points(iter)
    }
}

impl<P: KdPoint> Extend<P> for KdTree<P> {
    /// Insert values one at a time; see [`KdTree::add`].
    fn extend<I: IntoIterator<Item = P>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<'a, P: KdPoint> IntoIterator for &'a KdTree<P> {
    type Item = &'a P;
    type IntoIter = Iter<'a, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pre-order iterator over the values of a [`KdTree`].
pub struct Iter<'a, P> {
    tree: &'a KdTree<P>,
    stack: Stack<NodeId>,
}

impl<P> fmt::Debug for Iter<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("pending", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl<'a, P: KdPoint> Iterator for Iter<'a, P> {
    type Item = &'a P;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.greater);
        self.stack.extend(node.lesser);
        Some(&node.value)
    }
}

/// Read-only view of one node of a [`KdTree`].
///
/// Obtained from [`KdTree::root_view`]; walk down with [`NodeView::lesser`]
/// and [`NodeView::greater`].
pub struct NodeView<'a, P> {
    tree: &'a KdTree<P>,
    id: NodeId,
}

impl<P> Clone for NodeView<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for NodeView<'_, P> {}

impl<P: KdPoint> fmt::Debug for NodeView<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeView")
            .field("point", &self.point())
            .field("depth", &self.depth())
            .field("axis", &self.axis())
            .finish_non_exhaustive()
    }
}

impl<'a, P: KdPoint> NodeView<'a, P> {
    fn node(&self) -> &'a Node<P> {
        self.tree.node(self.id)
    }

    fn view(&self, id: Option<NodeId>) -> Option<Self> {
        id.map(|id| Self {
            tree: self.tree,
            id,
        })
    }

    /// The stored value.
    pub fn value(&self) -> &'a P {
        &self.node().value
    }

    /// The value's position.
    pub fn point(&self) -> Point3 {
        self.node().point
    }

    /// Distance from the root (the root is at depth 0).
    pub fn depth(&self) -> usize {
        self.node().depth
    }

    /// The axis this node splits on.
    pub fn axis(&self) -> Axis {
        self.tree.axis_of(self.node())
    }

    /// The lesser child, if any.
    pub fn lesser(&self) -> Option<Self> {
        self.view(self.node().lesser)
    }

    /// The greater child, if any.
    pub fn greater(&self) -> Option<Self> {
        self.view(self.node().greater)
    }

    /// The parent, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        self.view(self.node().parent)
    }
}
