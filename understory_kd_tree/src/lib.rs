// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory k-d tree: a mutable 3D point index with exact k-nearest-neighbor search.
//!
//! A [`KdTree`] stores values that have a position ([`KdPoint`]) and splits space on
//! `x`, `y`, `z` in turn as it gets deeper. Trees can be 1, 2, or 3 dimensional; a
//! two-dimensional tree only ever splits on `x` and `y`.
//!
//! - Bulk-build a balanced tree with [`KdTree::from_points`] (median split per level).
//! - Insert with [`KdTree::add`], look up with [`KdTree::contains`] and [`KdTree::find`].
//! - Remove with [`KdTree::remove`] or [`KdTree::take`]; the affected subtree is rebuilt
//!   in place so the tree stays valid.
//! - Query the `k` nearest values with [`KdTree::nearest_neighbors`].
//! - Inspect the structure with [`KdTree::root_view`], [`KdTree::iter`], and
//!   [`KdTree::display`].
//!
//! ## Neighbor ties
//!
//! Nearest-neighbor results are ordered by distance, then lexicographically by
//! position (`x`, then `y`, then `z`). When several values sit exactly at the distance
//! of the `k`-th neighbor, all of them are returned, so a result can be longer than `k`.
//! Duplicate points are distinct values and each counts as its own neighbor.
//!
//! ## Features
//!
//! - `std` *(default)*: use the standard library for float math.
//! - `libm`: use `libm` for float math in `no_std` builds.
//!
//! ### Float semantics
//!
//! Points with a NaN or infinite coordinate are never stored: [`KdTree::add`] rejects
//! them and the bulk constructors skip them. Equality is exact; there is no epsilon.
//!
//! # Example
//!
//! ```rust
//! use understory_kd_tree::{KdTree, Point3};
//!
//! let mut tree = KdTree::from_points([
//!     Point3::new_2d(2.0, 3.0),
//!     Point3::new_2d(5.0, 4.0),
//!     Point3::new_2d(9.0, 6.0),
//!     Point3::new_2d(4.0, 7.0),
//!     Point3::new_2d(8.0, 1.0),
//!     Point3::new_2d(7.0, 2.0),
//! ]);
//! assert_eq!(tree.len(), 6);
//!
//! let nearest = tree.nearest(Point3::new_2d(9.0, 2.0)).unwrap();
//! assert_eq!(*nearest, Point3::new_2d(8.0, 1.0));
//!
//! assert!(tree.remove(Point3::new_2d(8.0, 1.0)));
//! let nearest = tree.nearest(Point3::new_2d(9.0, 2.0)).unwrap();
//! assert_eq!(*nearest, Point3::new_2d(7.0, 2.0));
//! ```

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod display;
mod error;
mod knn;
mod tree;
mod types;

pub use display::TreeDisplay;
pub use error::KdTreeError;
pub use tree::{DEFAULT_DIMENSIONS, Iter, KdTree, MAX_DIMENSIONS, NodeView};
pub use types::{Axis, KdPoint, Point3, compare};
