// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point and axis primitives shared by the tree and the neighbor search.

use core::cmp::Ordering;
use core::fmt;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A point in 3D space.
///
/// 2D points are represented with `z = 0`; see [`Point3::new_2d`] and the
/// `From<kurbo::Point>` conversion.
///
/// Equality is exact `f64` equality on every coordinate. There is no epsilon.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Point3 {
    /// The point `(0, 0, 0)`.
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a point from its three coordinates.
    #[inline(always)]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create a point in the `z = 0` plane.
    #[inline(always)]
    pub const fn new_2d(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// The coordinate of this point along `axis`.
    #[inline]
    pub const fn coord(self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Whether every coordinate is finite (not NaN and not infinite).
    #[inline]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Squared Euclidean distance to `other`.
    ///
    /// Orders points the same way as [`Point3::distance`] without the square root,
    /// so ties stay exact.
    #[inline]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Total lexicographic ordering: x first, then y, then z.
    ///
    /// Used to break ties between equidistant neighbors. Coordinates that
    /// cannot be ordered (NaN) compare as equal.
    pub fn lexicographic_cmp(&self, other: &Self) -> Ordering {
        compare(Axis::X, self, other)
            .then_with(|| compare(Axis::Y, self, other))
            .then_with(|| compare(Axis::Z, self, other))
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<[f64; 3]> for Point3 {
    #[inline]
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<[f64; 2]> for Point3 {
    #[inline]
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new_2d(x, y)
    }
}

impl From<(f64, f64, f64)> for Point3 {
    #[inline]
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl From<kurbo::Point> for Point3 {
    #[inline]
    fn from(p: kurbo::Point) -> Self {
        Self::new_2d(p.x, p.y)
    }
}

/// A splitting axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Split on the x coordinate.
    X,
    /// Split on the y coordinate.
    Y,
    /// Split on the z coordinate.
    Z,
}

impl Axis {
    /// The axis used by a node at `depth` in a tree of `dimensions` (1 to 3).
    #[inline]
    pub(crate) const fn for_depth(depth: usize, dimensions: usize) -> Self {
        debug_assert!(
            dimensions >= 1 && dimensions <= 3,
            "dimensions are validated at construction"
        );
        match depth % dimensions {
            0 => Self::X,
            1 => Self::Y,
            _ => Self::Z,
        }
    }
}

/// Compare two points along a single axis.
///
/// Plain `f64` ordering on the selected coordinate, so `-0.0` and `0.0` tie.
/// Unordered values (NaN) compare as equal; the tree never stores them.
#[inline]
pub fn compare(axis: Axis, a: &Point3, b: &Point3) -> Ordering {
    a.coord(axis)
        .partial_cmp(&b.coord(axis))
        .unwrap_or(Ordering::Equal)
}

/// Values that can be stored in a [`KdTree`](crate::KdTree).
///
/// The tree only needs each value's position. Implement this for your own
/// types to keep data next to the point it is indexed by.
///
/// The position of a stored value must not change while it is in the tree.
///
/// ```rust
/// use understory_kd_tree::{KdPoint, KdTree, Point3};
///
/// #[derive(Debug)]
/// struct Star {
///     name: &'static str,
///     at: Point3,
/// }
///
/// impl KdPoint for Star {
///     fn position(&self) -> Point3 {
///         self.at
///     }
/// }
///
/// let mut sky = KdTree::new();
/// sky.add(Star { name: "sol", at: Point3::ORIGIN });
/// sky.add(Star { name: "proxima", at: Point3::new(1.3, 0.0, 0.0) });
///
/// let closest = sky.nearest(Point3::new(1.0, 0.0, 0.0)).unwrap();
/// assert_eq!(closest.name, "proxima");
/// ```
pub trait KdPoint {
    /// The position this value is indexed at.
    fn position(&self) -> Point3;
}

impl KdPoint for Point3 {
    #[inline(always)]
    fn position(&self) -> Point3 {
        *self
    }
}

impl KdPoint for [f64; 3] {
    #[inline]
    fn position(&self) -> Point3 {
        Point3::from(*self)
    }
}

impl KdPoint for [f64; 2] {
    #[inline]
    fn position(&self) -> Point3 {
        Point3::from(*self)
    }
}

impl KdPoint for (f64, f64, f64) {
    #[inline]
    fn position(&self) -> Point3 {
        Point3::from(*self)
    }
}

impl KdPoint for kurbo::Point {
    #[inline]
    fn position(&self) -> Point3 {
        Point3::from(*self)
    }
}
