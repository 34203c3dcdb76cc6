// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for operations that cannot produce a meaningful answer.

use crate::tree::MAX_DIMENSIONS;

/// Errors returned by [`KdTree`](crate::KdTree) constructors and queries.
///
/// Ordinary misses (a point that is not stored, a removal that finds nothing)
/// are not errors; those operations return `bool` or `Option`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KdTreeError {
    /// A nearest-neighbor query was issued against a tree with no points.
    #[error("nearest-neighbor search on an empty tree")]
    EmptyTree,
    /// A nearest-neighbor query asked for zero neighbors.
    #[error("nearest-neighbor search needs at least one neighbor")]
    ZeroNeighbors,
    /// A query point had a NaN or infinite coordinate.
    #[error("query point has a non-finite coordinate")]
    NonFinitePoint,
    /// The requested dimensionality is outside `1..=3`.
    #[error("tree dimensionality must be between 1 and {}, found {found}", MAX_DIMENSIONS)]
    InvalidDimensions {
        /// The dimensionality that was requested.
        found: usize,
    },
}
