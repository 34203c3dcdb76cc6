// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build a small planar k-d tree, print it, and run a few neighbor queries.
//!
//! This example shows:
//! - bulk building a two-dimensional tree from `kurbo::Point`s,
//! - reading the structure through `display()`,
//! - neighbor ties growing the result past `k`,
//! - removing a point and querying again.
//!
//! Run:
//! - `cargo run -p understory_demos --example nearest_neighbors`

use kurbo::Point;
use understory_kd_tree::{KdTree, KdTreeError, Point3};

fn main() -> Result<(), KdTreeError> {
    let mut tree = KdTree::from_points_with_dimensions(
        [
            Point::new(2.0, 3.0),
            Point::new(5.0, 4.0),
            Point::new(9.0, 6.0),
            Point::new(4.0, 7.0),
            Point::new(8.0, 1.0),
            Point::new(7.0, 2.0),
        ],
        2,
    )?;

    println!("== Tree ({} points, height {}) ==", tree.len(), tree.height());
    print!("{}", tree.display());

    let target = Point::new(9.0, 2.0);
    for k in 1..=3 {
        let found = tree.nearest_neighbors(k, target)?;
        println!("k={k} near {target:?}: {found:?}");
    }

    // (5, 4) and (7, 2) are both at distance sqrt(2) from (6, 3).
    let tied = tree.nearest_neighbors(1, Point::new(6.0, 3.0))?;
    println!("k=1 near (6, 3) with a tie: {tied:?}");

    let removed = tree.take(Point3::new_2d(8.0, 1.0));
    println!("\n== After removing {removed:?} ==");
    print!("{}", tree.display());
    println!("nearest to {target:?}: {:?}", tree.nearest(target)?);

    match tree.nearest_neighbors(0, target) {
        Err(err) => println!("k=0 is rejected: {err}"),
        Ok(found) => println!("unexpected result: {found:?}"),
    }
    Ok(())
}
