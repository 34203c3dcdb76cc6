// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable tree diagram for debugging.

use alloc::string::String;
use core::fmt;

use smallvec::smallvec;

use crate::tree::{KdTree, NodeId, Side, Stack};
use crate::types::KdPoint;

/// Renders a [`KdTree`] as an indented diagram.
///
/// Created by [`KdTree::display`]. Each line shows one node's depth and point;
/// children are listed lesser first and tagged with their side.
///
/// ```rust
/// use understory_kd_tree::{KdTree, Point3};
///
/// let tree = KdTree::from_points([
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(2.0, 0.0, 0.0),
///     Point3::new(3.0, 0.0, 0.0),
/// ]);
/// let expected = "\
/// └── depth=0 id=(2, 0, 0)
///     ├── [lesser] depth=1 id=(1, 0, 0)
///     └── [greater] depth=1 id=(3, 0, 0)
/// ";
/// assert_eq!(tree.display().to_string(), expected);
/// ```
pub struct TreeDisplay<'a, P> {
    tree: &'a KdTree<P>,
}

impl<P> fmt::Debug for TreeDisplay<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeDisplay")
            .field("tree", self.tree)
            .finish()
    }
}

impl<P: KdPoint> KdTree<P> {
    /// A [`Display`](fmt::Display) adapter drawing this tree.
    pub fn display(&self) -> TreeDisplay<'_, P> {
        TreeDisplay { tree: self }
    }
}

impl<P: KdPoint> fmt::Display for TreeDisplay<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.tree.root_id() else {
            return f.write_str("Tree has no nodes.");
        };

        // (node, indentation prefix, whether it is the last of its siblings)
        let mut stack: Stack<(NodeId, String, bool)> = smallvec![(root, String::new(), true)];
        while let Some((id, prefix, is_tail)) = stack.pop() {
            let node = self.tree.node(id);
            f.write_str(&prefix)?;
            f.write_str(if is_tail { "└── " } else { "├── " })?;
            if let Some(parent) = node.parent {
                match self.tree.node(parent).side_of(id) {
                    Side::Lesser => f.write_str("[lesser] ")?,
                    Side::Greater => f.write_str("[greater] ")?,
                }
            }
            writeln!(f, "depth={} id={}", node.depth, node.point)?;

            let mut child_prefix = prefix;
            child_prefix.push_str(if is_tail { "    " } else { "│   " });
            match (node.lesser, node.greater) {
                (Some(lesser), Some(greater)) => {
                    stack.push((greater, child_prefix.clone(), true));
                    stack.push((lesser, child_prefix, false));
                }
                (Some(only), None) | (None, Some(only)) => {
                    stack.push((only, child_prefix, true));
                }
                (None, None) => {}
            }
        }
        Ok(())
    }
}
