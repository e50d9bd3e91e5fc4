//! Breadth-first and depth-first walks over a [`Tree`].

use std::collections::VecDeque;
use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use generational_arena::Index;
use serde::{Deserialize, Serialize};

use crate::domain::tree::{NodeRef, Tree};

/// Visiting order of a traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Order {
    /// All children of a node before any grandchildren.
    #[default]
    BreadthFirst,
    /// Pre-order: each child's subtree completes before the next sibling.
    DepthFirst,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::BreadthFirst => f.write_str("breadth-first"),
            Order::DepthFirst => f.write_str("depth-first"),
        }
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breadth-first" | "breadth_first" | "bfs" => Ok(Order::BreadthFirst),
            "depth-first" | "depth_first" | "dfs" => Ok(Order::DepthFirst),
            other => Err(format!("unknown traversal order: {other}")),
        }
    }
}

/// Lazy walk over a tree. Finite and single-pass.
///
/// Breadth-first pops pending nodes from the front and queues children at
/// the back. Depth-first pops from the back and pushes children in reverse,
/// so siblings come out left to right.
pub struct Traverse<'a, T> {
    tree: &'a Tree<T>,
    order: Order,
    pending: VecDeque<Index>,
}

impl<'a, T> Traverse<'a, T> {
    pub(crate) fn new(tree: &'a Tree<T>, order: Order) -> Self {
        Self {
            tree,
            order,
            pending: tree.root_slot().into_iter().collect(),
        }
    }

    pub fn order(&self) -> Order {
        self.order
    }

    fn pop(&mut self) -> Option<Index> {
        match self.order {
            Order::BreadthFirst => self.pending.pop_front(),
            Order::DepthFirst => self.pending.pop_back(),
        }
    }
}

impl<'a, T> Iterator for Traverse<'a, T> {
    type Item = NodeRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(slot) = self.pop() {
            let Some(node) = tree.view(slot) else {
                continue;
            };
            let children = node.node().children();
            match self.order {
                Order::BreadthFirst => self.pending.extend(children.iter().copied()),
                Order::DepthFirst => self.pending.extend(children.iter().rev().copied()),
            }
            return Some(node);
        }
        None
    }
}

impl<T> FusedIterator for Traverse<'_, T> {}
