//! Indexed tree built from `(id, parent_id, data)` rows arriving in any order.
//!
//! A tree here is a graph with three properties:
//! - a single root node with no inbound edge
//! - every other node has exactly one inbound edge (its parent)
//! - any node may have any number of outbound edges (children)
//!
//! Nodes live in a generational arena. Each node owns its children through
//! arena handles in insertion order and keeps a plain handle back to its
//! parent. A key index maps primary keys to arena slots for O(1) lookup.

use std::collections::VecDeque;
use std::fmt;

use generational_arena::{Arena, Index};
use itertools::Itertools;
use tracing::{debug, instrument, warn};

use crate::domain::error::{MergeConflict, MergeError};
use crate::domain::index::KeyIndex;
use crate::domain::node::{Node, NodeId, NO_PARENT};
use crate::domain::traverse::{Order, Traverse};

/// Outcome of [`Tree::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Attached under an existing parent, or became the first root.
    Added,
    /// Became the new root, adopting the previous root as its child.
    Rerooted,
    /// The key is already present; nothing changed.
    Existed,
    /// Parent unknown, key reserved, or the insert would close a cycle.
    Rejected,
}

impl Insertion {
    pub fn added(self) -> bool {
        matches!(self, Insertion::Added | Insertion::Rerooted)
    }

    pub fn existed(self) -> bool {
        matches!(self, Insertion::Existed)
    }
}

#[derive(Debug, Clone)]
pub struct Tree<T> {
    arena: Arena<Node<T>>,
    root: Option<Index>,
    index: KeyIndex,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    /// An empty tree.
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            index: KeyIndex::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_index(index: KeyIndex) -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            index,
        }
    }

    pub fn root(&self) -> Option<NodeRef<'_, T>> {
        self.root.and_then(|slot| self.view(slot))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains(id)
    }

    /// Insert a row as a node.
    ///
    /// - A key already in the tree yields [`Insertion::Existed`] without mutation.
    /// - The first node always becomes the root; its `parent_id` is kept but not resolved.
    /// - With a known parent the node is attached as its last child, unless
    ///   the node is the recorded parent of the current root: that would
    ///   close a cycle and is rejected.
    /// - With an unknown parent the node is accepted only if it is the
    ///   recorded parent of the current root. It then becomes the new root.
    ///   Any other orphan is rejected and may be retried once its parent exists.
    ///
    /// The cycle check only compares against the current root. Deeper cycles
    /// are not searched for.
    #[instrument(level = "trace", skip(self, data))]
    pub fn add(&mut self, id: NodeId, parent_id: NodeId, data: T) -> Insertion {
        if !self.index.is_initialized() {
            warn!(id, "add on a tree without an index");
            return Insertion::Rejected;
        }
        if id == NO_PARENT {
            warn!(parent_id, "node id {} is reserved for the root marker", NO_PARENT);
            return Insertion::Rejected;
        }
        if self.index.contains(id) {
            return Insertion::Existed;
        }

        let Some(root) = self.root else {
            let slot = self.arena.insert(Node::new(id, parent_id, data));
            self.root = Some(slot);
            self.index_slot(id, slot);
            return Insertion::Added;
        };
        let root_parent_id = self.arena.get(root).map(Node::parent_id);

        match self.index.find(parent_id) {
            Some(_) if root_parent_id == Some(id) => {
                debug!(id, parent_id, "rejected: node is the parent of the root");
                Insertion::Rejected
            }
            Some(parent) => {
                let mut node = Node::new(id, parent_id, data);
                node.set_parent(parent, parent_id);
                let slot = self.arena.insert(node);
                if let Some(parent) = self.arena.get_mut(parent) {
                    parent.add_children([slot]);
                }
                self.index_slot(id, slot);
                Insertion::Added
            }
            None if root_parent_id == Some(id) => {
                self.reroot(root, id, parent_id, data);
                Insertion::Rerooted
            }
            None => {
                debug!(id, parent_id, "rejected: parent not found");
                Insertion::Rejected
            }
        }
    }

    fn reroot(&mut self, old_root: Index, id: NodeId, parent_id: NodeId, data: T) {
        let slot = self.arena.insert(Node::new(id, parent_id, data));
        if let Some(old) = self.arena.get_mut(old_root) {
            old.set_parent(slot, id);
        }
        if let Some(new_root) = self.arena.get_mut(slot) {
            new_root.add_children([old_root]);
        }
        self.root = Some(slot);
        self.index_slot(id, slot);
        debug!(id, "rerooted");
    }

    fn index_slot(&mut self, id: NodeId, slot: Index) {
        // The index was checked for initialization on entry.
        if let Err(e) = self.index.insert(id, slot) {
            warn!(id, error = %e, "node stored but not indexed");
        }
    }

    /// Graft `other` onto this tree as a subtree.
    ///
    /// The root of `other` is attached under the node named by its
    /// `parent_id`. Refused when `other` is empty, when that node is missing,
    /// or when any key of `other` already exists here. Every check runs
    /// before anything is moved, so a refused merge leaves both trees as
    /// they were and hands `other` back inside the error.
    #[instrument(level = "trace", skip_all, fields(other_len = other.len()))]
    pub fn merge(&mut self, mut other: Tree<T>) -> Result<(), MergeError<T>> {
        let Some(other_root) = other.root else {
            return Err(MergeError::new(MergeConflict::EmptyTree, other));
        };
        let Some(head_parent_id) = other.arena.get(other_root).map(Node::parent_id) else {
            return Err(MergeError::new(MergeConflict::EmptyTree, other));
        };
        let Some(attach) = self.index.find(head_parent_id) else {
            debug!(parent_id = head_parent_id, "merge refused: attach point missing");
            return Err(MergeError::new(
                MergeConflict::DetachedRoot {
                    parent_id: head_parent_id,
                },
                other,
            ));
        };
        let duplicate = other.index.keys().find(|&id| self.index.contains(id));
        if let Some(id) = duplicate {
            debug!(id, "merge refused: duplicate key");
            return Err(MergeError::new(MergeConflict::DuplicateKey { id }, other));
        }

        // Move nodes breadth-first so every parent exists before its children.
        let mut pending = VecDeque::from([(other_root, attach, head_parent_id)]);
        while let Some((old_slot, new_parent, new_parent_id)) = pending.pop_front() {
            let Some(mut node) = other.arena.remove(old_slot) else {
                continue;
            };
            let children = node.replace_children(Vec::new());
            node.set_parent(new_parent, new_parent_id);
            let id = node.id();
            let slot = self.arena.insert(node);
            if let Some(parent) = self.arena.get_mut(new_parent) {
                parent.add_children([slot]);
            }
            self.index_slot(id, slot);
            pending.extend(children.into_iter().map(|child| (child, slot, id)));
        }
        debug!(attach = head_parent_id, len = self.len(), "merged");
        Ok(())
    }

    pub fn find(&self, id: NodeId) -> Option<NodeRef<'_, T>> {
        self.index.find(id).and_then(|slot| self.view(slot))
    }

    /// Mutable access to a node. Only its payload can be changed from outside.
    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        let slot = self.index.find(id)?;
        self.arena.get_mut(slot)
    }

    /// Ancestors of `id`, nearest parent first and root last.
    ///
    /// `None` when `id` is unknown; an empty list for the root.
    pub fn find_parents(&self, id: NodeId) -> Option<Vec<NodeRef<'_, T>>> {
        self.find(id).map(|node| node.ancestors().collect())
    }

    /// All nodes whose payload satisfies `predicate`, in index order.
    pub fn find_by<F>(&self, predicate: F) -> Vec<NodeRef<'_, T>>
    where
        F: Fn(&T) -> bool,
    {
        self.index
            .iter()
            .filter_map(|(_, slot)| self.view(slot))
            .filter(|node| predicate(node.data()))
            .collect()
    }

    /// All nodes whose payload equals `data`, in index order.
    pub fn find_by_data(&self, data: &T) -> Vec<NodeRef<'_, T>>
    where
        T: PartialEq,
    {
        self.find_by(|candidate| candidate == data)
    }

    /// Lazy, single-pass walk over the tree in the requested order.
    pub fn traverse(&self, order: Order) -> Traverse<'_, T> {
        Traverse::new(self, order)
    }

    pub fn bfs(&self) -> Traverse<'_, T> {
        self.traverse(Order::BreadthFirst)
    }

    pub fn dfs(&self) -> Traverse<'_, T> {
        self.traverse(Order::DepthFirst)
    }

    /// Primary keys in traversal order.
    pub fn keys(&self, order: Order) -> Vec<NodeId> {
        self.traverse(order).map(|node| node.id()).collect()
    }

    /// Number of levels; zero for an empty tree.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut pending: VecDeque<(Index, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((slot, depth)) = pending.pop_front() {
            max_depth = max_depth.max(depth);
            if let Some(node) = self.arena.get(slot) {
                pending.extend(node.children().iter().map(|&c| (c, depth + 1)));
            }
        }
        max_depth
    }

    /// Keys of nodes without children, in depth-first order.
    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.dfs()
            .filter(|node| node.child_count() == 0)
            .map(|node| node.id())
            .collect()
    }

    pub(crate) fn root_slot(&self) -> Option<Index> {
        self.root
    }

    pub(crate) fn view(&self, slot: Index) -> Option<NodeRef<'_, T>> {
        self.arena.get(slot).map(|node| NodeRef {
            tree: self,
            slot,
            node,
        })
    }
}

/// Read-only view of a node that can navigate to its relatives.
pub struct NodeRef<'a, T> {
    tree: &'a Tree<T>,
    slot: Index,
    node: &'a Node<T>,
}

impl<T> Clone for NodeRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NodeRef<'_, T> {}

impl<'a, T> NodeRef<'a, T> {
    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn parent_id(&self) -> NodeId {
        self.node.parent_id()
    }

    pub fn data(&self) -> &'a T {
        self.node.data()
    }

    pub fn node(&self) -> &'a Node<T> {
        self.node
    }

    pub fn is_root(&self) -> bool {
        self.tree.root_slot() == Some(self.slot)
    }

    pub fn child_count(&self) -> usize {
        self.node.child_count()
    }

    pub fn parent(&self) -> Option<NodeRef<'a, T>> {
        self.node.parent().and_then(|slot| self.tree.view(slot))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a, T>> + 'a {
        let tree = self.tree;
        self.node
            .children()
            .iter()
            .filter_map(move |&slot| tree.view(slot))
    }

    pub fn child_ids(&self) -> Vec<NodeId> {
        self.children().map(|child| child.id()).collect()
    }

    /// Parent, grandparent and so on up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'a, T>> + 'a {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    pub(crate) fn slot(&self) -> Index {
        self.slot
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id())
            .field("parent_id", &self.parent_id())
            .field("data", self.data())
            .field("children", &self.child_ids())
            .finish()
    }
}

impl<T: fmt::Debug> fmt::Display for NodeRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{id: {} parentID: {} data: {:?} children:[{}]}}",
            self.id(),
            self.parent_id(),
            self.data(),
            self.children().map(|child| child.id()).join(" ")
        )
    }
}
