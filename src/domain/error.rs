//! Domain-level errors (no I/O concerns)

use std::fmt;

use thiserror::Error;

use crate::domain::node::NodeId;
use crate::domain::tree::Tree;

/// Misuse of the tree's internal structures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("index used before initialization")]
    UninitializedIndex,
}

/// Why a merge was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeConflict {
    #[error("tree to merge is empty")]
    EmptyTree,

    #[error("attach point {parent_id} not found in target tree")]
    DetachedRoot { parent_id: NodeId },

    #[error("key {id} exists in both trees")]
    DuplicateKey { id: NodeId },
}

/// A refused merge. Gives the untouched source tree back to the caller.
pub struct MergeError<T> {
    conflict: MergeConflict,
    tree: Tree<T>,
}

impl<T> MergeError<T> {
    pub(crate) fn new(conflict: MergeConflict, tree: Tree<T>) -> Self {
        Self { conflict, tree }
    }

    pub fn conflict(&self) -> MergeConflict {
        self.conflict
    }

    /// Recover the tree that could not be merged.
    pub fn into_tree(self) -> Tree<T> {
        self.tree
    }
}

impl<T> fmt::Debug for MergeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeError")
            .field("conflict", &self.conflict)
            .field("nodes", &self.tree.len())
            .finish()
    }
}

impl<T> fmt::Display for MergeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "merge refused: {}", self.conflict)
    }
}

impl<T> std::error::Error for MergeError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.conflict)
    }
}
