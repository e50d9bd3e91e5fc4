//! Tree node: identity, parent link, owned child links and payload.

use std::mem;

use generational_arena::Index;

/// Primary key of a node.
pub type NodeId = u64;

/// Parent id recorded on a node that has no parent. Never a valid node id.
pub const NO_PARENT: NodeId = 0;

/// A single element of a [`Tree`](crate::domain::Tree).
///
/// `parent_id` names the logical parent and may refer to a node that has not
/// been added yet. `parent` and `children` are arena handles maintained by the
/// tree: children are owned by this node, the parent handle is only a
/// back-link.
#[derive(Debug, Clone)]
pub struct Node<T> {
    id: NodeId,
    parent_id: NodeId,
    parent: Option<Index>,
    children: Vec<Index>,
    data: T,
}

impl<T> Node<T> {
    pub(crate) fn new(id: NodeId, parent_id: NodeId, data: T) -> Self {
        Self {
            id,
            parent_id,
            parent: None,
            children: Vec::new(),
            data,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent_id(&self) -> NodeId {
        self.parent_id
    }

    /// True when `id` is the recorded parent of this node.
    pub fn is_parent(&self, id: NodeId) -> bool {
        self.parent_id == id
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Swap in a new payload, returning the old one.
    pub fn replace_data(&mut self, data: T) -> T {
        mem::replace(&mut self.data, data)
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn parent(&self) -> Option<Index> {
        self.parent
    }

    pub(crate) fn children(&self) -> &[Index] {
        &self.children
    }

    pub(crate) fn add_children(&mut self, children: impl IntoIterator<Item = Index>) {
        self.children.extend(children);
    }

    /// Replace the whole child list, returning the previous one.
    pub(crate) fn replace_children(&mut self, children: Vec<Index>) -> Vec<Index> {
        mem::replace(&mut self.children, children)
    }

    /// Point this node at a new parent and record its id.
    ///
    /// A node can never become its own parent: the call is ignored and
    /// `false` is returned.
    pub(crate) fn set_parent(&mut self, parent: Index, parent_id: NodeId) -> bool {
        if parent_id == self.id {
            return false;
        }
        self.parent = Some(parent);
        self.parent_id = parent_id;
        true
    }
}
