//! An indexed tree container that can be built from, and stored to, a
//! row-based data format such as a relational table or a CSV file.
//!
//! Every row carries its own primary key and the key of its parent. Rows may
//! arrive in any order: a child can be added before its parent as long as the
//! parent later turns out to be the parent of the current root, at which
//! point the tree re-roots itself.
//!
//! ```
//! use rowtree::{Order, Tree};
//!
//! let mut tree = Tree::new();
//! tree.add(1, 2, "child arrives first");
//! tree.add(3, 1, "grandchild");
//! tree.add(2, 0, "the real root");
//! tree.add(4, 2, "second child");
//!
//! assert_eq!(tree.keys(Order::BreadthFirst), vec![2, 1, 4, 3]);
//! assert_eq!(tree.keys(Order::DepthFirst), vec![2, 1, 3, 4]);
//! ```

pub mod config;
pub mod domain;
pub mod stream;
pub mod tree_traits;
pub mod util;

pub use domain::{
    Insertion, MergeConflict, MergeError, Node, NodeId, NodeRef, Order, Traverse, Tree, NO_PARENT,
};
pub use stream::{Completion, Framing, JsonCodec, Record, RecordCodec, RecordReader, StreamError};
