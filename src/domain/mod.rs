//! Domain layer: the tree data model and its algorithms
//!
//! This layer is independent of external concerns (no I/O, no config loading).

pub mod error;
mod index;
pub mod node;
pub mod traverse;
pub mod tree;

pub use error::{DomainError, MergeConflict, MergeError};
pub use node::{Node, NodeId, NO_PARENT};
pub use traverse::{Order, Traverse};
pub use tree::{Insertion, NodeRef, Tree};
