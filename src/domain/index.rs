//! Primary key index: `NodeId` to arena handle.

use std::collections::HashMap;

use generational_arena::Index;
use tracing::warn;

use crate::domain::error::DomainError;
use crate::domain::node::NodeId;

/// Lookup table from primary key to arena slot.
///
/// An index without backing storage answers every lookup with `None` and
/// refuses inserts. That state is a programming error and is logged, never
/// panicked on.
#[derive(Debug, Clone)]
pub(crate) struct KeyIndex {
    entries: Option<HashMap<NodeId, Index>>,
}

impl Default for KeyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyIndex {
    pub fn new() -> Self {
        Self {
            entries: Some(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn uninitialized() -> Self {
        Self { entries: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.entries.is_some()
    }

    pub fn find(&self, id: NodeId) -> Option<Index> {
        match &self.entries {
            Some(entries) => entries.get(&id).copied(),
            None => {
                warn!(id, "lookup in an uninitialized index");
                None
            }
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }

    /// Map `id` to `slot`, overwriting any previous entry.
    ///
    /// Duplicate detection is the caller's job: check [`find`](Self::find) first.
    pub fn insert(&mut self, id: NodeId, slot: Index) -> Result<(), DomainError> {
        match &mut self.entries {
            Some(entries) => {
                entries.insert(id, slot);
                Ok(())
            }
            None => {
                warn!(id, "insert into an uninitialized index");
                Err(DomainError::UninitializedIndex)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, HashMap::len)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Index)> + '_ {
        self.entries
            .iter()
            .flat_map(|entries| entries.iter().map(|(&id, &slot)| (id, slot)))
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter().map(|(id, _)| id)
    }
}
