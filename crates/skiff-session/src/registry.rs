use std::collections::HashMap;

use crate::bridge::SessionId;
use crate::record::SessionRecord;

/// Returned by [`SessionRegistry::add`] when the id is already live. Hands
/// the rejected record back so its surfaces can be released.
#[derive(thiserror::Error)]
#[error("session {} is already registered", .0.id())]
pub struct DuplicateSession(pub SessionRecord);

impl std::fmt::Debug for DuplicateSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DuplicateSession").field(&self.0.id()).finish()
    }
}

/// Live sessions in tab order.
///
/// Presence in the registry is what makes a session alive. Records are
/// looked up by id; `order` keeps insertion order for the tab strip and
/// survives removal of other entries.
pub struct SessionRegistry {
    records: HashMap<SessionId, SessionRecord>,
    order: Vec<SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Append `record` as the last tab.
    pub fn add(&mut self, record: SessionRecord) -> Result<(), DuplicateSession> {
        if self.records.contains_key(record.id()) {
            return Err(DuplicateSession(record));
        }
        let id = record.id().to_string();
        self.order.push(id.clone());
        self.records.insert(id, record);
        Ok(())
    }

    /// Remove and return the record for `id`. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: &str) -> Option<SessionRecord> {
        let record = self.records.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(record)
    }

    pub fn find(&self, id: &str) -> Option<&SessionRecord> {
        self.records.get(id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut SessionRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Tab index of `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|existing| existing == id)
    }

    /// Id of the tab at `index`.
    pub fn id_at(&self, index: usize) -> Option<&str> {
        self.order.get(index).map(String::as_str)
    }

    /// Ids in tab order.
    pub fn ordered_ids(&self) -> Vec<SessionId> {
        self.order.clone()
    }

    /// Records in tab order.
    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
