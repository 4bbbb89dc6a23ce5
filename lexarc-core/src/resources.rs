//! In-memory resource collections addressed by integer identifier.
//!
//! Identifiers are process-local and monotonically allocated per
//! store. An id doubles as the archive entry filename stem (for
//! example `images/<id>.png`), so load and save are inverse with
//! respect to identity. A document recovered after corruption may
//! reference ids with no surviving payload; lookups simply return
//! `None` in that case.

use std::collections::BTreeMap;

use crate::reversion::ReversionRing;

/// Integer key addressing one embedded asset.
pub type ResourceId = u32;

/// Ordered byte-payload store for one resource class.
#[derive(Debug, Clone, Default)]
pub struct ResourceStore {
    entries: BTreeMap<ResourceId, Vec<u8>>,
    next_id: ResourceId,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new payload under a freshly allocated identifier.
    pub fn insert(&mut self, bytes: Vec<u8>) -> ResourceId {
        let id = self.next_id;
        self.entries.insert(id, bytes);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Reinstate a payload under a stored identifier (archive load
    /// path). Keeps the allocator ahead of every reinstated id; an id
    /// at the top of the range pins the allocator there rather than
    /// wrapping it back to zero.
    pub fn insert_with_id(&mut self, id: ResourceId, bytes: Vec<u8>) {
        self.entries.insert(id, bytes);
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
    }

    pub fn get(&self, id: ResourceId) -> Option<&[u8]> {
        self.entries.get(&id).map(Vec::as_slice)
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<Vec<u8>> {
        self.entries.remove(&id)
    }

    /// Iterate payloads in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &[u8])> {
        self.entries.iter().map(|(id, bytes)| (*id, bytes.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two reserved embedded font payloads.
#[derive(Debug, Clone, Default)]
pub struct FontSlots {
    /// Custom font for the constructed language, when set
    pub conlang: Option<Vec<u8>>,
    /// Custom font for the local (natural) language, when set
    pub local: Option<Vec<u8>>,
}

/// The in-memory project: document bytes plus every resource
/// collection the container persists.
///
/// Save verification builds a throwaway `ProjectModel::default()`,
/// loads the candidate bytes into it through the normal read path, and
/// discards it regardless of outcome.
#[derive(Debug, Clone, Default)]
pub struct ProjectModel {
    /// Serialized primary document as of the last load or save
    pub document: Vec<u8>,
    pub images: ResourceStore,
    pub audio: ResourceStore,
    pub glyphs: ResourceStore,
    pub fonts: FontSlots,
    pub reversions: ReversionRing,
}

impl ProjectModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh model with a ring bounded to `max_reversions`.
    pub fn with_reversion_capacity(max_reversions: usize) -> Self {
        Self {
            reversions: ReversionRing::with_capacity(max_reversions),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_allocation() {
        let mut store = ResourceStore::new();
        let a = store.insert(vec![1]);
        let b = store.insert(vec![2]);
        assert!(b > a);
        assert_eq!(store.get(a), Some(&[1u8][..]));
    }

    #[test]
    fn test_insert_with_id_bumps_allocator() {
        let mut store = ResourceStore::new();
        store.insert_with_id(10, vec![1]);
        store.insert_with_id(12, vec![2]);
        let fresh = store.insert(vec![3]);
        assert_eq!(fresh, 13);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_iter_is_id_ordered() {
        let mut store = ResourceStore::new();
        store.insert_with_id(12, vec![2]);
        store.insert_with_id(10, vec![0]);
        store.insert_with_id(11, vec![1]);

        let ids: Vec<ResourceId> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn test_maximal_id_saturates_allocator() {
        let mut store = ResourceStore::new();
        store.insert_with_id(ResourceId::MAX, vec![1]);
        assert_eq!(store.get(ResourceId::MAX), Some(&[1u8][..]));

        // the allocator pins at the top of the range; it never wraps
        // back and hands out ids already taken by lower entries
        store.insert_with_id(7, vec![2]);
        let fresh = store.insert(vec![3]);
        assert_eq!(fresh, ResourceId::MAX);
        assert_eq!(store.get(7), Some(&[2u8][..]));
    }

    #[test]
    fn test_missing_id_is_tolerated() {
        let store = ResourceStore::new();
        assert!(store.get(99).is_none());
    }
}
