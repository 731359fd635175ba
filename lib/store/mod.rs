//! The primary mapping `RecordId -> PackedRecord` (§4.2).
//!
//! All `PackedRecord`s are owned exclusively here; every index refers to a
//! record by its id, never by reference, so eviction from an index is just
//! dropping a 32-bit integer out of an id-set.

use rustc_hash::FxHashMap;

use crate::model::{PackedRecord, RecordId};

#[derive(Default)]
pub struct RecordStore {
    records: FxHashMap<RecordId, PackedRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RecordId) -> Option<&PackedRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut PackedRecord> {
        self.records.get_mut(&id)
    }

    /// Insert a record that must not already be present. Returns the
    /// previous value, if any (the merge engine treats a `Some` here as a
    /// logic error — callers should have dispatched to `replace` instead).
    pub fn insert(&mut self, record: PackedRecord) -> Option<PackedRecord> {
        self.records.insert(record.id, record)
    }

    /// Swap in a new version of a record whose id is already present,
    /// returning the version it replaced.
    pub fn replace(&mut self, id: RecordId, record: PackedRecord) -> Option<PackedRecord> {
        self.records.insert(id, record)
    }

    pub fn remove(&mut self, id: RecordId) -> Option<PackedRecord> {
        self.records.remove(&id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, &PackedRecord)> {
        self.records.iter()
    }

    /// All ids currently held, for the merge engine's purge pass.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.records.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{BlockType, Decision, Record};

    fn sample(id: RecordId) -> PackedRecord {
        let record = Record {
            id,
            entry_type: 1,
            urgency_type: None,
            block_type: BlockType::Url,
            decision: Decision {
                org: String::new(),
                number: String::new(),
                date: String::new(),
            },
            include_time: 0,
            ts: None,
            hash: String::new(),
            urls: Vec::new(),
            domains: Vec::new(),
            ipv4s: Vec::new(),
            ipv6s: Vec::new(),
            subnet4s: Vec::new(),
            subnet6s: Vec::new(),
            record_hash: 0,
            registry_update_time: 0,
        };
        PackedRecord::from_record(&record, "15_1".to_string(), "Генпрокуратура".to_string())
    }

    #[test]
    fn insert_then_get() {
        let mut store = RecordStore::new();
        assert!(store.insert(sample(111)).is_none());
        assert_eq!(store.get(111).unwrap().id, 111);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replace_returns_previous() {
        let mut store = RecordStore::new();
        store.insert(sample(111));
        let prev = store.replace(111, sample(111));
        assert!(prev.is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_drops_and_reports_absence() {
        let mut store = RecordStore::new();
        store.insert(sample(111));
        assert!(store.remove(111).is_some());
        assert!(store.get(111).is_none());
        assert!(!store.contains(111));
        assert!(store.is_empty());
    }

    #[test]
    fn ids_enumerates_every_key() {
        let mut store = RecordStore::new();
        store.insert(sample(111));
        store.insert(sample(222));
        let mut ids: Vec<_> = store.ids().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![111, 222]);
    }
}
