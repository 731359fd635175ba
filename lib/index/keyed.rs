//! A generic inverted index: key -> id-set, with the "new key" / "key
//! emptied" signals the diff/merge engine needs to drive dependent
//! structures (the CIDR tree, the public-suffix index).

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::model::RecordId;

use super::idset::IdSet;

#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Default)]
pub struct KeyedIndex<K> {
    entries: FxHashMap<K, IdSet>,
}

impl<K> KeyedIndex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `(key, id)`. Returns `true` if `key` was not present in the
    /// map at all before this call (a brand-new key).
    pub fn insert(&mut self, key: K, id: RecordId) -> bool {
        match self.entries.get_mut(&key) {
            Some(ids) => {
                ids.insert(id);
                false
            }
            None => {
                let mut ids = IdSet::new();
                ids.insert(id);
                self.entries.insert(key, ids);
                true
            }
        }
    }

    /// Remove `(key, id)`. Returns `true` if removing `id` emptied the set
    /// and the key was dropped from the map entirely (invariant 3: no
    /// index entry has an empty id-set).
    pub fn remove(&mut self, key: &K, id: RecordId) -> bool {
        let Some(ids) = self.entries.get_mut(key) else {
            return false;
        };
        if ids.remove(id) {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }

    pub fn get(&self, key: &K) -> Option<&IdSet> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// The key with the largest id-set and its cardinality, for the
    /// Summary's "largest id-set" field.
    pub fn largest(&self) -> Option<(&K, usize)> {
        self.entries
            .iter()
            .map(|(k, ids)| (k, ids.len()))
            .max_by_key(|(_, len)| *len)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn insert_signals_new_key_once() {
        let mut index = KeyedIndex::new();
        assert!(index.insert("a".to_string(), 1));
        assert!(!index.insert("a".to_string(), 2));
        assert_eq!(index.get(&"a".to_string()).unwrap().len(), 2);
    }

    #[test]
    fn remove_drops_emptied_key() {
        let mut index = KeyedIndex::new();
        index.insert("a".to_string(), 1);
        assert!(index.remove(&"a".to_string(), 1));
        assert!(index.get(&"a".to_string()).is_none());
        assert!(!index.contains_key(&"a".to_string()));
    }

    #[test]
    fn remove_nonemptying_does_not_signal() {
        let mut index = KeyedIndex::new();
        index.insert("a".to_string(), 1);
        index.insert("a".to_string(), 2);
        assert!(!index.remove(&"a".to_string(), 1));
        assert!(index.contains_key(&"a".to_string()));
    }

    #[test]
    fn largest_reports_the_busiest_key() {
        let mut index = KeyedIndex::new();
        index.insert("a".to_string(), 1);
        index.insert("b".to_string(), 1);
        index.insert("b".to_string(), 2);
        let (key, len) = index.largest().unwrap();
        assert_eq!(key, "b");
        assert_eq!(len, 2);
    }
}
