//! The secondary indices (§4.3): six inverted maps plus Decision,
//! Entry-type, Org, Public-suffix, a flat Without-Decision-Number set, and
//! the CIDR prefix tree.

pub mod cidr;
pub mod domain;
pub mod entry_type;
pub mod idset;
pub mod keyed;
pub mod org;
pub mod subnet;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::RecordId;

use cidr::CidrTree;
use idset::IdSet;
use keyed::KeyedIndex;

#[derive(Default)]
pub struct SecondaryIndices {
    pub ipv4: KeyedIndex<u32>,
    pub ipv6: KeyedIndex<[u8; 16]>,
    pub subnet4: KeyedIndex<String>,
    pub subnet6: KeyedIndex<String>,
    pub cidr4: CidrTree,
    pub cidr6: CidrTree,
    pub url: KeyedIndex<String>,
    pub domain: KeyedIndex<String>,
    pub public_suffix: KeyedIndex<String>,
    pub decision: KeyedIndex<u64>,
    pub entry_type: KeyedIndex<String>,
    pub org: KeyedIndex<u64>,
    pub org_names: FxHashMap<u64, String>,
    pub without_no: IdSet,
}

impl SecondaryIndices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ipv4(&mut self, addr: u32, id: RecordId) {
        self.ipv4.insert(addr, id);
    }

    pub fn remove_ipv4(&mut self, addr: u32, id: RecordId) {
        self.ipv4.remove(&addr, id);
    }

    pub fn add_ipv6(&mut self, addr: [u8; 16], id: RecordId) {
        self.ipv6.insert(addr, id);
    }

    pub fn remove_ipv6(&mut self, addr: [u8; 16], id: RecordId) {
        self.ipv6.remove(&addr, id);
    }

    /// Returns `false` if `text` failed to parse as a CIDR (logged and
    /// dropped, never indexed).
    pub fn add_subnet4(&mut self, text: &str, id: RecordId) -> bool {
        let Some((addr, len)) = subnet::parse_cidr4_logged(text) else {
            return false;
        };
        self.subnet4.insert(text.to_string(), id);
        self.cidr4.insert(&addr, len, text.to_string(), id);
        true
    }

    pub fn remove_subnet4(&mut self, text: &str, id: RecordId) {
        self.subnet4.remove(&text.to_string(), id);
        if let Some((addr, len)) = subnet::parse_cidr4(text) {
            self.cidr4.remove(&addr, len, id);
        }
    }

    pub fn add_subnet6(&mut self, text: &str, id: RecordId) -> bool {
        let Some((addr, len)) = subnet::parse_cidr6_logged(text) else {
            return false;
        };
        self.subnet6.insert(text.to_string(), id);
        self.cidr6.insert(&addr, len, text.to_string(), id);
        true
    }

    pub fn remove_subnet6(&mut self, text: &str, id: RecordId) {
        self.subnet6.remove(&text.to_string(), id);
        if let Some((addr, len)) = subnet::parse_cidr6(text) {
            self.cidr6.remove(&addr, len, id);
        }
    }

    pub fn add_url(&mut self, url: &str, id: RecordId) {
        self.url.insert(url.to_string(), id);
    }

    pub fn remove_url(&mut self, url: &str, id: RecordId) {
        self.url.remove(&url.to_string(), id);
    }

    pub fn add_domain(&mut self, name: &str, id: RecordId) {
        self.domain.insert(name.to_string(), id);
    }

    pub fn remove_domain(&mut self, name: &str, id: RecordId) {
        self.domain.remove(&name.to_string(), id);
    }

    /// Recompute the Public-suffix index's membership for `id` from the
    /// full set of domains it carries before and after a merge. Computed
    /// wholesale rather than per-value, since several domains in the same
    /// record's collection can share a parent or ICANN suffix and a
    /// per-value remove would otherwise evict a key a sibling value still
    /// needs.
    pub fn resync_public_suffix(&mut self, old_domains: &[String], new_domains: &[String], id: RecordId) {
        let old_keys = suffix_key_set(old_domains);
        let new_keys = suffix_key_set(new_domains);

        for key in old_keys.difference(&new_keys) {
            self.public_suffix.remove(key, id);
        }
        for key in new_keys.difference(&old_keys) {
            self.public_suffix.insert(key.clone(), id);
        }
    }

    /// Re-key the Decision index for `id`, wholesale (a record carries
    /// exactly one decision).
    pub fn set_decision(&mut self, old_fingerprint: Option<u64>, new_fingerprint: u64, id: RecordId) {
        if let Some(old) = old_fingerprint {
            if old != new_fingerprint {
                self.decision.remove(&old, id);
            }
        }
        self.decision.insert(new_fingerprint, id);
    }

    pub fn remove_decision(&mut self, fingerprint: u64, id: RecordId) {
        self.decision.remove(&fingerprint, id);
    }

    pub fn set_entry_type(&mut self, old_key: Option<&str>, new_key: &str, id: RecordId) {
        if let Some(old) = old_key {
            if old != new_key {
                self.entry_type.remove(&old.to_string(), id);
            }
        }
        self.entry_type.insert(new_key.to_string(), id);
    }

    pub fn remove_entry_type(&mut self, key: &str, id: RecordId) {
        self.entry_type.remove(&key.to_string(), id);
    }

    pub fn set_org(
        &mut self,
        old_fingerprint: Option<u64>,
        new_fingerprint: u64,
        display_name: &str,
        id: RecordId,
    ) {
        if let Some(old) = old_fingerprint {
            if old != new_fingerprint {
                self.org.remove(&old, id);
            }
        }
        self.org.insert(new_fingerprint, id);
        self.org_names.insert(new_fingerprint, display_name.to_string());
    }

    pub fn remove_org(&mut self, fingerprint: u64, id: RecordId) {
        self.org.remove(&fingerprint, id);
    }

    pub fn set_without_no(&mut self, decision_number_empty: bool, id: RecordId) {
        if decision_number_empty {
            self.without_no.insert(id);
        } else {
            self.without_no.remove(id);
        }
    }

    pub fn remove_without_no(&mut self, id: RecordId) {
        self.without_no.remove(id);
    }
}

fn suffix_key_set(domains: &[String]) -> FxHashSet<String> {
    domains
        .iter()
        .flat_map(|d| {
            let (parent, icann) = domain::suffix_keys(d);
            parent.into_iter().chain(icann)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn subnet4_add_populates_both_the_index_and_the_tree() {
        let mut indices = SecondaryIndices::new();
        assert!(indices.add_subnet4("10.4.0.0/16", 444));
        assert_eq!(indices.subnet4.len(), 1);
        assert_eq!(indices.cidr4.network_count(), 1);
        assert_eq!(
            indices.cidr4.containing(&[10, 4, 4, 4]),
            vec![("10.4.0.0/16".to_string(), 444)]
        );
    }

    #[test]
    fn subnet4_remove_drops_both() {
        let mut indices = SecondaryIndices::new();
        indices.add_subnet4("10.4.0.0/16", 444);
        indices.remove_subnet4("10.4.0.0/16", 444);
        assert!(indices.subnet4.is_empty());
        assert_eq!(indices.cidr4.network_count(), 0);
    }

    #[test]
    fn malformed_subnet_is_not_indexed() {
        let mut indices = SecondaryIndices::new();
        assert!(!indices.add_subnet4("garbage", 1));
        assert!(indices.subnet4.is_empty());
        assert_eq!(indices.cidr4.network_count(), 0);
    }

    #[test]
    fn public_suffix_resync_keeps_shared_keys_when_a_sibling_domain_remains() {
        let mut indices = SecondaryIndices::new();
        indices.resync_public_suffix(&[], &["a.example.com".to_string(), "b.example.com".to_string()], 1);
        assert!(indices.public_suffix.contains_key(&"example.com".to_string()));

        indices.resync_public_suffix(
            &["a.example.com".to_string(), "b.example.com".to_string()],
            &["b.example.com".to_string()],
            1,
        );
        assert!(indices.public_suffix.contains_key(&"example.com".to_string()));

        indices.resync_public_suffix(&["b.example.com".to_string()], &[], 1);
        assert!(!indices.public_suffix.contains_key(&"example.com".to_string()));
    }

    #[test]
    fn set_decision_removes_old_key_when_it_changes() {
        let mut indices = SecondaryIndices::new();
        indices.set_decision(None, 111, 555);
        indices.set_decision(Some(111), 222, 555);
        assert!(!indices.decision.contains_key(&111));
        assert!(indices.decision.contains_key(&222));
    }

    #[test]
    fn without_no_tracks_empty_decision_numbers() {
        let mut indices = SecondaryIndices::new();
        indices.set_without_no(true, 1);
        assert!(indices.without_no.contains(1));
        indices.set_without_no(false, 1);
        assert!(!indices.without_no.contains(1));
    }
}
