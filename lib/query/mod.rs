//! The read-only query surface (§4.6). Every lookup acquires the
//! snapshot's read lock, and every response carries the registry update
//! time stamped into the snapshot it was served from.

use std::net::{Ipv4Addr, Ipv6Addr};

use thiserror::Error;

use crate::index::domain::suffix_keys;
use crate::model::RecordId;
use crate::normalize::{ipv4_str_to_int, normalize_domain, normalize_url};
use crate::snapshot::{Snapshot, Summary};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Data not ready")]
    NotReady,
}

#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Clone)]
pub struct Match {
    pub id: RecordId,
    pub payload: serde_json::Value,
    pub matched_attribute: String,
}

#[cfg_attr(any(debug_assertions, test), derive(Debug))]
pub struct QueryResult {
    pub registry_update_time: i64,
    pub normalized_query: String,
    pub matches: Vec<Match>,
}

pub struct QuerySurface<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> QuerySurface<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self { snapshot }
    }

    fn require_ready(&self) -> Result<i64, QueryError> {
        let update_time = self.snapshot.summary().registry_update_time;
        if update_time == 0 {
            return Err(QueryError::NotReady);
        }
        Ok(update_time)
    }

    pub fn search_by_id(&self, id: RecordId) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let guard = self.snapshot.read();
        let matches = guard
            .store
            .get(id)
            .map(|pack| vec![Match { id, payload: pack.payload.clone(), matched_attribute: "id".to_string() }])
            .unwrap_or_default();

        Ok(QueryResult { registry_update_time: update_time, normalized_query: id.to_string(), matches })
    }

    pub fn search_by_decision(&self, fingerprint: u64) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let guard = self.snapshot.read();
        let matches = guard
            .indices
            .decision
            .get(&fingerprint)
            .map(|ids| ids_to_matches(ids.iter(), &guard, "decision"))
            .unwrap_or_default();

        Ok(QueryResult {
            registry_update_time: update_time,
            normalized_query: format!("{fingerprint:#018x}"),
            matches,
        })
    }

    pub fn search_ipv4(&self, addr: u32) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let guard = self.snapshot.read();

        let mut matches = guard
            .indices
            .ipv4
            .get(&addr)
            .map(|ids| ids_to_matches(ids.iter(), &guard, "ipv4"))
            .unwrap_or_default();

        for (network, id) in guard.indices.cidr4.containing(&addr.to_be_bytes()) {
            if let Some(pack) = guard.store.get(id) {
                matches.push(Match {
                    id,
                    payload: pack.payload.clone(),
                    matched_attribute: format!("subnet4:{network}"),
                });
            }
        }

        Ok(QueryResult {
            registry_update_time: update_time,
            normalized_query: Ipv4Addr::from(addr).to_string(),
            matches,
        })
    }

    /// Direct matches, plus CIDR containment via the IPv6 prefix tree
    /// mirroring the IPv4 path.
    pub fn search_ipv6(&self, addr: [u8; 16]) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let guard = self.snapshot.read();

        let mut matches = guard
            .indices
            .ipv6
            .get(&addr)
            .map(|ids| ids_to_matches(ids.iter(), &guard, "ipv6"))
            .unwrap_or_default();

        for (network, id) in guard.indices.cidr6.containing(&addr) {
            if let Some(pack) = guard.store.get(id) {
                matches.push(Match {
                    id,
                    payload: pack.payload.clone(),
                    matched_attribute: format!("subnet6:{network}"),
                });
            }
        }

        Ok(QueryResult {
            registry_update_time: update_time,
            normalized_query: Ipv6Addr::from(addr).to_string(),
            matches,
        })
    }

    pub fn search_url(&self, url: &str) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let normalized = normalize_url(url);
        let guard = self.snapshot.read();
        let matches = guard
            .indices
            .url
            .get(&normalized)
            .map(|ids| ids_to_matches(ids.iter(), &guard, "url"))
            .unwrap_or_default();

        Ok(QueryResult { registry_update_time: update_time, normalized_query: normalized, matches })
    }

    pub fn search_domain(&self, name: &str) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let normalized = normalize_domain(name);
        let guard = self.snapshot.read();
        let matches = guard
            .indices
            .domain
            .get(&normalized)
            .map(|ids| ids_to_matches(ids.iter(), &guard, "domain"))
            .unwrap_or_default();

        Ok(QueryResult { registry_update_time: update_time, normalized_query: normalized, matches })
    }

    /// `variant == 1` matches only the parent (eTLD+1); `variant == 2`
    /// additionally matches the ICANN suffix. Empty when `name` has no dot.
    pub fn search_domain_suffix(&self, name: &str, variant: u8) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let normalized = normalize_domain(name);
        let (parent, icann) = suffix_keys(&normalized);

        let guard = self.snapshot.read();
        let mut matches = Vec::new();

        if let Some(parent) = &parent {
            if let Some(ids) = guard.indices.public_suffix.get(parent) {
                matches.extend(ids_to_matches(ids.iter(), &guard, &format!("domain_suffix:{parent}")));
            }
        }
        if variant == 2 {
            if let Some(icann) = &icann {
                if let Some(ids) = guard.indices.public_suffix.get(icann) {
                    matches.extend(ids_to_matches(ids.iter(), &guard, &format!("domain_suffix:{icann}")));
                }
            }
        }

        Ok(QueryResult {
            registry_update_time: update_time,
            normalized_query: parent.unwrap_or(normalized),
            matches,
        })
    }

    pub fn search_entry_type(&self, tag: &str) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let guard = self.snapshot.read();
        let matches = guard
            .indices
            .entry_type
            .get(&tag.to_string())
            .map(|ids| ids_to_matches(ids.iter(), &guard, "entry_type"))
            .unwrap_or_default();

        Ok(QueryResult { registry_update_time: update_time, normalized_query: tag.to_string(), matches })
    }

    /// The server resolves `fingerprint` back to the display string it was
    /// computed from, for the caller's benefit.
    pub fn search_org(&self, fingerprint: u64) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let guard = self.snapshot.read();
        let display_name = guard.indices.org_names.get(&fingerprint).cloned().unwrap_or_default();
        let matches = guard
            .indices
            .org
            .get(&fingerprint)
            .map(|ids| ids_to_matches(ids.iter(), &guard, "org"))
            .unwrap_or_default();

        Ok(QueryResult { registry_update_time: update_time, normalized_query: display_name, matches })
    }

    pub fn search_without_no(&self) -> Result<QueryResult, QueryError> {
        let update_time = self.require_ready()?;
        let guard = self.snapshot.read();
        let matches = ids_to_matches(guard.indices.without_no.iter(), &guard, "without_no");

        Ok(QueryResult {
            registry_update_time: update_time,
            normalized_query: String::new(),
            matches,
        })
    }

    /// Liveness plus the registry update time; does not require the
    /// snapshot to be ready.
    pub fn ping(&self) -> i64 {
        self.snapshot.summary().registry_update_time
    }

    pub fn summary(&self) -> Summary {
        (*self.snapshot.summary()).clone()
    }
}

fn ids_to_matches(
    ids: impl Iterator<Item = RecordId>,
    guard: &crate::snapshot::Inner,
    matched_attribute: &str,
) -> Vec<Match> {
    ids.filter_map(|id| {
        guard.store.get(id).map(|pack| Match {
            id,
            payload: pack.payload.clone(),
            matched_attribute: matched_attribute.to_string(),
        })
    })
    .collect()
}

pub fn parse_ipv4_query(addr: &str) -> u32 {
    ipv4_str_to_int(addr)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<register updateTime="2021-01-01T00:00:00+03:00" formatVersion="2.4">
  <content id="111" entryType="1" includeTime="2021-01-01T00:00:00" hash="h111">
    <decision date="2020-01-01" number="1" org="Генпрокуратура"/>
    <domain>www.e01.tld</domain>
  </content>
  <content id="444" entryType="1" includeTime="2021-01-01T00:00:00" hash="h444">
    <decision date="2020-01-01" number="" org=""/>
    <ip>10.4.4.4</ip>
    <ipSubnet>10.4.0.0/16</ipSubnet>
  </content>
</register>"#;

    fn snapshot_with_dump() -> Snapshot {
        let snapshot = Snapshot::new();
        snapshot.apply_dump(DUMP.as_bytes()).unwrap();
        snapshot
    }

    #[test]
    fn query_before_any_load_reports_not_ready() {
        let snapshot = Snapshot::new();
        let query = QuerySurface::new(&snapshot);
        assert!(matches!(query.search_by_id(111), Err(QueryError::NotReady)));
    }

    #[test]
    fn search_by_id_matches_exactly_one_record() {
        let snapshot = snapshot_with_dump();
        let query = QuerySurface::new(&snapshot);
        let result = query.search_by_id(111).unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].id, 111);
    }

    #[test]
    fn search_ipv4_reports_direct_and_cidr_hits() {
        let snapshot = snapshot_with_dump();
        let query = QuerySurface::new(&snapshot);
        let result = query.search_ipv4(ipv4_str_to_int("10.4.4.4")).unwrap();
        assert_eq!(result.matches.len(), 2);
        assert!(result.matches.iter().any(|m| m.matched_attribute == "ipv4"));
        assert!(result.matches.iter().any(|m| m.matched_attribute.starts_with("subnet4:")));
    }

    #[test]
    fn search_domain_matches_normalised_form() {
        let snapshot = snapshot_with_dump();
        let query = QuerySurface::new(&snapshot);
        let result = query.search_domain("www.e01.tld").unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].id, 111);
    }

    #[test]
    fn search_domain_suffix_without_a_dot_is_empty() {
        let snapshot = snapshot_with_dump();
        let query = QuerySurface::new(&snapshot);
        let result = query.search_domain_suffix("example", 2).unwrap();
        assert!(result.matches.is_empty());
    }

    #[test]
    fn search_without_no_finds_the_empty_decision_number_record() {
        let snapshot = snapshot_with_dump();
        let query = QuerySurface::new(&snapshot);
        let result = query.search_without_no().unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].id, 444);
    }

    #[test]
    fn ping_reports_the_registry_update_time() {
        let snapshot = snapshot_with_dump();
        let query = QuerySurface::new(&snapshot);
        assert!(query.ping() > 0);
    }
}
