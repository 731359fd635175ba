//! The diff/merge engine (§4.4): classifies every record in a freshly
//! parsed dump as added, updated, unchanged, or (by omission) removed, and
//! applies the minimal set of index mutations for each.

pub mod xml;

use std::hash::Hash;

use rustc_hash::FxHashSet;

use crate::index::{entry_type, org, SecondaryIndices};
use crate::model::{PackedRecord, Record, RecordId, Timestamped};
use crate::normalize::fnv1a_64;
use crate::store::RecordStore;

pub use xml::XmlError;

#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub seen: usize,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Parse `source` and apply it to `store`/`indices` in place. On a parse
/// failure the store and indices are left untouched: the previous snapshot
/// survives (§4.4, §7).
pub fn apply_dump<R: std::io::Read>(
    source: R,
    store: &mut RecordStore,
    indices: &mut SecondaryIndices,
) -> Result<(MergeStats, i64), XmlError> {
    let dump = xml::parse_reader(source)?;
    Ok(apply_parsed(dump, store, indices))
}

fn apply_parsed(dump: xml::ParsedDump, store: &mut RecordStore, indices: &mut SecondaryIndices) -> (MergeStats, i64) {
    let mut stats = MergeStats::default();
    let mut seen: FxHashSet<RecordId> = FxHashSet::default();

    for parsed in dump.records {
        seen.insert(parsed.id);

        let Some(mut record) = parsed.record else {
            tracing::error!(id = parsed.id, "record decode failure, preserving previous state");
            continue;
        };
        record.record_hash = parsed.record_hash;
        record.registry_update_time = dump.update_time;

        match store.get(record.id).map(|prev| prev.record_hash) {
            None => {
                add_record(record, store, indices);
                stats.added += 1;
            }
            Some(prev_hash) if prev_hash != record.record_hash => {
                let prev = store.remove(record.id).expect("just observed present");
                merge_record(record, prev, store, indices);
                stats.updated += 1;
            }
            Some(_) => {
                if let Some(existing) = store.get_mut(record.id) {
                    existing.registry_update_time = dump.update_time;
                }
            }
        }
    }

    for id in store.ids().collect::<Vec<_>>() {
        if !seen.contains(&id) {
            if let Some(prev) = store.remove(id) {
                remove_record_fully(&prev, indices);
                stats.removed += 1;
            }
        }
    }

    stats.seen = seen.len();

    (stats, dump.update_time)
}

fn add_record(record: Record, store: &mut RecordStore, indices: &mut SecondaryIndices) {
    let entry_type_key =
        entry_type::taxonomy_key(record.entry_type, &record.decision.org, &record.decision.number).to_string();
    let org_key = org::normalize_org(&record.decision.org);
    let org_fingerprint = fnv1a_64(org_key.as_bytes());
    let decision_fingerprint = record.decision.fingerprint();
    let id = record.id;
    let number_empty = record.decision.number.is_empty();

    let pack = PackedRecord::from_record(&record, entry_type_key.clone(), org_key.clone());

    for v in &pack.ipv4s {
        indices.add_ipv4(v.value, id);
    }
    for v in &pack.ipv6s {
        indices.add_ipv6(v.value, id);
    }
    for v in &pack.urls {
        indices.add_url(&v.value, id);
    }
    for v in &pack.domains {
        indices.add_domain(&v.value, id);
    }
    for v in &pack.subnet4s {
        indices.add_subnet4(&v.value, id);
    }
    for v in &pack.subnet6s {
        indices.add_subnet6(&v.value, id);
    }

    let domain_values = collect_values(&pack.domains);
    indices.resync_public_suffix(&[], &domain_values, id);

    indices.set_decision(None, decision_fingerprint, id);
    indices.set_entry_type(None, &entry_type_key, id);
    indices.set_org(None, org_fingerprint, &org_key, id);
    indices.set_without_no(number_empty, id);

    store.insert(pack);
}

fn merge_record(record: Record, prev: PackedRecord, store: &mut RecordStore, indices: &mut SecondaryIndices) {
    let id = record.id;

    let (ipv4_add, ipv4_remove) = diff(&prev.ipv4s, &record.ipv4s);
    for v in ipv4_add {
        indices.add_ipv4(v, id);
    }
    for v in ipv4_remove {
        indices.remove_ipv4(v, id);
    }

    let (ipv6_add, ipv6_remove) = diff(&prev.ipv6s, &record.ipv6s);
    for v in ipv6_add {
        indices.add_ipv6(v, id);
    }
    for v in ipv6_remove {
        indices.remove_ipv6(v, id);
    }

    let (url_add, url_remove) = diff(&prev.urls, &record.urls);
    for v in &url_add {
        indices.add_url(v, id);
    }
    for v in &url_remove {
        indices.remove_url(v, id);
    }

    let (domain_add, domain_remove) = diff(&prev.domains, &record.domains);
    for v in &domain_add {
        indices.add_domain(v, id);
    }
    for v in &domain_remove {
        indices.remove_domain(v, id);
    }
    let prev_domain_values = collect_values(&prev.domains);
    let new_domain_values = collect_values(&record.domains);
    indices.resync_public_suffix(&prev_domain_values, &new_domain_values, id);

    let (subnet4_add, subnet4_remove) = diff(&prev.subnet4s, &record.subnet4s);
    for v in &subnet4_add {
        indices.add_subnet4(v, id);
    }
    for v in &subnet4_remove {
        indices.remove_subnet4(v, id);
    }

    let (subnet6_add, subnet6_remove) = diff(&prev.subnet6s, &record.subnet6s);
    for v in &subnet6_add {
        indices.add_subnet6(v, id);
    }
    for v in &subnet6_remove {
        indices.remove_subnet6(v, id);
    }

    let entry_type_key =
        entry_type::taxonomy_key(record.entry_type, &record.decision.org, &record.decision.number).to_string();
    let org_key = org::normalize_org(&record.decision.org);
    let org_fingerprint = fnv1a_64(org_key.as_bytes());
    let decision_fingerprint = record.decision.fingerprint();
    let number_empty = record.decision.number.is_empty();

    let prev_org_fingerprint = fnv1a_64(prev.org_key.as_bytes());
    indices.set_decision(Some(prev.decision_fingerprint), decision_fingerprint, id);
    indices.set_entry_type(Some(&prev.entry_type_key), &entry_type_key, id);
    indices.set_org(Some(prev_org_fingerprint), org_fingerprint, &org_key, id);
    indices.set_without_no(number_empty, id);

    let pack = PackedRecord::from_record(&record, entry_type_key, org_key);
    store.replace(id, pack);
}

fn remove_record_fully(prev: &PackedRecord, indices: &mut SecondaryIndices) {
    let id = prev.id;

    for v in &prev.ipv4s {
        indices.remove_ipv4(v.value, id);
    }
    for v in &prev.ipv6s {
        indices.remove_ipv6(v.value, id);
    }
    for v in &prev.urls {
        indices.remove_url(&v.value, id);
    }
    for v in &prev.domains {
        indices.remove_domain(&v.value, id);
    }
    for v in &prev.subnet4s {
        indices.remove_subnet4(&v.value, id);
    }
    for v in &prev.subnet6s {
        indices.remove_subnet6(&v.value, id);
    }

    let domain_values = collect_values(&prev.domains);
    indices.resync_public_suffix(&domain_values, &[], id);

    indices.remove_decision(prev.decision_fingerprint, id);
    indices.remove_entry_type(&prev.entry_type_key, id);
    indices.remove_org(fnv1a_64(prev.org_key.as_bytes()), id);
    indices.remove_without_no(id);
}

fn collect_values<T: Clone>(values: &[Timestamped<T>]) -> Vec<T> {
    values.iter().map(|t| t.value.clone()).collect()
}

/// Set-diff two collections by their normalised value, per the §4.4 Merge
/// algorithm: values are already normalised at parse time, so this just
/// compares `.value`.
fn diff<T: Clone + Eq + Hash>(prev: &[Timestamped<T>], next: &[Timestamped<T>]) -> (Vec<T>, Vec<T>) {
    let prev_set: FxHashSet<T> = prev.iter().map(|t| t.value.clone()).collect();
    let next_set: FxHashSet<T> = next.iter().map(|t| t.value.clone()).collect();

    let added = next_set.difference(&prev_set).cloned().collect();
    let removed = prev_set.difference(&next_set).cloned().collect();
    (added, removed)
}
