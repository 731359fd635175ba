//! The snapshot supervisor (§4.5): a reader/writer lock over the record
//! store and every secondary index, plus an atomically-published Summary.
//!
//! A rebuild takes the write lock once and performs every mutation under
//! it; readers block for the duration but never observe a partial rebuild.
//! The Summary is swapped in via a wholly separate lock after the rebuild
//! releases the write lock, so a reader can never observe a Summary newer
//! than the snapshot it's about to read.

use std::net::Ipv6Addr;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use rustc_hash::FxHashMap;

use crate::index::SecondaryIndices;
use crate::merge::{self, MergeStats, XmlError};
use crate::store::RecordStore;

#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Default, Clone)]
pub struct Summary {
    pub registry_update_time: i64,
    pub record_count: usize,
    pub ipv4_count: usize,
    pub ipv6_count: usize,
    pub subnet4_count: usize,
    pub subnet6_count: usize,
    pub url_count: usize,
    pub domain_count: usize,
    pub public_suffix_count: usize,
    pub decision_count: usize,
    pub entry_type_count: usize,
    pub org_count: usize,
    pub without_no_count: usize,
    pub largest_index_name: Option<&'static str>,
    pub largest_index_key: Option<String>,
    pub largest_index_cardinality: usize,
    pub block_type_histogram: FxHashMap<String, usize>,
    pub entry_type_histogram: FxHashMap<String, usize>,
    pub org_histogram: FxHashMap<String, usize>,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// The guarded store and indices. Fields are `pub(crate)` so the query
/// surface can read them directly through a read-lock guard without an
/// extra accessor layer per field.
#[derive(Default)]
pub struct Inner {
    pub(crate) store: RecordStore,
    pub(crate) indices: SecondaryIndices,
}

pub struct Snapshot {
    inner: RwLock<Inner>,
    summary: RwLock<Arc<Summary>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            summary: RwLock::new(Arc::new(Summary::default())),
        }
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a dump, holding the write lock for the entire rebuild. On
    /// success the Summary is published after the write lock is released.
    pub fn apply_dump<R: std::io::Read>(&self, source: R) -> Result<Summary, XmlError> {
        let summary = {
            let mut inner = self.inner.write().unwrap_or_else(|poison| poison.into_inner());
            let (stats, update_time) = merge::apply_dump(source, &mut inner.store, &mut inner.indices)?;
            build_summary(&inner, update_time, stats)
        };

        *self.summary.write().unwrap_or_else(|poison| poison.into_inner()) = Arc::new(summary.clone());
        Ok(summary)
    }

    /// Acquire the read lock for a query. Held for the duration of the
    /// lookup; release it on drop (or scope exit on RPC deadline, at the
    /// caller's layer).
    pub fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poison| poison.into_inner())
    }

    /// The last published Summary. Never blocks on the rebuild lock.
    pub fn summary(&self) -> Arc<Summary> {
        self.summary.read().unwrap_or_else(|poison| poison.into_inner()).clone()
    }
}

fn build_summary(inner: &Inner, update_time: i64, stats: MergeStats) -> Summary {
    let mut largest_index_name = None;
    let mut largest_index_key = None;
    let mut largest_cardinality = 0;

    macro_rules! consider {
        ($name:literal, $index:expr, $fmt:expr) => {
            if let Some((key, len)) = $index.largest() {
                if len > largest_cardinality {
                    largest_cardinality = len;
                    largest_index_name = Some($name);
                    largest_index_key = Some($fmt(key));
                }
            }
        };
    }

    consider!("ipv4", inner.indices.ipv4, |k: &u32| format!("{:#010x}", k));
    consider!("ipv6", inner.indices.ipv6, |k: &[u8; 16]| Ipv6Addr::from(*k).to_string());
    consider!("subnet4", inner.indices.subnet4, |k: &String| k.clone());
    consider!("subnet6", inner.indices.subnet6, |k: &String| k.clone());
    consider!("url", inner.indices.url, |k: &String| k.clone());
    consider!("domain", inner.indices.domain, |k: &String| k.clone());
    consider!("public_suffix", inner.indices.public_suffix, |k: &String| k.clone());
    consider!("decision", inner.indices.decision, |k: &u64| format!("{k:#018x}"));
    consider!("entry_type", inner.indices.entry_type, |k: &String| k.clone());
    consider!("org", inner.indices.org, |k: &u64| format!("{k:#018x}"));

    let mut block_type_histogram = FxHashMap::default();
    let mut entry_type_histogram = FxHashMap::default();
    let mut org_histogram = FxHashMap::default();

    for (_, pack) in inner.store.iter() {
        *block_type_histogram.entry(format!("{:?}", pack.block_type)).or_insert(0) += 1;
        *entry_type_histogram.entry(pack.entry_type_key.clone()).or_insert(0) += 1;
        *org_histogram.entry(pack.org_key.clone()).or_insert(0) += 1;
    }

    Summary {
        registry_update_time: update_time,
        record_count: inner.store.len(),
        ipv4_count: inner.indices.ipv4.len(),
        ipv6_count: inner.indices.ipv6.len(),
        subnet4_count: inner.indices.subnet4.len(),
        subnet6_count: inner.indices.subnet6.len(),
        url_count: inner.indices.url.len(),
        domain_count: inner.indices.domain.len(),
        public_suffix_count: inner.indices.public_suffix.len(),
        decision_count: inner.indices.decision.len(),
        entry_type_count: inner.indices.entry_type.len(),
        org_count: inner.indices.org.len(),
        without_no_count: inner.indices.without_no.len(),
        largest_index_name,
        largest_index_key,
        largest_index_cardinality: largest_cardinality,
        block_type_histogram,
        entry_type_histogram,
        org_histogram,
        added: stats.added,
        updated: stats.updated,
        removed: stats.removed,
    }
}
