use std::sync::{LazyLock, PoisonError, RwLock, RwLockWriteGuard};

use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

use crate::snapshot::Summary;

pub static REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(RwLock::default);

pub static RECORDS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static IPV4_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static IPV6_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static SUBNET4_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static SUBNET6_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static URL_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static DOMAIN_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static PUBLIC_SUFFIX_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static ORG_KEYS: LazyLock<Gauge> = LazyLock::new(Gauge::default);
pub static LARGEST_INDEX_CARDINALITY: LazyLock<Gauge> = LazyLock::new(Gauge::default);

pub static REBUILDS: LazyLock<Counter> = LazyLock::new(Counter::default);
pub static RECORDS_ADDED: LazyLock<Counter> = LazyLock::new(Counter::default);
pub static RECORDS_UPDATED: LazyLock<Counter> = LazyLock::new(Counter::default);
pub static RECORDS_REMOVED: LazyLock<Counter> = LazyLock::new(Counter::default);

///
/// Initialise the metrics registry
///
/// # Errors
/// This should essentially never error, as the only time it should is if the lock
/// is held by the current thread. However, this should be virtually impossible as
/// this is meant to only ever be called once
///
pub fn init() -> Result<(), PoisonError<RwLockWriteGuard<'static, Registry>>> {
    let mut registry = REGISTRY.write()?;

    registry.register("regsnap_records", "Number of records held in the store", RECORDS.clone());
    registry.register("regsnap_ipv4_keys", "Cardinality of the IPv4 index", IPV4_KEYS.clone());
    registry.register("regsnap_ipv6_keys", "Cardinality of the IPv6 index", IPV6_KEYS.clone());
    registry.register("regsnap_subnet4_keys", "Cardinality of the Subnet4 index", SUBNET4_KEYS.clone());
    registry.register("regsnap_subnet6_keys", "Cardinality of the Subnet6 index", SUBNET6_KEYS.clone());
    registry.register("regsnap_url_keys", "Cardinality of the URL index", URL_KEYS.clone());
    registry.register("regsnap_domain_keys", "Cardinality of the Domain index", DOMAIN_KEYS.clone());
    registry.register(
        "regsnap_public_suffix_keys",
        "Cardinality of the Public-suffix index",
        PUBLIC_SUFFIX_KEYS.clone(),
    );
    registry.register("regsnap_org_keys", "Cardinality of the Org index", ORG_KEYS.clone());
    registry.register(
        "regsnap_largest_index_cardinality",
        "Cardinality of the busiest id-set across every index",
        LARGEST_INDEX_CARDINALITY.clone(),
    );
    registry.register("regsnap_rebuilds_total", "Number of completed rebuilds", REBUILDS.clone());
    registry.register("regsnap_records_added_total", "Records added across all rebuilds", RECORDS_ADDED.clone());
    registry.register("regsnap_records_updated_total", "Records updated across all rebuilds", RECORDS_UPDATED.clone());
    registry.register("regsnap_records_removed_total", "Records removed across all rebuilds", RECORDS_REMOVED.clone());

    Ok(())
}

/// Update the gauges from a freshly published summary and bump the
/// rebuild counters. Called once per rebuild, after the write lock has
/// released.
pub fn observe_rebuild(summary: &Summary) {
    RECORDS.set(summary.record_count as i64);
    IPV4_KEYS.set(summary.ipv4_count as i64);
    IPV6_KEYS.set(summary.ipv6_count as i64);
    SUBNET4_KEYS.set(summary.subnet4_count as i64);
    SUBNET6_KEYS.set(summary.subnet6_count as i64);
    URL_KEYS.set(summary.url_count as i64);
    DOMAIN_KEYS.set(summary.domain_count as i64);
    PUBLIC_SUFFIX_KEYS.set(summary.public_suffix_count as i64);
    ORG_KEYS.set(summary.org_count as i64);
    LARGEST_INDEX_CARDINALITY.set(summary.largest_index_cardinality as i64);

    REBUILDS.inc();
    RECORDS_ADDED.inc_by(summary.added as u64);
    RECORDS_UPDATED.inc_by(summary.updated as u64);
    RECORDS_REMOVED.inc_by(summary.removed as u64);
}
