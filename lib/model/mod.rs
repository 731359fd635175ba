//! The `Record`/`PackedRecord` data model (§3 of the design).

use serde::{Deserialize, Serialize};

pub type RecordId = i32;

/// One `(value, ts)` pair as carried by a `Record` collection.
#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub value: T,
    pub ts: i64,
}

impl<T> Timestamped<T> {
    pub fn new(value: T, ts: i64) -> Self {
        Self { value, ts }
    }
}

#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockType {
    Url,
    Https,
    Domain,
    Mask,
    Ip,
}

impl BlockType {
    /// Derive the block type the way the diff engine does: the XML
    /// `blockType` string wins outright for `ip`/`domain`/`domain-mask`;
    /// otherwise it's a URL block, upgraded to HTTPS if any contained URL
    /// normalises to an `https://` scheme.
    pub fn derive(xml_block_type: Option<&str>, https_block_count: usize) -> Self {
        match xml_block_type {
            Some("ip") => BlockType::Ip,
            Some("domain") => BlockType::Domain,
            Some("domain-mask") => BlockType::Mask,
            _ if https_block_count > 0 => BlockType::Https,
            _ => BlockType::Url,
        }
    }
}

#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    pub org: String,
    pub number: String,
    pub date: String,
}

impl Decision {
    /// 64-bit fingerprint of the triple, fields separated by `' '`.
    pub fn fingerprint(&self) -> u64 {
        crate::normalize::hash::fnv1a_64_parts(&[
            self.org.as_bytes(),
            b" ",
            self.number.as_bytes(),
            b" ",
            self.date.as_bytes(),
        ])
    }
}

/// The atomic unit distributed by the upstream: one `<content>` element.
#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub entry_type: i32,
    pub urgency_type: Option<i32>,
    pub block_type: BlockType,
    pub decision: Decision,
    pub include_time: i64,
    pub ts: Option<i64>,
    pub hash: String,
    pub urls: Vec<Timestamped<String>>,
    pub domains: Vec<Timestamped<String>>,
    pub ipv4s: Vec<Timestamped<u32>>,
    pub ipv6s: Vec<Timestamped<[u8; 16]>>,
    pub subnet4s: Vec<Timestamped<String>>,
    pub subnet6s: Vec<Timestamped<String>>,
    pub record_hash: u64,
    pub registry_update_time: i64,
}

/// The in-memory variant held by the record store: only the fields
/// secondary indices need, plus the opaque JSON payload.
#[cfg_attr(any(debug_assertions, test), derive(Debug))]
#[derive(Clone)]
pub struct PackedRecord {
    pub id: RecordId,
    pub entry_type: i32,
    pub entry_type_key: String,
    pub block_type: BlockType,
    pub decision: Decision,
    pub decision_fingerprint: u64,
    pub org_key: String,
    pub record_hash: u64,
    pub registry_update_time: i64,
    pub urls: Vec<Timestamped<String>>,
    pub domains: Vec<Timestamped<String>>,
    pub ipv4s: Vec<Timestamped<u32>>,
    pub ipv6s: Vec<Timestamped<[u8; 16]>>,
    pub subnet4s: Vec<Timestamped<String>>,
    pub subnet6s: Vec<Timestamped<String>>,
    pub payload: serde_json::Value,
}

impl PackedRecord {
    pub fn from_record(record: &Record, entry_type_key: String, org_key: String) -> Self {
        Self {
            id: record.id,
            entry_type: record.entry_type,
            entry_type_key,
            block_type: record.block_type,
            decision: record.decision.clone(),
            decision_fingerprint: record.decision.fingerprint(),
            org_key,
            record_hash: record.record_hash,
            registry_update_time: record.registry_update_time,
            urls: record.urls.clone(),
            domains: record.domains.clone(),
            ipv4s: record.ipv4s.clone(),
            ipv6s: record.ipv6s.clone(),
            subnet4s: record.subnet4s.clone(),
            subnet6s: record.subnet6s.clone(),
            payload: serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
        }
    }
}
