//! The streaming dump parser (§4.4).
//!
//! The whole dump is read into memory up front (`core consumes an ordered
//! byte stream`, and these dumps run to tens of megabytes, not gigabytes),
//! which lets the fingerprint step slice the raw bytes of a `<content>`
//! element straight out of the original buffer by byte offset rather than
//! teeing the decoder's output through a side buffer: `quick-xml`'s
//! `buffer_position()` always tracks the position in the *original* bytes,
//! even when its `encoding` feature is transcoding a declared non-UTF-8
//! charset (e.g. windows-1251) under the hood, so there's no offset
//! correction to track across the declaration boundary.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::model::{BlockType, Decision, Record, RecordId, Timestamped};
use crate::normalize::{
    fnv1a_64, ipv4_str_to_int, normalize_domain, normalize_url, parse_naive_moscow, parse_rfc3339,
};

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("I/O error reading dump: {0}")]
    Io(String),
    #[error("malformed XML: {0}")]
    Malformed(String),
}

pub struct ParsedDump {
    pub format_version: String,
    pub update_time: i64,
    pub update_time_urgently_raw: String,
    pub records: Vec<ParsedRecord>,
}

pub struct ParsedRecord {
    pub id: RecordId,
    pub record_hash: u64,
    /// `None` on a record-decode failure; the id is still reported so the
    /// caller can mark it "seen" and skip purging it (§4.4 failure
    /// semantics).
    pub record: Option<Record>,
}

#[derive(Default)]
struct ContentBody {
    decision: Decision,
    urls: Vec<(String, Option<i64>)>,
    domains: Vec<(String, Option<i64>)>,
    ips: Vec<(String, Option<i64>)>,
    ipv6s: Vec<(String, Option<i64>)>,
    subnets: Vec<(String, Option<i64>)>,
    subnet6s: Vec<(String, Option<i64>)>,
}

/// Drain `source` into memory and parse it. An I/O error reading the
/// stream itself (as opposed to malformed XML once it's all in hand) is
/// reported separately so the caller can abort the rebuild and retain the
/// previous snapshot (§4.4 failure semantics).
pub fn parse_reader<R: std::io::Read>(mut source: R) -> Result<ParsedDump, XmlError> {
    let mut bytes = Vec::new();
    source
        .read_to_end(&mut bytes)
        .map_err(|err| XmlError::Io(err.to_string()))?;
    parse(&bytes)
}

pub fn parse(bytes: &[u8]) -> Result<ParsedDump, XmlError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut format_version = String::new();
    let mut update_time = 0_i64;
    let mut update_time_urgently_raw = String::new();
    let mut records = Vec::new();

    loop {
        let element_start = reader.buffer_position() as usize;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| XmlError::Malformed(err.to_string()))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) if e.name().as_ref() == b"register" => {
                for attr in e.attributes().flatten() {
                    let Ok(value) = attr.decode_and_unescape_value(&reader) else {
                        continue;
                    };
                    match attr.key.as_ref() {
                        b"formatVersion" => format_version = value.into_owned(),
                        b"updateTime" => update_time = parse_rfc3339(&value),
                        b"updateTimeUrgently" => update_time_urgently_raw = value.into_owned(),
                        _ => {}
                    }
                }
            }
            Event::Start(ref e) if e.name().as_ref() == b"content" => {
                match parse_content_id(e, &reader) {
                    Some(id) => {
                        let attrs = parse_content_attrs(e, &reader);
                        let body = read_content_body(&mut reader, &mut buf)?;

                        let element_end = reader.buffer_position() as usize;
                        let slice = &bytes[element_start..element_end];
                        let record_hash = fnv1a_64(slice);

                        let record = build_record(id, attrs, body, update_time);
                        records.push(ParsedRecord {
                            id,
                            record_hash,
                            record: Some(record),
                        });
                    }
                    None => {
                        tracing::error!("content element without a parseable id attribute, skipping");
                        skip_to_content_end(&mut reader, &mut buf)?;
                    }
                }
            }
            Event::Empty(ref e) if e.name().as_ref() == b"content" => {
                if let Some(id) = parse_content_id(e, &reader) {
                    let attrs = parse_content_attrs(e, &reader);
                    let element_end = reader.buffer_position() as usize;
                    let slice = &bytes[element_start..element_end];
                    let record_hash = fnv1a_64(slice);
                    let record = build_record(id, attrs, ContentBody::default(), update_time);
                    records.push(ParsedRecord {
                        id,
                        record_hash,
                        record: Some(record),
                    });
                }
            }
            _ => {}
        }

        buf.clear();
    }

    Ok(ParsedDump {
        format_version,
        update_time,
        update_time_urgently_raw,
        records,
    })
}

struct ContentAttrs {
    entry_type: i32,
    urgency_type: Option<i32>,
    include_time: i64,
    block_type_str: Option<String>,
    hash: String,
    ts: Option<i64>,
}

fn parse_content_id(e: &quick_xml::events::BytesStart, reader: &Reader<&[u8]>) -> Option<RecordId> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.as_ref() != b"id" {
            return None;
        }
        let value = attr.decode_and_unescape_value(reader).ok()?;
        value.parse::<RecordId>().ok()
    })
}

fn parse_content_attrs(e: &quick_xml::events::BytesStart, reader: &Reader<&[u8]>) -> ContentAttrs {
    let mut entry_type = 0;
    let mut urgency_type = None;
    let mut include_time = 0;
    let mut block_type_str = None;
    let mut hash = String::new();
    let mut ts = None;

    for attr in e.attributes().flatten() {
        let Ok(value) = attr.decode_and_unescape_value(reader) else {
            continue;
        };
        match attr.key.as_ref() {
            b"entryType" => entry_type = value.parse().unwrap_or(0),
            b"urgencyType" => urgency_type = value.parse().ok(),
            b"includeTime" => include_time = parse_naive_moscow(&value),
            b"blockType" => block_type_str = Some(value.into_owned()),
            b"hash" => hash = value.into_owned(),
            b"ts" => ts = Some(parse_rfc3339(&value)),
            _ => {}
        }
    }

    ContentAttrs {
        entry_type,
        urgency_type,
        include_time,
        block_type_str,
        hash,
        ts,
    }
}

/// Read from just after a `<content ...>` start tag up to (and including)
/// its matching end tag, collecting the child elements the diff engine
/// cares about.
fn read_content_body(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<ContentBody, XmlError> {
    let mut body = ContentBody::default();
    let mut current: Option<(Vec<u8>, Option<i64>)> = None;

    loop {
        buf.clear();
        let event = reader
            .read_event_into(buf)
            .map_err(|err| XmlError::Malformed(err.to_string()))?;

        match event {
            Event::Eof => return Err(XmlError::Malformed("unexpected EOF inside <content>".to_string())),
            Event::End(ref e) if e.name().as_ref() == b"content" => break,
            Event::Start(ref e) if e.name().as_ref() == b"decision" => {
                for attr in e.attributes().flatten() {
                    let Ok(value) = attr.decode_and_unescape_value(&*reader) else {
                        continue;
                    };
                    match attr.key.as_ref() {
                        b"org" => body.decision.org = value.into_owned(),
                        b"number" => body.decision.number = value.into_owned(),
                        b"date" => body.decision.date = value.into_owned(),
                        _ => {}
                    }
                }
            }
            Event::Empty(ref e) if e.name().as_ref() == b"decision" => {
                for attr in e.attributes().flatten() {
                    let Ok(value) = attr.decode_and_unescape_value(&*reader) else {
                        continue;
                    };
                    match attr.key.as_ref() {
                        b"org" => body.decision.org = value.into_owned(),
                        b"number" => body.decision.number = value.into_owned(),
                        b"date" => body.decision.date = value.into_owned(),
                        _ => {}
                    }
                }
            }
            Event::Start(ref e) => {
                let name = e.name().as_ref().to_vec();
                let ts = e.attributes().flatten().find_map(|attr| {
                    if attr.key.as_ref() != b"ts" {
                        return None;
                    }
                    let value = attr.decode_and_unescape_value(&*reader).ok()?;
                    Some(parse_rfc3339(&value))
                });
                current = Some((name, ts));
            }
            Event::Empty(ref e) => {
                push_child(&mut body, e.name().as_ref(), String::new(), None);
            }
            Event::Text(ref e) | Event::CData(ref e) => {
                if let Some((name, ts)) = current.take() {
                    let text = reader
                        .decoder()
                        .decode(e.as_ref())
                        .map(|cow| cow.into_owned())
                        .unwrap_or_default();
                    push_child(&mut body, &name, text, ts);
                    current = Some((name, ts));
                }
            }
            Event::End(_) => {
                current = None;
            }
            _ => {}
        }
    }

    Ok(body)
}

fn push_child(body: &mut ContentBody, name: &[u8], text: String, ts: Option<i64>) {
    match name {
        b"url" => body.urls.push((text, ts)),
        b"domain" => body.domains.push((text, ts)),
        b"ip" => body.ips.push((text, ts)),
        b"ipv6" => body.ipv6s.push((text, ts)),
        b"ipSubnet" => body.subnets.push((text, ts)),
        b"ipv6Subnet" => body.subnet6s.push((text, ts)),
        _ => {}
    }
}

/// Skip past a `<content>` element whose `id` couldn't be read at all; there
/// is nothing to mark "seen" for, so this record is simply invisible to the
/// purge pass until the upstream fixes it.
fn skip_to_content_end(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<(), XmlError> {
    loop {
        buf.clear();
        match reader
            .read_event_into(buf)
            .map_err(|err| XmlError::Malformed(err.to_string()))?
        {
            Event::Eof => return Ok(()),
            Event::End(ref e) if e.name().as_ref() == b"content" => return Ok(()),
            _ => {}
        }
    }
}

fn build_record(id: RecordId, attrs: ContentAttrs, body: ContentBody, registry_update_time: i64) -> Record {
    let ipv4s: Vec<Timestamped<u32>> = body
        .ips
        .iter()
        .map(|(v, ts)| Timestamped::new(ipv4_str_to_int(v), ts.unwrap_or(0)))
        .collect();

    let ipv6s: Vec<Timestamped<[u8; 16]>> = body
        .ipv6s
        .iter()
        .map(|(v, ts)| Timestamped::new(parse_ipv6(v), ts.unwrap_or(0)))
        .collect();

    let domains: Vec<Timestamped<String>> = body
        .domains
        .iter()
        .map(|(v, ts)| Timestamped::new(normalize_domain(v), ts.unwrap_or(0)))
        .collect();

    let normalized_urls: Vec<String> = body.urls.iter().map(|(v, _)| normalize_url(v)).collect();
    let https_block_count = normalized_urls
        .iter()
        .filter(|u| u.starts_with("https://"))
        .count();

    let urls: Vec<Timestamped<String>> = normalized_urls
        .into_iter()
        .zip(body.urls.iter())
        .map(|(normalized, (_, ts))| Timestamped::new(normalized, ts.unwrap_or(0)))
        .collect();

    let subnet4s: Vec<Timestamped<String>> = body
        .subnets
        .iter()
        .map(|(v, ts)| Timestamped::new(v.clone(), ts.unwrap_or(0)))
        .collect();

    let subnet6s: Vec<Timestamped<String>> = body
        .subnet6s
        .iter()
        .map(|(v, ts)| Timestamped::new(v.clone(), ts.unwrap_or(0)))
        .collect();

    Record {
        id,
        entry_type: attrs.entry_type,
        urgency_type: attrs.urgency_type,
        block_type: BlockType::derive(attrs.block_type_str.as_deref(), https_block_count),
        decision: body.decision,
        include_time: attrs.include_time,
        ts: attrs.ts,
        hash: attrs.hash,
        urls,
        domains,
        ipv4s,
        ipv6s,
        subnet4s,
        subnet6s,
        record_hash: 0,
        registry_update_time,
    }
}

/// Parse an IPv6 literal into its 16-byte form. There is no specified
/// sentinel for a malformed IPv6 address (only IPv4 and time carry one);
/// this uses all-ones, mirroring the IPv4 sentinel's "all bits set" shape,
/// so a downstream consumer can recognise it the same way.
const IPV6_SENTINEL: [u8; 16] = [0xFF; 16];

fn parse_ipv6(text: &str) -> [u8; 16] {
    text.parse::<std::net::Ipv6Addr>()
        .map(|addr| addr.octets())
        .unwrap_or(IPV6_SENTINEL)
}
