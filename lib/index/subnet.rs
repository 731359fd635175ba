//! CIDR text parsing for the Subnet4/Subnet6 indices (§4.3, §4.4).
//!
//! The index key is the CIDR text form itself (no further normalisation is
//! specified), but inserting into the CIDR tree needs the address split
//! into raw bytes and a prefix length. Text that doesn't parse as a valid
//! CIDR is logged and dropped rather than indexed under a sentinel: unlike
//! a 32-bit IPv4 value, there is no single key that multiple malformed
//! subnet strings could safely collapse onto without violating invariant 4
//! (the Subnet index and the CIDR tree must agree on their key sets).

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::warn;

pub fn parse_cidr4(text: &str) -> Option<(Vec<u8>, u8)> {
    let (addr, len) = split(text)?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    if len > 32 {
        return None;
    }
    Some((addr.octets().to_vec(), len))
}

pub fn parse_cidr6(text: &str) -> Option<(Vec<u8>, u8)> {
    let (addr, len) = split(text)?;
    let addr: Ipv6Addr = addr.parse().ok()?;
    if len > 128 {
        return None;
    }
    Some((addr.octets().to_vec(), len))
}

fn split(text: &str) -> Option<(&str, u8)> {
    let (addr, len) = text.split_once('/')?;
    let len: u8 = len.parse().ok()?;
    Some((addr, len))
}

/// Parse `text` as a v4 CIDR, logging and returning `None` on failure.
pub fn parse_cidr4_logged(text: &str) -> Option<(Vec<u8>, u8)> {
    let parsed = parse_cidr4(text);
    if parsed.is_none() {
        warn!(cidr = text, "unparseable IPv4 subnet, dropping");
    }
    parsed
}

/// Parse `text` as a v6 CIDR, logging and returning `None` on failure.
pub fn parse_cidr6_logged(text: &str) -> Option<(Vec<u8>, u8)> {
    let parsed = parse_cidr6(text);
    if parsed.is_none() {
        warn!(cidr = text, "unparseable IPv6 subnet, dropping");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn valid_v4_cidr() {
        let (addr, len) = parse_cidr4("10.4.0.0/16").unwrap();
        assert_eq!(addr, vec![10, 4, 0, 0]);
        assert_eq!(len, 16);
    }

    #[test]
    fn valid_v6_cidr() {
        let (addr, len) = parse_cidr6("2001:db8::/32").unwrap();
        assert_eq!(addr[0..4], [0x20, 0x01, 0x0d, 0xb8]);
        assert_eq!(len, 32);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_cidr4("not-a-cidr").is_none());
        assert!(parse_cidr4("10.4.0.0/33").is_none());
        assert!(parse_cidr4("10.4.0.0").is_none());
        assert!(parse_cidr6("not-a-cidr").is_none());
        assert!(parse_cidr6("2001:db8::/200").is_none());
    }
}
