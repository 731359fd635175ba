//! End-to-end scenarios over a three-dump sequence (§8): first load,
//! an in-place update, and a removal.

use pretty_assertions::assert_eq;
use regsnap::{normalize::ipv4_str_to_int, query::QuerySurface, snapshot::Snapshot};

const DUMP_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<register updateTime="2021-06-01T00:00:00+03:00" formatVersion="2.4">
  <content id="111" entryType="1" includeTime="2021-06-01T00:00:00" hash="h111">
    <decision date="2020-01-01" number="111" org=""/>
    <url>https://example.com/test</url>
    <domain>www.e01.tld</domain>
    <ip>10.1.0.1</ip>
    <ip>10.1.0.2</ip>
    <ip>10.1.0.3</ip>
    <ipv6>2001:db8::1</ipv6>
    <ipv6>2001:db8::2</ipv6>
  </content>
  <content id="222" entryType="1" includeTime="2021-06-01T00:00:00" hash="h222">
    <decision date="2020-01-01" number="222" org=""/>
    <url>https://example2.test/a</url>
    <domain>other.e02.tld</domain>
    <ip>10.2.0.1</ip>
    <ip>10.2.0.2</ip>
    <ip>10.2.0.3</ip>
    <ipv6>2001:db8::3</ipv6>
    <ipv6>2001:db8::4</ipv6>
  </content>
  <content id="333" entryType="1" includeTime="2021-06-01T00:00:00" hash="h333">
    <decision date="2020-01-01" number="333" org=""/>
    <url>https://example3.test/b</url>
    <ip>10.3.0.1</ip>
    <ip>10.3.0.2</ip>
    <ip>10.3.0.3</ip>
    <ipv6>2001:db8::5</ipv6>
    <ipv6>2001:db8::6</ipv6>
  </content>
  <content id="444" entryType="1" includeTime="2021-06-01T00:00:00" hash="h444">
    <decision date="2020-01-01" number="444" org=""/>
    <ip>10.4.4.4</ip>
    <ipSubnet>10.4.0.0/16</ipSubnet>
    <ipv6>2001:db8::7</ipv6>
    <ipv6>2001:db8::8</ipv6>
    <ipv6>2001:db8::9</ipv6>
  </content>
  <content id="555" entryType="1" includeTime="2021-06-01T00:00:00" hash="h555">
    <decision date="2020-01-01" number="555" org="FIVE"/>
    <ip>10.5.0.1</ip>
    <ip>10.5.0.2</ip>
    <ip>10.5.0.3</ip>
    <ipv6>2001:db8::a</ipv6>
    <ipv6>2001:db8::b</ipv6>
  </content>
</register>"#;

const DUMP_B: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<register updateTime="2021-06-01T00:05:00+03:00" formatVersion="2.4">
  <content id="111" entryType="1" includeTime="2021-06-01T00:05:00" hash="h111">
    <decision date="2020-01-01" number="111" org=""/>
    <url>https://example.com/test</url>
    <domain>www.e01.tld</domain>
    <ip>10.1.0.1</ip>
    <ip>10.1.0.2</ip>
    <ip>10.1.0.3</ip>
    <ipv6>2001:db8::1</ipv6>
    <ipv6>2001:db8::2</ipv6>
  </content>
  <content id="222" entryType="1" includeTime="2021-06-01T00:05:00" hash="h222">
    <decision date="2020-01-01" number="222" org=""/>
    <url>https://example2.test/a</url>
    <domain>other.e02.tld</domain>
    <ip>10.2.0.1</ip>
    <ip>10.2.0.2</ip>
    <ip>10.2.0.3</ip>
    <ipv6>2001:db8::3</ipv6>
    <ipv6>2001:db8::4</ipv6>
  </content>
  <content id="333" entryType="1" includeTime="2021-06-01T00:05:00" hash="h333">
    <decision date="2020-01-01" number="333" org=""/>
    <url>https://example3.test/b</url>
    <ip>10.3.0.1</ip>
    <ip>10.3.0.2</ip>
    <ip>10.3.0.3</ip>
    <ipv6>2001:db8::5</ipv6>
    <ipv6>2001:db8::6</ipv6>
  </content>
  <content id="444" entryType="1" includeTime="2021-06-01T00:05:00" hash="h444">
    <decision date="2020-01-01" number="444" org=""/>
    <ip>10.4.4.4</ip>
    <ipSubnet>10.4.0.0/16</ipSubnet>
    <ipv6>2001:db8::7</ipv6>
    <ipv6>2001:db8::8</ipv6>
  </content>
  <content id="555" entryType="1" includeTime="2021-06-01T00:05:00" hash="h555">
    <decision date="2020-01-01" number="555" org="FSB"/>
    <ip>10.5.0.1</ip>
    <ip>10.5.0.2</ip>
    <ip>10.5.0.3</ip>
    <ipv6>2001:db8::a</ipv6>
    <ipv6>2001:db8::b</ipv6>
  </content>
</register>"#;

const DUMP_C: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<register updateTime="2021-06-01T00:10:00+03:00" formatVersion="2.4">
  <content id="111" entryType="1" includeTime="2021-06-01T00:05:00" hash="h111">
    <decision date="2020-01-01" number="111" org=""/>
    <url>https://example.com/test</url>
    <domain>www.e01.tld</domain>
    <ip>10.1.0.1</ip>
    <ip>10.1.0.2</ip>
    <ip>10.1.0.3</ip>
    <ipv6>2001:db8::1</ipv6>
    <ipv6>2001:db8::2</ipv6>
  </content>
  <content id="222" entryType="1" includeTime="2021-06-01T00:05:00" hash="h222">
    <decision date="2020-01-01" number="222" org=""/>
    <url>https://example2.test/a</url>
    <domain>other.e02.tld</domain>
    <ip>10.2.0.1</ip>
    <ip>10.2.0.2</ip>
    <ip>10.2.0.3</ip>
    <ipv6>2001:db8::3</ipv6>
    <ipv6>2001:db8::4</ipv6>
  </content>
  <content id="333" entryType="1" includeTime="2021-06-01T00:05:00" hash="h333">
    <decision date="2020-01-01" number="333" org=""/>
    <url>https://example3.test/b</url>
    <ip>10.3.0.1</ip>
    <ip>10.3.0.2</ip>
    <ip>10.3.0.3</ip>
    <ipv6>2001:db8::5</ipv6>
    <ipv6>2001:db8::6</ipv6>
  </content>
  <content id="444" entryType="1" includeTime="2021-06-01T00:05:00" hash="h444">
    <decision date="2020-01-01" number="444" org=""/>
    <ip>10.4.4.4</ip>
    <ipSubnet>10.4.0.0/16</ipSubnet>
    <ipv6>2001:db8::7</ipv6>
    <ipv6>2001:db8::8</ipv6>
  </content>
</register>"#;

#[test]
fn dump_a_is_a_clean_first_load() {
    let snapshot = Snapshot::new();
    let summary = snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();

    assert_eq!(summary.record_count, 5);
    assert_eq!(summary.added, 5);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.removed, 0);

    assert_eq!(summary.ipv4_count, 13);
    assert_eq!(summary.ipv6_count, 11);
    assert_eq!(summary.subnet4_count, 1);
    assert_eq!(summary.subnet6_count, 0);
    assert_eq!(summary.url_count, 3);
    assert_eq!(summary.domain_count, 2);
}

#[test]
fn dump_a_ipv4_search_matches_direct_and_cidr_containment() {
    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();

    let query = QuerySurface::new(&snapshot);
    let result = query.search_ipv4(ipv4_str_to_int("10.4.4.4")).unwrap();

    assert_eq!(result.matches.len(), 2);
    assert!(result.matches.iter().all(|m| m.id == 444));
    assert!(result.matches.iter().any(|m| m.matched_attribute == "ipv4"));
    assert!(result.matches.iter().any(|m| m.matched_attribute == "subnet4:10.4.0.0/16"));
}

#[test]
fn dump_a_domain_search_matches_record_111() {
    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();

    let query = QuerySurface::new(&snapshot);
    let result = query.search_domain("www.e01.tld").unwrap();

    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].id, 111);
}

#[test]
fn url_query_normalises_away_the_fragment_before_matching() {
    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();

    let query = QuerySurface::new(&snapshot);
    let result = query.search_url("https://example.com/test#fragment").unwrap();

    assert_eq!(result.normalized_query, "https://example.com/test");
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].id, 111);
}

#[test]
fn dump_b_reports_every_record_as_updated() {
    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();
    let summary = snapshot.apply_dump(DUMP_B.as_bytes()).unwrap();

    assert_eq!(summary.added, 0);
    assert_eq!(summary.updated, 5);
    assert_eq!(summary.removed, 0);
}

#[test]
fn dump_b_drops_the_removed_ipv6_address_from_record_444() {
    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();
    snapshot.apply_dump(DUMP_B.as_bytes()).unwrap();

    let guard = snapshot.read();
    assert!(!guard.indices.ipv6.contains_key(&parse_ipv6("2001:db8::9")));
    assert!(guard.indices.ipv6.contains_key(&parse_ipv6("2001:db8::7")));
}

#[test]
fn dump_b_rekeys_the_decision_fingerprint_for_record_555() {
    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();

    let old_fingerprint = {
        let guard = snapshot.read();
        guard.store.get(555).unwrap().decision_fingerprint
    };

    snapshot.apply_dump(DUMP_B.as_bytes()).unwrap();

    let guard = snapshot.read();
    let new_fingerprint = guard.store.get(555).unwrap().decision_fingerprint;

    assert_ne!(old_fingerprint, new_fingerprint);
    assert!(!guard.indices.decision.contains_key(&old_fingerprint));
    assert!(guard.indices.decision.contains_key(&new_fingerprint));
}

#[test]
fn dump_c_purges_the_omitted_record_from_every_index() {
    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_A.as_bytes()).unwrap();
    snapshot.apply_dump(DUMP_B.as_bytes()).unwrap();
    let summary = snapshot.apply_dump(DUMP_C.as_bytes()).unwrap();

    assert_eq!(summary.removed, 1);
    assert_eq!(summary.record_count, 4);

    let guard = snapshot.read();
    assert!(!guard.store.contains(555));
    assert!(!guard.indices.ipv4.contains_key(&ipv4_str_to_int("10.5.0.1")));
    assert!(!guard.indices.ipv6.contains_key(&parse_ipv6("2001:db8::a")));
}

#[test]
fn domain_suffix_variant_two_matches_both_parent_and_icann_suffix() {
    const DUMP_WITH_UK_DOMAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<register updateTime="2021-06-01T00:00:00+03:00" formatVersion="2.4">
  <content id="666" entryType="1" includeTime="2021-06-01T00:00:00" hash="h666">
    <decision date="2020-01-01" number="666" org=""/>
    <domain>a.b.co.uk</domain>
  </content>
</register>"#;

    let snapshot = Snapshot::new();
    snapshot.apply_dump(DUMP_WITH_UK_DOMAIN.as_bytes()).unwrap();
    let query = QuerySurface::new(&snapshot);

    let parent_only = query.search_domain_suffix("a.b.co.uk", 1).unwrap();
    assert_eq!(parent_only.normalized_query, "b.co.uk");
    assert_eq!(parent_only.matches.len(), 1);
    assert_eq!(parent_only.matches[0].id, 666);

    let with_icann = query.search_domain_suffix("a.b.co.uk", 2).unwrap();
    assert_eq!(with_icann.matches.len(), 2);
    assert!(with_icann.matches.iter().any(|m| m.matched_attribute == "domain_suffix:b.co.uk"));
    assert!(with_icann.matches.iter().any(|m| m.matched_attribute == "domain_suffix:co.uk"));
}

fn parse_ipv6(text: &str) -> [u8; 16] {
    text.parse::<std::net::Ipv6Addr>().unwrap().octets()
}
