//! Public-suffix key derivation for the Domain index (§4.3, §4.6).
//!
//! Populated whenever the Domain index is mutated: the eTLD+1 ("parent")
//! always gets a key, alongside the domain's ICANN public suffix — walked up
//! one level when the domain's own suffix turns out to be a private suffix
//! sitting below a public one — so a `variant == 2` suffix query can match
//! on either.

use psl::{List, Psl, Type};

/// `(parent, icann_suffix)` for `name`. Both are `None` when `name` has no
/// dot (single-label names carry no eTLD+1 or suffix).
pub fn suffix_keys(name: &str) -> (Option<String>, Option<String>) {
    if !name.contains('.') {
        return (None, None);
    }

    let bytes = name.as_bytes();

    let parent = List
        .domain(bytes)
        .map(|domain| String::from_utf8_lossy(domain.as_bytes()).into_owned());

    let icann_suffix = List.suffix(bytes).and_then(|suffix| {
        if suffix.typ() == Some(Type::Icann) {
            Some(String::from_utf8_lossy(suffix.as_bytes()).into_owned())
        } else {
            List.suffix(suffix.as_bytes())
                .filter(|s| s.typ() == Some(Type::Icann))
                .map(|s| String::from_utf8_lossy(s.as_bytes()).into_owned())
        }
    });

    (parent, icann_suffix)
}
