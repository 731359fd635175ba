//! Canonicalisers for the values carried in a [`Record`](crate::model::Record):
//! domains, URLs, IPv4 text, and the two timestamp grammars the dump uses.
//!
//! Every normaliser here is total: malformed input never panics or
//! propagates an error, it degrades to a sentinel or a best-effort fallback,
//! exactly as the diff engine expects (§4.1, §7).

pub mod domain;
pub mod hash;
pub mod ip4;
pub mod time;
pub mod url;

pub use domain::normalize_domain;
pub use hash::fnv1a_64;
pub use ip4::{ipv4_str_to_int, IPV4_SENTINEL};
pub use time::{parse_naive_moscow, parse_rfc3339};
pub use url::normalize_url;
