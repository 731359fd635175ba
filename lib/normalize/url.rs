//! URL canonicalisation (§4.1).
//!
//! Contract: total and idempotent, same as [`super::domain::normalize_domain`].
//! Unlike the domain normaliser, a URL that fails to parse as a URL at all is
//! returned unchanged rather than degraded further — the diff engine still
//! needs *some* stable string to index it under.

use url::Url;

/// Canonicalise a URL: fold backslashes to forward slashes, parse per RFC
/// 3986, lowercase and IDNA-normalise the host (preserving an explicit
/// port), drop any fragment, and re-serialise. Falls back to the
/// backslash-folded input unchanged if it doesn't parse as a URL at all.
pub fn normalize_url(raw: &str) -> String {
    let folded = raw.replace('\\', "/");

    let Ok(mut parsed) = Url::parse(&folded) else {
        return folded;
    };

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        let ascii = idna::domain_to_ascii(&lowered).unwrap_or(lowered);
        // host_str() never fails on a value we just read from the same URL.
        let _ = parsed.set_host(Some(&ascii));
    }

    parsed.set_fragment(None);

    parsed.into()
}
