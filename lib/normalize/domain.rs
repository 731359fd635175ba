//! Domain canonicalisation (§4.1).
//!
//! Contract: total (never fails) and idempotent
//! (`normalize_domain(normalize_domain(x)) == normalize_domain(x)`).

/// Canonicalise a domain the way the diff engine indexes it: strip any URL
/// scheme prefix, truncate at the first `/`, `\`, or whitespace, fold `,`
/// into `.`, strip a leading `*.` and a trailing `.`, IDNA-to-ASCII (errors
/// ignored, falling back to the stripped input), then lowercase.
pub fn normalize_domain(domain: &str) -> String {
    let domain = strip_scheme(domain);
    let domain = truncate_at_path_or_space(domain);

    let folded: String = domain.chars().map(|c| if c == ',' { '.' } else { c }).collect();

    let stripped = folded
        .strip_prefix("*.")
        .unwrap_or(folded.as_str())
        .trim_end_matches('.');

    let ascii = idna::domain_to_ascii(stripped).unwrap_or_else(|_| stripped.to_string());

    ascii.to_lowercase()
}

/// Cut the string at the first `/`, `\`, or whitespace character, whichever
/// comes first; everything from that point on is path/query noise that was
/// never part of the domain.
fn truncate_at_path_or_space(input: &str) -> &str {
    match input.find(|c: char| c == '/' || c == '\\' || c.is_whitespace()) {
        Some(idx) => &input[..idx],
        None => input,
    }
}

/// Drop a leading `scheme://` if present; this mirrors the Go
/// implementation's behaviour of truncating at `/` after stripping any
/// `http(s)://`-style prefix, generalised to any `scheme://`.
fn strip_scheme(input: &str) -> &str {
    match input.find("://") {
        Some(idx) => &input[idx + 3..],
        None => input,
    }
}
