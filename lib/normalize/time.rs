//! The two timestamp grammars the dump uses (§4.1): RFC 3339 with an
//! explicit offset, and a Moscow-local naive timestamp with no offset
//! spelled out at all.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Europe::Moscow;
use tracing::error;

/// Parse an RFC 3339 timestamp (used for `register/@updateTime` and the
/// per-record `ts` attribute). Empty input is not an error and returns `0`;
/// anything malformed is logged and also returns `0`.
pub fn parse_rfc3339(s: &str) -> i64 {
    if s.is_empty() {
        return 0;
    }

    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.timestamp(),
        Err(err) => {
            error!(input = s, %err, "can't parse RFC3339 time");
            0
        }
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SS` as a naive local time in the Europe/Moscow
/// timezone (used for `content/@includeTime`, which carries no offset).
pub fn parse_naive_moscow(s: &str) -> i64 {
    if s.is_empty() {
        return 0;
    }

    match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => match Moscow.from_local_datetime(&naive).single() {
            Some(dt) => dt.timestamp(),
            None => {
                // Ambiguous/nonexistent local time around a DST transition;
                // Moscow hasn't observed DST since 2014, so this is
                // effectively unreachable, but degrade rather than panic.
                error!(input = s, "ambiguous local time");
                0
            }
        },
        Err(err) => {
            error!(input = s, %err, "can't parse naive Moscow time");
            0
        }
    }
}
