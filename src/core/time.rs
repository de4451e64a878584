//! Shared timestamp and id helpers.

use ulid::Ulid;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", now_unix_secs())
}

pub fn now_unix_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn parse_epoch_z(ts: &str) -> Option<u64> {
    ts.trim_end_matches('Z').parse::<u64>().ok()
}

/// Epoch-Z timestamp `days` days after `ts`. Falls through to `ts` when the
/// input is not a valid epoch-Z string.
pub fn epoch_z_plus_days(ts: &str, days: u64) -> String {
    match parse_epoch_z(ts) {
        Some(secs) => format!("{}Z", secs + days * SECONDS_PER_DAY),
        None => ts.to_string(),
    }
}

/// Epoch-Z cutoff for "older than `days` days ago".
pub fn epoch_z_days_ago(days: u64) -> String {
    format!("{}Z", now_unix_secs().saturating_sub(days * SECONDS_PER_DAY))
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Prefixed entity id, e.g. `req_01J...`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}
