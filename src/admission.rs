//! Admission policy applied to every fetched record.

use crate::wire::Record;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Records older than this (relative to classification time) are rejected.
const STALE_AFTER_HOURS: i64 = 1;

/// Tags that force rejection, compared case-sensitively.
pub const BLOCKED_TAGS: [&str; 2] = ["system", "suspect"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Stale,
    BlockedTag,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Stale => f.write_str("stale"),
            RejectReason::BlockedTag => f.write_str("blocked-tag"),
        }
    }
}

/// Classify a decoded record against the retention and tag policy.
///
/// The stale check runs first; tags are scanned in payload order and the
/// first blocked tag rejects the whole record.
pub fn classify(record: &Record, now: DateTime<Utc>) -> Decision {
    if record.time < now - Duration::hours(STALE_AFTER_HOURS) {
        return Decision::Reject(RejectReason::Stale);
    }

    if record
        .tags
        .iter()
        .any(|tag| BLOCKED_TAGS.contains(&tag.as_str()))
    {
        return Decision::Reject(RejectReason::BlockedTag);
    }

    Decision::Accept
}
