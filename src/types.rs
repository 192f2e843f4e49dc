//! Core data types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A classified measurement as persisted to storage.
///
/// `received_at` is stamped by the pipeline at admission time, never by the
/// producer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub time: DateTime<Utc>,
    pub value: f32,
    pub tags: Vec<String>,
    pub received_at: DateTime<Utc>,
}

/// Inclusive time bounds for a range query. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryRange {
    pub start: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}
