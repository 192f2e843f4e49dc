//! Wire decoder for the producer payload.
//!
//! The payload is a JSON envelope with three fields:
//! - `time`: an integer literal of whole epoch seconds, usually carried as a
//!   JSON string (`"1700000000"`),
//! - `value`: an array of exactly 4 integers 0-255, the little-endian bytes
//!   of an IEEE-754 float32,
//! - `tags`: an array of strings.
//!
//! Each field is tracked individually through [`FieldState`] so that a
//! missing field (incomplete record) and a present-but-malformed field
//! (decode failure) stay distinguishable.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid {field} field: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("incomplete record: {0} field was not decoded")]
    Incomplete(&'static str),
}

/// Decode state of a single record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldState<T> {
    /// The field was absent from the payload.
    Pending,
    /// The field decoded successfully.
    Decoded(T),
    /// The field was present but malformed.
    Invalid(String),
}

impl<T> Default for FieldState<T> {
    fn default() -> Self {
        FieldState::Pending
    }
}

/// A not-yet-verified record with per-field decode state.
#[derive(Debug, Default)]
pub struct Candidate {
    pub time: FieldState<DateTime<Utc>>,
    pub value: FieldState<f32>,
    pub tags: FieldState<Vec<String>>,
}

/// A fully decoded record, every required field present and valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub value: f32,
    pub tags: Vec<String>,
}

/// Required number of measurement bytes.
const VALUE_LEN: usize = 4;

/// Raw envelope shape. Fields are kept as untyped JSON so that one bad field
/// does not abort structural decoding of the others.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    time: Option<serde_json::Value>,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    tags: Option<serde_json::Value>,
}

/// Decode a raw payload into a complete [`Record`].
pub fn decode(raw: &[u8]) -> Result<Record, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(raw)?;
    Candidate::from_envelope(envelope).complete()
}

impl Candidate {
    fn from_envelope(envelope: Envelope) -> Self {
        Self {
            time: envelope.time.map_or(FieldState::Pending, decode_time),
            value: envelope.value.map_or(FieldState::Pending, decode_value),
            tags: envelope.tags.map_or(FieldState::Pending, decode_tags),
        }
    }

    /// Verify completeness in field order (time, value, tags) and collapse
    /// into a [`Record`].
    pub fn complete(self) -> Result<Record, DecodeError> {
        let time = required("time", self.time)?;
        let value = required("value", self.value)?;
        let tags = required("tags", self.tags)?;
        Ok(Record { time, value, tags })
    }
}

fn required<T>(field: &'static str, state: FieldState<T>) -> Result<T, DecodeError> {
    match state {
        FieldState::Decoded(v) => Ok(v),
        FieldState::Pending => Err(DecodeError::Incomplete(field)),
        FieldState::Invalid(reason) => Err(DecodeError::InvalidField { field, reason }),
    }
}

/// Epoch seconds, carried as a string-encoded integer literal. A bare JSON
/// integer is accepted as well; anything non-integer is invalid.
fn decode_time(raw: serde_json::Value) -> FieldState<DateTime<Utc>> {
    let seconds = match &raw {
        serde_json::Value::String(s) => s.parse::<i64>().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    };

    let Some(seconds) = seconds else {
        return FieldState::Invalid(format!("expected integer epoch seconds, got {raw}"));
    };

    match Utc.timestamp_opt(seconds, 0).single() {
        Some(t) => FieldState::Decoded(t),
        None => FieldState::Invalid(format!("epoch seconds out of range: {seconds}")),
    }
}

/// Exactly 4 little-endian bytes reinterpreted as a float32. No NaN or range
/// check is applied to the resulting value.
fn decode_value(raw: serde_json::Value) -> FieldState<f32> {
    let bytes: Vec<u8> = match serde_json::from_value(raw) {
        Ok(b) => b,
        Err(e) => return FieldState::Invalid(format!("expected byte array: {e}")),
    };

    if bytes.len() != VALUE_LEN {
        return FieldState::Invalid(format!(
            "expected {VALUE_LEN} bytes, got {} bytes",
            bytes.len()
        ));
    }

    FieldState::Decoded(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn decode_tags(raw: serde_json::Value) -> FieldState<Vec<String>> {
    match serde_json::from_value(raw) {
        Ok(tags) => FieldState::Decoded(tags),
        Err(e) => FieldState::Invalid(format!("expected string array: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_bytes(f: f32) -> String {
        let b = f.to_le_bytes();
        format!("[{},{},{},{}]", b[0], b[1], b[2], b[3])
    }

    #[test]
    fn decodes_complete_record() {
        let raw = format!(
            r#"{{"time":"1700000000","value":{},"tags":["ok","extra"]}}"#,
            value_bytes(3.14)
        );

        let record = decode(raw.as_bytes()).unwrap();
        assert_eq!(record.time.timestamp(), 1_700_000_000);
        assert!((record.value - 3.14).abs() < 1e-6);
        assert_eq!(record.tags, vec!["ok", "extra"]);
    }

    #[test]
    fn accepts_bare_integer_time() {
        let raw = format!(r#"{{"time":1700000000,"value":{},"tags":[]}}"#, value_bytes(1.0));
        let record = decode(raw.as_bytes()).unwrap();
        assert_eq!(record.time.timestamp(), 1_700_000_000);
    }

    #[test]
    fn rejects_non_integer_time() {
        let raw = format!(
            r#"{{"time":"2023-11-14T00:00:00Z","value":{},"tags":[]}}"#,
            value_bytes(1.0)
        );
        let err = decode(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "time", .. }));
    }

    #[test]
    fn value_roundtrips_within_float32_precision() {
        for f in [0.0f32, -42.5, 3.14, 1e6, f32::MIN_POSITIVE, -0.0] {
            let raw = format!(r#"{{"time":"0","value":{},"tags":[]}}"#, value_bytes(f));
            let record = decode(raw.as_bytes()).unwrap();
            assert_eq!(record.value.to_bits(), f.to_bits(), "value {f} did not round-trip");
        }
    }

    #[test]
    fn reports_observed_length_for_short_value() {
        let raw = r#"{"time":"0","value":[1,2,3],"tags":[]}"#;
        let err = decode(raw.as_bytes()).unwrap_err();
        match err {
            DecodeError::InvalidField { field: "value", reason } => {
                assert!(reason.contains("got 3 bytes"), "reason was: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_observed_length_for_long_value() {
        let raw = r#"{"time":"0","value":[1,2,3,4,5],"tags":[]}"#;
        let err = decode(raw.as_bytes()).unwrap_err();
        match err {
            DecodeError::InvalidField { field: "value", reason } => {
                assert!(reason.contains("got 5 bytes"), "reason was: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_out_of_range_byte() {
        let raw = r#"{"time":"0","value":[1,2,3,256],"tags":[]}"#;
        let err = decode(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "value", .. }));
    }

    #[test]
    fn missing_tags_fails_completeness_naming_tags() {
        let raw = format!(r#"{{"time":"1700000000","value":{}}}"#, value_bytes(1.0));
        let err = decode(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Incomplete("tags")));
    }

    #[test]
    fn missing_time_reported_before_missing_tags() {
        let raw = format!(r#"{{"value":{}}}"#, value_bytes(1.0));
        let err = decode(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Incomplete("time")));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = decode(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
