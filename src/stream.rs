//! Streaming JSON array encoder for query results.
//!
//! Rows are emitted as they arrive from the store cursor; the full result
//! set is never buffered. A row that cannot be decoded is logged and
//! skipped without disturbing the comma bookkeeping of its neighbours. A
//! cursor failure mid-stream is logged and closes the array early, so the
//! emitted body stays well-formed JSON.

use crate::store::{self, RowStream};
use bytes::Bytes;
use chrono::SecondsFormat;
use futures_util::{future, stream, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;

#[derive(Serialize)]
struct RowBody {
    time: String,
    value: f32,
}

/// Encode a row stream as a JSON array of `{"time", "value"}` objects.
///
/// Output order follows cursor order; the store is responsible for the
/// descending-time sort.
pub fn encode_array(rows: RowStream) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let items = rows.scan(true, |first, row| {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(error = %e, "query cursor failed mid-stream");
                return future::ready(None);
            }
        };
        let chunk = match encode_row(&row, *first) {
            Some(chunk) => {
                *first = false;
                chunk
            }
            // Skipped rows contribute nothing, including no comma.
            None => Bytes::new(),
        };
        future::ready(Some(Ok(chunk)))
    });

    stream::once(future::ready(Ok(Bytes::from_static(b"["))))
        .chain(items)
        .chain(stream::once(future::ready(Ok(Bytes::from_static(b"]")))))
}

fn encode_row(row: &serde_json::Value, first: bool) -> Option<Bytes> {
    let decoded = match store::decode_row(row) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::error!(error = %e, "skipping undecodable result row");
            return None;
        }
    };

    let body = RowBody {
        time: decoded.time.to_rfc3339_opts(SecondsFormat::Secs, true),
        value: decoded.value as f32,
    };

    let json = match serde_json::to_vec(&body) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "skipping unserializable result row");
            return None;
        }
    };

    let mut chunk = Vec::with_capacity(json.len() + 1);
    if !first {
        chunk.push(b',');
    }
    chunk.extend_from_slice(&json);
    Some(Bytes::from(chunk))
}
