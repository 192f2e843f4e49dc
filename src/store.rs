//! Storage port for classified data points, plus the InfluxDB 3 HTTP
//! implementation used in production.
//!
//! Writes go to one of two logical tables (`accepted`/`rejected`); range
//! queries come back as a forward-only, single-pass row stream ordered by
//! descending time. Row decoding is separate from cursor advancement so a
//! single bad row never terminates the stream.

use crate::types::{DataPoint, QueryRange};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("write to {table} failed with status {status}: {body}")]
    WriteFailed {
        table: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("query failed with status {status}: {body}")]
    QueryFailed {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("query result stream failed: {0}")]
    Cursor(String),
    #[error("timestamp out of range for storage precision")]
    TimestampOutOfRange,
}

/// Logical destination table for a classified data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Accepted,
    Rejected,
}

impl Destination {
    pub fn table(self) -> &'static str {
        match self {
            Destination::Accepted => "accepted",
            Destination::Rejected => "rejected",
        }
    }
}

/// Forward-only stream of raw query rows, descending by time.
///
/// Rows arrive lazily as the storage response streams in; an `Err` item
/// means the cursor failed mid-stream and no further rows will follow.
pub type RowStream = BoxStream<'static, Result<serde_json::Value, StoreError>>;

/// Abstraction over the backing time-series store.
///
/// The connection behind an implementation is shared across the collector
/// and all query handlers and must tolerate concurrent use.
#[async_trait]
pub trait DataPointStore: Send + Sync {
    async fn write(&self, destination: Destination, point: &DataPoint) -> Result<(), StoreError>;

    async fn query(&self, range: QueryRange) -> Result<RowStream, StoreError>;
}

/// A decoded query row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Error)]
#[error("failed to parse {field} from row: {raw}")]
pub struct RowError {
    pub field: &'static str,
    pub raw: String,
}

/// Extract `time` and `value` from a raw row.
pub fn decode_row(row: &serde_json::Value) -> Result<QueryRow, RowError> {
    let time = row
        .get("time")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| RowError {
            field: "time",
            raw: row.get("time").cloned().unwrap_or_default().to_string(),
        })?;

    let value = row
        .get("value")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| RowError {
            field: "value",
            raw: row.get("value").cloned().unwrap_or_default().to_string(),
        })?;

    Ok(QueryRow { time, value })
}

/// Configuration for the InfluxDB 3 store.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub host: String,
    pub token: String,
    pub database: String,
}

/// InfluxDB 3 backed store speaking the v3 HTTP API.
pub struct InfluxStore {
    client: reqwest::Client,
    config: InfluxConfig,
}

impl InfluxStore {
    pub fn new(config: InfluxConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DataPointStore for InfluxStore {
    async fn write(&self, destination: Destination, point: &DataPoint) -> Result<(), StoreError> {
        let table = destination.table();
        let line = line_protocol(table, point)?;

        let url = format!("{}/api/v3/write_lp", self.config.host);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("db", self.config.database.as_str()),
                ("precision", "nanosecond"),
            ])
            .bearer_auth(&self.config.token)
            .body(line)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::WriteFailed { table, status, body });
        }

        Ok(())
    }

    async fn query(&self, range: QueryRange) -> Result<RowStream, StoreError> {
        let (sql, params) = build_query(range);

        let url = format!("{}/api/v3/query_sql", self.config.host);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({
                "db": self.config.database,
                "q": sql,
                "params": params,
                "format": "jsonl",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::QueryFailed { status, body });
        }

        // One row per line; rows are decoded as the body streams in, so the
        // caller sees the first row before the response has finished.
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        let lines = FramedRead::new(StreamReader::new(body), LinesCodec::new());

        Ok(lines
            .filter_map(|line| {
                let row = match line {
                    Ok(line) if line.trim().is_empty() => None,
                    Ok(line) => Some(
                        serde_json::from_str(&line)
                            .map_err(|e| StoreError::Cursor(e.to_string())),
                    ),
                    Err(e) => Some(Err(StoreError::Cursor(e.to_string()))),
                };
                future::ready(row)
            })
            .boxed())
    }
}

/// Render one data point in line protocol.
///
/// Tags are stored as a comma-joined string field; `received_at` as epoch
/// nanoseconds.
fn line_protocol(table: &str, point: &DataPoint) -> Result<String, StoreError> {
    let timestamp = point
        .time
        .timestamp_nanos_opt()
        .ok_or(StoreError::TimestampOutOfRange)?;
    let received_at = point
        .received_at
        .timestamp_nanos_opt()
        .ok_or(StoreError::TimestampOutOfRange)?;

    Ok(format!(
        "{table} value={},tags=\"{}\",received_at={received_at}i {timestamp}",
        point.value,
        escape_field(&point.tags.join(",")),
    ))
}

fn escape_field(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Assemble the range query with inclusive bounds and descending order.
fn build_query(range: QueryRange) -> (String, serde_json::Map<String, serde_json::Value>) {
    let mut sql = String::from("SELECT time, value FROM accepted");
    let mut params = serde_json::Map::new();
    let mut clauses = Vec::new();

    if let Some(start) = range.start {
        clauses.push("time >= $start");
        params.insert(
            "start".to_string(),
            start.to_rfc3339_opts(SecondsFormat::Nanos, true).into(),
        );
    }

    if let Some(until) = range.until {
        clauses.push("time <= $until");
        params.insert(
            "until".to_string(),
            until.to_rfc3339_opts(SecondsFormat::Nanos, true).into(),
        );
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    sql.push_str(" ORDER BY time DESC");
    (sql, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use chrono::TimeZone;
    use std::net::SocketAddr;

    async fn serve_query_body(body: &'static str) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let app = Router::new().route("/api/v3/query_sql", post(move || async move { body }));
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn query_rows(body: &'static str) -> Vec<Result<serde_json::Value, StoreError>> {
        let addr = serve_query_body(body).await;
        let store = InfluxStore::new(InfluxConfig {
            host: format!("http://{addr}"),
            token: "t".to_string(),
            database: "dev".to_string(),
        })
        .unwrap();

        store
            .query(QueryRange::default())
            .await
            .unwrap()
            .collect()
            .await
    }

    #[tokio::test]
    async fn query_yields_one_row_per_jsonl_line() {
        let rows = query_rows(
            "{\"time\":\"2023-11-14T22:13:20Z\",\"value\":2.0}\n\
             {\"time\":\"2023-11-14T22:13:10Z\",\"value\":1.0}\n",
        )
        .await;

        assert_eq!(rows.len(), 2);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first["value"], 2.0);
        let second = rows[1].as_ref().unwrap();
        assert_eq!(second["value"], 1.0);
    }

    #[tokio::test]
    async fn query_skips_blank_lines() {
        let rows =
            query_rows("{\"time\":\"2023-11-14T22:13:20Z\",\"value\":2.0}\n\n").await;

        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_ok());
    }

    #[tokio::test]
    async fn corrupt_line_surfaces_as_cursor_error() {
        let rows = query_rows("{not json\n").await;

        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0], Err(StoreError::Cursor(_))));
    }

    #[test]
    fn decodes_a_well_formed_row() {
        let row = serde_json::json!({"time": "2023-11-14T22:13:20Z", "value": 3.14});
        let decoded = decode_row(&row).unwrap();
        assert_eq!(decoded.time.timestamp(), 1_700_000_000);
        assert!((decoded.value - 3.14).abs() < 1e-9);
    }

    #[test]
    fn reports_bad_time_field() {
        let row = serde_json::json!({"time": 12345, "value": 3.14});
        let err = decode_row(&row).unwrap_err();
        assert_eq!(err.field, "time");
    }

    #[test]
    fn reports_missing_value_field() {
        let row = serde_json::json!({"time": "2023-11-14T22:13:20Z"});
        let err = decode_row(&row).unwrap_err();
        assert_eq!(err.field, "value");
    }

    #[test]
    fn unbounded_query_has_no_where_clause() {
        let (sql, params) = build_query(QueryRange::default());
        assert_eq!(sql, "SELECT time, value FROM accepted ORDER BY time DESC");
        assert!(params.is_empty());
    }

    #[test]
    fn until_only_query_is_well_formed() {
        let until = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let (sql, params) = build_query(QueryRange {
            start: None,
            until: Some(until),
        });
        assert_eq!(
            sql,
            "SELECT time, value FROM accepted WHERE time <= $until ORDER BY time DESC"
        );
        assert!(params.contains_key("until"));
    }

    #[test]
    fn both_bounds_joined_with_and() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let (sql, _) = build_query(QueryRange {
            start: Some(t),
            until: Some(t),
        });
        assert_eq!(
            sql,
            "SELECT time, value FROM accepted \
             WHERE time >= $start AND time <= $until ORDER BY time DESC"
        );
    }

    #[test]
    fn line_protocol_escapes_tags() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let point = DataPoint {
            time: t,
            value: 2.5,
            tags: vec!["a\"b".to_string(), "c".to_string()],
            received_at: t,
        };
        let line = line_protocol("accepted", &point).unwrap();
        assert_eq!(
            line,
            "accepted value=2.5,tags=\"a\\\"b,c\",received_at=1700000000000000000i \
             1700000000000000000"
        );
    }
}
