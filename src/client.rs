//! HTTP client for fetching data points from the producer.

use crate::wire::{self, DecodeError, Record};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {status}")]
    UnexpectedStatus { status: StatusCode },
    #[error("failed to decode data point body: {0}")]
    Decode(#[from] DecodeError),
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the producer client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Producer endpoint serving one data point per GET.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for fetching data points from the producer.
pub struct ProducerClient {
    client: Client,
    base_url: String,
}

impl ProducerClient {
    /// Create a new producer client.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Fetch a single data point from the producer.
    ///
    /// One request per call; retries are the caller's concern. Non-2xx
    /// responses fail without reading the body.
    pub async fn fetch(&self) -> Result<Record, ClientError> {
        let response = self.client.get(&self.base_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus { status });
        }

        let body = response.bytes().await?;
        Ok(wire::decode(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn value_bytes(f: f32) -> String {
        let b = f.to_le_bytes();
        format!("[{},{},{},{}]", b[0], b[1], b[2], b[3])
    }

    #[tokio::test]
    async fn fetches_and_decodes_a_data_point() {
        let body = format!(
            r#"{{"time":"1700000000","value":{},"tags":["ok"]}}"#,
            value_bytes(3.14)
        );
        let addr = serve(Router::new().route("/", get(move || async move { body.clone() }))).await;

        let client = ProducerClient::new(ClientConfig::new(format!("http://{addr}"))).unwrap();
        let record = client.fetch().await.unwrap();

        assert_eq!(record.time.timestamp(), 1_700_000_000);
        assert!((record.value - 3.14).abs() < 1e-6);
        assert_eq!(record.tags, vec!["ok"]);
    }

    #[tokio::test]
    async fn non_2xx_is_unexpected_status() {
        let addr = serve(Router::new().route(
            "/",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let client = ProducerClient::new(ClientConfig::new(format!("http://{addr}"))).unwrap();
        let err = client.fetch().await.unwrap_err();

        match err {
            ClientError::UnexpectedStatus { status } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn incomplete_body_surfaces_as_decode_error() {
        let body = format!(r#"{{"time":"1700000000","value":{}}}"#, value_bytes(1.0));
        let addr = serve(Router::new().route("/", get(move || async move { body.clone() }))).await;

        let client = ProducerClient::new(ClientConfig::new(format!("http://{addr}"))).unwrap();
        let err = client.fetch().await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Decode(DecodeError::Incomplete("tags"))
        ));
    }
}
