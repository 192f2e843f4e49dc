//! Collection workflow: fetch one data point, classify it, persist it.

use crate::admission::{self, Decision};
use crate::client::{ClientError, ProducerClient};
use crate::store::{DataPointStore, Destination, StoreError};
use crate::types::DataPoint;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read data point from producer: {0}")]
    Producer(#[from] ClientError),
    #[error("failed to persist data point: {0}")]
    Store(#[from] StoreError),
    #[error("collection cancelled")]
    Cancelled,
}

/// One collection unit: producer client plus storage port.
///
/// `tick` is the fallible task handed to the scheduler; every successfully
/// decoded record results in exactly one write, to the destination matching
/// its classification.
pub struct Pipeline {
    client: ProducerClient,
    store: Arc<dyn DataPointStore>,
}

impl Pipeline {
    pub fn new(client: ProducerClient, store: Arc<dyn DataPointStore>) -> Self {
        Self { client, store }
    }

    /// Run one collection cycle, aborting promptly if `cancel` fires.
    ///
    /// Cancellation drops the in-flight producer request or store write.
    pub async fn tick(&self, cancel: CancellationToken) -> Result<(), PipelineError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.collect() => result,
        }
    }

    async fn collect(&self) -> Result<(), PipelineError> {
        let record = self.client.fetch().await?;

        let now = Utc::now();
        let decision = admission::classify(&record, now);
        let point = DataPoint {
            time: record.time,
            value: record.value,
            tags: record.tags,
            received_at: now,
        };

        match decision {
            Decision::Accept => {
                tracing::debug!(time = %point.time, value = point.value, "accepting data point");
                self.store.write(Destination::Accepted, &point).await?;
            }
            Decision::Reject(reason) => {
                tracing::info!(%reason, time = %point.time, "rejecting data point");
                self.store.write(Destination::Rejected, &point).await?;
            }
        }

        Ok(())
    }
}
