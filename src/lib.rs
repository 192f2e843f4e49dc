//! Periodic data-point collector with time-series storage and a streaming
//! query API.
//!
//! The service pulls one measurement per tick from an external producer,
//! decodes its mixed binary/JSON payload, classifies it against an age and
//! tag policy, and persists it to one of two time-series tables. A separate
//! HTTP endpoint serves filtered time-range queries as a streamed JSON
//! array.
//!
//! # Architecture
//!
//! ```text
//! Scheduler tick ──▶ ProducerClient ──▶ wire::decode ──▶ admission
//!                                                            │
//!                                        accepted / rejected ▼
//!                                                      DataPointStore
//!                                                            ▲
//! GET /data-point ──▶ store query ──▶ stream::encode_array ──┘
//! ```

pub mod admission;
pub mod client;
pub mod collector;
pub mod config;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod stream;
pub mod types;
pub mod wire;

pub use client::{ClientConfig, ProducerClient};
pub use collector::{Lifecycle, Scheduler};
pub use config::Config;
pub use pipeline::Pipeline;
pub use store::{DataPointStore, Destination, InfluxConfig, InfluxStore};
pub use types::{DataPoint, QueryRange};
