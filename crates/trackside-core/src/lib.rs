//! # Trackside Core Library
//!
//! Core ingestion pipeline for the Trackside vehicle telemetry tools.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A static channel catalog (engine, inverter, suspension, pedal, steering,
//!   GPS, accelerometer and flag channels)
//! - Decoding of raw telemetry fields into physical units
//! - A thread-safe time-series store with consistent snapshots
//! - Live (UDP) and replay (CSV log) record sources
//! - An append-only CSV session log
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trackside_core::{config::PipelineConfig, pipeline::Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PipelineConfig::load("trackside.json")?;
//! let pipeline = Pipeline::from_config(&config).await?;
//! let store = pipeline.store();
//!
//! let shutdown = CancellationToken::new();
//! let summary = pipeline.run(shutdown.clone()).await?;
//!
//! let snapshot = store.snapshot();
//! println!("speed: {:?}", snapshot.latest("Car_Speed"));
//! ```

pub mod catalog;
pub mod config;
pub mod datalog;
pub mod decode;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{Catalog, CatalogVariant, Channel, ChannelCategory, DecodeRule};
    pub use crate::config::{PipelineConfig, SourceConfig};
    pub use crate::datalog::{list_sessions, DurableLogger};
    pub use crate::decode::RecordDecoder;
    pub use crate::error::{ConfigError, LogError, PipelineError, SourceError};
    pub use crate::pipeline::{Pipeline, PipelineDriver, PipelineSummary};
    pub use crate::record::{NormalizedRecord, RawRecord, RawValue};
    pub use crate::source::{LiveSource, RecordSource, ReplaySource, SourceKind};
    pub use crate::store::{FlagEvent, Retention, Sample, Snapshot, TelemetryStore};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
