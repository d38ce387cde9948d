//! svitlo - Hourly power outage schedule monitor
//!
//! Ingests the regional utility's published outage schedules and serves
//! them as a JSON API, per service queue and date.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`fetcher`] - HTTP retrieval of the source page with retries
//! - [`parser`] - Publication markup parsing into per-queue intervals
//! - [`normalize`] - Interval normalization and derived facts
//! - [`models`] - Core data structures and types
//! - [`storage`] - SQLite persistence of schedule snapshots
//! - [`service`] - Ingestion orchestration and query paths
//! - [`server`] - HTTP API
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use svitlo::config::Config;
//! use svitlo::fetcher::SourceFetcher;
//! use svitlo::service::OutageService;
//! use svitlo::storage::OutageStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(OutageStore::open(&config.storage.db_path)?);
//!     let fetcher = SourceFetcher::new(&config.source)?;
//!     let service = OutageService::new(fetcher, store, config.source.timezone);
//!     let report = service.trigger_update().await?;
//!     println!("updated {} dates", report.dates.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod server;
pub mod service;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::fetcher::SourceFetcher;
    pub use crate::models::{
        ClockTime, IntervalKind, QueueId, QueueStatus, ScheduleEntry, TimeInterval,
    };
    pub use crate::service::{IngestReport, OutageService};
    pub use crate::storage::OutageStore;
}

// Direct re-exports for convenience
pub use models::{ClockTime, IntervalKind, QueueId, QueueStatus, ScheduleEntry, TimeInterval};
