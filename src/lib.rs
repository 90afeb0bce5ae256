//! DNS Query Log Pipeline
//!
//! Ingests per-query events from a DNS resolution engine, persists them as
//! log records under a bounded retention ceiling and aggregates them into
//! time-bucketed statistics.
//!
//! # Features
//!
//! - **Non-blocking ingestion**: classified records are queued and written in batches
//! - **Bounded storage**: the oldest rows are evicted once the ceiling is reached
//! - **Cached statistics**: one bucket per granularity, recomputed on change
//! - **Change notifications**: per-instance publish/subscribe hub
//! - **HTTP API**: REST endpoints plus a server-sent event stream
//!
//! # Modules
//!
//! - `types`: Core data structures (Record, RawQueryEvent, Bucket)
//! - `classifier`: Raw event to Record conversion
//! - `writer`: Buffered, time-batched writer lane
//! - `store`: Log store trait with memory and JSON-lines backends
//! - `stats`: Granularities, aggregator cache and background lane
//! - `notify`: Notification hub
//! - `pipeline`: Facade wiring the components together
//! - `api`: Axum router for REST and SSE
//! - `config`, `logging`, `error`, `utils`: Ambient support
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dns_query_log::{MemoryLogStore, PipelineConfig, QueryLogPipeline, RawQueryEvent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryLogStore::new());
//!     let pipeline = QueryLogPipeline::start(PipelineConfig::default(), store).unwrap();
//!
//!     let event: RawQueryEvent = serde_json::from_str(
//!         r#"{"domain":"example.com","startTime":1700000000000,"elapsed":12}"#,
//!     )
//!     .unwrap();
//!     pipeline.handle_event(&event);
//!
//!     pipeline.flush_now().await.unwrap();
//!     println!("{:?}", pipeline.series("day").unwrap());
//!     pipeline.shutdown().await.unwrap();
//! }
//! ```

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod stats;
pub mod store;
pub mod types;
pub mod utils;
pub mod writer;

// Re-export commonly used items at crate root
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult, StatsError, StoreError, WriterError};
pub use notify::{Notification, NotificationHub, NotificationKind};
pub use pipeline::QueryLogPipeline;
pub use stats::{Granularity, GranularitySpec};
pub use store::{JsonlLogStore, LogStore, MemoryLogStore, StoreConfig};
pub use types::{Bucket, QueryStatus, RawQueryEvent, Record, RowId, UserOverrideStatus};
pub use writer::{BufferedWriter, FlushReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
