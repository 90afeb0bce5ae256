//! Pipeline facade
//!
//! Wires classifier, writer, store, aggregator and notification hub into one
//! instance. Every collaborator is per-instance: two pipelines in the same
//! process share nothing.
//!
//! ```text
//! RawQueryEvent ─► classify ─► BufferedWriter ─► LogStore ─► StatsAggregator
//!                                    │                             ▲
//!                                    └──── NotificationHub ────────┘
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineResult, StatsResult, StoreResult, WriterError};
use crate::notify::{NotificationHub, NotificationKind};
use crate::stats::{AggregatorLane, GranularitySpec, SeriesReceiver, StatsAggregator};
use crate::store::{JsonlLogStore, LogStore};
use crate::types::{Bucket, RawQueryEvent, Record, RowId, UserOverrideStatus};
use crate::utils::{Clock, SystemClock};
use crate::writer::{BufferedWriter, DiagnosticSink, FlushReport, TracingSink};

/// A running query log pipeline
///
/// Must be started inside a tokio runtime; it spawns the writer lane and the
/// stats lane.
pub struct QueryLogPipeline {
    config: PipelineConfig,
    store: Arc<dyn LogStore>,
    hub: NotificationHub,
    writer: BufferedWriter,
    aggregator: Arc<StatsAggregator>,
    stats_lane: AggregatorLane,
    server_label: RwLock<String>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl QueryLogPipeline {
    /// Open the JSONL store from `config` and start the pipeline on it
    pub fn open(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let store = JsonlLogStore::open(config.store_config())?;
        Self::start(config, Arc::new(store))
    }

    /// Start on an existing store with the system clock
    pub fn start(config: PipelineConfig, store: Arc<dyn LogStore>) -> PipelineResult<Self> {
        Self::with_parts(config, store, Arc::new(SystemClock), Arc::new(TracingSink))
    }

    pub fn with_parts(
        config: PipelineConfig,
        store: Arc<dyn LogStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        if store.ceiling() != config.retention_ceiling {
            return Err(ConfigError::Invalid(format!(
                "retention_ceiling is {} but the store keeps {} rows",
                config.retention_ceiling,
                store.ceiling()
            ))
            .into());
        }

        let hub = NotificationHub::new();
        let (writer, writer_task) =
            BufferedWriter::spawn(store.clone(), hub.clone(), config.flush_interval(), sink);

        let aggregator = Arc::new(StatsAggregator::new(
            store.clone(),
            hub.clone(),
            clock,
            config.granularities.clone(),
            config.refresh_interval(),
        ));
        let initial = config.granularities[0].name.clone();
        let (stats_lane, stats_task) = AggregatorLane::spawn(aggregator.clone(), &hub, initial)?;

        info!(
            ceiling = store.ceiling(),
            flush_interval_ms = config.flush_interval_ms,
            granularities = config.granularities.len(),
            "query log pipeline started"
        );

        Ok(Self {
            server_label: RwLock::new(config.server_label.clone()),
            config,
            store,
            hub,
            writer,
            aggregator,
            stats_lane,
            tasks: Mutex::new(vec![writer_task, stats_task]),
        })
    }

    // ========== Ingestion ==========

    /// Classify and queue one engine event; `false` if it was not logged
    pub fn handle_event(&self, event: &RawQueryEvent) -> bool {
        let label = self.server_label.read().clone();
        let Some(record) = classify(event, &label) else {
            return false;
        };

        match self.writer.submit(record) {
            Ok(()) => true,
            Err(e) => {
                warn!(domain = %event.domain, error = %e, "event arrived after writer shutdown");
                false
            }
        }
    }

    /// Queue an already classified record
    pub fn submit(&self, record: Record) -> Result<(), WriterError> {
        self.writer.submit(record)
    }

    pub async fn flush_now(&self) -> Result<FlushReport, WriterError> {
        self.writer.flush_now().await
    }

    // ========== Statistics ==========

    pub fn series(&self, name: impl AsRef<str>) -> StatsResult<Arc<Bucket>> {
        self.aggregator.series(name)
    }

    /// Change the granularity pushed to `watch_series` receivers
    pub fn select_granularity(&self, name: &str) -> StatsResult<()> {
        self.stats_lane.select(name)
    }

    pub fn watch_series(&self) -> SeriesReceiver {
        self.stats_lane.subscribe()
    }

    pub fn granularities(&self) -> &[GranularitySpec] {
        self.aggregator.granularities()
    }

    // ========== Log management ==========

    /// All stored records, oldest first
    pub fn records(&self) -> StoreResult<Vec<Record>> {
        self.store.read_all()
    }

    pub fn set_user_status(&self, row_id: RowId, status: UserOverrideStatus) -> StoreResult<bool> {
        let found = self.store.update_user_status(row_id, status)?;
        if found {
            self.hub.publish(NotificationKind::RecordUpdated);
        }
        Ok(found)
    }

    pub fn delete_record(&self, row_id: RowId) -> StoreResult<bool> {
        let found = self.store.delete(row_id)?;
        if found {
            self.hub.publish_with(NotificationKind::RecordDeleted, Some(1));
        }
        Ok(found)
    }

    pub fn clear_log(&self) -> StoreResult<()> {
        let removed = self.store.len()?;
        self.store.clear_all()?;
        info!(removed, "query log cleared");
        self.hub.publish_with(NotificationKind::LogCleared, Some(removed));
        Ok(())
    }

    // ========== Settings ==========

    pub fn server_label(&self) -> String {
        self.server_label.read().clone()
    }

    /// Label stamped on records classified from now on
    pub fn set_server_label(&self, label: impl Into<String>) {
        *self.server_label.write() = label.into();
    }

    /// Restore configured settings and force every bucket to recompute
    pub fn reset_settings(&self) -> u64 {
        *self.server_label.write() = self.config.server_label.clone();
        self.aggregator.invalidate(None);
        self.hub.publish(NotificationKind::SettingsReset)
    }

    // ========== Accessors ==========

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    /// Flush pending records, then stop both lanes
    pub async fn shutdown(&self) -> PipelineResult<FlushReport> {
        let report = match self.writer.shutdown().await {
            Ok(report) => report,
            // Already stopped by an earlier shutdown
            Err(WriterError::Closed) => FlushReport::default(),
        };
        self.stats_lane.shutdown();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "pipeline task ended abnormally");
            }
        }

        debug!(flushed = report.flushed, dropped = report.dropped, "pipeline stopped");
        Ok(report)
    }
}
