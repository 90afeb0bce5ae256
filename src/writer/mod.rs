//! Buffered Writer
//!
//! Accepts classified records without blocking the caller and persists them
//! in batches. A batch is written when the flush deadline passes (checked on
//! every submission and by a deadline timer), on an explicit `flush_now`, and
//! on shutdown.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   mpsc    ┌─────────────────────────┐  spawn_blocking  ┌──────────┐
//! │ BufferedWriter│──────────►│ WriterLane              │─────────────────►│ LogStore │
//! │ (clone-able)  │ Submit    │ pending + deadline      │  append(batch)   └──────────┘
//! └───────────────┘ Flush     │ one flush in flight     │
//!                   Shutdown  └───────────┬─────────────┘
//!                                         │ NewData
//!                                         ▼
//!                                 NotificationHub
//! ```

mod diagnostics;
mod lane;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::WriterError;
use crate::notify::NotificationHub;
use crate::store::LogStore;
use crate::types::Record;

pub use diagnostics::{DiagnosticSink, TracingSink};
pub use lane::FlushReport;

use lane::{WriterCommand, WriterLane};

/// Default time between batch writes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(3);

/// Handle to the writer lane
#[derive(Clone)]
pub struct BufferedWriter {
    tx: mpsc::UnboundedSender<WriterCommand>,
}

impl BufferedWriter {
    /// Spawn the writer lane on the current runtime
    pub fn spawn(
        store: Arc<dyn LogStore>,
        hub: NotificationHub,
        flush_interval: Duration,
        sink: Arc<dyn DiagnosticSink>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let lane = WriterLane::new(store, hub, sink, rx, flush_interval);
        let task = tokio::spawn(lane.run());
        (Self { tx }, task)
    }

    /// Queue a record for the next batch
    ///
    /// Returns immediately; persistence failures go to the diagnostic sink.
    pub fn submit(&self, record: Record) -> Result<(), WriterError> {
        self.tx
            .send(WriterCommand::Submit(record))
            .map_err(|_| WriterError::Closed)
    }

    /// Flush everything pending, ignoring the deadline
    pub async fn flush_now(&self) -> Result<FlushReport, WriterError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush(reply))
            .map_err(|_| WriterError::Closed)?;
        rx.await.map_err(|_| WriterError::Closed)
    }

    /// Flush everything pending and stop the lane
    pub async fn shutdown(&self) -> Result<FlushReport, WriterError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Shutdown(reply))
            .map_err(|_| WriterError::Closed)?;
        rx.await.map_err(|_| WriterError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
