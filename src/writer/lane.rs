//! Writer lane: the single task that owns the pending batch
//!
//! Every mutation of the pending sequence and the flush deadline happens
//! here, in command order. A flush takes the whole pending sequence with
//! `mem::take`, so records submitted while a flush is in flight land in the
//! next batch instead of being lost.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use super::diagnostics::DiagnosticSink;
use crate::notify::{NotificationHub, NotificationKind};
use crate::store::LogStore;
use crate::types::{Record, RowId};

/// Outcome of one or more flushes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records that reached the store
    pub flushed: usize,
    /// Row ids the store assigned, in submission order
    pub row_ids: Vec<RowId>,
    /// Records discarded because the store rejected their batch
    pub dropped: usize,
}

impl FlushReport {
    fn merge(&mut self, other: FlushReport) {
        self.flushed += other.flushed;
        self.row_ids.extend(other.row_ids);
        self.dropped += other.dropped;
    }
}

pub(crate) enum WriterCommand {
    Submit(Record),
    Flush(oneshot::Sender<FlushReport>),
    Shutdown(oneshot::Sender<FlushReport>),
}

pub(crate) struct WriterLane {
    store: Arc<dyn LogStore>,
    hub: NotificationHub,
    sink: Arc<dyn DiagnosticSink>,
    rx: mpsc::UnboundedReceiver<WriterCommand>,

    /// Records waiting for the next flush
    pending: Vec<Record>,
    flush_interval: Duration,
    next_flush: Instant,

    /// Single-slot guard: at most one flush in flight
    in_flight: Option<JoinHandle<FlushReport>>,
}

impl WriterLane {
    pub fn new(
        store: Arc<dyn LogStore>,
        hub: NotificationHub,
        sink: Arc<dyn DiagnosticSink>,
        rx: mpsc::UnboundedReceiver<WriterCommand>,
        flush_interval: Duration,
    ) -> Self {
        Self {
            store,
            hub,
            sink,
            rx,
            pending: Vec::new(),
            flush_interval,
            next_flush: Instant::now() + flush_interval,
            in_flight: None,
        }
    }

    /// Run until shutdown or until every writer handle is dropped
    ///
    /// Both exits drain the pending batch first.
    pub async fn run(mut self) {
        loop {
            let deadline = self.next_flush;
            let timer_armed = !self.pending.is_empty() && self.in_flight.is_none();

            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(WriterCommand::Submit(record)) => self.submit(record),
                    Some(WriterCommand::Flush(reply)) => {
                        let report = self.drain().await;
                        let _ = reply.send(report);
                    }
                    Some(WriterCommand::Shutdown(reply)) => {
                        let report = self.drain().await;
                        let _ = reply.send(report);
                        break;
                    }
                    None => {
                        // All handles dropped, flush remaining and exit
                        self.drain().await;
                        break;
                    }
                },

                _ = join_in_flight(&mut self.in_flight) => {
                    self.in_flight = None;
                }

                _ = sleep_until(deadline), if timer_armed => {
                    self.start_flush();
                }
            }
        }

        debug!("writer lane stopped");
    }

    fn submit(&mut self, record: Record) {
        self.pending.push(record);

        if Instant::now() >= self.next_flush && self.in_flight.is_none() {
            self.start_flush();
        }
    }

    /// Move the pending batch into a background flush
    fn start_flush(&mut self) {
        self.next_flush = Instant::now() + self.flush_interval;
        if self.pending.is_empty() {
            return;
        }

        let batch = std::mem::take(&mut self.pending);
        let store = self.store.clone();
        let hub = self.hub.clone();
        let sink = self.sink.clone();
        self.in_flight = Some(tokio::spawn(flush_batch(store, hub, sink, batch)));
    }

    /// Wait for any in-flight flush, then flush what is pending right now
    async fn drain(&mut self) -> FlushReport {
        let mut report = match self.in_flight.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                error!(error = %e, "flush task failed");
                FlushReport::default()
            }),
            None => FlushReport::default(),
        };

        self.next_flush = Instant::now() + self.flush_interval;
        if !self.pending.is_empty() {
            let batch = std::mem::take(&mut self.pending);
            report.merge(
                flush_batch(self.store.clone(), self.hub.clone(), self.sink.clone(), batch).await,
            );
        }
        report
    }
}

/// Await the in-flight flush; never resolves when the slot is empty
async fn join_in_flight(slot: &mut Option<JoinHandle<FlushReport>>) -> FlushReport {
    match slot.as_mut() {
        Some(handle) => match handle.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "flush task failed");
                FlushReport::default()
            }
        },
        None => std::future::pending().await,
    }
}

/// Append one batch to the store and announce it
async fn flush_batch(
    store: Arc<dyn LogStore>,
    hub: NotificationHub,
    sink: Arc<dyn DiagnosticSink>,
    batch: Vec<Record>,
) -> FlushReport {
    let batch_len = batch.len();
    let result = tokio::task::spawn_blocking(move || store.append(batch)).await;

    match result {
        Ok(Ok(row_ids)) => {
            info!(records = batch_len, "flushed query log batch");
            hub.publish_with(NotificationKind::NewData, Some(batch_len));
            FlushReport {
                flushed: batch_len,
                row_ids,
                dropped: 0,
            }
        }
        Ok(Err(e)) => {
            sink.flush_failed(batch_len, &e);
            FlushReport {
                dropped: batch_len,
                ..Default::default()
            }
        }
        Err(e) => {
            error!(error = %e, records = batch_len, "flush worker panicked, batch discarded");
            FlushReport {
                dropped: batch_len,
                ..Default::default()
            }
        }
    }
}
