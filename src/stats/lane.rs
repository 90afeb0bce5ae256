//! Background aggregation lane
//!
//! Keeps the selected granularity's bucket current on a `watch` channel.
//! Recomputes when a stats-relevant notification arrives, when the refresh
//! timer fires, and when the selection changes.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, warn};

use super::aggregator::StatsAggregator;
use crate::error::StatsResult;
use crate::notify::{NotificationHub, NotificationKind, RecvError, Subscription};
use crate::types::Bucket;

/// Latest bucket for the selected granularity; `None` until the first compute
pub type SeriesReceiver = watch::Receiver<Option<Arc<Bucket>>>;

enum LaneCommand {
    Select(String),
    Shutdown,
}

/// Handle to the aggregation lane
#[derive(Clone)]
pub struct AggregatorLane {
    aggregator: Arc<StatsAggregator>,
    tx: mpsc::UnboundedSender<LaneCommand>,
    updates: SeriesReceiver,
}

impl AggregatorLane {
    /// Spawn the lane, starting with `selected`
    pub fn spawn(
        aggregator: Arc<StatsAggregator>,
        hub: &NotificationHub,
        selected: impl Into<String>,
    ) -> StatsResult<(Self, JoinHandle<()>)> {
        let selected = selected.into();
        aggregator.spec(&selected)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (updates_tx, updates) = watch::channel(None);

        let worker = LaneWorker {
            aggregator: aggregator.clone(),
            subscription: hub.subscribe(&NotificationKind::INVALIDATES_STATS),
            rx,
            updates: updates_tx,
            refresh: refresh_timer(&aggregator),
            selected,
        };
        let task = tokio::spawn(worker.run());

        Ok((
            Self {
                aggregator,
                tx,
                updates,
            },
            task,
        ))
    }

    /// Switch the observed granularity
    ///
    /// Replaces the refresh timer and recomputes right away.
    pub fn select(&self, name: &str) -> StatsResult<()> {
        self.aggregator.spec(name)?;
        // A stopped lane has nobody left to notify
        let _ = self.tx.send(LaneCommand::Select(name.to_string()));
        Ok(())
    }

    /// Receiver for bucket updates of the selected granularity
    pub fn subscribe(&self) -> SeriesReceiver {
        self.updates.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(LaneCommand::Shutdown);
    }
}

struct LaneWorker {
    aggregator: Arc<StatsAggregator>,
    subscription: Subscription,
    rx: mpsc::UnboundedReceiver<LaneCommand>,
    updates: watch::Sender<Option<Arc<Bucket>>>,
    refresh: Interval,
    selected: String,
}

impl LaneWorker {
    async fn run(mut self) {
        self.recompute().await;

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(LaneCommand::Select(name)) => {
                        self.selected = name;
                        self.refresh = refresh_timer(&self.aggregator);
                        self.recompute().await;
                    }
                    Some(LaneCommand::Shutdown) | None => break,
                },

                notification = self.subscription.recv() => match notification {
                    Ok(notification) => {
                        debug!(kind = %notification.kind, "stats invalidated by notification");
                        self.recompute().await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "stats lane lagged behind notifications");
                        self.aggregator.invalidate(None);
                        self.recompute().await;
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = self.refresh.tick() => {
                    self.aggregator.invalidate(Some(&self.selected));
                    self.recompute().await;
                }
            }
        }

        debug!("stats lane stopped");
    }

    async fn recompute(&mut self) {
        let aggregator = self.aggregator.clone();
        let name = self.selected.clone();

        match tokio::task::spawn_blocking(move || aggregator.series(&name)).await {
            Ok(Ok(bucket)) => {
                self.updates.send_replace(Some(bucket));
            }
            Ok(Err(e)) => warn!(error = %e, "stats recompute rejected"),
            Err(e) => error!(error = %e, "stats recompute panicked"),
        }
    }
}

fn refresh_timer(aggregator: &StatsAggregator) -> Interval {
    let period = aggregator.refresh_interval();
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{GranularitySpec, DEFAULT_REFRESH_INTERVAL};
    use crate::store::{LogStore, MemoryLogStore};
    use crate::types::Record;
    use crate::utils::{datetime_from_secs, ManualClock};
    use std::time::Duration;

    const NOW: i64 = 1_700_000_000;

    fn setup() -> (Arc<MemoryLogStore>, NotificationHub, AggregatorLane) {
        let store = Arc::new(MemoryLogStore::new());
        let hub = NotificationHub::new();
        let aggregator = Arc::new(StatsAggregator::new(
            store.clone(),
            hub.clone(),
            Arc::new(ManualClock::at_secs(NOW)),
            GranularitySpec::defaults(),
            DEFAULT_REFRESH_INTERVAL,
        ));
        let (lane, _task) = AggregatorLane::spawn(aggregator, &hub, "hour").unwrap();
        (store, hub, lane)
    }

    fn record(secs: i64) -> Record {
        Record::new("example.com", datetime_from_secs(secs)).with_elapsed(20)
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_initial_bucket() {
        let (_, _, lane) = setup();
        let mut updates = lane.subscribe();

        updates.changed().await.unwrap();
        let bucket = updates.borrow().clone().unwrap();
        assert_eq!(bucket.granularity, "hour");
        assert!(bucket.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_data_triggers_update() {
        let (store, hub, lane) = setup();
        let mut updates = lane.subscribe();
        updates.changed().await.unwrap();

        store.append(vec![record(NOW - 30), record(NOW - 20)]).unwrap();
        hub.publish_with(NotificationKind::NewData, Some(2));

        updates.changed().await.unwrap();
        let bucket = updates.borrow().clone().unwrap();
        assert_eq!(bucket.request_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_switches_granularity() {
        let (_, _, lane) = setup();
        let mut updates = lane.subscribe();
        updates.changed().await.unwrap();

        lane.select("month").unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().as_ref().unwrap().granularity, "month");

        assert!(lane.select("fortnight").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_timer_recomputes() {
        let (_, _, lane) = setup();
        let mut updates = lane.subscribe();
        updates.changed().await.unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().as_ref().unwrap().granularity, "hour");
    }
}
