// Sync engine - probe, fetch, merge and publish snapshots for the selected lane
use crate::application::clock::Clock;
use crate::application::sensor_api::SensorApi;
use crate::application::transformer::RecordTransformer;
use crate::domain::channel::{ChannelCatalog, ChannelId};
use crate::domain::connection::{ConnectionEvent, ConnectionStateMachine};
use crate::domain::error::SyncError;
use crate::domain::series::Series;
use crate::domain::snapshot::SyncSnapshot;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// What started a poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTrigger {
    Initial,
    /// Periodic re-poll; ignored unless the engine is connected
    Timer,
    Retry,
    ChannelSwitch(ChannelId),
}

struct EngineState {
    channel: ChannelId,
    connection: ConnectionStateMachine,
    series: Series,
    error: Option<String>,
    staleness_s: Option<i64>,
    last_update: Option<DateTime<Utc>>,
    generation: u64,
}

impl EngineState {
    fn to_snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            channel_id: self.channel.clone(),
            state: self.connection.state(),
            series: self.series.clone(),
            error: self.error.clone(),
            staleness_s: self.staleness_s,
            last_update: self.last_update,
            generation: self.generation,
        }
    }
}

/// A cycle remembers which generation and channel it was started for, so
/// its result can be dropped if a retry or channel switch happened meanwhile.
#[derive(Debug, Clone)]
struct CycleTicket {
    generation: u64,
    channel: ChannelId,
}

type CycleOutcome = Result<(Series, DateTime<Utc>), SyncError>;

pub struct SyncEngine {
    api: Arc<dyn SensorApi>,
    clock: Arc<dyn Clock>,
    transformer: RecordTransformer,
    catalog: ChannelCatalog,
    state: Mutex<EngineState>,
    snapshots: watch::Sender<Arc<SyncSnapshot>>,
}

impl SyncEngine {
    pub fn new(
        api: Arc<dyn SensorApi>,
        clock: Arc<dyn Clock>,
        transformer: RecordTransformer,
        catalog: ChannelCatalog,
    ) -> Self {
        let channel = catalog.default_channel().clone();
        let (snapshots, _) = watch::channel(Arc::new(SyncSnapshot::initial(channel.clone())));

        Self {
            api,
            clock,
            transformer,
            catalog,
            state: Mutex::new(EngineState {
                channel,
                connection: ConnectionStateMachine::new(),
                series: Series::empty(),
                error: None,
                staleness_s: None,
                last_update: None,
                generation: 0,
            }),
            snapshots,
        }
    }

    pub fn catalog(&self) -> &ChannelCatalog {
        &self.catalog
    }

    /// The most recently published snapshot
    pub fn snapshot(&self) -> Arc<SyncSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SyncSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Re-run a full cycle now. Any cycle already in flight is superseded.
    pub async fn retry(&self) -> Arc<SyncSnapshot> {
        self.update(PollTrigger::Retry).await
    }

    /// Select another channel and poll it. Selecting the current channel is a no-op.
    pub async fn select_channel(&self, name: &str) -> Result<Arc<SyncSnapshot>, SyncError> {
        let channel = self
            .catalog
            .resolve(name)
            .ok_or_else(|| SyncError::UnknownChannel(name.to_string()))?;
        Ok(self.update(PollTrigger::ChannelSwitch(channel)).await)
    }

    /// Run one poll cycle and return the snapshot it left behind.
    ///
    /// Poll failures never escape: they become `state = error` with a message
    /// while the last good series stays published.
    pub async fn update(&self, trigger: PollTrigger) -> Arc<SyncSnapshot> {
        let Some(ticket) = self.begin_cycle(trigger) else {
            return self.snapshot();
        };

        if !self.api.probe_health().await {
            return self.finish(
                &ticket,
                Err(SyncError::NetworkUnreachable("health check failed".to_string())),
            );
        }

        if !self.is_current(&ticket) {
            tracing::debug!(
                channel = %ticket.channel,
                generation = ticket.generation,
                "cycle superseded after health check"
            );
            return self.snapshot();
        }

        let outcome = match self.api.fetch_records(&ticket.channel).await {
            Ok(records) => {
                let now = self.clock.now();
                let samples = self
                    .transformer
                    .transform_batch(&records, &ticket.channel, now);
                tracing::debug!(
                    channel = %ticket.channel,
                    records = records.len(),
                    "transformed records"
                );
                Ok((Series::merge(samples), now))
            }
            Err(err) => Err(err),
        };

        self.finish(&ticket, outcome)
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &EngineState) -> Arc<SyncSnapshot> {
        let snapshot = Arc::new(state.to_snapshot());
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    fn is_current(&self, ticket: &CycleTicket) -> bool {
        let state = self.lock_state();
        state.generation == ticket.generation && state.channel == ticket.channel
    }

    fn begin_cycle(&self, trigger: PollTrigger) -> Option<CycleTicket> {
        let mut state = self.lock_state();

        match trigger {
            PollTrigger::Timer => {
                if !state.connection.accepts_timer_poll() {
                    tracing::trace!(state = %state.connection.state(), "skipping timer poll");
                    return None;
                }
                return Some(CycleTicket {
                    generation: state.generation,
                    channel: state.channel.clone(),
                });
            }
            requested @ (PollTrigger::Initial | PollTrigger::Retry) => {
                tracing::info!(channel = %state.channel, trigger = ?requested, "starting poll cycle");
            }
            PollTrigger::ChannelSwitch(channel) => {
                if !self.catalog.contains(&channel) {
                    tracing::warn!(channel = %channel, "ignoring switch to unlisted channel");
                    return None;
                }
                if channel == state.channel {
                    return None;
                }
                tracing::info!(from = %state.channel, to = %channel, "switching channel");
                state.channel = channel;
                state.series = Series::empty();
                state.staleness_s = None;
                state.last_update = None;
            }
        }

        state.generation += 1;
        state.error = None;
        state.connection.request_cycle();
        self.publish(&state);

        Some(CycleTicket {
            generation: state.generation,
            channel: state.channel.clone(),
        })
    }

    fn finish(&self, ticket: &CycleTicket, outcome: CycleOutcome) -> Arc<SyncSnapshot> {
        let mut state = self.lock_state();

        if state.generation != ticket.generation || state.channel != ticket.channel {
            tracing::debug!(
                channel = %ticket.channel,
                generation = ticket.generation,
                current_generation = state.generation,
                "discarding stale poll result"
            );
            return self.snapshot();
        }

        let event = match &outcome {
            Ok(_) => ConnectionEvent::CycleSucceeded,
            Err(_) => ConnectionEvent::CycleFailed,
        };
        let previous = state.connection.state();
        if let Err(err) = state.connection.apply(event) {
            tracing::debug!(error = %err, "discarding poll result");
            return self.snapshot();
        }

        match outcome {
            Ok((series, now)) => {
                state.staleness_s = series.staleness_secs(now);
                state.series = series;
                state.error = None;
                state.last_update = Some(now);
                tracing::debug!(
                    channel = %state.channel,
                    samples = state.series.len(),
                    staleness_s = ?state.staleness_s,
                    "published series"
                );
            }
            Err(err) => {
                tracing::warn!(channel = %state.channel, error = %err, "poll cycle failed");
                state.error = Some(err.to_string());
            }
        }

        if previous != state.connection.state() {
            tracing::info!(
                channel = %state.channel,
                from = %previous,
                to = %state.connection.state(),
                "connection state changed"
            );
        }

        self.publish(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{FixedClock, ScriptedApi, catalog, record};
    use crate::domain::connection::ConnectionState;
    use chrono::TimeZone;

    const NOW_S: i64 = 1_700_000_000;

    fn engine(api: Arc<ScriptedApi>) -> SyncEngine {
        let clock = Arc::new(FixedClock::new(Utc.timestamp_opt(NOW_S, 0).unwrap()));
        SyncEngine::new(api, clock, RecordTransformer::default(), catalog())
    }

    fn cars(snapshot: &SyncSnapshot) -> Vec<u64> {
        snapshot.series.samples().iter().map(|s| s.current_cars).collect()
    }

    #[tokio::test]
    async fn test_successful_cycle_publishes_series() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 15, 7.0), record(NOW_S - 75, 3.0)]);
        let engine = engine(api.clone());

        let snapshot = engine.update(PollTrigger::Initial).await;
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert_eq!(cars(&snapshot), vec![3, 7]);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.staleness_s, Some(15));
        assert!(snapshot.last_update.is_some());
        assert_eq!(engine.snapshot().generation, snapshot.generation);
    }

    #[tokio::test]
    async fn test_duplicate_timestamps_keep_first() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S, 5.0), record(NOW_S, 9.0)]);
        let snapshot = engine(api).update(PollTrigger::Initial).await;
        assert_eq!(cars(&snapshot), vec![5]);
    }

    #[tokio::test]
    async fn test_empty_payload_clears_series() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 5, 1.0)]);
        let engine = engine(api.clone());
        engine.update(PollTrigger::Initial).await;

        api.set_records("lane_1", vec![]);
        let snapshot = engine.update(PollTrigger::Timer).await;
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert!(snapshot.series.is_empty());
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.staleness_s, None);
    }

    #[tokio::test]
    async fn test_probe_failure_keeps_previous_series() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 5, 4.0)]);
        let engine = engine(api.clone());
        let good = engine.update(PollTrigger::Initial).await;

        api.set_healthy(false);
        let failed = engine.update(PollTrigger::Timer).await;
        assert_eq!(failed.state, ConnectionState::Error);
        assert_eq!(failed.series, good.series);
        let message = failed.error.clone().unwrap();
        assert!(message.contains("cannot reach API"));
        assert_eq!(api.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_keeps_previous_series() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 5, 4.0)]);
        let engine = engine(api.clone());
        let good = engine.update(PollTrigger::Initial).await;

        api.set_error(
            "lane_1",
            SyncError::HttpError {
                status: 500,
                reason: "Internal Server Error".to_string(),
            },
        );
        let failed = engine.update(PollTrigger::Timer).await;
        assert_eq!(failed.state, ConnectionState::Error);
        assert_eq!(failed.series, good.series);
        assert!(failed.error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_timer_is_noop_unless_connected() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_healthy(false);
        let engine = engine(api.clone());

        // still connecting: nothing runs
        engine.update(PollTrigger::Timer).await;
        assert_eq!(api.probe_calls(), 0);

        let snapshot = engine.update(PollTrigger::Initial).await;
        assert_eq!(snapshot.state, ConnectionState::Error);
        assert_eq!(api.probe_calls(), 1);

        // error: timer stays idle until a retry
        engine.update(PollTrigger::Timer).await;
        assert_eq!(api.probe_calls(), 1);

        api.set_healthy(true);
        let recovered = engine.retry().await;
        assert_eq!(recovered.state, ConnectionState::Connected);
        assert_eq!(recovered.error, None);
    }

    #[tokio::test]
    async fn test_retry_shows_connecting_while_in_flight() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 5, 4.0)]);
        let engine = Arc::new(engine(api.clone()));
        engine.update(PollTrigger::Initial).await;

        let gate = api.gate("lane_1");
        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.retry().await }
        });
        while api.fetch_calls() < 2 {
            tokio::task::yield_now().await;
        }

        let in_flight = engine.snapshot();
        assert_eq!(in_flight.state, ConnectionState::Connecting);
        assert_eq!(cars(&in_flight), vec![4]);

        gate.notify_one();
        let done = pending.await.unwrap();
        assert_eq!(done.state, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_timer_poll_does_not_flicker() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 5, 4.0)]);
        let engine = Arc::new(engine(api.clone()));
        engine.update(PollTrigger::Initial).await;

        let gate = api.gate("lane_1");
        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.update(PollTrigger::Timer).await }
        });
        while api.fetch_calls() < 2 {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.snapshot().state, ConnectionState::Connected);

        gate.notify_one();
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_switch_suppresses_stale_response() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 10, 1.0)]);
        api.set_records("lane_2", vec![record(NOW_S - 20, 2.0)]);
        let gate = api.gate("lane_1");
        let engine = Arc::new(engine(api.clone()));

        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.update(PollTrigger::Initial).await }
        });
        while api.fetch_calls() < 1 {
            tokio::task::yield_now().await;
        }

        let switched = engine.select_channel("lane_2").await.unwrap();
        assert_eq!(switched.channel_id.as_str(), "lane_2");
        assert_eq!(switched.state, ConnectionState::Connected);
        assert_eq!(cars(&switched), vec![2]);

        // let the lane_1 response land after lane_2 is selected
        gate.notify_one();
        let stale = pending.await.unwrap();
        assert_eq!(stale.channel_id.as_str(), "lane_2");

        let current = engine.snapshot();
        assert_eq!(current.channel_id.as_str(), "lane_2");
        assert_eq!(cars(&current), vec![2]);
        assert_eq!(current.staleness_s, Some(20));
    }

    #[tokio::test]
    async fn test_channel_switch_resets_series_and_connects() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 10, 1.0)]);
        api.set_records("lane_3", vec![record(NOW_S - 30, 6.0)]);
        let engine = Arc::new(engine(api.clone()));
        let first = engine.update(PollTrigger::Initial).await;
        assert_eq!(cars(&first), vec![1]);

        let gate = api.gate("lane_3");
        let pending = tokio::spawn({
            let engine = engine.clone();
            async move { engine.select_channel("lane_3").await }
        });
        while api.fetch_calls() < 2 {
            tokio::task::yield_now().await;
        }

        let in_flight = engine.snapshot();
        assert_eq!(in_flight.channel_id.as_str(), "lane_3");
        assert_eq!(in_flight.state, ConnectionState::Connecting);
        assert!(in_flight.series.is_empty());
        assert_eq!(in_flight.staleness_s, None);
        assert_eq!(in_flight.last_update, None);
        assert_eq!(in_flight.error, None);
        assert!(in_flight.generation > first.generation);

        gate.notify_one();
        let switched = pending.await.unwrap().unwrap();
        assert_eq!(switched.state, ConnectionState::Connected);
        assert_eq!(cars(&switched), vec![6]);
        assert_eq!(switched.staleness_s, Some(30));
    }

    #[tokio::test]
    async fn test_failed_channel_switch_keeps_empty_series() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 10, 1.0)]);
        let engine = engine(api.clone());
        engine.update(PollTrigger::Initial).await;

        api.set_healthy(false);
        let failed = engine.select_channel("lane_3").await.unwrap();
        assert_eq!(failed.channel_id.as_str(), "lane_3");
        assert_eq!(failed.state, ConnectionState::Error);
        assert!(failed.series.is_empty());
    }

    #[tokio::test]
    async fn test_select_same_channel_is_noop() {
        let api = Arc::new(ScriptedApi::healthy());
        let engine = engine(api.clone());
        let first = engine.update(PollTrigger::Initial).await;

        let again = engine.select_channel("lane_1").await.unwrap();
        assert_eq!(again.generation, first.generation);
        assert_eq!(api.probe_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_rejected() {
        let api = Arc::new(ScriptedApi::healthy());
        let engine = engine(api.clone());
        let err = engine.select_channel("lane_9").await.unwrap_err();
        assert_eq!(err, SyncError::UnknownChannel("lane_9".to_string()));
        assert_eq!(engine.snapshot().channel_id.as_str(), "lane_1");
        assert_eq!(api.probe_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_supersedes_in_flight_retry() {
        let api = Arc::new(ScriptedApi::healthy());
        api.set_records("lane_1", vec![record(NOW_S - 10, 1.0)]);
        let gate = api.gate("lane_1");
        let engine = Arc::new(engine(api.clone()));

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.retry().await }
        });
        while api.fetch_calls() < 1 {
            tokio::task::yield_now().await;
        }

        api.set_records("lane_1", vec![record(NOW_S - 10, 8.0)]);
        let second = engine.retry().await;
        assert_eq!(cars(&second), vec![8]);

        gate.notify_one();
        first.await.unwrap();
        assert_eq!(cars(&engine.snapshot()), vec![8]);
        assert_eq!(engine.snapshot().generation, second.generation);
    }
}
