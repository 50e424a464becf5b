// Poll scheduler - drives timer-triggered cycles on a fixed interval
use crate::application::sync_engine::{PollTrigger, SyncEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Owns the background task that issues `PollTrigger::Timer` updates.
///
/// Ticks run one at a time, so a slow cycle delays the next tick instead of
/// piling requests up. The engine itself ignores ticks unless connected.
pub struct PollScheduler {
    engine: Arc<SyncEngine>,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(engine: Arc<SyncEngine>, period: Duration) -> Self {
        Self {
            engine,
            period: period.max(MIN_PERIOD),
            task: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start ticking. The first tick fires one period from now.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        tracing::info!(period_ms = self.period.as_millis() as u64, "starting poll scheduler");
        self.task = Some(spawn_ticker(self.engine.clone(), self.period));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("poll scheduler stopped");
        }
    }

    /// Change the period, restarting the ticker if it was running
    pub fn reschedule(&mut self, period: Duration) {
        self.period = period.max(MIN_PERIOD);
        if self.task.is_some() {
            self.stop();
            self.start();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn spawn_ticker(engine: Arc<SyncEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let snapshot = engine.update(PollTrigger::Timer).await;
            tracing::trace!(state = %snapshot.state, generation = snapshot.generation, "timer tick");
        }
    })
}
