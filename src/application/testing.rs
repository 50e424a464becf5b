// Test doubles shared by the engine, scheduler and presentation tests
use crate::application::clock::Clock;
use crate::application::sensor_api::SensorApi;
use crate::domain::channel::{ChannelCatalog, ChannelId};
use crate::domain::error::SyncError;
use crate::domain::record::{RawRecord, RawTimestamp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) fn catalog() -> ChannelCatalog {
    ChannelCatalog::new(
        vec!["lane_1".to_string(), "lane_2".to_string(), "lane_3".to_string()],
        "lane_1",
    )
    .unwrap()
}

pub(crate) fn record(timestamp_s: i64, current_cars: f64) -> RawRecord {
    RawRecord {
        timestamp: Some(RawTimestamp::Number(timestamp_s as f64)),
        current_cars: Some(current_cars),
        rolling_average: Some(current_cars),
        total_count: Some(current_cars * 10.0),
        lane_id: None,
    }
}

pub(crate) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory `SensorApi` whose answers are set per channel. A gated channel
/// holds its next fetch until the returned `Notify` fires.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    healthy: AtomicBool,
    responses: Mutex<HashMap<String, Result<Vec<RawRecord>, SyncError>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    probe_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedApi {
    pub(crate) fn healthy() -> Self {
        let api = Self::default();
        api.set_healthy(true);
        api
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub(crate) fn set_records(&self, channel: &str, records: Vec<RawRecord>) {
        self.responses
            .lock()
            .unwrap()
            .insert(channel.to_string(), Ok(records));
    }

    pub(crate) fn set_error(&self, channel: &str, error: SyncError) {
        self.responses
            .lock()
            .unwrap()
            .insert(channel.to_string(), Err(error));
    }

    pub(crate) fn gate(&self, channel: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(channel.to_string(), notify.clone());
        notify
    }

    pub(crate) fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorApi for ScriptedApi {
    async fn probe_health(&self) -> bool {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }

    async fn fetch_records(&self, channel: &ChannelId) -> Result<Vec<RawRecord>, SyncError> {
        let gate = self.gates.lock().unwrap().remove(channel.as_str());
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .get(channel.as_str())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
