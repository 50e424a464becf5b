// Immutable snapshot the engine publishes after every state change
use crate::domain::channel::ChannelId;
use crate::domain::connection::ConnectionState;
use crate::domain::series::Series;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SyncSnapshot {
    pub channel_id: ChannelId,
    pub state: ConnectionState,
    pub series: Series,
    pub error: Option<String>,
    /// Seconds between the newest sample and the moment it was published
    pub staleness_s: Option<i64>,
    pub last_update: Option<DateTime<Utc>>,
    pub generation: u64,
}

impl SyncSnapshot {
    pub fn initial(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            state: ConnectionState::Connecting,
            series: Series::empty(),
            error: None,
            staleness_s: None,
            last_update: None,
            generation: 0,
        }
    }

    pub fn is_stale(&self, threshold_secs: i64) -> bool {
        self.staleness_s.is_some_and(|age| age > threshold_secs)
    }
}
