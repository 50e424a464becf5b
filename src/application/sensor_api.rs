// Port for the remote traffic-sensor API
use crate::domain::channel::ChannelId;
use crate::domain::error::SyncError;
use crate::domain::record::RawRecord;
use async_trait::async_trait;

#[async_trait]
pub trait SensorApi: Send + Sync {
    /// Bounded liveness check. Timeouts, refused connections and non-2xx
    /// statuses all come back as `false`.
    async fn probe_health(&self) -> bool;

    /// Fetch and schema-validate the raw records for a channel
    async fn fetch_records(&self, channel: &ChannelId) -> Result<Vec<RawRecord>, SyncError>;
}
