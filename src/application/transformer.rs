// Record transformer - raw API records to canonical sensor samples
use crate::application::display::DisplayFormat;
use crate::application::timestamp::TimestampNormalizer;
use crate::domain::channel::{ChannelId, DEFAULT_CHANNEL};
use crate::domain::record::RawRecord;
use crate::domain::sample::{SensorSample, round1, round_count};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct RecordTransformer {
    normalizer: TimestampNormalizer,
    display: DisplayFormat,
}

impl RecordTransformer {
    pub fn new(normalizer: TimestampNormalizer, display: DisplayFormat) -> Self {
        Self {
            normalizer,
            display,
        }
    }

    pub fn transform(
        &self,
        record: &RawRecord,
        index: usize,
        batch_len: usize,
        selected: Option<&ChannelId>,
        now: DateTime<Utc>,
    ) -> SensorSample {
        let timestamp_s = self
            .normalizer
            .normalize(record.timestamp.as_ref(), index, batch_len, now);
        let (display_time, display_date) = self.display.labels(timestamp_s);

        let channel_id = record
            .lane_id
            .as_deref()
            .map(str::trim)
            .filter(|lane| !lane.is_empty())
            .or(selected.map(ChannelId::as_str))
            .unwrap_or(DEFAULT_CHANNEL)
            .to_string();

        SensorSample {
            timestamp_s,
            current_cars: round_count(record.current_cars.unwrap_or(0.0)),
            rolling_average: round1(record.rolling_average.unwrap_or(0.0)),
            total_count: round_count(record.total_count.unwrap_or(0.0)),
            channel_id,
            display_time,
            display_date,
        }
    }

    pub fn transform_batch(
        &self,
        records: &[RawRecord],
        selected: &ChannelId,
        now: DateTime<Utc>,
    ) -> Vec<SensorSample> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| self.transform(record, index, records.len(), Some(selected), now))
            .collect()
    }
}
