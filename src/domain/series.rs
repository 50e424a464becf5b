// Canonical per-channel time series
use crate::domain::sample::SensorSample;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// An immutable, strictly time-ordered run of samples.
///
/// Cloning shares the underlying buffer; a new fetch always produces a new
/// `Series` rather than editing an existing one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Arc<Vec<SensorSample>>,
}

impl Series {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stable-sort by timestamp, then keep only the first sample of every
    /// run of equal timestamps.
    pub fn merge(mut samples: Vec<SensorSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp_s);
        samples.dedup_by_key(|s| s.timestamp_s);
        Self {
            samples: Arc::new(samples),
        }
    }

    pub fn samples(&self) -> &[SensorSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.last()
    }

    /// Whole seconds elapsed since the newest sample, `None` when empty.
    /// Samples stamped in the future count as fresh.
    pub fn staleness_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        let latest = self.latest()?;
        let age_ms = now
            .timestamp_millis()
            .saturating_sub(latest.timestamp_s.saturating_mul(1000));
        Some((age_ms / 1000).max(0))
    }

    pub fn summary(&self) -> SeriesSummary {
        let peak = self
            .samples
            .iter()
            .fold(None::<&SensorSample>, |best, sample| match best {
                Some(b) if sample.current_cars <= b.current_cars => Some(b),
                _ => Some(sample),
            });

        let average_flow = if self.samples.is_empty() {
            0
        } else {
            let total = self
                .samples
                .iter()
                .fold(0u128, |acc, s| acc + u128::from(s.current_cars));
            // saturates at u64::MAX
            (total as f64 / self.samples.len() as f64).round() as u64
        };

        SeriesSummary {
            latest: self.latest().cloned(),
            peak: peak.cloned(),
            average_flow,
            count: self.samples.len(),
        }
    }
}

impl Serialize for Series {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.samples.as_slice().serialize(serializer)
    }
}

/// Headline figures a dashboard shows next to the chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub latest: Option<SensorSample>,
    pub peak: Option<SensorSample>,
    pub average_flow: u64,
    pub count: usize,
}
