// Timestamp normalization - raw API timestamps to canonical epoch seconds
use crate::application::display::DisplayZone;
use crate::domain::record::RawTimestamp;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

/// Values above this are milliseconds under the `auto` policy
pub const MILLIS_THRESHOLD: f64 = 10_000_000_000.0;
pub const DEFAULT_FALLBACK_SPACING_SECS: i64 = 300;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Unit contract for numeric timestamps sent by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    /// Disambiguate by magnitude
    #[default]
    Auto,
    Seconds,
    Milliseconds,
}

#[derive(Debug, Clone)]
pub struct TimestampNormalizer {
    unit: TimestampUnit,
    fallback_spacing_secs: i64,
    zone: DisplayZone,
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self::new(TimestampUnit::Auto, DEFAULT_FALLBACK_SPACING_SECS, DisplayZone::Local)
    }
}

impl TimestampNormalizer {
    pub fn new(unit: TimestampUnit, fallback_spacing_secs: i64, zone: DisplayZone) -> Self {
        Self {
            unit,
            fallback_spacing_secs,
            zone,
        }
    }

    /// Canonical epoch seconds for record `index` of a batch of `batch_len`.
    ///
    /// Missing, non-positive or unparseable timestamps are synthesized as
    /// `now - (batch_len - index) * spacing`, so a batch without server
    /// timestamps still comes out in arrival order. Never negative.
    pub fn normalize(
        &self,
        raw: Option<&RawTimestamp>,
        index: usize,
        batch_len: usize,
        now: DateTime<Utc>,
    ) -> i64 {
        let resolved = match raw {
            Some(RawTimestamp::Number(value)) => self.from_number(*value),
            Some(RawTimestamp::Text(text)) => self.from_text(text),
            None => None,
        };

        resolved
            .unwrap_or_else(|| self.fallback(index, batch_len, now))
            .max(0)
    }

    fn from_number(&self, value: f64) -> Option<i64> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let seconds = match self.unit {
            TimestampUnit::Auto if value > MILLIS_THRESHOLD => value / 1000.0,
            TimestampUnit::Auto | TimestampUnit::Seconds => value,
            TimestampUnit::Milliseconds => value / 1000.0,
        };
        Some(seconds.floor() as i64)
    }

    fn from_text(&self, text: &str) -> Option<i64> {
        let text = text.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Some(parsed.timestamp()).filter(|s| *s > 0);
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return self
                    .zone
                    .resolve_naive(naive)
                    .map(|dt| dt.timestamp())
                    .filter(|s| *s > 0);
            }
        }

        match text.parse::<f64>() {
            Ok(value) => self.from_number(value),
            Err(_) => {
                tracing::debug!(timestamp = text, "unparseable timestamp, synthesizing one");
                None
            }
        }
    }

    fn fallback(&self, index: usize, batch_len: usize, now: DateTime<Utc>) -> i64 {
        let steps = i64::try_from(batch_len.saturating_sub(index)).unwrap_or(i64::MAX);
        now.timestamp()
            .saturating_sub(steps.saturating_mul(self.fallback_spacing_secs))
    }
}
