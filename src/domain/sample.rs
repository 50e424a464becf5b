// Sensor sample domain model
use serde::Serialize;

/// One normalized vehicle-count reading for a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSample {
    pub timestamp_s: i64,
    pub current_cars: u64,
    pub rolling_average: f64,
    pub total_count: u64,
    pub channel_id: String,
    pub display_time: String,
    pub display_date: String,
}

/// Round a raw count half away from zero. Negative and non-finite input becomes 0.
pub fn round_count(value: f64) -> u64 {
    if !value.is_finite() {
        return 0;
    }
    let rounded = value.round();
    if rounded <= 0.0 { 0 } else { rounded as u64 }
}

/// Round to one decimal digit
pub fn round1(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0).round() / 10.0
}
