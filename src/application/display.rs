// Display timezone and formats for sample labels
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use std::fmt::Write;

pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn from_offset_minutes(minutes: Option<i32>) -> Option<Self> {
        match minutes {
            None => Some(DisplayZone::Local),
            Some(m) => FixedOffset::east_opt(m.checked_mul(60)?).map(DisplayZone::Fixed),
        }
    }

    /// Interpret a wall-clock time without offset in this zone
    pub fn resolve_naive(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            DisplayZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            DisplayZone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    fn render(&self, utc: DateTime<Utc>, format: &str) -> String {
        let mut out = String::new();
        let written = match self {
            DisplayZone::Local => write!(out, "{}", utc.with_timezone(&Local).format(format)),
            DisplayZone::Fixed(offset) => {
                write!(out, "{}", utc.with_timezone(offset).format(format))
            }
        };
        if written.is_err() {
            out.clear();
        }
        out
    }
}

/// Returns false if chrono cannot render the strftime pattern
pub fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

#[derive(Debug, Clone)]
pub struct DisplayFormat {
    pub zone: DisplayZone,
    pub time_format: String,
    pub date_format: String,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            zone: DisplayZone::Local,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl DisplayFormat {
    /// `(display_time, display_date)` for an epoch-seconds timestamp
    pub fn labels(&self, timestamp_s: i64) -> (String, String) {
        match DateTime::<Utc>::from_timestamp(timestamp_s, 0) {
            Some(utc) => (
                self.zone.render(utc, &self.time_format),
                self.zone.render(utc, &self.date_format),
            ),
            None => (String::new(), String::new()),
        }
    }
}
