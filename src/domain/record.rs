// Raw record schema accepted from the sensor API
use crate::domain::error::SyncError;
use serde::Deserialize;
use serde_json::Value;

/// One element of the `/data` payload. Every field is optional, but a field
/// that is present must have the right type. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default)]
    pub current_cars: Option<f64>,
    #[serde(default)]
    pub rolling_average: Option<f64>,
    #[serde(default)]
    pub total_count: Option<f64>,
    #[serde(default)]
    pub lane_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Number(f64),
    Text(String),
}

/// Validate a decoded payload: it must be an array of record objects
pub fn parse_batch(payload: Value) -> Result<Vec<RawRecord>, SyncError> {
    let items = match payload {
        Value::Array(items) => items,
        other => {
            return Err(SyncError::InvalidPayloadShape(format!(
                "expected an array of records, got {}",
                json_kind(&other)
            )));
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(SyncError::InvalidRecord {
                    index,
                    reason: format!("expected an object, got {}", json_kind(&item)),
                });
            }
            serde_json::from_value(item).map_err(|e| SyncError::InvalidRecord {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
