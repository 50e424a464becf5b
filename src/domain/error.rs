// Errors raised while synchronizing with the sensor API
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("cannot reach API: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP error: {status} {reason}")]
    HttpError { status: u16, reason: String },

    #[error("API response is not JSON (content-type: {0})")]
    InvalidContentType(String),

    #[error("invalid data format: {0}")]
    InvalidPayloadShape(String),

    #[error("invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}
