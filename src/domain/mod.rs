// Domain layer - Values the engine publishes and the rules they obey
pub mod channel;
pub mod connection;
pub mod error;
pub mod record;
pub mod sample;
pub mod series;
pub mod snapshot;
