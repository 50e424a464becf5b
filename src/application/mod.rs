// Application layer - Polling, normalization and the sync engine
pub mod clock;
pub mod display;
pub mod scheduler;
pub mod sensor_api;
pub mod sync_engine;
pub mod timestamp;
pub mod transformer;

#[cfg(test)]
pub(crate) mod testing;
