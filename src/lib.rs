// traffic-sync - client-side synchronization engine for live lane telemetry
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
