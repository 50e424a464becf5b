// Application state for HTTP handlers
use crate::application::sync_engine::SyncEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub stale_after_secs: i64,
}
