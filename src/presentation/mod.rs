// Presentation layer - Read-only snapshot surface for dashboards
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    health_check, list_channels, retry, select_channel, snapshot, stream_snapshots,
};
use axum::Router;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/snapshot", get(snapshot))
        .route("/snapshot/stream", get(stream_snapshots))
        .route("/retry", post(retry))
        .route("/channels", get(list_channels))
        .route("/channel/:channel_id", put(select_channel))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
