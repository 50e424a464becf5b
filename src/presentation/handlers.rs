// HTTP request handlers
use crate::domain::error::SyncError;
use crate::domain::series::SeriesSummary;
use crate::domain::snapshot::SyncSnapshot;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

/// A snapshot plus the figures a dashboard derives from it
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    #[serde(flatten)]
    pub snapshot: SyncSnapshot,
    pub summary: SeriesSummary,
    pub stale: bool,
}

impl SnapshotView {
    pub fn new(snapshot: &SyncSnapshot, stale_after_secs: i64) -> Self {
        Self {
            summary: snapshot.series.summary(),
            stale: snapshot.is_stale(stale_after_secs),
            snapshot: snapshot.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChannelsView {
    pub channels: Vec<String>,
    pub selected: String,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current snapshot
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<SnapshotView> {
    Json(SnapshotView::new(&state.engine.snapshot(), state.stale_after_secs))
}

/// Push every published snapshot as a server-sent event
pub async fn stream_snapshots(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.engine.subscribe();
    let stale_after_secs = state.stale_after_secs;

    let stream = async_stream::stream! {
        loop {
            let current = rx.borrow_and_update().clone();
            match Event::default()
                .event("snapshot")
                .json_data(SnapshotView::new(&current, stale_after_secs))
            {
                Ok(event) => yield Ok(event),
                Err(e) => tracing::warn!(error = %e, "failed to encode snapshot event"),
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Re-run the poll cycle immediately
pub async fn retry(State(state): State<Arc<AppState>>) -> Json<SnapshotView> {
    let snapshot = state.engine.retry().await;
    Json(SnapshotView::new(&snapshot, state.stale_after_secs))
}

pub async fn list_channels(State(state): State<Arc<AppState>>) -> Json<ChannelsView> {
    let catalog = state.engine.catalog();
    Json(ChannelsView {
        channels: catalog
            .channels()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
        selected: state.engine.snapshot().channel_id.as_str().to_string(),
    })
}

/// Switch the selected channel
pub async fn select_channel(
    Path(channel_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match state.engine.select_channel(&channel_id).await {
        Ok(snapshot) => Json(SnapshotView::new(&snapshot, state.stale_after_secs)).into_response(),
        Err(e @ SyncError::UnknownChannel(_)) => {
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
