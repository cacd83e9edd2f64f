//! SSE typing stream.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use quill_core::defaults;

use crate::services::typing::{typing_events, TypingParams};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub chunk_chars: Option<usize>,
    pub interval_ms: Option<u64>,
}

/// Clients connect to `/api/v1/documents/:id/stream` and receive the body as
/// `chunk` events followed by `done`.
pub async fn stream_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let params = TypingParams::resolve(
        query.chunk_chars,
        query.interval_ms,
        state.config.stream_chunk_chars,
        state.config.stream_interval_ms,
    )?;
    let doc = state.documents.fetch(id).await?;

    debug!(
        subsystem = "api",
        component = "stream",
        op = "stream_document",
        document_id = %id,
        chunk_chars = params.chunk_chars,
        interval_ms = params.interval.as_millis() as u64,
        "Starting typing stream"
    );

    Ok(Sse::new(typing_events(doc.id, &doc.body, params)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::STREAM_KEEPALIVE_SECS))
            .text("keepalive"),
    ))
}
