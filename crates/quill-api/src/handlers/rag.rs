//! Reindex and question answering.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::writable_project;
use crate::services::rag::{clamp_top_k, Answer};
use crate::services::ReindexSummary;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct AskBody {
    #[serde(default)]
    pub question: String,
    pub top_k: Option<i64>,
}

pub async fn reindex_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReindexSummary>, ApiError> {
    writable_project(&state, id, "reindex_project").await?;
    let indexer = state.require_indexer()?;
    let summary = indexer.reindex_project(state.documents.as_ref(), id).await?;
    Ok(Json(summary))
}

pub async fn ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AskBody>,
) -> Result<Json<Answer>, ApiError> {
    state.projects.fetch(id).await?;
    if body.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question is required".into()));
    }
    let rag = state.rag()?;
    let top_k = clamp_top_k(body.top_k, state.config.rag_top_k);
    Ok(Json(rag.ask(id, &body.question, top_k).await?))
}
