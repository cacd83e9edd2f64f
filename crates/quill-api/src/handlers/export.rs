//! Document and project export.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::services::export::{
    attachment_disposition, render_document_markdown, render_project_markdown, ExportFormat,
    ProjectExport,
};
use crate::{ApiError, AppState};

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// `markdown` (default) or `json`
    pub format: Option<String>,
}

impl ExportQuery {
    fn format(&self) -> Result<ExportFormat, ApiError> {
        Ok(self.format.as_deref().unwrap_or_default().parse()?)
    }
}

fn markdown_attachment(name: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, MARKDOWN_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(name)),
        ],
        body,
    )
        .into_response()
}

pub async fn export_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = query.format()?;
    let doc = state.documents.fetch(id).await?;

    match format {
        ExportFormat::Json => Ok(Json(doc).into_response()),
        ExportFormat::Markdown => {
            let project = state.projects.fetch(doc.project_id).await?;
            let body = render_document_markdown(&doc, &project)?;
            Ok(markdown_attachment(&doc.title, body))
        }
    }
}

pub async fn export_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = query.format()?;
    let project = state.projects.fetch(id).await?;
    let documents = state.documents.list_full(id).await?;

    info!(
        subsystem = "api",
        component = "export",
        op = "export_project",
        project_id = %id,
        result_count = documents.len(),
        "Exporting project"
    );

    match format {
        ExportFormat::Json => Ok(Json(ProjectExport {
            project,
            documents,
            exported_at_utc: Utc::now(),
        })
        .into_response()),
        ExportFormat::Markdown => {
            let body = render_project_markdown(&project, &documents)?;
            Ok(markdown_attachment(&project.slug, body))
        }
    }
}
