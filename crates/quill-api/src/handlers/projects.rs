//! Project HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use quill_core::{
    CreateProjectRequest, ListProjectsRequest, Project, ProjectKind, UpdateProjectFlagsRequest,
};

use crate::pagination::{page_params, ListResponse};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateProjectBody {
    #[serde(default)]
    pub name: String,
    /// `series` or `book`
    pub kind: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Defaults to true.
    #[serde(default)]
    pub require_confirmation: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub kind: Option<String>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub include_deleted: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectBody {
    pub require_confirmation: Option<bool>,
    pub blocked: Option<bool>,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<CreateProjectBody>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let kind: ProjectKind = body
        .kind
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("kind is required ('series' or 'book')".into()))?
        .parse()?;

    let project = state
        .projects
        .insert(CreateProjectRequest {
            name: body.name,
            kind,
            parent_id: body.parent_id,
            require_confirmation: body.require_confirmation.unwrap_or(true),
        })
        .await?;

    info!(
        subsystem = "api",
        component = "projects",
        op = "create",
        project_id = %project.id,
        slug = %project.slug,
        kind = %project.kind,
        "Project created"
    );
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<ListResponse<Project>>, ApiError> {
    let (limit, offset) = page_params(query.limit, query.offset)?;
    let kind = query
        .kind
        .as_deref()
        .map(str::parse::<ProjectKind>)
        .transpose()?;

    let result = state
        .projects
        .list(ListProjectsRequest {
            kind,
            parent_id: query.parent_id,
            include_deleted: query.include_deleted,
            limit: Some(limit),
            offset: Some(offset),
        })
        .await?;

    Ok(Json(ListResponse::new(
        result.projects,
        result.total as usize,
        limit as usize,
        offset as usize,
    )))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.projects.fetch(id).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProjectBody>,
) -> Result<Json<Project>, ApiError> {
    let project = state
        .projects
        .update_flags(
            id,
            UpdateProjectFlagsRequest {
                require_confirmation: body.require_confirmation,
                blocked: body.blocked,
            },
        )
        .await?;
    Ok(Json(project))
}

/// Idempotent: confirming a confirmed project returns it unchanged.
pub async fn confirm_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.projects.confirm(id).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.projects.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.projects.restore(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
