//! Document HTTP handlers.
//!
//! Every write goes through the project write gate first, then kicks off
//! background re-embedding when an embedding backend is configured.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use quill_core::{
    defaults, parse_meta_pairs, parse_tag_list, CreateDocumentRequest, Document, DocumentFilter,
    DocumentSummary, ListDocumentsRequest, SearchDocumentsRequest, TagMatchMode,
    UpdateDocumentRequest,
};

use super::writable_project;
use crate::pagination::{page_params, ListResponse};
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateDocumentBody {
    pub doc_type: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub meta: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentBody {
    pub doc_type: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub meta: Option<JsonValue>,
}

/// Query string for listing: `tags=a,b&tag_mode=any&meta=pov:mara`.
#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub doc_type: Option<String>,
    pub tags: Option<String>,
    pub tag_mode: Option<String>,
    pub meta: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchDocumentsBody {
    #[serde(default)]
    pub query: String,
    pub doc_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub tag_mode: Option<String>,
    #[serde(default)]
    pub meta: Map<String, JsonValue>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchDocumentsResponse {
    pub query: String,
    pub data: Vec<DocumentSummary>,
    pub total: usize,
}

fn build_filter(
    doc_type: Option<String>,
    tags: Vec<String>,
    tag_mode: Option<&str>,
    meta: Map<String, JsonValue>,
) -> Result<DocumentFilter, ApiError> {
    let mode: TagMatchMode = tag_mode.unwrap_or_default().parse()?;
    let mut filter = DocumentFilter::new().with_tags(tags).with_mode(mode);
    if let Some(doc_type) = doc_type.filter(|t| !t.trim().is_empty()) {
        filter = filter.with_doc_type(doc_type);
    }
    filter.meta = meta;
    Ok(filter)
}

fn reindex_in_background(state: &AppState, doc: &Document) {
    if let Some(indexer) = state.indexer() {
        indexer.spawn_index(doc.clone());
    }
}

pub async fn create_document(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<CreateDocumentBody>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    writable_project(&state, project_id, "create_document").await?;

    let doc = state
        .documents
        .insert(CreateDocumentRequest {
            project_id,
            doc_type: body.doc_type.unwrap_or_default(),
            title: body.title,
            body: body.body,
            tags: body.tags,
            meta: body.meta.unwrap_or(JsonValue::Null),
        })
        .await?;

    reindex_in_background(&state, &doc);
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.documents.fetch(id).await?))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDocumentBody>,
) -> Result<Json<Document>, ApiError> {
    let project_id = state.documents.owner(id).await?;
    writable_project(&state, project_id, "update_document").await?;

    let content_changed = body.title.is_some() || body.body.is_some();
    let doc = state
        .documents
        .update(
            id,
            UpdateDocumentRequest {
                doc_type: body.doc_type,
                title: body.title,
                body: body.body,
                tags: body.tags,
                meta: body.meta,
            },
        )
        .await?;

    if content_changed {
        reindex_in_background(&state, &doc);
    }
    Ok(Json(doc))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let project_id = state.documents.owner(id).await?;
    writable_project(&state, project_id, "delete_document").await?;
    state.documents.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let project_id = state.documents.owner(id).await?;
    writable_project(&state, project_id, "restore_document").await?;
    state.documents.restore(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<ListResponse<DocumentSummary>>, ApiError> {
    state.projects.fetch(project_id).await?;
    let (limit, offset) = page_params(query.limit, query.offset)?;

    let tags = query.tags.as_deref().map(parse_tag_list).unwrap_or_default();
    let meta = query
        .meta
        .as_deref()
        .map(parse_meta_pairs)
        .transpose()?
        .unwrap_or_default();
    let filter = build_filter(query.doc_type, tags, query.tag_mode.as_deref(), meta)?;

    let result = state
        .documents
        .list(ListDocumentsRequest {
            project_id,
            filter,
            include_deleted: query.include_deleted,
            limit: Some(limit),
            offset: Some(offset),
        })
        .await?;

    Ok(Json(ListResponse::new(
        result.documents,
        result.total as usize,
        limit as usize,
        offset as usize,
    )))
}

pub async fn search_documents(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<SearchDocumentsBody>,
) -> Result<Json<SearchDocumentsResponse>, ApiError> {
    state.projects.fetch(project_id).await?;
    let limit = body.limit.unwrap_or(defaults::PAGE_LIMIT_SEARCH);
    if !(1..=defaults::PAGE_LIMIT_MAX).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            defaults::PAGE_LIMIT_MAX
        )));
    }

    let filter = build_filter(body.doc_type, body.tags, body.tag_mode.as_deref(), body.meta)?;
    let data = state
        .documents
        .search(SearchDocumentsRequest {
            project_id,
            query: body.query.clone(),
            filter,
            limit: Some(limit),
        })
        .await?;

    Ok(Json(SearchDocumentsResponse {
        query: body.query,
        total: data.len(),
        data,
    }))
}
