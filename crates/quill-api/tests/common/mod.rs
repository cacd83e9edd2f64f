//! In-memory repositories and request helpers for router tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

use quill_api::{build_router, AppState, ServerConfig};
use quill_core::{
    next_available_slug, normalize_tags, slugify, ChunkEmbedding, CreateDocumentRequest,
    CreateProjectRequest, Document, DocumentRepository, DocumentSummary, EmbeddingRepository,
    Error, ListDocumentsRequest, ListDocumentsResponse, ListProjectsRequest, ListProjectsResponse,
    Project, ProjectKind, ProjectRepository, Result, RetrievedChunk, SearchDocumentsRequest,
    UpdateDocumentRequest, UpdateProjectFlagsRequest, Vector,
};
use quill_db::documents::{hash_content, merge_meta, normalize_doc_type, normalize_meta};
use quill_db::BodySplitter;
use quill_inference::MockInferenceBackend;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn page<T>(items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.unwrap_or(0) as usize)
        .take(limit.unwrap_or(50) as usize)
        .collect()
}

// =============================================================================
// PROJECTS
// =============================================================================

#[derive(Default)]
pub struct MemoryProjects {
    rows: Mutex<Vec<Project>>,
}

impl MemoryProjects {
    pub fn is_live(&self, id: Uuid) -> bool {
        lock(&self.rows)
            .iter()
            .any(|p| p.id == id && p.deleted_at.is_none())
    }

    pub fn is_blocked(&self, id: Uuid) -> bool {
        lock(&self.rows).iter().any(|p| p.id == id && p.blocked)
    }

    fn modify(&self, id: Uuid, f: impl FnOnce(&mut Project)) -> Result<Project> {
        let mut rows = lock(&self.rows);
        let project = rows
            .iter_mut()
            .find(|p| p.id == id && p.deleted_at.is_none())
            .ok_or(Error::ProjectNotFound(id))?;
        f(project);
        Ok(project.clone())
    }
}

#[async_trait]
impl ProjectRepository for MemoryProjects {
    async fn insert(&self, req: CreateProjectRequest) -> Result<Project> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidInput("project name is required".into()));
        }
        let mut rows = lock(&self.rows);
        if rows.iter().any(|p| p.name.to_lowercase() == name.to_lowercase()) {
            return Err(Error::Conflict(format!("project '{}' already exists", name)));
        }
        if let Some(parent_id) = req.parent_id {
            let parent_ok = req.kind == ProjectKind::Book
                && rows.iter().any(|p| {
                    p.id == parent_id && p.kind == ProjectKind::Series && p.deleted_at.is_none()
                });
            if !parent_ok {
                return Err(Error::InvalidInput("parent must be a live series".into()));
            }
        }
        let existing: Vec<String> = rows.iter().map(|p| p.slug.clone()).collect();
        let now = Utc::now();
        let project = Project {
            id: Uuid::now_v7(),
            slug: next_available_slug(&slugify(&name), &existing),
            name,
            kind: req.kind,
            parent_id: req.parent_id,
            confirmed: false,
            require_confirmation: req.require_confirmation,
            blocked: false,
            created_at_utc: now,
            updated_at_utc: now,
            deleted_at: None,
        };
        rows.push(project.clone());
        Ok(project)
    }

    async fn fetch(&self, id: Uuid) -> Result<Project> {
        lock(&self.rows)
            .iter()
            .find(|p| p.id == id && p.deleted_at.is_none())
            .cloned()
            .ok_or(Error::ProjectNotFound(id))
    }

    async fn list(&self, req: ListProjectsRequest) -> Result<ListProjectsResponse> {
        let matched: Vec<Project> = lock(&self.rows)
            .iter()
            .filter(|p| req.include_deleted || p.deleted_at.is_none())
            .filter(|p| req.kind.map_or(true, |k| p.kind == k))
            .filter(|p| req.parent_id.is_none() || p.parent_id == req.parent_id)
            .cloned()
            .collect();
        let total = matched.len() as i64;
        Ok(ListProjectsResponse {
            projects: page(matched, req.limit, req.offset),
            total,
        })
    }

    async fn confirm(&self, id: Uuid) -> Result<Project> {
        self.modify(id, |p| {
            if !p.confirmed {
                p.confirmed = true;
                p.updated_at_utc = Utc::now();
            }
        })
    }

    async fn update_flags(&self, id: Uuid, req: UpdateProjectFlagsRequest) -> Result<Project> {
        self.modify(id, |p| {
            if let Some(require) = req.require_confirmation {
                p.require_confirmation = require;
            }
            if let Some(blocked) = req.blocked {
                p.blocked = blocked;
            }
            p.updated_at_utc = Utc::now();
        })
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        self.modify(id, |p| p.deleted_at = Some(Utc::now()))?;
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        let mut rows = lock(&self.rows);
        let project = rows
            .iter_mut()
            .find(|p| p.id == id && p.deleted_at.is_some())
            .ok_or(Error::ProjectNotFound(id))?;
        project.deleted_at = None;
        Ok(())
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

pub struct MemoryDocuments {
    projects: Arc<MemoryProjects>,
    splitter: BodySplitter,
    rows: Mutex<Vec<Document>>,
}

impl MemoryDocuments {
    pub fn new(projects: Arc<MemoryProjects>, splitter: BodySplitter) -> Self {
        Self {
            projects,
            splitter,
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Live document (and live project) by id.
    pub fn live(&self, id: Uuid) -> Option<Document> {
        lock(&self.rows)
            .iter()
            .find(|d| d.id == id && d.deleted_at.is_none() && self.projects.is_live(d.project_id))
            .cloned()
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocuments {
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document> {
        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("document title is required".into()));
        }
        if !self.projects.is_live(req.project_id) {
            return Err(Error::ProjectNotFound(req.project_id));
        }
        if self.projects.is_blocked(req.project_id) {
            return Err(Error::Blocked(req.project_id));
        }
        let now = Utc::now();
        let doc = Document {
            id: Uuid::now_v7(),
            project_id: req.project_id,
            doc_type: normalize_doc_type(&req.doc_type),
            title,
            tags: normalize_tags(&req.tags),
            meta: normalize_meta(req.meta)?,
            part_count: self.splitter.split(&req.body).len() as i32,
            byte_len: req.body.len() as i64,
            content_hash: hash_content(&req.body),
            body: req.body,
            created_at_utc: now,
            updated_at_utc: now,
            deleted_at: None,
        };
        lock(&self.rows).push(doc.clone());
        Ok(doc)
    }

    async fn fetch(&self, id: Uuid) -> Result<Document> {
        self.live(id).ok_or(Error::DocumentNotFound(id))
    }

    async fn owner(&self, id: Uuid) -> Result<Uuid> {
        lock(&self.rows)
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.project_id)
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn update(&self, id: Uuid, req: UpdateDocumentRequest) -> Result<Document> {
        if self.live(id).is_none() {
            return Err(Error::DocumentNotFound(id));
        }
        let mut rows = lock(&self.rows);
        let doc = rows
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(Error::DocumentNotFound(id))?;
        if self.projects.is_blocked(doc.project_id) {
            return Err(Error::Blocked(doc.project_id));
        }
        if let Some(title) = req.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(Error::InvalidInput("document title is required".into()));
            }
            doc.title = title;
        }
        if let Some(doc_type) = req.doc_type {
            doc.doc_type = normalize_doc_type(&doc_type);
        }
        if let Some(tags) = req.tags {
            doc.tags = normalize_tags(&tags);
        }
        if let Some(patch) = req.meta {
            doc.meta = merge_meta(&doc.meta, &patch)?;
        }
        if let Some(body) = req.body {
            doc.part_count = self.splitter.split(&body).len() as i32;
            doc.byte_len = body.len() as i64;
            doc.content_hash = hash_content(&body);
            doc.body = body;
        }
        doc.updated_at_utc = Utc::now();
        Ok(doc.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let mut rows = lock(&self.rows);
        let doc = rows
            .iter_mut()
            .find(|d| d.id == id && d.deleted_at.is_none())
            .ok_or(Error::DocumentNotFound(id))?;
        doc.deleted_at = Some(Utc::now());
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<()> {
        let mut rows = lock(&self.rows);
        let doc = rows
            .iter_mut()
            .find(|d| d.id == id && d.deleted_at.is_some())
            .ok_or(Error::DocumentNotFound(id))?;
        doc.deleted_at = None;
        Ok(())
    }

    async fn list(&self, req: ListDocumentsRequest) -> Result<ListDocumentsResponse> {
        let matched: Vec<DocumentSummary> = lock(&self.rows)
            .iter()
            .filter(|d| d.project_id == req.project_id)
            .filter(|d| req.include_deleted || d.deleted_at.is_none())
            .filter(|d| req.filter.matches(d))
            .map(Document::summary)
            .collect();
        let total = matched.len() as i64;
        Ok(ListDocumentsResponse {
            documents: page(matched, req.limit, req.offset),
            total,
        })
    }

    async fn search(&self, req: SearchDocumentsRequest) -> Result<Vec<DocumentSummary>> {
        let query = req.query.trim().to_lowercase();
        if query.is_empty() {
            return Err(Error::InvalidInput("search query is required".into()));
        }
        Ok(lock(&self.rows)
            .iter()
            .filter(|d| d.project_id == req.project_id && d.deleted_at.is_none())
            .filter(|d| {
                d.title.to_lowercase().contains(&query) || d.body.to_lowercase().contains(&query)
            })
            .filter(|d| req.filter.matches(d))
            .map(|d| DocumentSummary {
                score: Some(1.0),
                ..d.summary()
            })
            .take(req.limit.unwrap_or(20) as usize)
            .collect())
    }

    async fn list_full(&self, project_id: Uuid) -> Result<Vec<Document>> {
        Ok(lock(&self.rows)
            .iter()
            .filter(|d| d.project_id == project_id && d.deleted_at.is_none())
            .cloned()
            .collect())
    }
}

// =============================================================================
// EMBEDDINGS
// =============================================================================

struct StoredChunk {
    document_id: Uuid,
    chunk: ChunkEmbedding,
}

pub struct MemoryEmbeddings {
    documents: Arc<MemoryDocuments>,
    rows: Mutex<Vec<StoredChunk>>,
}

impl MemoryEmbeddings {
    pub fn new(documents: Arc<MemoryDocuments>) -> Self {
        Self {
            documents,
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn count_for_document(&self, document_id: Uuid) -> usize {
        lock(&self.rows)
            .iter()
            .filter(|r| r.document_id == document_id)
            .count()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl EmbeddingRepository for MemoryEmbeddings {
    async fn replace_for_document(
        &self,
        document_id: Uuid,
        title: &str,
        content_hash: &str,
        _model: &str,
        chunks: Vec<ChunkEmbedding>,
    ) -> Result<bool> {
        let fresh = lock(&self.documents.rows)
            .iter()
            .find(|d| d.id == document_id)
            .map(|d| d.title == title && d.content_hash == content_hash)
            .ok_or(Error::DocumentNotFound(document_id))?;
        if !fresh {
            return Ok(false);
        }
        let mut rows = lock(&self.rows);
        rows.retain(|r| r.document_id != document_id);
        rows.extend(chunks.into_iter().map(|chunk| StoredChunk { document_id, chunk }));
        Ok(true)
    }

    async fn find_similar(
        &self,
        project_id: Uuid,
        query_vec: &Vector,
        limit: i64,
    ) -> Result<Vec<RetrievedChunk>> {
        let rows = lock(&self.rows);
        let mut hits: Vec<RetrievedChunk> = rows
            .iter()
            .filter_map(|r| {
                let doc = self.documents.live(r.document_id)?;
                (doc.project_id == project_id).then(|| RetrievedChunk {
                    document_id: r.document_id,
                    title: doc.title,
                    chunk_index: r.chunk.chunk_index,
                    text: r.chunk.text.clone(),
                    score: cosine(r.chunk.vector.as_slice(), query_vec.as_slice()),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}

// =============================================================================
// HARNESS
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub projects: Arc<MemoryProjects>,
    pub documents: Arc<MemoryDocuments>,
    pub embeddings: Arc<MemoryEmbeddings>,
    pub backend: Option<MockInferenceBackend>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(ServerConfig::default(), None)
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_backend(backend: MockInferenceBackend) -> Self {
        Self::build(ServerConfig::default(), Some(backend))
    }

    fn build(config: ServerConfig, backend: Option<MockInferenceBackend>) -> Self {
        let projects = Arc::new(MemoryProjects::default());
        let documents = Arc::new(MemoryDocuments::new(projects.clone(), config.splitter()));
        let embeddings = Arc::new(MemoryEmbeddings::new(documents.clone()));

        let mut state = AppState::new(
            projects.clone(),
            documents.clone(),
            embeddings.clone(),
            config,
        );
        if let Some(backend) = &backend {
            state = state.with_inference(Arc::new(backend.clone()));
        }

        Self {
            router: build_router(state),
            projects,
            documents,
            embeddings,
            backend,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, body: JsonValue) -> TestResponse {
        self.json(Method::POST, uri, body).await
    }

    pub async fn patch(&self, uri: &str, body: JsonValue) -> TestResponse {
        self.json(Method::PATCH, uri, body).await
    }

    async fn json(&self, method: Method, uri: &str, body: JsonValue) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Create a project and return its id.
    pub async fn project(&self, name: &str, confirmed: bool) -> Uuid {
        let res = self
            .post("/api/v1/projects", serde_json::json!({"name": name, "kind": "book"}))
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        let id = res.id();
        if confirmed {
            let res = self.post(&format!("/api/v1/projects/{}/confirm", id), JsonValue::Null).await;
            assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        }
        id
    }

    /// Create a document and return its id.
    pub async fn document(&self, project_id: Uuid, body: JsonValue) -> Uuid {
        let res = self
            .post(&format!("/api/v1/projects/{}/documents", project_id), body)
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        res.id()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> JsonValue {
        serde_json::from_str(&self.body).unwrap_or_else(|e| panic!("{}: {}", e, self.body))
    }

    pub fn id(&self) -> Uuid {
        self.json()["id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .expect("response has an id")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
