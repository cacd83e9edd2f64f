//! Core traits for Quill abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::filter::DocumentFilter;
use crate::models::*;

// =============================================================================
// PROJECT REPOSITORY TRAITS
// =============================================================================

/// Request for creating a new project.
#[derive(Debug, Clone)]
pub struct CreateProjectRequest {
    pub name: String,
    pub kind: ProjectKind,
    pub parent_id: Option<Uuid>,
    pub require_confirmation: bool,
}

/// Request for listing projects.
#[derive(Debug, Clone, Default)]
pub struct ListProjectsRequest {
    pub kind: Option<ProjectKind>,
    pub parent_id: Option<Uuid>,
    pub include_deleted: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProjectsResponse {
    pub projects: Vec<Project>,
    pub total: i64,
}

/// Request for changing a project's write flags.
#[derive(Debug, Clone, Default)]
pub struct UpdateProjectFlagsRequest {
    pub require_confirmation: Option<bool>,
    pub blocked: Option<bool>,
}

/// Repository for project CRUD operations.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Insert a new project. Duplicate names yield `Error::Conflict`.
    async fn insert(&self, req: CreateProjectRequest) -> Result<Project>;

    /// Fetch a live (non-deleted) project.
    async fn fetch(&self, id: Uuid) -> Result<Project>;

    /// List projects with filtering and pagination.
    async fn list(&self, req: ListProjectsRequest) -> Result<ListProjectsResponse>;

    /// Mark a project confirmed. Confirming twice is a no-op.
    async fn confirm(&self, id: Uuid) -> Result<Project>;

    /// Update confirmation requirement / blocked flags.
    async fn update_flags(&self, id: Uuid, req: UpdateProjectFlagsRequest) -> Result<Project>;

    /// Soft-delete a project.
    async fn soft_delete(&self, id: Uuid) -> Result<()>;

    /// Restore a soft-deleted project.
    async fn restore(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// DOCUMENT REPOSITORY TRAITS
// =============================================================================

/// Request for creating a new document.
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub project_id: Uuid,
    pub doc_type: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub meta: JsonValue,
}

/// Partial document update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentRequest {
    pub doc_type: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    /// Replaces the tag set.
    pub tags: Option<Vec<String>>,
    /// Merged into the existing meta object; `null` values remove keys.
    pub meta: Option<JsonValue>,
}

impl UpdateDocumentRequest {
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none()
            && self.title.is_none()
            && self.body.is_none()
            && self.tags.is_none()
            && self.meta.is_none()
    }
}

/// Request for listing a project's documents.
#[derive(Debug, Clone, Default)]
pub struct ListDocumentsRequest {
    pub project_id: Uuid,
    pub filter: DocumentFilter,
    pub include_deleted: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentSummary>,
    pub total: i64,
}

/// Full-text search within one project.
#[derive(Debug, Clone, Default)]
pub struct SearchDocumentsRequest {
    pub project_id: Uuid,
    pub query: String,
    pub filter: DocumentFilter,
    pub limit: Option<i64>,
}

/// Repository for document storage, including multi-part bodies.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document, splitting the body into parts as needed.
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document>;

    /// Fetch a live document with its reassembled body.
    async fn fetch(&self, id: Uuid) -> Result<Document>;

    /// Project owning the document, including soft-deleted documents.
    async fn owner(&self, id: Uuid) -> Result<Uuid>;

    /// Apply a partial update and return the new state.
    async fn update(&self, id: Uuid, req: UpdateDocumentRequest) -> Result<Document>;

    /// Soft-delete a document.
    async fn soft_delete(&self, id: Uuid) -> Result<()>;

    /// Restore a soft-deleted document.
    async fn restore(&self, id: Uuid) -> Result<()>;

    /// List document summaries with in-process tag/meta filtering.
    async fn list(&self, req: ListDocumentsRequest) -> Result<ListDocumentsResponse>;

    /// Full-text search, ranked, then filtered in process.
    async fn search(&self, req: SearchDocumentsRequest) -> Result<Vec<DocumentSummary>>;

    /// All live documents of a project with bodies, oldest first.
    async fn list_full(&self, project_id: Uuid) -> Result<Vec<Document>>;
}

// =============================================================================
// EMBEDDING REPOSITORY TRAITS
// =============================================================================

/// Repository for retrieval chunk embeddings.
#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    /// Replace every stored chunk of a document.
    ///
    /// Chunks carry the title as a prefix, so nothing is written when the
    /// document's current `title` or `content_hash` differs from the values
    /// the chunks were built from (a newer write superseded this one).
    /// Returns whether the chunks were stored.
    async fn replace_for_document(
        &self,
        document_id: Uuid,
        title: &str,
        content_hash: &str,
        model: &str,
        chunks: Vec<ChunkEmbedding>,
    ) -> Result<bool>;

    /// Nearest chunks within a project's live documents.
    async fn find_similar(
        &self,
        project_id: Uuid,
        query_vec: &Vector,
        limit: i64,
    ) -> Result<Vec<RetrievedChunk>>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts, one vector per input.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Combined inference backend supporting both embedding and generation.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + GenerationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}
