//! Shared handler state.

use std::sync::Arc;

use tracing::warn;

use quill_core::{
    DocumentRepository, EmbeddingBackend, EmbeddingRepository, GenerationBackend,
    InferenceBackend, ProjectRepository,
};
use quill_db::Database;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::services::{IndexingService, RagService};

#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<dyn ProjectRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub embeddings: Arc<dyn EmbeddingRepository>,
    /// None when no inference backend is configured.
    pub embedder: Option<Arc<dyn EmbeddingBackend>>,
    pub generator: Option<Arc<dyn GenerationBackend>>,
    /// Health-checked by `/health`.
    pub inference: Option<Arc<dyn InferenceBackend>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        documents: Arc<dyn DocumentRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        config: ServerConfig,
    ) -> Self {
        Self {
            projects,
            documents,
            embeddings,
            embedder: None,
            generator: None,
            inference: None,
            config: Arc::new(config),
        }
    }

    pub fn from_database(db: Database, config: ServerConfig) -> Self {
        Self::new(
            Arc::new(db.projects),
            Arc::new(db.documents),
            Arc::new(db.embeddings),
            config,
        )
    }

    /// Use one backend for both embeddings and answers.
    pub fn with_inference<B>(mut self, backend: Arc<B>) -> Self
    where
        B: InferenceBackend + 'static,
    {
        let embedder: Arc<dyn EmbeddingBackend> = backend.clone();
        let generator: Arc<dyn GenerationBackend> = backend.clone();
        let inference: Arc<dyn InferenceBackend> = backend;
        self.embedder = Some(embedder);
        self.generator = Some(generator);
        self.inference = Some(inference);
        self
    }

    pub fn rag_available(&self) -> bool {
        self.embedder.is_some() && self.generator.is_some()
    }

    /// RAG is configured and the backend answers its health check.
    pub async fn rag_healthy(&self) -> bool {
        if !self.rag_available() {
            return false;
        }
        let Some(backend) = &self.inference else {
            return true;
        };
        match backend.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(
                    subsystem = "api",
                    component = "health",
                    error = %e,
                    "Inference backend health check failed"
                );
                false
            }
        }
    }

    /// Indexer, when an embedding backend is configured.
    pub fn indexer(&self) -> Option<IndexingService> {
        self.embedder
            .clone()
            .map(|embedder| IndexingService::new(embedder, self.embeddings.clone()))
    }

    pub fn require_indexer(&self) -> Result<IndexingService, ApiError> {
        self.indexer().ok_or_else(|| {
            ApiError::Unavailable("no embedding backend is configured".to_string())
        })
    }

    pub fn rag(&self) -> Result<RagService, ApiError> {
        match (&self.embedder, &self.generator) {
            (Some(embedder), Some(generator)) => Ok(RagService::new(
                embedder.clone(),
                generator.clone(),
                self.embeddings.clone(),
            )),
            _ => Err(ApiError::Unavailable(
                "no inference backend is configured".to_string(),
            )),
        }
    }
}
