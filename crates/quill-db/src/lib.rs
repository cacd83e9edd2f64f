//! # quill-db
//!
//! PostgreSQL database layer for Quill.
//!
//! This crate provides:
//! - Pool setup with per-connection statement timeouts
//! - Project and document repositories
//! - Lossless multi-part storage of large document bodies
//! - Full-text search with PostgreSQL tsvector
//! - Vector search over retrieval chunks with pgvector
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_db::{create_pool, Database, ProjectRepository, CreateProjectRequest, ProjectKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(create_pool("postgres://localhost/quill").await?);
//!
//!     let project = db.projects.insert(CreateProjectRequest {
//!         name: "The Long Night".to_string(),
//!         kind: ProjectKind::Book,
//!         parent_id: None,
//!         require_confirmation: true,
//!     }).await?;
//!
//!     println!("Created project: {}", project.slug);
//!     Ok(())
//! }
//! ```
pub mod chunking;
pub mod documents;
pub mod embeddings;
pub mod pool;
pub mod projects;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use quill_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use chunking::{
    reassemble_parts, BodySplitter, Chunk, ChunkStrategy, Chunker, FixedChunker, ParagraphChunker,
};
pub use documents::{hash_content, merge_meta, PgDocumentRepository};
pub use embeddings::PgEmbeddingRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use projects::PgProjectRepository;

/// All repositories over one pool.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Project repository.
    pub projects: PgProjectRepository,
    /// Document repository, including part storage.
    pub documents: PgDocumentRepository,
    /// Retrieval chunk embeddings.
    pub embeddings: PgEmbeddingRepository,
}

impl Database {
    /// Repositories with the default body splitter.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_splitter(pool, BodySplitter::default())
    }

    /// Create a Database whose document repository splits bodies with `splitter`.
    pub fn with_splitter(pool: sqlx::Pool<sqlx::Postgres>, splitter: BodySplitter) -> Self {
        Self {
            projects: PgProjectRepository::new(pool.clone()),
            documents: PgDocumentRepository::with_splitter(pool.clone(), splitter),
            embeddings: PgEmbeddingRepository::new(pool.clone()),
            pool,
        }
    }

    /// Apply `migrations/` (embedded at build time).
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
