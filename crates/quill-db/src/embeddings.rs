//! Retrieval chunk embedding repository (pgvector).

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use quill_core::{ChunkEmbedding, EmbeddingRepository, Error, Result, RetrievedChunk, Vector};

/// PostgreSQL implementation of EmbeddingRepository.
#[derive(Clone)]
pub struct PgEmbeddingRepository {
    pool: Pool<Postgres>,
}

impl PgEmbeddingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmbeddingRepository for PgEmbeddingRepository {
    async fn replace_for_document(
        &self,
        document_id: Uuid,
        title: &str,
        content_hash: &str,
        model: &str,
        chunks: Vec<ChunkEmbedding>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Row lock serialises indexers of the same document.
        let current: Option<(Uuid, String, String)> = sqlx::query_as(
            "SELECT project_id, title, content_hash FROM document WHERE id = $1 FOR UPDATE",
        )
        .bind(document_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let Some((project_id, stored_title, stored_hash)) = current else {
            return Err(Error::DocumentNotFound(document_id));
        };
        if stored_hash != content_hash || stored_title != title {
            debug!(
                subsystem = "db",
                component = "embeddings",
                op = "replace",
                document_id = %document_id,
                "Skipping stale embeddings; document changed since indexing began"
            );
            return Ok(false);
        }

        sqlx::query("DELETE FROM document_embedding WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let now = Utc::now();
        let chunk_count = chunks.len();
        for chunk in chunks {
            sqlx::query(
                "INSERT INTO document_embedding
                     (id, document_id, project_id, chunk_index, text, model, embedding, created_at_utc)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::now_v7())
            .bind(document_id)
            .bind(project_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(model)
            .bind(&chunk.vector)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "embeddings",
            op = "replace",
            document_id = %document_id,
            chunk_count,
            model,
            "Stored document embeddings"
        );
        Ok(true)
    }

    async fn find_similar(
        &self,
        project_id: Uuid,
        query_vec: &Vector,
        limit: i64,
    ) -> Result<Vec<RetrievedChunk>> {
        // Rows from another model's dimension cannot be compared with <=>.
        let rows = sqlx::query(
            "SELECT e.document_id, d.title, e.chunk_index, e.text,
                    (1.0 - (e.embedding <=> $2::vector))::real AS score
             FROM document_embedding e
             JOIN document d ON d.id = e.document_id
             JOIN project p ON p.id = d.project_id
             WHERE e.project_id = $1
               AND d.deleted_at IS NULL
               AND p.deleted_at IS NULL
               AND vector_dims(e.embedding) = vector_dims($2::vector)
             ORDER BY e.embedding <=> $2::vector
             LIMIT $3",
        )
        .bind(project_id)
        .bind(query_vec)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| RetrievedChunk {
                document_id: row.get("document_id"),
                title: row.get("title"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                score: row.get("score"),
            })
            .collect())
    }
}
