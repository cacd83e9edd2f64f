//! Embedding of documents into retrieval chunks.
//!
//! Each document is cut with the paragraph chunker into pieces of at most
//! [`defaults::RAG_CHUNK_BYTES`] bytes. Every piece is prefixed with the
//! document title before embedding so a chunk stays attributable on its own.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quill_core::{
    defaults, ChunkEmbedding, Document, DocumentRepository, EmbeddingBackend,
    EmbeddingRepository, Error, Result,
};
use quill_db::{Chunker, ParagraphChunker};

/// Retrieval chunk texts for a document, title-prefixed.
pub fn retrieval_chunks(doc: &Document) -> Vec<String> {
    let chunker = ParagraphChunker::new(defaults::RAG_CHUNK_BYTES);
    let mut texts: Vec<String> = chunker
        .chunk(&doc.body)
        .into_iter()
        .map(|c| c.text.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(|t| format!("{}\n\n{}", doc.title, t))
        .collect();
    if texts.is_empty() {
        texts.push(doc.title.clone());
    }
    texts
}

/// Totals reported by a project reindex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReindexSummary {
    pub documents: usize,
    pub chunks: usize,
}

/// Embeds documents and stores their retrieval chunks.
#[derive(Clone)]
pub struct IndexingService {
    embedder: Arc<dyn EmbeddingBackend>,
    embeddings: Arc<dyn EmbeddingRepository>,
}

impl IndexingService {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, embeddings: Arc<dyn EmbeddingRepository>) -> Self {
        Self {
            embedder,
            embeddings,
        }
    }

    /// Embed one document. Returns the number of chunks stored, which is zero
    /// when the document changed while it was being embedded.
    pub async fn index_document(&self, doc: &Document) -> Result<usize> {
        let start = Instant::now();
        let texts = retrieval_chunks(doc);
        let vectors = self.embedder.embed_texts(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "backend returned {} vectors for {} chunks",
                vectors.len(),
                texts.len()
            )));
        }

        let chunk_count = texts.len();
        let chunks = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| ChunkEmbedding {
                chunk_index: i as i32,
                text,
                vector,
            })
            .collect();

        let stored = self
            .embeddings
            .replace_for_document(
                doc.id,
                &doc.title,
                &doc.content_hash,
                self.embedder.model_name(),
                chunks,
            )
            .await?;

        debug!(
            subsystem = "rag",
            component = "indexer",
            op = "index_document",
            document_id = %doc.id,
            chunk_count,
            stored,
            model = self.embedder.model_name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Document indexed"
        );
        Ok(if stored { chunk_count } else { 0 })
    }

    /// Index in the background. Failures are logged, never returned.
    pub fn spawn_index(&self, doc: Document) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.index_document(&doc).await {
                warn!(
                    subsystem = "rag",
                    component = "indexer",
                    op = "index_document",
                    document_id = %doc.id,
                    error = %e,
                    "Background indexing failed"
                );
            }
        });
    }

    /// Re-embed every live document of a project, one after another.
    pub async fn reindex_project(
        &self,
        documents: &dyn DocumentRepository,
        project_id: Uuid,
    ) -> Result<ReindexSummary> {
        let start = Instant::now();
        let docs = documents.list_full(project_id).await?;
        let mut summary = ReindexSummary::default();
        for doc in &docs {
            summary.chunks += self.index_document(doc).await?;
            summary.documents += 1;
        }

        info!(
            subsystem = "rag",
            component = "indexer",
            op = "reindex_project",
            project_id = %project_id,
            documents = summary.documents,
            chunk_count = summary.chunks,
            duration_ms = start.elapsed().as_millis() as u64,
            "Project reindexed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn doc(title: &str, body: &str) -> Document {
        Document {
            id: Uuid::now_v7(),
            project_id: Uuid::now_v7(),
            doc_type: "scene".into(),
            title: title.into(),
            body: body.into(),
            tags: vec![],
            meta: json!({}),
            part_count: 1,
            byte_len: body.len() as i64,
            content_hash: quill_db::hash_content(body),
            created_at_utc: Utc::now(),
            updated_at_utc: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_short_body_is_one_prefixed_chunk() {
        let chunks = retrieval_chunks(&doc("Harbor", "The fog rolled in."));
        assert_eq!(chunks, vec!["Harbor\n\nThe fog rolled in.".to_string()]);
    }

    #[test]
    fn test_empty_body_indexes_title() {
        assert_eq!(retrieval_chunks(&doc("Mara", "  ")), vec!["Mara".to_string()]);
    }

    #[test]
    fn test_long_body_splits_on_paragraphs() {
        let paragraph = "word ".repeat(150);
        let body = format!("{}\n\n{}\n\n{}", paragraph, paragraph, paragraph);
        let chunks = retrieval_chunks(&doc("Storm", &body));
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.starts_with("Storm\n\n")));
    }
}
