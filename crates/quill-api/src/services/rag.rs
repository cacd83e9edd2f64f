//! Retrieval-augmented answers over a project's documents.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use quill_core::{
    defaults, EmbeddingBackend, EmbeddingRepository, Error, GenerationBackend, Result,
    RetrievedChunk,
};

/// System prompt sent with every question.
pub const SYSTEM_PROMPT: &str = "You are a research assistant for a fiction writer. \
Answer the question using only the numbered context passages from the writer's own project. \
Cite passages by number, for example [2]. If the context does not contain the answer, \
say that the project notes do not cover it. Do not invent facts about characters, places or events.";

/// Answer returned when a project has no indexed chunks.
pub const NO_MATERIAL_ANSWER: &str =
    "This project has no indexed material yet. Add documents or reindex the project, then ask again.";

/// A chunk that contributed to an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub document_id: Uuid,
    pub title: String,
    pub chunk_index: i32,
    pub score: f32,
}

impl From<&RetrievedChunk> for Source {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            document_id: chunk.document_id,
            title: chunk.title.clone(),
            chunk_index: chunk.chunk_index,
            score: chunk.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub model: String,
    pub sources: Vec<Source>,
}

/// Requested depth, or the configured default, bounded to `1..=RAG_TOP_K_MAX`.
pub fn clamp_top_k(requested: Option<i64>, default: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, defaults::RAG_TOP_K_MAX)
}

/// User prompt with numbered context passages followed by the question.
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::from("Context:\n\n");
    for (i, chunk) in chunks.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {} (chunk {})\n{}\n\n",
            i + 1,
            chunk.title,
            chunk.chunk_index,
            chunk.text.trim()
        ));
    }
    prompt.push_str(&format!("Question: {}", question.trim()));
    prompt
}

#[derive(Clone)]
pub struct RagService {
    embedder: Arc<dyn EmbeddingBackend>,
    generator: Arc<dyn GenerationBackend>,
    embeddings: Arc<dyn EmbeddingRepository>,
}

impl RagService {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        generator: Arc<dyn GenerationBackend>,
        embeddings: Arc<dyn EmbeddingRepository>,
    ) -> Self {
        Self {
            embedder,
            generator,
            embeddings,
        }
    }

    pub async fn ask(&self, project_id: Uuid, question: &str, top_k: i64) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is required".into()));
        }
        let start = Instant::now();

        let query_vec = self
            .embedder
            .embed_texts(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("backend returned no vector for question".into()))?;

        let chunks = self
            .embeddings
            .find_similar(project_id, &query_vec, top_k)
            .await?;

        debug!(
            subsystem = "rag",
            component = "ask",
            op = "retrieve",
            project_id = %project_id,
            top_k,
            chunk_count = chunks.len(),
            "Retrieved context chunks"
        );

        if chunks.is_empty() {
            return Ok(Answer {
                answer: NO_MATERIAL_ANSWER.to_string(),
                model: self.generator.model_name().to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = build_prompt(question, &chunks);
        let answer = self
            .generator
            .generate_with_system(SYSTEM_PROMPT, &prompt)
            .await?;

        info!(
            subsystem = "rag",
            component = "ask",
            op = "answer",
            project_id = %project_id,
            chunk_count = chunks.len(),
            model = self.generator.model_name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Answered question"
        );

        Ok(Answer {
            answer: answer.trim().to_string(),
            model: self.generator.model_name().to_string(),
            sources: chunks.iter().map(Source::from).collect(),
        })
    }
}
