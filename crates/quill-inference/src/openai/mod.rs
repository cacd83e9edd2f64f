//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that speaks the OpenAI embeddings and chat
//! completions API (OpenAI, Azure OpenAI, Ollama in compatibility mode, vLLM,
//! LM Studio).
//!
//! # Example
//!
//! ```rust,no_run
//! use quill_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use quill_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         embed_model: "nomic-embed-text".to_string(),
//!         embed_dimension: 768,
//!         ..Default::default()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!
//!     let texts = vec!["The lighthouse keeper".to_string()];
//!     let vectors = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{
    OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL, DEFAULT_GEN_MODEL,
    DEFAULT_OPENAI_URL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS,
};
pub use error::{to_quill_error, OpenAIErrorCode, Operation};
pub use types::*;
