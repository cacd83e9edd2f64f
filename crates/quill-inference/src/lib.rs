//! # quill-inference
//!
//! Embedding and text generation backends for Quill.
//!
//! This crate provides:
//! - OpenAI-compatible implementation (default, feature `openai`)
//! - Deterministic mock backend for tests (feature `mock`)
//!
//! Both implement the `EmbeddingBackend` and `GenerationBackend` traits
//! from `quill-core`.

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use quill_core::*;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockInferenceBackend;
