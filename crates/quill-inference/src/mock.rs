//! Mock inference backend for deterministic testing.
//!
//! Embeddings are hashed bag-of-words vectors: texts sharing words point in
//! similar directions, so retrieval ordering is stable and meaningful in
//! tests. Generation returns a configured response and records the prompt.
//!
//! ## Usage
//!
//! ```rust
//! use quill_inference::mock::MockInferenceBackend;
//!
//! let backend = MockInferenceBackend::new()
//!     .with_dimension(64)
//!     .with_fixed_response("Mara lit the lamp.");
//! assert_eq!(backend.generate_call_count(), 0);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use quill_core::{EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result, Vector};

/// Model name reported by the mock for both embedding and generation.
pub const MOCK_MODEL: &str = "mock-model";

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    response: String,
    fail_embeddings: bool,
    fail_generation: bool,
    unhealthy: bool,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: &'static str,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 64,
            response: "Mock response".to_string(),
            fail_embeddings: false,
            fail_generation: false,
            unhealthy: false,
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension.max(1);
        self
    }

    /// Set the response returned by every generation request.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).response = response.into();
        self
    }

    /// Make every embedding call fail.
    pub fn with_failing_embeddings(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_embeddings = true;
        self
    }

    /// Make every generation call fail.
    pub fn with_failing_generation(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_generation = true;
        self
    }

    /// Make the health check report the backend as down.
    pub fn with_unhealthy(mut self) -> Self {
        Arc::make_mut(&mut self.config).unhealthy = true;
        self
    }

    fn log(&self) -> MutexGuard<'_, Vec<MockCall>> {
        // A panicking test thread must not hide the log from the others.
        self.call_log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, operation: &'static str, input: &str) {
        self.log().push(MockCall {
            operation,
            input: input.to_string(),
        });
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.log().clone()
    }

    /// Number of texts embedded so far.
    pub fn embed_call_count(&self) -> usize {
        self.log().iter().filter(|c| c.operation == "embed").count()
    }

    /// Number of generation requests so far.
    pub fn generate_call_count(&self) -> usize {
        self.log().iter().filter(|c| c.operation == "generate").count()
    }

    /// Prompt of the most recent generation request.
    pub fn last_prompt(&self) -> Option<String> {
        self.log()
            .iter()
            .rev()
            .find(|c| c.operation == "generate")
            .map(|c| c.input.clone())
    }

    /// Deterministic unit-length embedding for `text`.
    pub fn embedding_for(&self, text: &str) -> Vec<f32> {
        hashed_bag_of_words(text, self.config.dimension)
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash each lower-cased word into a bucket and L2-normalise.
pub fn hashed_bag_of_words(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let digest = Sha256::digest(word.to_lowercase().as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % dimension as u64) as usize;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    } else {
        // Empty text still needs a valid direction.
        vector[0] = 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        for text in texts {
            self.record("embed", text);
        }
        if self.config.fail_embeddings {
            return Err(Error::Embedding("mock embedding failure".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| Vector::from(self.embedding_for(t)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.record("generate", prompt);
        if self.config.fail_generation {
            return Err(Error::Inference("mock generation failure".to_string()));
        }
        Ok(self.config.response.clone())
    }

    fn model_name(&self) -> &str {
        MOCK_MODEL
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(!self.config.unhealthy)
    }
}
