//! Embeddings and chat completions over any OpenAI-compatible HTTP API
//! (OpenAI itself, vLLM, LM Studio, llama.cpp server, ...).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use quill_core::{EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result, Vector};

use super::error::{to_quill_error, OpenAIErrorCode, Operation};
use super::types::*;

/// Used when only `OPENAI_API_KEY` is set.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

pub const DEFAULT_GEN_MODEL: &str = "gpt-4o-mini";

/// Output width of `text-embedding-3-small`.
pub const DEFAULT_DIMENSION: usize = 1536;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default sampling temperature for grounded answers.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Endpoint, models and request limits.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Everything before `/embeddings` and `/chat/completions`.
    pub base_url: String,
    /// Sent as a bearer token; local servers usually need none.
    pub api_key: Option<String>,
    pub embed_model: String,
    pub gen_model: String,
    /// Vectors of any other width are rejected.
    pub embed_dimension: usize,
    pub timeout_seconds: u64,
    /// Sampling temperature for chat completions.
    pub temperature: Option<f32>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            embed_dimension: DEFAULT_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }
}

impl OpenAIConfig {
    /// Read configuration from environment variables.
    ///
    /// Returns `None` when neither `OPENAI_API_KEY` nor `OPENAI_BASE_URL` is
    /// set, meaning no backend is configured.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let api_key = non_empty("OPENAI_API_KEY");
        let base_url = non_empty("OPENAI_BASE_URL");
        if api_key.is_none() && base_url.is_none() {
            return None;
        }

        Some(Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            embed_model: non_empty("OPENAI_EMBED_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string()),
            gen_model: non_empty("OPENAI_GEN_MODEL")
                .unwrap_or_else(|| DEFAULT_GEN_MODEL.to_string()),
            embed_dimension: parse_var(non_empty("OPENAI_EMBED_DIM")).unwrap_or(DEFAULT_DIMENSION),
            timeout_seconds: parse_var(non_empty("OPENAI_TIMEOUT")).unwrap_or(DEFAULT_TIMEOUT_SECS),
            temperature: parse_var(non_empty("OPENAI_TEMPERATURE")).or(Some(DEFAULT_TEMPERATURE)),
        })
    }
}

fn parse_var<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Backend used for both retrieval embeddings and answers.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            op = "init",
            base_url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            "Initializing OpenAI-compatible backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables; `Ok(None)` when not configured.
    pub fn from_env() -> Result<Option<Self>> {
        OpenAIConfig::from_env().map(Self::new).transpose()
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// POST to `endpoint`, with the bearer token when one is configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(self.url(endpoint));
        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }
        req
    }

    /// POST a JSON body and decode a JSON response, mapping API errors.
    async fn post_json<B, R>(&self, op: Operation, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let wrap = |msg: String| match op {
            Operation::Embedding => Error::Embedding(msg),
            Operation::Generation => Error::Inference(msg),
        };

        let response = self
            .build_request(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| wrap(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (message, error_type) = match serde_json::from_str::<OpenAIErrorResponse>(&text) {
                Ok(body) => (body.error.message, body.error.error_type.unwrap_or_default()),
                Err(_) if text.is_empty() => (status.to_string(), String::new()),
                Err(_) => (text, String::new()),
            };
            let code = OpenAIErrorCode::from_response(status.as_u16(), &error_type);
            warn!(
                subsystem = "inference",
                component = "openai",
                endpoint,
                status = status.as_u16(),
                error = %message,
                "OpenAI-compatible API returned an error"
            );
            return Err(to_quill_error(op, code, &message));
        }

        response
            .json()
            .await
            .map_err(|e| wrap(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
            encoding_format: Some("float".to_string()),
        };
        let result: EmbeddingResponse = self
            .post_json(Operation::Embedding, "/embeddings", &request)
            .await?;

        if result.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            )));
        }

        // Servers may answer out of order.
        let mut data = result.data;
        data.sort_by_key(|d| d.index);
        let vectors: Vec<Vector> = data
            .into_iter()
            .map(|d| Vector::from(d.embedding))
            .collect();

        debug!(
            subsystem = "inference",
            component = "openai",
            op = "embed",
            model = %self.config.embed_model,
            result_count = vectors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Embeddings generated"
        );
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: None,
            stream: false,
        };
        let result: ChatCompletionResponse = self
            .post_json(Operation::Generation, "/chat/completions", &request)
            .await?;

        let content = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Inference("completion returned no choices".to_string()))?;

        debug!(
            subsystem = "inference",
            component = "openai",
            op = "generate",
            model = %self.config.gen_model,
            prompt_len = prompt.len(),
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OpenAIBackend {
    async fn health_check(&self) -> Result<bool> {
        let mut req = self
            .client
            .get(self.url("/models"))
            .timeout(Duration::from_secs(5));
        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!(
                    subsystem = "inference",
                    component = "openai",
                    status = resp.status().as_u16(),
                    "Health check failed"
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "openai",
                    error = %e,
                    "Health check error"
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, DEFAULT_OPENAI_URL);
        assert_eq!(config.embed_model, DEFAULT_EMBED_MODEL);
        assert_eq!(config.gen_model, DEFAULT_GEN_MODEL);
        assert_eq!(config.embed_dimension, DEFAULT_DIMENSION);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_unconfigured_env_yields_none() {
        assert!(OpenAIConfig::from_lookup(lookup(&[])).is_none());
        assert!(OpenAIConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = OpenAIConfig::from_lookup(lookup(&[
            ("OPENAI_BASE_URL", "http://localhost:11434/v1"),
            ("OPENAI_EMBED_MODEL", "nomic-embed-text"),
            ("OPENAI_EMBED_DIM", "768"),
            ("OPENAI_TIMEOUT", "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert!(config.api_key.is_none());
        assert_eq!(config.embed_model, "nomic-embed-text");
        assert_eq!(config.embed_dimension, 768);
        assert_eq!(config.timeout_seconds, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_api_key_alone_uses_default_url() {
        let config = OpenAIConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_OPENAI_URL);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_model_name_accessors() {
        let config = OpenAIConfig {
            embed_model: "test-embed".to_string(),
            gen_model: "test-gen".to_string(),
            embed_dimension: 512,
            ..Default::default()
        };
        let backend = OpenAIBackend::new(config).unwrap();
        assert_eq!(EmbeddingBackend::model_name(&backend), "test-embed");
        assert_eq!(GenerationBackend::model_name(&backend), "test-gen");
        assert_eq!(backend.dimension(), 512);
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = OpenAIConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let backend = OpenAIBackend::new(config).unwrap();
        assert_eq!(backend.url("/embeddings"), "http://localhost:8080/v1/embeddings");
    }
}
