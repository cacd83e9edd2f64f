//! Server configuration read from the environment.
//!
//! Environment variables:
//!   HOST, PORT                   - bind address (default 0.0.0.0:3000)
//!   DATABASE_URL                 - PostgreSQL connection string
//!   ALLOWED_ORIGINS              - comma-separated CORS origins
//!   MAX_BODY_BYTES               - request body limit (default 16 MiB)
//!   DB_MAX_CONNECTIONS           - pool size
//!   QUILL_BYPASS_CONFIRMATION    - "true" lets writes skip project confirmation
//!   QUILL_MAX_PART_BYTES         - stored part size for large bodies
//!   QUILL_CHUNK_STRATEGY         - "paragraph" or "fixed"
//!   QUILL_STREAM_CHUNK_CHARS     - default characters per SSE chunk
//!   QUILL_STREAM_INTERVAL_MS     - default delay between SSE chunks
//!   QUILL_RAG_TOP_K              - default retrieval depth for /ask
//!   QUILL_RAG_ENABLED            - "false" disables the inference backend

use std::str::FromStr;

use axum::http::HeaderValue;
use tracing::warn;

use quill_core::defaults;
use quill_db::{BodySplitter, ChunkStrategy};

/// Default origins when `ALLOWED_ORIGINS` is unset or empty.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub db_max_connections: u32,
    pub bypass_confirmation: bool,
    pub max_part_bytes: usize,
    pub chunk_strategy: ChunkStrategy,
    pub stream_chunk_chars: usize,
    pub stream_interval_ms: u64,
    pub rag_top_k: i64,
    pub rag_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: defaults::SERVER_PORT,
            database_url: "postgres://localhost/quill".to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_body_bytes: defaults::MAX_BODY_BYTES,
            db_max_connections: defaults::DB_MAX_CONNECTIONS,
            bypass_confirmation: false,
            max_part_bytes: defaults::MAX_PART_BYTES,
            chunk_strategy: ChunkStrategy::default(),
            stream_chunk_chars: defaults::STREAM_CHUNK_CHARS,
            stream_interval_ms: defaults::STREAM_INTERVAL_MS,
            rag_top_k: defaults::RAG_TOP_K,
            rag_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Invalid values fall back to the
    /// default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base = Self::default();

        let allowed_origins = get("ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(base.allowed_origins);

        let stream_chunk_chars: usize = parse_or(
            get("QUILL_STREAM_CHUNK_CHARS"),
            "QUILL_STREAM_CHUNK_CHARS",
            base.stream_chunk_chars,
        );
        let stream_interval_ms: u64 = parse_or(
            get("QUILL_STREAM_INTERVAL_MS"),
            "QUILL_STREAM_INTERVAL_MS",
            base.stream_interval_ms,
        );
        let rag_top_k: i64 = parse_or(get("QUILL_RAG_TOP_K"), "QUILL_RAG_TOP_K", base.rag_top_k);

        Self {
            host: get("HOST").unwrap_or(base.host),
            port: parse_or(get("PORT"), "PORT", base.port),
            database_url: get("DATABASE_URL").unwrap_or(base.database_url),
            allowed_origins,
            max_body_bytes: parse_or(get("MAX_BODY_BYTES"), "MAX_BODY_BYTES", base.max_body_bytes),
            db_max_connections: parse_or(
                get("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                base.db_max_connections,
            ),
            bypass_confirmation: parse_flag(
                get("QUILL_BYPASS_CONFIRMATION"),
                "QUILL_BYPASS_CONFIRMATION",
                base.bypass_confirmation,
            ),
            max_part_bytes: parse_or(
                get("QUILL_MAX_PART_BYTES"),
                "QUILL_MAX_PART_BYTES",
                base.max_part_bytes,
            ),
            chunk_strategy: parse_or(
                get("QUILL_CHUNK_STRATEGY"),
                "QUILL_CHUNK_STRATEGY",
                base.chunk_strategy,
            ),
            stream_chunk_chars: stream_chunk_chars.clamp(1, defaults::STREAM_CHUNK_CHARS_MAX),
            stream_interval_ms: stream_interval_ms.min(defaults::STREAM_INTERVAL_MS_MAX),
            rag_top_k: rag_top_k.clamp(1, defaults::RAG_TOP_K_MAX),
            rag_enabled: parse_flag(
                get("QUILL_RAG_ENABLED"),
                "QUILL_RAG_ENABLED",
                base.rag_enabled,
            ),
        }
    }

    /// Splitter for stored document parts.
    pub fn splitter(&self) -> BodySplitter {
        BodySplitter::new(self.chunk_strategy, self.max_part_bytes)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match value {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    subsystem = "api",
                    component = "config",
                    key,
                    value = %raw,
                    fallback = ?default,
                    "Invalid configuration value, using default"
                );
                default
            }
        },
    }
}

fn parse_flag(value: Option<String>, key: &str, default: bool) -> bool {
    let Some(raw) = value else {
        return default;
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(
                subsystem = "api",
                component = "config",
                key,
                value = %raw,
                fallback = default,
                "Invalid boolean configuration value, using default"
            );
            default
        }
    }
}

/// Parse configured origins into header values for the CORS layer.
///
/// Entries that are not valid header values are skipped with a warning. An
/// empty result falls back to [`DEFAULT_ALLOWED_ORIGINS`].
pub fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Invalid origin in ALLOWED_ORIGINS, skipping");
                None
            }
        })
        .collect();

    if parsed.is_empty() {
        DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|s| HeaderValue::from_static(s))
            .collect()
    } else {
        parsed
    }
}
