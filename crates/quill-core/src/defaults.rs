//! Centralized default constants for Quill.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// DOCUMENT STORAGE
// =============================================================================

/// Bodies larger than this many UTF-8 bytes are stored as multiple parts.
pub const MAX_PART_BYTES: usize = 32 * 1024;

/// Lower bound accepted for a configured part size.
pub const MIN_PART_BYTES: usize = 256;

/// Default document type when none is supplied.
pub const DOC_TYPE: &str = "note";

/// Maximum project name length in characters.
pub const PROJECT_NAME_MAX_LEN: usize = 200;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Largest accepted page size.
pub const PAGE_LIMIT_MAX: i64 = 500;

/// Default page size for search endpoints.
pub const PAGE_LIMIT_SEARCH: i64 = 20;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// SNIPPET
// =============================================================================

/// Snippet length in characters for list and search results.
pub const SNIPPET_LENGTH: usize = 200;

// =============================================================================
// TYPING STREAM
// =============================================================================

/// Characters emitted per SSE chunk.
pub const STREAM_CHUNK_CHARS: usize = 24;

/// Largest accepted SSE chunk size.
pub const STREAM_CHUNK_CHARS_MAX: usize = 4096;

/// Delay between SSE chunks in milliseconds.
pub const STREAM_INTERVAL_MS: u64 = 30;

/// Largest accepted SSE delay.
pub const STREAM_INTERVAL_MS_MAX: u64 = 5000;

/// SSE keep-alive interval in seconds.
pub const STREAM_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Bytes per retrieval chunk when indexing documents for RAG.
pub const RAG_CHUNK_BYTES: usize = 1000;

/// Default number of chunks used as context.
pub const RAG_TOP_K: i64 = 5;

/// Largest accepted top_k.
pub const RAG_TOP_K_MAX: i64 = 20;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default request body limit in bytes.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Default database pool size.
pub const DB_MAX_CONNECTIONS: u32 = 10;
