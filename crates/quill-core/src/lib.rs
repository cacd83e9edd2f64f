//! # quill-core
//!
//! Core types, traits, and abstractions for the Quill writing API.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other Quill crates depend on.
//!
//! ## Logging
//!
//! Events carry `subsystem` (`api`, `db`, `inference`, `rag`), `component`
//! and `op`, plus `project_id`, `document_id`, `part_count`, `chunk_count`,
//! `result_count`, `model` and `duration_ms` where they apply.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | 5xx responses, failed startup |
//! | WARN  | Bypassed confirmation, failed background indexing, bad config values |
//! | INFO  | Startup, writes, reindex and answer completions |
//! | DEBUG | Retrieval results, per-document indexing, pool usage |

pub mod defaults;
pub mod error;
pub mod filter;
pub mod gate;
pub mod models;
pub mod slug;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use filter::*;
pub use gate::{ensure_writable, is_bypassed};
pub use models::*;
pub use slug::{next_available_slug, slugify};
pub use traits::*;
