//! # quill-api
//!
//! HTTP server for the Quill writing backend: projects, multi-part documents,
//! tag/meta filtering, SSE typing playback and retrieval-augmented answers.
//!
//! The binary in `main.rs` wires PostgreSQL repositories and the
//! OpenAI-compatible backend into [`AppState`] and serves [`build_router`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use pagination::{ListResponse, PaginationMeta};
pub use routes::build_router;
pub use state::AppState;
