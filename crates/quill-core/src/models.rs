//! Core data models for Quill.
//!
//! These types are shared across all Quill crates and represent the core
//! domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::defaults::SNIPPET_LENGTH;
use crate::error::Error;

// =============================================================================
// PROJECT TYPES
// =============================================================================

/// Kind of writing project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Series,
    Book,
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Series => "series",
            ProjectKind::Book => "book",
        }
    }
}

impl fmt::Display for ProjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "series" => Ok(ProjectKind::Series),
            "book" => Ok(ProjectKind::Book),
            other => Err(Error::InvalidInput(format!(
                "unknown project kind '{}' (expected 'series' or 'book')",
                other
            ))),
        }
    }
}

/// A book or series that owns documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub kind: ProjectKind,
    pub parent_id: Option<Uuid>,
    pub confirmed: bool,
    pub require_confirmation: bool,
    pub blocked: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// A document with its reassembled body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    pub doc_type: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub meta: JsonValue,
    pub part_count: i32,
    pub byte_len: i64,
    pub content_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Summary view with a snippet in place of the body.
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id,
            project_id: self.project_id,
            doc_type: self.doc_type.clone(),
            title: self.title.clone(),
            snippet: snippet(&self.body),
            tags: self.tags.clone(),
            meta: self.meta.clone(),
            part_count: self.part_count,
            byte_len: self.byte_len,
            created_at_utc: self.created_at_utc,
            updated_at_utc: self.updated_at_utc,
            deleted_at: self.deleted_at,
            score: None,
        }
    }
}

/// Summary view of a document for listing and search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub project_id: Uuid,
    pub doc_type: String,
    pub title: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub meta: JsonValue,
    pub part_count: i32,
    pub byte_len: i64,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Full-text rank, present on search results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// First [`SNIPPET_LENGTH`] characters of a body with whitespace collapsed.
pub fn snippet(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_LENGTH)
        .collect()
}

// =============================================================================
// RETRIEVAL TYPES
// =============================================================================

pub use pgvector::Vector;

/// Embedded piece of a document ready to be stored.
#[derive(Debug, Clone)]
pub struct ChunkEmbedding {
    pub chunk_index: i32,
    pub text: String,
    pub vector: Vector,
}

/// A retrieval chunk matched by vector similarity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub document_id: Uuid,
    pub title: String,
    pub chunk_index: i32,
    pub text: String,
    /// Cosine similarity in [-1, 1]; higher is closer.
    pub score: f32,
}
