//! Error types for Quill.

use thiserror::Error;

/// Result type alias using Quill's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Quill operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Project not found
    #[error("Project not found: {0}")]
    ProjectNotFound(uuid::Uuid),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Uniqueness conflict (duplicate project name, slug)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write attempted against a project that still requires confirmation
    #[error("Project {0} is not confirmed")]
    Unconfirmed(uuid::Uuid),

    /// Write attempted against a blocked project
    #[error("Project {0} is blocked")]
    Blocked(uuid::Uuid),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// A required backend (embeddings, chat) is not configured
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// True when the error is a Postgres unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_project_not_found() {
        let id = Uuid::nil();
        let err = Error::ProjectNotFound(id);
        assert_eq!(err.to_string(), format!("Project not found: {}", id));
    }

    #[test]
    fn test_error_display_document_not_found() {
        let id = Uuid::new_v4();
        let err = Error::DocumentNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_unconfirmed() {
        let id = Uuid::nil();
        let err = Error::Unconfirmed(id);
        assert_eq!(err.to_string(), format!("Project {} is not confirmed", id));
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("name taken".to_string());
        assert_eq!(err.to_string(), "Conflict: name taken");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        assert!(!Error::Conflict("x".into()).is_unique_violation());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
