//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

/// Error returned by every handler. Rendered as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(quill_core::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<quill_core::Error> for ApiError {
    fn from(err: quill_core::Error) -> Self {
        use quill_core::Error;

        if err.is_unique_violation() {
            return ApiError::Conflict(err.to_string());
        }
        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::ProjectNotFound(_) | Error::DocumentNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Blocked(_) => ApiError::Forbidden(err.to_string()),
            Error::Unconfirmed(id) => ApiError::PreconditionFailed(format!(
                "Project {} requires confirmation before documents can be changed; \
                 POST /api/v1/projects/{}/confirm first",
                id, id
            )),
            Error::Unavailable(msg) => ApiError::Unavailable(msg),
            Error::Embedding(_) | Error::Inference(_) | Error::Request(_) => {
                ApiError::Upstream(err.to_string())
            }
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(subsystem = "api", status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Error;
    use uuid::Uuid;

    #[test]
    fn test_core_errors_map_to_status() {
        let id = Uuid::now_v7();
        let cases = [
            (Error::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (Error::ProjectNotFound(id), StatusCode::NOT_FOUND),
            (Error::DocumentNotFound(id), StatusCode::NOT_FOUND),
            (Error::Conflict("dup".into()), StatusCode::CONFLICT),
            (Error::Blocked(id), StatusCode::FORBIDDEN),
            (Error::Unconfirmed(id), StatusCode::PRECONDITION_FAILED),
            (Error::Unavailable("no backend".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::Embedding("timeout".into()), StatusCode::BAD_GATEWAY),
            (Error::Internal("missing part 2".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Config("bad key".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_unconfirmed_message_names_project() {
        let id = Uuid::now_v7();
        let err = ApiError::from(Error::Unconfirmed(id));
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.to_string().contains("confirm"));
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::Conflict("Project name already exists".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Project name already exists"}));
    }
}
