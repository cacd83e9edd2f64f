//! Router and middleware stack.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::parse_allowed_origins;
use crate::handlers::{documents, export, health, projects, rag, stream};
use crate::AppState;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Routes addressed by document id, mounted under `/documents` and `/docs`.
fn document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:id",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/:id/restore", post(documents::restore_document))
        .route("/:id/export", get(export::export_document))
        .route("/:id/stream", get(stream::stream_document))
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins = parse_allowed_origins(&state.config.allowed_origins);
    let max_body_bytes = state.config.max_body_bytes;

    let api = Router::new()
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/:id/confirm", post(projects::confirm_project))
        .route("/projects/:id/restore", post(projects::restore_project))
        .route(
            "/projects/:id/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/projects/:id/documents/search",
            post(documents::search_documents),
        )
        .route(
            "/projects/:id/docs",
            get(documents::list_documents).post(documents::create_document),
        )
        .route("/projects/:id/docs/search", post(documents::search_documents))
        .route("/projects/:id/export", get(export::export_project))
        .route("/projects/:id/reindex", post(rag::reindex_project))
        .route("/projects/:id/ask", post(rag::ask))
        .nest("/documents", document_routes())
        .nest("/docs", document_routes());

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static("x-request-id"),
                ])
                .expose_headers([
                    header::CONTENT_DISPOSITION,
                    HeaderName::from_static("x-request-id"),
                ]),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}
