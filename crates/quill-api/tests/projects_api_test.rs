//! Project endpoints: creation, confirmation, flags and soft delete.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn test_health_reports_version_and_rag() {
    let app = TestApp::new();
    let res = app.get("/health").await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rag"], false);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::new();
    let res = app.get("/health").await;
    let id = res.header("x-request-id").expect("x-request-id header");
    assert!(id.parse::<uuid::Uuid>().is_ok());
}

#[tokio::test]
async fn test_create_project_defaults() {
    let app = TestApp::new();
    let res = app
        .post("/api/v1/projects", json!({"name": "  The Long Night ", "kind": "book"}))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let body = res.json();
    assert_eq!(body["name"], "The Long Night");
    assert_eq!(body["slug"], "the-long-night");
    assert_eq!(body["confirmed"], false);
    assert_eq!(body["require_confirmation"], true);
    assert_eq!(body["blocked"], false);
}

#[tokio::test]
async fn test_duplicate_project_name_is_conflict() {
    let app = TestApp::new();
    app.project("Harbor Lights", false).await;

    let res = app
        .post("/api/v1/projects", json!({"name": "HARBOR lights", "kind": "series"}))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert!(res.json()["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_invalid_kind_and_missing_fields_are_bad_request() {
    let app = TestApp::new();
    let res = app
        .post("/api/v1/projects", json!({"name": "Ash", "kind": "chapter"}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/api/v1/projects", json!({"name": "Ash"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.post("/api/v1/projects", json!({"kind": "book"})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_book_under_series() {
    let app = TestApp::new();
    let series = app
        .post("/api/v1/projects", json!({"name": "Tidewater", "kind": "series"}))
        .await
        .id();

    let book = app
        .post(
            "/api/v1/projects",
            json!({"name": "Tidewater I", "kind": "book", "parent_id": series}),
        )
        .await;
    assert_eq!(book.status, StatusCode::CREATED);
    assert_eq!(book.json()["parent_id"], series.to_string());

    let nested_series = app
        .post(
            "/api/v1/projects",
            json!({"name": "Tidewater Prime", "kind": "series", "parent_id": series}),
        )
        .await;
    assert_eq!(nested_series.status, StatusCode::BAD_REQUEST);

    let children = app
        .get(&format!("/api/v1/projects?parent_id={}", series))
        .await
        .json();
    assert_eq!(children["pagination"]["total"], 1);
    assert_eq!(children["data"][0]["name"], "Tidewater I");
}

#[tokio::test]
async fn test_confirm_is_idempotent() {
    let app = TestApp::new();
    let id = app.project("Confirm Me", false).await;
    let uri = format!("/api/v1/projects/{}/confirm", id);

    let first = app.post(&uri, json!(null)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["confirmed"], true);

    let second = app.post(&uri, json!(null)).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.json()["confirmed"], true);
    assert_eq!(first.json()["updated_at_utc"], second.json()["updated_at_utc"]);
}

#[tokio::test]
async fn test_list_projects_pagination() {
    let app = TestApp::new();
    for name in ["One", "Two", "Three"] {
        app.project(name, false).await;
    }

    let page = app.get("/api/v1/projects?limit=2").await.json();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(
        page["pagination"],
        json!({"total": 3, "limit": 2, "offset": 0, "has_more": true})
    );

    let last = app.get("/api/v1/projects?limit=2&offset=2").await.json();
    assert_eq!(last["data"][0]["name"], "Three");
    assert_eq!(last["pagination"]["has_more"], false);

    let rejected = app.get("/api/v1/projects?limit=0").await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    let rejected = app.get("/api/v1/projects?limit=501").await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_soft_delete_and_restore_project() {
    let app = TestApp::new();
    let id = app.project("Vanishing", true).await;
    let uri = format!("/api/v1/projects/{}", id);

    assert_eq!(app.delete(&uri).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri).await.status, StatusCode::NOT_FOUND);
    let listed = app.get("/api/v1/projects").await.json();
    assert_eq!(listed["pagination"]["total"], 0);
    let with_deleted = app.get("/api/v1/projects?include_deleted=true").await.json();
    assert_eq!(with_deleted["pagination"]["total"], 1);

    let restore = format!("/api/v1/projects/{}/restore", id);
    assert_eq!(app.post(&restore, json!(null)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri).await.status, StatusCode::OK);
    // Restoring a live project is a 404.
    assert_eq!(app.post(&restore, json!(null)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_project_flags() {
    let app = TestApp::new();
    let id = app.project("Flags", false).await;
    let res = app
        .patch(
            &format!("/api/v1/projects/{}", id),
            json!({"require_confirmation": false, "blocked": true}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["require_confirmation"], false);
    assert_eq!(body["blocked"], true);
}

#[tokio::test]
async fn test_unknown_project_is_not_found() {
    let app = TestApp::new();
    let res = app
        .get(&format!("/api/v1/projects/{}", uuid::Uuid::now_v7()))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(res.json()["error"].is_string());
}
