//! HTTP surface, driven through the router without a socket.

#![cfg(feature = "server")]

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{mock_config, MockBrowser, MockUploader, ToolState};
use remarkdown::server::build_router;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

fn app(work: &Path, browser: Arc<MockBrowser>, uploader: Arc<MockUploader>) -> Router {
    build_router(mock_config(work, browser, uploader))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_tool_availability() {
    let work = tempfile::tempdir().unwrap();
    let app = app(work.path(), MockBrowser::new(10.0), MockUploader::new(ToolState::Ready));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["externalToolAvailable"], true);
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn health_still_ok_without_tool() {
    let work = tempfile::tempdir().unwrap();
    let app = app(work.path(), MockBrowser::new(10.0), MockUploader::new(ToolState::NotInstalled));

    let body = json_body(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["externalToolAvailable"], false);
}

#[tokio::test]
async fn convert_rejects_missing_markdown_with_400() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(10.0);
    let app = app(work.path(), browser.clone(), MockUploader::new(ToolState::Ready));

    let response = app.oneshot(post_json("/convert", json!({ "filename": "x" }))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Markdown content is required");
    assert_eq!(browser.launch_count(), 0);
}

#[tokio::test]
async fn convert_uploads_and_reports_location() {
    let work = tempfile::tempdir().unwrap();
    let uploader = MockUploader::new(ToolState::Ready);
    let app = app(work.path(), MockBrowser::new(720.0), uploader.clone());

    let response = app
        .oneshot(post_json(
            "/convert",
            json!({ "markdown": "# Hi\n\ntext", "filename": "answer", "folder": "/Notes" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["folder"], "/Notes");
    let filename = body["filename"].as_str().unwrap();
    assert!(filename.starts_with("answer-") && filename.ends_with(".pdf"));
    assert!(body["message"].as_str().unwrap().contains("/Notes"));
    assert_eq!(uploader.uploads().len(), 1);
}

#[tokio::test]
async fn unauthenticated_tool_maps_to_503_with_instructions() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(10.0);
    let app = app(work.path(), browser.clone(), MockUploader::new(ToolState::NotAuthenticated));

    let response = app
        .oneshot(post_json("/convert", json!({ "markdown": "# Hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["instructions"].as_str().unwrap().starts_with("Run: rmapi"));
    assert_eq!(browser.launch_count(), 0);
    assert_eq!(common::entries(work.path()), 0);
}

#[tokio::test]
async fn rejected_upload_maps_to_502() {
    let work = tempfile::tempdir().unwrap();
    let app = app(work.path(), MockBrowser::new(10.0), MockUploader::rejecting());

    let response = app
        .oneshot(post_json("/convert", json!({ "markdown": "# Hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn pdf_only_returns_attachment() {
    let work = tempfile::tempdir().unwrap();
    let uploader = MockUploader::new(ToolState::NotInstalled);
    let app = app(work.path(), MockBrowser::new(400.0), uploader.clone());

    let response = app
        .oneshot(post_json(
            "/convert-pdf-only",
            json!({ "markdown": "# Report\n\n| a | b |\n|---|---|\n| 1 | 2 |", "filename": "report" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"report-"), "{disposition}");
    assert!(disposition.ends_with(".pdf\""), "{disposition}");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert!(uploader.uploads().is_empty());
    assert_eq!(common::entries(work.path()), 0);
}

#[tokio::test]
async fn preview_returns_html_without_a_browser() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(10.0);
    let app = app(work.path(), browser.clone(), MockUploader::new(ToolState::Ready));

    let response = app
        .oneshot(post_json("/preview", json!({ "markdown": "# Hi\n\n<img src=x onerror=alert(1)>" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(html.contains("<h1>Hi</h1>"));
    assert!(!html.contains("<img"));
    assert_eq!(browser.launch_count(), 0);
}

#[tokio::test]
async fn folders_lead_with_root_and_default() {
    let work = tempfile::tempdir().unwrap();
    let app = app(work.path(), MockBrowser::new(10.0), MockUploader::new(ToolState::Ready));

    let body = json_body(app.oneshot(get("/folders")).await.unwrap()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["folders"], json!(["/", "/LLM-Outputs", "/Books"]));
}

#[tokio::test]
async fn malformed_json_is_a_structured_400() {
    let work = tempfile::tempdir().unwrap();
    let app = app(work.path(), MockBrowser::new(10.0), MockUploader::new(ToolState::Ready));

    let request = Request::builder()
        .method("POST")
        .uri("/convert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(10.0);
    let config = remarkdown::ConversionConfig::builder()
        .work_dir(work.path())
        .browser(browser.clone())
        .uploader(MockUploader::new(ToolState::Ready))
        .max_body_bytes(2048)
        .build()
        .unwrap();
    let app = build_router(config);

    let big = "x".repeat(8192);
    let response = app
        .oneshot(post_json("/convert-pdf-only", json!({ "markdown": big })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(browser.launch_count(), 0);
}
