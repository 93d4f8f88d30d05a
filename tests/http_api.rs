//! HTTP API tests, driven in-process through the router.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use patch_bridge::server::{router, AppState};
use patch_bridge::Session;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(files: &[(&str, &str)]) -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    for (name, text) in files {
        fs::write(dir.path().join(name), text).unwrap();
    }
    let session = Session::new(dir.path()).unwrap();
    (dir, router(AppState::new(session)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |text| Body::from(text.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(&body.to_string())).await
}

#[tokio::test]
async fn test_context_shape() {
    let (_dir, app) = app(&[("a.py", "def a():\n    pass\n")]);

    let (status, body) = send(&app, "GET", "/context", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files_count"], 0);
    assert_eq!(body["git_status"], "");
    assert_eq!(body["active_files"], json!([]));
    assert!(body["repo_map"].as_str().unwrap().contains("def a()"));
}

#[tokio::test]
async fn test_chat_echo_and_missing_message() {
    let (_dir, app) = app(&[]);

    let (status, body) = post(&app, "/chat", json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": "Echo: hello" }));

    let (status, body) = post(&app, "/chat", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No message provided" }));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (_dir, app) = app(&[]);

    let (status, body) = send(&app, "POST", "/chat", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn test_add_files_then_context() {
    let (_dir, app) = app(&[("a.py", "x = 1\n")]);

    let (status, body) = post(&app, "/files", json!({ "fnames": ["a.py", "new.py"] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Added 2 file(s) to the chat." }));

    let (_, body) = send(&app, "GET", "/context", None).await;
    assert_eq!(body["active_files"], json!(["a.py", "new.py"]));
}

#[tokio::test]
async fn test_add_files_errors() {
    let (_dir, app) = app(&[]);

    let (status, body) = post(&app, "/files", json!({ "fnames": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No filenames provided" }));

    let (status, body) = post(&app, "/files", json!({ "fnames": "a.py" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "'fnames' must be a list of strings" }));

    let (status, _) = post(&app, "/files", json!({ "fnames": ["../outside.py"] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_execute_applies_change() {
    let (dir, app) = app(&[("f.py", "def f():\n    return 1\n")]);
    let yaml = "code_changes:\n  - file: f.py\n    search: return 1\n    replace: return 2\n";

    let (status, body) = post(&app, "/execute", json!({ "yaml_content": yaml })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["claude_feedback"],
        "✅ Applied 1 change(s)\n\nPlease verify changes and provide next steps in YAML."
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("f.py")).unwrap(),
        "def f():\n    return 2\n"
    );
}

#[tokio::test]
async fn test_execute_no_match_is_feedback_not_error() {
    let (_dir, app) = app(&[("f.py", "def f():\n    return 1\n")]);
    let yaml = "code_changes:\n  - file: f.py\n    search: return 9\n    replace: return 2\n";

    let (status, body) = post(&app, "/execute", json!({ "yaml_content": yaml })).await;
    assert_eq!(status, StatusCode::OK);
    let feedback = body["claude_feedback"].as_str().unwrap();
    assert!(feedback.starts_with("❌ Error applying changes:\nSEARCH block failed to match in f.py"));
    assert!(feedback.contains("Did you mean to match these lines?\n    return 1"));
}

#[tokio::test]
async fn test_execute_bad_documents() {
    let (_dir, app) = app(&[]);

    let (status, body) = post(&app, "/execute", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No yaml_content provided" }));

    let (status, body) = post(&app, "/execute", json!({ "yaml_content": "- a\n- b\n" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "YAML must be a dictionary" }));

    let (status, body) = post(&app, "/execute", json!({ "yaml_content": "other: 1\n" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "YAML must contain 'files_needed' or 'code_changes'" }));
}

#[tokio::test]
async fn test_files_needed_over_http() {
    let (_dir, app) = app(&[("a.py", "x = 1")]);
    let yaml = "files_needed: [a.py]\n";

    let (status, body) = post(&app, "/execute", json!({ "yaml_content": yaml })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["claude_feedback"]
        .as_str()
        .unwrap()
        .contains("### a.py\n```\nx = 1\n```"));
}
