//! JSON-over-HTTP surface for a [`Session`].
//!
//! | method | path       | body                    |
//! |--------|------------|-------------------------|
//! | GET    | `/context` |                         |
//! | POST   | `/chat`    | `{"message": str}`      |
//! | POST   | `/files`   | `{"fnames": [str]}`     |
//! | POST   | `/execute` | `{"yaml_content": str}` |
//!
//! Errors are `{"error": str}` with 400 for bad input and 500 otherwise.
//! Blocking session work runs on tokio's blocking pool; requests are
//! serialized on the session mutex.

use crate::session::{ContextReport, Session};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<Session>>,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/context", get(context))
        .route("/chat", post(chat))
        .route("/files", post(add_files))
        .route("/execute", post(execute))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn serve(addr: SocketAddr, session: Session) -> std::io::Result<()> {
    let app = router(AppState::new(session));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "patch bridge listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
}

/// Run `f` against the session on the blocking pool.
async fn with_session<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Session) -> T + Send + 'static,
    T: Send + 'static,
{
    let shared = Arc::clone(&state.session);
    tokio::task::spawn_blocking(move || {
        let mut session = lock_session(&shared);
        f(&mut session)
    })
    .await
    .map_err(|e| ApiError::internal(format!("session task failed: {e}")))
}

/// Lock the session, recovering it if an earlier request panicked while
/// holding the lock.
fn lock_session(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("recovering session after a panicked request");
        session.clear_poison();
        poisoned.into_inner()
    })
}

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

/// A non-empty string field, or the given 400 message.
fn required_text(payload: &Value, field: &str, missing: &str) -> Result<String, ApiError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request(missing))
}

async fn context(State(state): State<AppState>) -> Result<Json<ContextReport>, ApiError> {
    let report = with_session(&state, |session| session.context()).await?;
    Ok(Json(report))
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let payload = parse_body(&body)?;
    let message = required_text(&payload, "message", "No message provided")?;

    let response = with_session(&state, move |session| session.chat(&message))
        .await?
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(json!({ "response": response })))
}

async fn add_files(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let payload = parse_body(&body)?;
    let names = file_names(&payload)?;

    let message = with_session(&state, move |session| session.add_files(&names))
        .await?
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(json!({ "message": message })))
}

fn file_names(payload: &Value) -> Result<Vec<String>, ApiError> {
    let fnames = payload.get("fnames").unwrap_or(&Value::Null);
    let empty = match fnames {
        Value::Null | Value::Bool(false) => true,
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    };
    if empty {
        return Err(ApiError::bad_request("No filenames provided"));
    }

    let not_strings = || ApiError::bad_request("'fnames' must be a list of strings");
    let items = fnames.as_array().ok_or_else(not_strings)?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(not_strings))
        .collect()
}

async fn execute(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let payload = parse_body(&body)?;
    let yaml = required_text(&payload, "yaml_content", "No yaml_content provided")?;

    let feedback = with_session(&state, move |session| session.execute_yaml(&yaml))
        .await?
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(json!({ "claude_feedback": feedback })))
}
