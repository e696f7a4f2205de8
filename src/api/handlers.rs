use std::sync::Arc;
use std::time::Duration;
use axum::{extract::{State, Query}, http::StatusCode, Json, response::IntoResponse};
use serde::Deserialize;
use tracing::{error, info};
use crate::{AppState, db};
use crate::models::detection::Frame;
use crate::pipeline::session::{Registration, SessionError};

fn error_response(e: &SessionError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match e {
        SessionError::MissingIdentity | SessionError::InvalidDescriptor(_) => StatusCode::BAD_REQUEST,
        SessionError::NoFaceFound => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::NoRegisteredFaces => StatusCode::CONFLICT,
        SessionError::Storage(inner) => {
            error!("storage error: {:#}", inner);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

fn join_error(e: tokio::task::JoinError) -> (StatusCode, Json<serde_json::Value>) {
    error!("blocking task failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": "internal error" })))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let v = env!("CARGO_PKG_VERSION");
    let stored_keys = {
        let conn = state.db.lock();
        db::query::count_keys(&conn).unwrap_or(0)
    };
    let backend_libraries = vec![
        "tokio - Async runtime".to_string(),
        "axum - Web framework".to_string(),
        "tower-http - HTTP middleware".to_string(),
        "serde - Serialization framework".to_string(),
        "chrono - Date and time handling".to_string(),
        "rusqlite - SQLite database".to_string(),
        "tracing - Structured logging".to_string(),
        "anyhow - Error handling".to_string(),
        "parking_lot - Synchronization primitives".to_string(),
        "reqwest - HTTP client".to_string(),
    ];
    let body = serde_json::json!({
        "status": "ok",
        "version": v,
        "database": "SQLite",
        "stored_keys": stored_keys,
        "data_dir": state.paths.data.to_string_lossy(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "recognition_running": state.session.is_running(),
        "backend_libraries": backend_libraries
    });
    (StatusCode::OK, Json(body))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.stats.snapshot()))
}

pub async fn reset_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.stats.reset();
    (StatusCode::OK, Json(serde_json::json!({ "success": true })))
}

pub async fn list_faces(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let faces = state.session.registered();
    (StatusCode::OK, Json(serde_json::json!({
        "total": faces.len(),
        "items": faces
    })))
}

pub async fn register_face(State(state): State<Arc<AppState>>, Json(req): Json<Registration>) -> impl IntoResponse {
    let session = state.session.clone();
    let result = tokio::task::spawn_blocking(move || session.register(req)).await;
    match result {
        Ok(Ok(outcome)) => {
            let message = format!("Registered {} ({})", outcome.name, outcome.fee);
            (StatusCode::OK, Json(serde_json::json!({
                "success": true,
                "message": message,
                "registration": outcome
            }))).into_response()
        }
        Ok(Err(e)) => error_response(&e).into_response(),
        Err(e) => join_error(e).into_response(),
    }
}

pub async fn clear_faces(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.clone();
    let result = tokio::task::spawn_blocking(move || session.clear_all()).await;
    match result {
        Ok(Ok(())) => (StatusCode::OK, Json(serde_json::json!({
            "success": true,
            "message": "All registered faces cleared"
        }))).into_response(),
        Ok(Err(e)) => error_response(&e).into_response(),
        Err(e) => join_error(e).into_response(),
    }
}

pub async fn submit_frame(State(state): State<Arc<AppState>>, Json(frame): Json<Frame>) -> impl IntoResponse {
    let faces = frame.detections.len();
    state.session.submit_frame(frame);
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "accepted": faces })))
}

pub async fn recognize(State(state): State<Arc<AppState>>, Json(frame): Json<Frame>) -> impl IntoResponse {
    match state.session.process_frame(&frame, chrono::Utc::now()).await {
        Ok(results) => (StatusCode::OK, Json(serde_json::json!({ "results": results }))).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub interval_ms: Option<u64>,
}

pub async fn start_recognition(State(state): State<Arc<AppState>>, body: Option<Json<StartRequest>>) -> impl IntoResponse {
    let interval = body
        .and_then(|Json(req)| req.interval_ms)
        .map(Duration::from_millis);
    match state.session.start_recognition(interval) {
        Ok(outcome) => {
            if !outcome.started {
                info!("start requested while recognition already running");
            }
            (StatusCode::OK, Json(serde_json::json!(outcome))).into_response()
        }
        Err(e) => error_response(&e).into_response(),
    }
}

pub async fn stop_recognition(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stopped = state.session.stop_recognition();
    (StatusCode::OK, Json(serde_json::json!({ "stopped": stopped })))
}

pub async fn recognition_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.status()))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

pub async fn activity_log(State(state): State<Arc<AppState>>, Query(q): Query<LogQuery>) -> impl IntoResponse {
    let mut entries = state.session.activity_log();
    if let Some(limit) = q.limit {
        entries.truncate(limit);
    }
    (StatusCode::OK, Json(serde_json::json!({ "items": entries })))
}

pub async fn current_alert(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let alert = state.session.current_alert(chrono::Utc::now());
    (StatusCode::OK, Json(serde_json::json!({ "alert": alert })))
}
