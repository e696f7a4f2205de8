use axum::{Router, routing::{get, post}};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, AllowOrigin};
use axum::http::Method;
use crate::AppState;
use crate::api::handlers;

pub fn router(state: Arc<AppState>) -> Router {
    // The camera page may be served from anywhere, including file://
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(vec![axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/stats/reset", post(handlers::reset_stats))
        .route("/faces/register", post(handlers::register_face))
        .route("/faces", get(handlers::list_faces).delete(handlers::clear_faces))
        .route("/frames", post(handlers::submit_frame))
        .route("/recognize", post(handlers::recognize))
        .route("/recognition/start", post(handlers::start_recognition))
        .route("/recognition/stop", post(handlers::stop_recognition))
        .route("/recognition/status", get(handlers::recognition_status))
        .route("/log", get(handlers::activity_log))
        .route("/alerts/current", get(handlers::current_alert))
        .layer(cors)
        .with_state(state)
}
