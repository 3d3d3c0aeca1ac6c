use axum::{http::StatusCode, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::services::session::{SessionStats, SessionStore};

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Point-in-time counts of in-memory session state
pub async fn session_stats(Extension(store): Extension<Arc<SessionStore>>) -> Json<SessionStats> {
    Json(store.stats())
}
