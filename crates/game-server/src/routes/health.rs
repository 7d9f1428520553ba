use axum::{Extension, Json};
use serde::Serialize;

use crate::state::Services;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
    pub waiting: usize,
}

pub async fn health_check(Extension(services): Extension<Services>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: services.sessions.len().await,
        waiting: services.queue.len().await,
    })
}
