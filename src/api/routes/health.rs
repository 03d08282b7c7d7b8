use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub data: HealthStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    /// Seconds since the server started
    pub uptime: f64,
    pub timestamp: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        data: HealthStatus {
            status: "healthy",
            uptime: state.started_at.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        },
    })
}
