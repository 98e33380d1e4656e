use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::HashMap;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` while trials are scored with the fallback
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime: u64,
    pub checks: HashMap<String, String>,
}

/// Liveness plus the configured collaborators
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.therapy.provider_name();

    let mut checks = HashMap::new();
    checks.insert("assessment_provider".to_string(), provider.to_string());
    checks.insert("storage".to_string(), state.storage_backend.to_string());

    let status = if provider == "unconfigured" { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.started_at.elapsed().as_secs(),
        checks,
    })
}
