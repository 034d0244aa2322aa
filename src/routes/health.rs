//! Liveness probe (/health, /healthz)

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// "development" or "production"
    pub mode: &'static str,
    /// Document backend ("mongodb" or "memory")
    pub database: &'static str,
    /// Blob store ("s3" or "memory")
    pub blob_store: &'static str,
    pub timestamp: String,
}

/// Always 200 while the process is serving
pub fn health_check(state: &AppState) -> Response<BoxBody> {
    let response = HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        database: state.services.backend_name(),
        blob_store: state.services.blob_store().name(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    json_response(StatusCode::OK, &response)
}
