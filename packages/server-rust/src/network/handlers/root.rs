//! Root informational endpoint and liveness probe.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

/// Payload of the root endpoint.
#[derive(Debug, Serialize)]
pub struct ServiceDescriptor {
    pub message: String,
    pub version: String,
}

/// Returns the configured service description and the resolved version.
pub async fn root_handler(State(state): State<AppState>) -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        message: state.info.description.clone(),
        version: state.info.version.clone(),
    })
}

/// Liveness probe -- always returns `OK`.
///
/// Only checks that the process is up and responsive; there are no
/// downstream dependencies to consult in this shell.
pub async fn health_handler() -> &'static str {
    "OK"
}
