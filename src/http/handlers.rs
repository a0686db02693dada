//! Health and readiness endpoints.
//!
//! `/health` reports dependencies and is advisory: an unhealthy peer makes
//! the service `degraded` but still 200. Only local failure (the storage
//! sink refusing writes) answers 503. `/ready` follows the lifecycle alone.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::client::HealthReport;
use crate::config::ServiceRole;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub role: ServiceRole,
    pub state: &'static str,
    pub dependencies: Vec<HealthReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ReadyBody {
    pub status: &'static str,
    pub service: String,
}

pub async fn health(State(state): State<AppState>) -> Response {
    let dependencies = state.client.check_all().await;
    let role = state.config.service.role;

    let storage = match role {
        ServiceRole::Delivery => Some(if state.storage.is_healthy() {
            "healthy"
        } else {
            "unhealthy"
        }),
        ServiceRole::Order => None,
    };

    let (code, status) = if storage == Some("unhealthy") {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else if dependencies.iter().all(HealthReport::is_healthy) {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::OK, "degraded")
    };

    tracing::info!(
        status,
        dependencies = dependencies.len(),
        "Health check completed"
    );

    let body = HealthBody {
        status,
        service: state.config.service.name.clone(),
        version: state.config.service.version.clone(),
        role,
        state: state.lifecycle.state().as_str(),
        dependencies,
        storage,
    };
    (code, Json(body)).into_response()
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let current = state.lifecycle.state();
    let code = if state.lifecycle.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = ReadyBody {
        status: current.as_str(),
        service: state.config.service.name.clone(),
    };
    (code, Json(body)).into_response()
}
