//! Health check endpoints.
//!
//! These endpoints are used by load balancers and orchestration systems
//! to determine if the service is healthy and ready to receive traffic.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status: "ok" or "degraded".
    pub status: String,

    /// Service name.
    pub service: String,

    /// Service version.
    pub version: String,

    /// Current timestamp (ISO 8601).
    pub timestamp: String,

    /// Detailed component health (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentHealth>,
}

/// Component health details.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ComponentHealth {
    /// Record store status.
    pub store: ComponentStatus,

    /// Certificate directory status.
    pub certificate_dir: ComponentStatus,
}

/// Individual component status.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ComponentStatus {
    /// Status: "ok" or "unavailable".
    pub status: String,

    /// Optional message with details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                status: "ok".to_string(),
                message: None,
            },
            Err(e) => Self {
                status: "unavailable".to_string(),
                message: Some(e.to_string()),
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Create health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/livez", get(livez))
}

fn response(status: &str, components: Option<ComponentHealth>) -> HealthResponse {
    HealthResponse {
        status: status.to_string(),
        service: "certify".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        components,
    }
}

/// Basic health check - is the service running?
///
/// This does not check dependencies.
async fn healthz() -> impl IntoResponse {
    Json(response("ok", None))
}

/// Readiness check - can certificates be issued and served?
///
/// Returns 503 if the store or the certificate directory is unusable.
async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let service = state.service();
    let components = ComponentHealth {
        store: ComponentStatus::from_result(service.store().health_check().await),
        certificate_dir: ComponentStatus::from_result(service.files().check_writable().await),
    };

    if components.store.is_ok() && components.certificate_dir.is_ok() {
        (StatusCode::OK, Json(response("ok", Some(components))))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(response("degraded", Some(components))),
        )
    }
}

/// Liveness check - is the service alive?
async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::files::CertificateFiles;
    use crate::service::CertificateService;
    use crate::store::MemoryStore;

    fn state(dir: std::path::PathBuf) -> AppState {
        AppState::new(CertificateService::new(
            "http://localhost:4000",
            CertificateFiles::new(dir),
            Arc::new(MemoryStore::new()),
        ))
    }

    async fn body(response: axum::response::Response) -> HealthResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let response = healthz().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await.service, "certify");
    }

    #[tokio::test]
    async fn test_livez_returns_ok() {
        let response = livez().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = readyz(State(state(dir.path().to_path_buf())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let health = body(response).await;
        assert_eq!(health.status, "ok");
        assert!(health.components.unwrap().store.is_ok());
    }

    #[tokio::test]
    async fn test_readyz_missing_dir_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let response = readyz(State(state(dir.path().join("missing"))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let components = body(response).await.components.unwrap();
        assert_eq!(components.certificate_dir.status, "unavailable");
        assert!(components.certificate_dir.message.is_some());
    }
}
