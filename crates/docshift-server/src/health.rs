//! Liveness and readiness endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use parking_lot::RwLock;
use serde::Serialize;

/// Whether the server can take traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Readiness {
    /// Migrations are still running.
    #[default]
    Migrating,
    /// All migrations completed.
    Ready,
    /// A migration failed or was interrupted.
    Maintenance { reason: String },
}

impl Readiness {
    fn status(&self) -> &'static str {
        match self {
            Readiness::Migrating => "migrating",
            Readiness::Ready => "ready",
            Readiness::Maintenance { .. } => "maintenance",
        }
    }
}

/// Shared readiness, updated by the bootstrap and read by the routes.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    readiness: Arc<RwLock<Readiness>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, readiness: Readiness) {
        tracing::info!(status = readiness.status(), "readiness changed");
        *self.readiness.write() = readiness;
    }

    pub fn get(&self) -> Readiness {
        self.readiness.read().clone()
    }
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Health routes.
pub fn routes() -> Router<HealthState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn ready(State(state): State<HealthState>) -> (StatusCode, Json<ReadinessResponse>) {
    let readiness = state.get();
    let status = readiness.status().to_string();
    match readiness {
        Readiness::Ready => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status,
                reason: None,
            }),
        ),
        Readiness::Migrating => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status,
                reason: None,
            }),
        ),
        Readiness::Maintenance { reason } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status,
                reason: Some(reason),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_router;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    fn server(state: &HealthState) -> TestServer {
        TestServer::new(create_router(state.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_liveness_is_always_ok() {
        let state = HealthState::new();
        let response = server(&state).get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "ok");
    }

    #[tokio::test]
    async fn test_not_ready_while_migrating() {
        let state = HealthState::new();
        let response = server(&state).get("/health/ready").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json::<Value>(), json!({"status": "migrating"}));
    }

    #[tokio::test]
    async fn test_ready_after_migrations() {
        let state = HealthState::new();
        let server = server(&state);
        state.set(Readiness::Ready);
        let response = server.get("/health/ready").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({"status": "ready"}));
    }

    #[tokio::test]
    async fn test_maintenance_reports_reason() {
        let state = HealthState::new();
        state.set(Readiness::Maintenance {
            reason: "index docshift-legacy-session not ready after 10 attempts".into(),
        });
        let response = server(&state).get("/health/ready").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body = response.json::<Value>();
        assert_eq!(body["status"], "maintenance");
        assert!(body["reason"].as_str().unwrap().contains("not ready"));
    }
}
