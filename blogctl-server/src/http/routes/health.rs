//! API info and health checks

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::http::server::AppState;

/// `GET /` response
#[derive(Serialize)]
pub struct ApiInfo {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct Endpoints {
    pub health: &'static str,
    pub database: &'static str,
    pub blogs: &'static str,
    pub search: &'static str,
    pub tags: &'static str,
    pub calendar: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// GET /
async fn root() -> Json<ApiInfo> {
    Json(ApiInfo {
        message: "Blog API Server",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            health: "/health",
            database: "/health/db",
            blogs: "/api/v1/blogs",
            search: "/api/v1/search",
            tags: "/api/v1/tags",
            calendar: "/api/v1/calendar",
        },
        timestamp: Utc::now(),
    })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        database: None,
        error: None,
        timestamp: Utc::now(),
    })
}

/// GET /health/db - 503 when the probe fails
async fn health_db(State(state): State<Arc<AppState>>) -> Response {
    match state.db.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            database: Some("connected"),
            error: None,
            timestamp: Utc::now(),
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "error",
                    database: Some("disconnected"),
                    error: Some(err.to_string()),
                    timestamp: Utc::now(),
                }),
            )
                .into_response()
        }
    }
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/db", get(health_db))
}
