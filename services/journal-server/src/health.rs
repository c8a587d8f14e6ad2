//! Health check endpoints for load balancers and monitoring

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::observability::{metrics, MetricsSnapshot};
use crate::AppState;

/// Basic health check - fast, no external dependencies
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness check - verifies storage connectivity
pub async fn readyz(State(state): State<Arc<AppState>>) -> Result<Json<ReadinessResponse>, StatusCode> {
    let repo = state.gateway.repo();
    match repo.ping().await {
        Ok(()) => Ok(Json(ReadinessResponse {
            status: "ready".to_string(),
            checks: vec![HealthCheck {
                name: "storage".to_string(),
                status: repo.backend().to_string(),
            }],
        })),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Detailed health check with all components
pub async fn health_detail(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DetailedHealthResponse>, (StatusCode, Json<DetailedHealthResponse>)> {
    let mut checks = vec![];
    let repo = state.gateway.repo();
    let storage_ok = repo.ping().await.is_ok();
    checks.push(HealthCheck {
        name: format!("storage:{}", repo.backend()),
        status: if storage_ok { "ok" } else { "error" }.to_string(),
    });

    let hub = state.gateway.hub();
    checks.push(HealthCheck {
        name: "hub".to_string(),
        status: format!("{} subscribers", hub.subscriber_count()),
    });
    checks.push(HealthCheck {
        name: "webhook".to_string(),
        status: if state.webhook_enabled { "enabled" } else { "disabled" }.to_string(),
    });
    checks.push(HealthCheck {
        name: "rate_limiter".to_string(),
        status: format!("{} callers tracked", state.rate_limiter.tracked_callers().await),
    });

    state
        .metrics
        .gauge(metrics::HUB_SUBSCRIBERS, hub.subscriber_count() as f64)
        .await;
    state
        .metrics
        .gauge(metrics::HUB_EVENTS_DROPPED, hub.dropped_events() as f64)
        .await;
    let snapshot = state.metrics.snapshot().await;

    let response = DetailedHealthResponse {
        status: if storage_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
        metrics: snapshot,
    };

    if storage_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: Vec<HealthCheck>,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub version: String,
    pub checks: Vec<HealthCheck>,
    pub metrics: MetricsSnapshot,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
}
