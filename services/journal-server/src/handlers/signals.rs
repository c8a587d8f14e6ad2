//! Signal handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::{LimitQuery, ValidJson};
use crate::error::Result;
use crate::models::{Signal, SignalInput, SignalStatusRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SignalListResponse {
    pub signals: Vec<Signal>,
    pub total: usize,
}

/// POST /signals
pub async fn create_signal(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<SignalInput>,
) -> Result<Json<Signal>> {
    Ok(Json(state.gateway.create_signal(req).await?))
}

/// GET /signals - Newest first
pub async fn list_signals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<SignalListResponse>> {
    let signals = state.gateway.list_signals(query.limit).await?;
    Ok(Json(SignalListResponse {
        total: signals.len(),
        signals,
    }))
}

/// PATCH /signals/{id}/status
pub async fn update_signal_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<SignalStatusRequest>,
) -> Result<Json<Signal>> {
    Ok(Json(state.gateway.update_signal_status(&id, req.status, req.pnl).await?))
}
