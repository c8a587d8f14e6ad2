//! Shared agent memory handlers

use agent_memory::AgentMemory;
use axum::{extract::State, Json};
use std::sync::Arc;

use super::ValidJson;
use crate::error::Result;
use crate::AppState;

/// GET /memory
pub async fn get_memory(State(state): State<Arc<AppState>>) -> Result<Json<AgentMemory>> {
    Ok(Json(state.gateway.get_memory().await?))
}

/// POST /memory/sync - Merge a pushed replica and return the result
pub async fn sync_memory(
    State(state): State<Arc<AppState>>,
    ValidJson(incoming): ValidJson<AgentMemory>,
) -> Result<Json<AgentMemory>> {
    Ok(Json(state.gateway.sync_memory(incoming).await?))
}
