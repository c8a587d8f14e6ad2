//! Statistics and learning handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::LimitQuery;
use crate::error::Result;
use crate::models::LearningEvent;
use crate::stats::{CalendarDay, StrategyStats, TradeStats};
use crate::AppState;

/// GET /stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<TradeStats>> {
    Ok(Json(state.gateway.get_stats().await?))
}

/// GET /stats/strategies - Highest weight first
pub async fn get_strategy_stats(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StrategyStats>>> {
    Ok(Json(state.gateway.get_strategy_stats().await?))
}

/// GET /stats/calendar
pub async fn get_calendar_stats(State(state): State<Arc<AppState>>) -> Result<Json<Vec<CalendarDay>>> {
    Ok(Json(state.gateway.get_calendar_stats().await?))
}

#[derive(Debug, Serialize)]
pub struct LearningListResponse {
    pub events: Vec<LearningEvent>,
    pub total: usize,
}

/// GET /learning - Newest first
pub async fn list_learning_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<LearningListResponse>> {
    let events = state.gateway.list_learning_events(query.limit).await?;
    Ok(Json(LearningListResponse {
        total: events.len(),
        events,
    }))
}
