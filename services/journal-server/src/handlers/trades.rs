//! Trade handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use super::ValidJson;
use crate::error::{JournalError, Result};
use crate::models::{CloseTradeRequest, PageQuery, Trade, TradeInput, TradeUpdateRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TradeListResponse {
    pub trades: Vec<Trade>,
    pub total: usize,
}

impl From<Vec<Trade>> for TradeListResponse {
    fn from(trades: Vec<Trade>) -> Self {
        Self {
            total: trades.len(),
            trades,
        }
    }
}

/// POST /trades - Create a trade, or correct a known one
pub async fn create_trade(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<TradeInput>,
) -> Result<Json<Trade>> {
    Ok(Json(state.gateway.create_or_update_trade(req).await?))
}

/// GET /trades - Newest first
pub async fn list_trades(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<TradeListResponse>> {
    Ok(Json(state.gateway.list_trades(&page).await?.into()))
}

/// GET /trades/open
pub async fn list_open_trades(State(state): State<Arc<AppState>>) -> Result<Json<TradeListResponse>> {
    Ok(Json(state.gateway.list_open_trades().await?.into()))
}

/// GET /trades/by-date/{date} - Trades opened on a local calendar day
pub async fn list_trades_by_date(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<TradeListResponse>> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| JournalError::Validation(format!("invalid date {}, expected YYYY-MM-DD", date)))?;
    Ok(Json(state.gateway.list_trades_by_date(date).await?.into()))
}

/// GET /trades/{id}
pub async fn get_trade(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Trade>> {
    Ok(Json(state.gateway.get_trade(&id).await?))
}

/// POST /trades/{id}/close
pub async fn close_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<CloseTradeRequest>,
) -> Result<Json<Trade>> {
    Ok(Json(state.gateway.close_trade(&id, req).await?))
}

/// PATCH /trades/{id} - Explicit correction of any field
pub async fn update_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<TradeUpdateRequest>,
) -> Result<Json<Trade>> {
    Ok(Json(state.gateway.update_trade_fields(&id, req).await?))
}
