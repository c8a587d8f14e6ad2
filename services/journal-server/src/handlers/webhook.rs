//! Webhook ingestion

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use crate::error::Result;
use crate::models::WebhookReceipt;
use crate::AppState;

pub const SECRET_HEADER: &str = "x-webhook-secret";

/// POST /webhook
///
/// The body is only read as untyped JSON here; a body that is not JSON at
/// all still goes through the secret check before being rejected.
pub async fn ingest(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Result<Json<WebhookReceipt>> {
    let secret = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    let payload = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    Ok(Json(state.gateway.handle_webhook(secret, payload).await?))
}
