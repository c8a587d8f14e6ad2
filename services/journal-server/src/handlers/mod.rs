//! HTTP handlers, one module per resource

pub mod events;
pub mod memory;
pub mod signals;
pub mod stats;
pub mod trades;
pub mod webhook;

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::JournalError;

/// JSON body whose rejection is reported as a validation error
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = JournalError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| JournalError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `?limit=` for plain newest-first lists
#[derive(Debug, Clone, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}
