//! Server-sent event stream

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use std::sync::Arc;

use crate::error::Result;
use crate::AppState;

/// GET /events - `connected`, `init`, then live events in write order
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let subscription = state.gateway.subscribe().await?;
    tracing::info!(subscriber_id = subscription.id(), "Event stream opened");

    let stream = subscription
        .into_stream()
        .map(|event| Event::default().event(event.kind()).json_data(&event));
    Ok(Sse::new(stream))
}
