//! Rate limiting middleware
//!
//! Fixed-window admission in front of the webhook route, keyed by caller
//! address. Per-process only.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::AppState;

/// Expired windows are swept at most this often
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

struct Windows {
    by_caller: HashMap<String, Window>,
    last_sweep: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<Windows>>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(window_secs: u64, max_requests: u32) -> Self {
        Self {
            windows: Arc::new(Mutex::new(Windows {
                by_caller: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            window: Duration::from_secs(window_secs),
            max_requests,
        }
    }

    pub async fn admit(&self, caller: &str) -> Admission {
        self.admit_at(caller, Instant::now()).await
    }

    async fn admit_at(&self, caller: &str, now: Instant) -> Admission {
        let mut windows = self.windows.lock().await;

        if now.duration_since(windows.last_sweep) >= SWEEP_INTERVAL {
            let window = self.window;
            let before = windows.by_caller.len();
            windows
                .by_caller
                .retain(|_, w| now.duration_since(w.opened) < window);
            let swept = before - windows.by_caller.len();
            if swept > 0 {
                tracing::debug!(swept, "Rate limiter swept expired windows");
            }
            windows.last_sweep = now;
        }

        let entry = windows
            .by_caller
            .entry(caller.to_string())
            .or_insert(Window { opened: now, used: 0 });
        if now.duration_since(entry.opened) >= self.window {
            *entry = Window { opened: now, used: 0 };
        }

        if entry.used >= self.max_requests {
            return Admission::Limited {
                retry_after: self.window.saturating_sub(now.duration_since(entry.opened)),
            };
        }
        entry.used += 1;
        Admission::Allowed {
            remaining: self.max_requests - entry.used,
        }
    }

    /// Callers with a live window
    pub async fn tracked_callers(&self) -> usize {
        self.windows.lock().await.by_caller.len()
    }
}

/// First hop of `X-Forwarded-For`, or a shared bucket when absent
fn caller_key(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim())
        .filter(|ip| !ip.is_empty())
        .map(|ip| format!("ip:{}", ip))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Webhook rate limiting; a limited caller gets 429 with `Retry-After`
pub async fn webhook_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = caller_key(&request);

    match state.rate_limiter.admit(&key).await {
        Admission::Allowed { .. } => next.run(request).await,
        Admission::Limited { retry_after } => {
            state.metrics.increment(metrics::RATE_LIMITED, 1).await;
            tracing::warn!(caller = %key, "Webhook rate limit exceeded");
            let secs = retry_after.as_secs().max(1);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, secs.to_string())],
            )
                .into_response()
        }
    }
}
