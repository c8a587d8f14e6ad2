//! Observability: metrics collection and structured logging

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::models::Trade;

/// In-process counters, gauges and timings, reported by `/health`
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<RwLock<Registry>>,
}

struct Registry {
    counters: HashMap<&'static str, u64>,
    gauges: HashMap<&'static str, f64>,
    timings: HashMap<&'static str, Timing>,
    started: Instant,
}

/// Running summary of one timed operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Timing {
    pub count: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl Timing {
    fn record(&mut self, ms: f64) {
        self.count += 1;
        self.total_ms += ms;
        self.max_ms = self.max_ms.max(ms);
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry {
                counters: HashMap::new(),
                gauges: HashMap::new(),
                timings: HashMap::new(),
                started: Instant::now(),
            })),
        }
    }

    pub async fn increment(&self, name: &'static str, by: u64) {
        *self.inner.write().await.counters.entry(name).or_default() += by;
    }

    pub async fn gauge(&self, name: &'static str, value: f64) {
        self.inner.write().await.gauges.insert(name, value);
    }

    pub async fn observe(&self, name: &'static str, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.inner.write().await.timings.entry(name).or_default().record(ms);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let registry = self.inner.read().await;
        MetricsSnapshot {
            counters: registry.counters.clone(),
            gauges: registry.gauges.clone(),
            timings: registry.timings.clone(),
            uptime_secs: registry.started.elapsed().as_secs(),
        }
    }

    pub async fn get_counter(&self, name: &str) -> u64 {
        self.inner.read().await.counters.get(name).copied().unwrap_or(0)
    }

    pub async fn get_timing(&self, name: &str) -> Timing {
        self.inner.read().await.timings.get(name).copied().unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<&'static str, u64>,
    pub gauges: HashMap<&'static str, f64>,
    pub timings: HashMap<&'static str, Timing>,
    pub uptime_secs: u64,
}

/// Structured logger for consistent log formatting
pub struct Logger;

impl Logger {
    pub fn trade_event(trade: &Trade, action: &str) {
        tracing::info!(
            trade_id = %trade.id,
            pair = %trade.pair,
            outcome = ?trade.outcome,
            pnl = %trade.pnl,
            source = ?trade.source,
            action = %action,
            "trade_event"
        );
    }

    pub fn memory_event(action: &str, level: u32, lessons: usize) {
        tracing::info!(
            action = %action,
            level = level,
            lessons = lessons,
            "memory_event"
        );
    }
}

/// Predefined metric names
pub mod metrics {
    // Trades
    pub const TRADES_INGESTED: &str = "trades_ingested_total";
    pub const TRADES_CLOSED: &str = "trades_closed_total";
    pub const TRADES_UPDATED: &str = "trades_updated_total";

    // Signals
    pub const SIGNALS_INGESTED: &str = "signals_ingested_total";
    pub const SIGNAL_TRANSITIONS: &str = "signal_transitions_total";

    // Webhook
    pub const WEBHOOK_ACCEPTED: &str = "webhook_accepted_total";
    pub const WEBHOOK_REJECTED: &str = "webhook_rejected_total";
    pub const RATE_LIMITED: &str = "rate_limited_total";

    // Learning
    pub const LEARNING_EVENTS: &str = "learning_events_total";
    pub const PATTERN_ERRORS: &str = "pattern_errors_total";
    pub const INSIGHT_FALLBACKS: &str = "insight_fallbacks_total";

    // Memory
    pub const MEMORY_SYNC: &str = "memory_sync_total";

    // Timings
    pub const CLOSE_PIPELINE: &str = "close_pipeline";

    // Hub
    pub const HUB_SUBSCRIBERS: &str = "hub_subscribers";
    pub const HUB_EVENTS_DROPPED: &str = "hub_events_dropped";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_accumulate() {
        let collector = MetricsCollector::new();
        collector.increment(metrics::TRADES_CLOSED, 1).await;
        collector.increment(metrics::TRADES_CLOSED, 2).await;
        collector.gauge(metrics::HUB_SUBSCRIBERS, 3.0).await;

        assert_eq!(collector.get_counter(metrics::TRADES_CLOSED).await, 3);
        assert_eq!(collector.get_counter(metrics::WEBHOOK_REJECTED).await, 0);

        let snapshot = collector.snapshot().await;
        assert_eq!(snapshot.gauges.get(metrics::HUB_SUBSCRIBERS), Some(&3.0));
    }

    #[tokio::test]
    async fn test_timings_summarise() {
        let collector = MetricsCollector::new();
        collector.observe(metrics::CLOSE_PIPELINE, Duration::from_millis(10)).await;
        collector.observe(metrics::CLOSE_PIPELINE, Duration::from_millis(30)).await;

        let timing = collector.get_timing(metrics::CLOSE_PIPELINE).await;
        assert_eq!(timing.count, 2);
        assert!((timing.mean_ms() - 20.0).abs() < 1e-9);
        assert!((timing.max_ms - 30.0).abs() < 1e-9);
        assert_eq!(collector.get_timing("unknown").await, Timing::default());
    }
}
