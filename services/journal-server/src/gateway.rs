//! Single entry point for every journal mutation
//!
//! One writer lock serializes trades, signals, learning events and the
//! server memory replica. Each mutation persists first, then runs stats and
//! pattern detection on the new state, then publishes to the hub, all inside
//! the same critical section so viewers see events in write order.

use agent_memory::{merge, AgentMemory};
use chrono::{FixedOffset, NaiveDate};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{JournalError, Result};
use crate::hub::{EventHub, InitSnapshot, JournalEvent, Subscription};
use crate::insight::InsightGenerator;
use crate::models::{
    CloseTradeRequest, LearningEvent, Outcome, PageQuery, Signal, SignalInput, SignalStatus, Trade, TradeInput,
    TradeSource, TradeUpdateRequest, WebhookAction, WebhookReceipt, WebhookTrade, MAX_PAGE_SIZE,
};
use crate::observability::{metrics, Logger, MetricsCollector};
use crate::patterns::PatternDetector;
use crate::stats::{self, CalendarDay, StrategyStats, TradeStats};
use crate::store::{Change, JournalRepository, SignalStore, TradeStore};

/// Lessons handed to the insight generator as context
const INSIGHT_CONTEXT_LESSONS: usize = 5;

/// Gateway knobs taken from [`ServerConfig`]
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub webhook_secret: Option<String>,
    pub offset: FixedOffset,
    pub init_recent_limit: usize,
    pub xp_per_close: u64,
    pub xp_per_lesson: u64,
}

impl GatewaySettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            webhook_secret: config.webhook_secret.clone(),
            offset: config.local_offset(),
            init_recent_limit: config.hub.init_recent_limit,
            xp_per_close: config.memory.xp_per_close,
            xp_per_lesson: config.memory.xp_per_lesson,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

pub struct IngestionGateway {
    repo: Arc<dyn JournalRepository>,
    trades: TradeStore,
    signals: SignalStore,
    detector: PatternDetector,
    hub: EventHub,
    insight: Arc<dyn InsightGenerator>,
    metrics: MetricsCollector,
    settings: GatewaySettings,
    writer: Mutex<()>,
}

impl IngestionGateway {
    pub fn new(
        repo: Arc<dyn JournalRepository>,
        hub: EventHub,
        insight: Arc<dyn InsightGenerator>,
        metrics: MetricsCollector,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            trades: TradeStore::new(repo.clone(), settings.offset),
            signals: SignalStore::new(repo.clone()),
            detector: PatternDetector::new(settings.offset),
            repo,
            hub,
            insight,
            metrics,
            settings,
            writer: Mutex::new(()),
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn repo(&self) -> &Arc<dyn JournalRepository> {
        &self.repo
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    // ---- trades ----

    pub async fn create_or_update_trade(&self, input: TradeInput) -> Result<Trade> {
        let _writer = self.writer.lock().await;
        self.upsert_trade(input, TradeSource::Manual).await
    }

    pub async fn close_trade(&self, id: &str, req: CloseTradeRequest) -> Result<Trade> {
        let _writer = self.writer.lock().await;
        self.apply_close(id, req).await
    }

    pub async fn update_trade_fields(&self, id: &str, patch: TradeUpdateRequest) -> Result<Trade> {
        let _writer = self.writer.lock().await;
        let was_closed = self.trades.get(id).await?.is_closed();
        let trade = self.trades.update(id, patch).await?;
        self.metrics.increment(metrics::TRADES_UPDATED, 1).await;

        if !was_closed && trade.is_closed() {
            self.on_closed(&trade).await;
        } else {
            Logger::trade_event(&trade, "update");
            self.hub.publish(JournalEvent::TradeUpdate(trade.clone()));
            self.publish_stats().await?;
        }
        Ok(trade)
    }

    async fn upsert_trade(&self, input: TradeInput, source: TradeSource) -> Result<Trade> {
        match self.trades.upsert(input, source).await? {
            Change::Created(trade) => {
                self.metrics.increment(metrics::TRADES_INGESTED, 1).await;
                if trade.is_closed() {
                    self.on_closed(&trade).await;
                } else {
                    Logger::trade_event(&trade, "open");
                    self.hub.publish(JournalEvent::TradeOpen(trade.clone()));
                }
                Ok(trade)
            }
            Change::Updated(trade) => {
                self.metrics.increment(metrics::TRADES_UPDATED, 1).await;
                Logger::trade_event(&trade, "correct");
                self.hub.publish(JournalEvent::TradeUpdate(trade.clone()));
                self.publish_stats().await?;
                Ok(trade)
            }
            Change::Unchanged(trade) => Ok(trade),
        }
    }

    /// A replayed close is a no-op. A re-close only learns again when it
    /// moved the outcome, exit or pnl; notes and grade alone are an update.
    async fn apply_close(&self, id: &str, req: CloseTradeRequest) -> Result<Trade> {
        let before = self.trades.get(id).await?;
        match self.trades.close(id, req).await? {
            Change::Unchanged(trade) => {
                info!(trade_id = %trade.id, "Close replayed, nothing to do");
                Ok(trade)
            }
            Change::Created(trade) | Change::Updated(trade) => {
                let settled_again = before.is_closed()
                    && before.outcome == trade.outcome
                    && before.exit_price == trade.exit_price
                    && before.pnl == trade.pnl;
                if settled_again {
                    self.metrics.increment(metrics::TRADES_UPDATED, 1).await;
                    Logger::trade_event(&trade, "update");
                    self.hub.publish(JournalEvent::TradeUpdate(trade.clone()));
                    self.publish_stats().await?;
                } else {
                    self.on_closed(&trade).await;
                }
                Ok(trade)
            }
        }
    }

    /// Broadcast a close, then learn from it. Only the stats read can fail
    /// the caller; detection and memory are best effort.
    async fn on_closed(&self, trade: &Trade) {
        let started = Instant::now();
        self.metrics.increment(metrics::TRADES_CLOSED, 1).await;
        Logger::trade_event(trade, "close");
        self.hub.publish(JournalEvent::TradeClose(trade.clone()));

        if let Err(e) = self.publish_stats().await {
            warn!(trade_id = %trade.id, "Stats refresh after close failed: {}", e);
        }

        let events = self.learn_from(trade).await;
        self.grow_memory(&events).await;
        self.metrics.observe(metrics::CLOSE_PIPELINE, started.elapsed()).await;
    }

    async fn publish_stats(&self) -> Result<TradeStats> {
        let closed = self.trades.list_closed().await?;
        let stats = stats::trade_stats(&closed);
        self.hub.publish(JournalEvent::StatsUpdate(stats.clone()));
        Ok(stats)
    }

    async fn learn_from(&self, trade: &Trade) -> Vec<LearningEvent> {
        let detected = match self.detector.analyze(&self.trades, trade).await {
            Ok(events) => events,
            Err(e) => {
                self.metrics.increment(metrics::PATTERN_ERRORS, 1).await;
                warn!(trade_id = %trade.id, "Pattern detection failed: {}", e);
                return Vec::new();
            }
        };

        let mut stored = Vec::with_capacity(detected.len());
        for event in detected {
            if let Err(e) = self.repo.append_learning_event(&event).await {
                self.metrics.increment(metrics::PATTERN_ERRORS, 1).await;
                warn!(trade_id = %trade.id, "Learning event not stored: {}", e);
                continue;
            }
            self.metrics.increment(metrics::LEARNING_EVENTS, 1).await;
            info!(
                trade_id = %trade.id,
                pattern = ?event.pattern_type,
                "Learning event recorded"
            );
            self.hub.publish(JournalEvent::LearningUpdate(event.clone()));
            stored.push(event);
        }
        stored
    }

    /// Award XP for the close and append one lesson per learning event
    async fn grow_memory(&self, events: &[LearningEvent]) {
        let mut memory = match self.repo.load_memory().await {
            Ok(stored) => stored.unwrap_or_else(AgentMemory::seed),
            Err(e) => {
                warn!("Agent memory unavailable, close not credited: {}", e);
                return;
            }
        };

        for event in events {
            let trend = event.trend_context.as_deref().unwrap_or("GENERAL");
            let context = memory.recent_lessons(INSIGHT_CONTEXT_LESSONS).to_vec();
            let insight = match self.insight.generate(trend, &context).await {
                Ok(text) => text,
                Err(e) => {
                    self.metrics.increment(metrics::INSIGHT_FALLBACKS, 1).await;
                    warn!("Insight generation failed, using detector lesson: {}", e);
                    event.lesson.clone()
                }
            };
            memory.add_lesson(&insight, trend);
        }

        let xp = self.settings.xp_per_close + self.settings.xp_per_lesson * events.len() as u64;
        let levels = memory.add_experience(xp);

        if let Err(e) = self.repo.save_memory(&memory).await {
            warn!("Agent memory not saved: {}", e);
            return;
        }
        if levels > 0 {
            Logger::memory_event("level_up", memory.level, memory.lessons.len());
        }
        self.hub.publish(JournalEvent::MemorySync(memory));
    }

    // ---- signals ----

    pub async fn create_signal(&self, input: SignalInput) -> Result<Signal> {
        let _writer = self.writer.lock().await;
        self.upsert_signal(input).await
    }

    async fn upsert_signal(&self, input: SignalInput) -> Result<Signal> {
        match self.signals.create(input).await? {
            Change::Created(signal) => {
                self.metrics.increment(metrics::SIGNALS_INGESTED, 1).await;
                info!(signal_id = %signal.id, pair = %signal.pair, "Signal created");
                self.hub.publish(JournalEvent::SignalNew(signal.clone()));
                Ok(signal)
            }
            Change::Updated(signal) => {
                self.hub.publish(JournalEvent::SignalUpdate(signal.clone()));
                Ok(signal)
            }
            Change::Unchanged(signal) => Ok(signal),
        }
    }

    pub async fn update_signal_status(
        &self,
        id: &str,
        status: SignalStatus,
        pnl: Option<rust_decimal::Decimal>,
    ) -> Result<Signal> {
        let _writer = self.writer.lock().await;
        self.transition_signal(id, status, pnl).await
    }

    async fn transition_signal(
        &self,
        id: &str,
        status: SignalStatus,
        pnl: Option<rust_decimal::Decimal>,
    ) -> Result<Signal> {
        match self.signals.update_status(id, status, pnl).await? {
            Change::Updated(signal) | Change::Created(signal) => {
                self.metrics.increment(metrics::SIGNAL_TRANSITIONS, 1).await;
                info!(signal_id = %signal.id, status = ?signal.status, "Signal status changed");
                self.hub.publish(JournalEvent::SignalUpdate(signal.clone()));
                Ok(signal)
            }
            Change::Unchanged(signal) => Ok(signal),
        }
    }

    // ---- reads ----

    pub async fn list_trades(&self, page: &PageQuery) -> Result<Vec<Trade>> {
        self.trades.list(page).await
    }

    pub async fn list_trades_by_date(&self, date: NaiveDate) -> Result<Vec<Trade>> {
        self.trades.list_by_date(date).await
    }

    pub async fn list_open_trades(&self) -> Result<Vec<Trade>> {
        self.trades.list_open().await
    }

    pub async fn get_trade(&self, id: &str) -> Result<Trade> {
        self.trades.get(id).await
    }

    pub async fn list_signals(&self, limit: usize) -> Result<Vec<Signal>> {
        self.signals.list(limit).await
    }

    pub async fn get_stats(&self) -> Result<TradeStats> {
        Ok(stats::trade_stats(&self.trades.list_closed().await?))
    }

    pub async fn get_strategy_stats(&self) -> Result<Vec<StrategyStats>> {
        Ok(stats::strategy_stats(&self.trades.list_closed().await?))
    }

    pub async fn get_calendar_stats(&self) -> Result<Vec<CalendarDay>> {
        Ok(stats::calendar_stats(&self.trades.list_closed().await?, self.settings.offset))
    }

    pub async fn list_learning_events(&self, limit: usize) -> Result<Vec<LearningEvent>> {
        self.repo.list_learning_events(limit.min(MAX_PAGE_SIZE)).await
    }

    // ---- memory ----

    /// Shared replica, seeded when nothing is stored yet
    pub async fn get_memory(&self) -> Result<AgentMemory> {
        Ok(self.repo.load_memory().await?.unwrap_or_else(AgentMemory::seed))
    }

    /// Server half of the sync protocol: merge the pushed replica into the
    /// stored one, persist, broadcast and return the result.
    pub async fn sync_memory(&self, incoming: AgentMemory) -> Result<AgentMemory> {
        let _writer = self.writer.lock().await;
        let stored = self.repo.load_memory().await?.unwrap_or_else(AgentMemory::seed);
        let merged = merge(&incoming.normalized(), &stored);
        self.repo.save_memory(&merged).await?;

        self.metrics.increment(metrics::MEMORY_SYNC, 1).await;
        Logger::memory_event("sync", merged.level, merged.lessons.len());
        self.hub.publish(JournalEvent::MemorySync(merged.clone()));
        Ok(merged)
    }

    // ---- subscribers ----

    /// Register a viewer. The snapshot and the registration happen under the
    /// writer lock, so the first live event follows `init` exactly.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let _writer = self.writer.lock().await;
        let limit = self.settings.init_recent_limit;
        let snapshot = InitSnapshot {
            stats: stats::trade_stats(&self.trades.list_closed().await?),
            trades: self.trades.list(&PageQuery { limit, offset: 0 }).await?,
            signals: self.signals.list(limit).await?,
        };
        let subscription = self.hub.subscribe(snapshot);
        self.metrics
            .gauge(metrics::HUB_SUBSCRIBERS, self.hub.subscriber_count() as f64)
            .await;
        Ok(subscription)
    }

    // ---- webhook ----

    /// Authenticate, then dispatch on `action`. Nothing is parsed or written
    /// before the secret matches.
    pub async fn handle_webhook(&self, header_secret: Option<&str>, body: serde_json::Value) -> Result<WebhookReceipt> {
        let body_secret = body.get("secret").and_then(|v| v.as_str());
        if let Err(e) = self.authenticate(header_secret.or(body_secret)) {
            self.metrics.increment(metrics::WEBHOOK_REJECTED, 1).await;
            warn!("Webhook rejected: bad or missing secret");
            return Err(e);
        }

        let action: WebhookAction = serde_json::from_value(body)
            .map_err(|e| JournalError::Validation(format!("invalid webhook payload: {}", e)))?;

        let _writer = self.writer.lock().await;
        let receipt = match action {
            WebhookAction::TradeOpen(leg) => {
                WebhookReceipt::Trade(self.upsert_trade(leg.into_trade_input(), TradeSource::Webhook).await?)
            }
            WebhookAction::TradeClose(leg) => WebhookReceipt::Trade(self.webhook_close(leg).await?),
            WebhookAction::Signal(input) => WebhookReceipt::Signal(self.upsert_signal(input).await?),
            WebhookAction::SignalUpdate(update) => {
                WebhookReceipt::Signal(self.transition_signal(&update.id, update.status, update.pnl).await?)
            }
        };
        self.metrics.increment(metrics::WEBHOOK_ACCEPTED, 1).await;
        Ok(receipt)
    }

    fn authenticate(&self, provided: Option<&str>) -> Result<()> {
        match (self.settings.webhook_secret.as_deref(), provided) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            _ => Err(JournalError::Unauthorized),
        }
    }

    /// Close a known trade, or record the whole closed trade when the open
    /// leg never reached this server.
    async fn webhook_close(&self, leg: WebhookTrade) -> Result<Trade> {
        let exit_price = leg
            .exit_price
            .ok_or_else(|| JournalError::Validation("exit_price is required".to_string()))?;

        if let Some(id) = leg.trade_id.as_deref() {
            if self.trades.find(id).await?.is_some() {
                let req = CloseTradeRequest {
                    exit_price,
                    outcome: leg.outcome,
                    pnl: leg.pnl,
                    pnl_percent: leg.pnl_percent,
                    notes: leg.notes,
                    checklist_grade: None,
                };
                return self.apply_close(id, req).await;
            }
        }

        let mut input = leg.into_trade_input();
        input.outcome = input.outcome.filter(Outcome::is_closed);
        info!(trade_id = ?input.id, "Close for unknown trade, recording full closed trade");
        self.upsert_trade(input, TradeSource::Webhook).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::CannedInsight;
    use crate::models::Direction;
    use crate::store::InMemoryRepository;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn gateway() -> IngestionGateway {
        IngestionGateway::new(
            Arc::new(InMemoryRepository::new()),
            EventHub::new(64),
            Arc::new(CannedInsight),
            MetricsCollector::new(),
            GatewaySettings {
                webhook_secret: Some("hook".to_string()),
                offset: FixedOffset::east_opt(0).unwrap(),
                ..GatewaySettings::default()
            },
        )
    }

    fn drain(sub: &mut Subscription) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Some(event) = sub.try_recv() {
            kinds.push(event.kind());
        }
        kinds
    }

    #[tokio::test]
    async fn test_close_broadcast_order() {
        let gw = gateway();
        let mut sub = gw.subscribe().await.unwrap();
        assert_eq!(drain(&mut sub), vec!["connected", "init"]);

        let open = gw
            .create_or_update_trade(TradeInput {
                id: Some("t1".to_string()),
                pair: Some("BTCUSDT".to_string()),
                direction: Some(Direction::Long),
                entry_price: Some(Decimal::from(100)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(open.outcome, Outcome::Open);

        gw.close_trade(
            "t1",
            CloseTradeRequest {
                exit_price: Decimal::from(110),
                outcome: None,
                pnl: None,
                pnl_percent: None,
                notes: None,
                checklist_grade: None,
            },
        )
        .await
        .unwrap();

        let kinds = drain(&mut sub);
        assert_eq!(kinds[0], "trade_open");
        assert_eq!(kinds[1], "trade_close");
        assert_eq!(kinds[2], "stats_update");
        assert_eq!(*kinds.last().unwrap(), "memory_sync");
        assert!(kinds.contains(&"learning_update"));
    }

    #[tokio::test]
    async fn test_close_grows_memory() {
        let gw = gateway();
        let body = json!({
            "action": "TRADE_CLOSE",
            "secret": "hook",
            "trade_id": "w1",
            "pair": "ETHUSDT",
            "direction": "LONG",
            "entry_price": 100,
            "exit_price": 150
        });
        gw.handle_webhook(None, body).await.unwrap();

        let memory = gw.get_memory().await.unwrap();
        // win: favorable hour + strong strategy lessons on top of genesis
        assert_eq!(memory.lessons.len(), 3);
        assert_eq!(memory.current_xp, 10 + 25 * 2);
        assert_eq!(gw.list_learning_events(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_redelivered_close_credits_once() {
        let gw = gateway();
        let body = json!({
            "action": "TRADE_OPEN",
            "secret": "hook",
            "trade_id": "w1",
            "pair": "ETHUSDT",
            "direction": "LONG",
            "entry_price": 100
        });
        gw.handle_webhook(None, body).await.unwrap();

        let close = json!({
            "action": "TRADE_CLOSE",
            "secret": "hook",
            "trade_id": "w1",
            "exit_price": 110
        });
        gw.handle_webhook(None, close.clone()).await.unwrap();
        let memory = gw.get_memory().await.unwrap();
        let events = gw.list_learning_events(10).await.unwrap().len();

        let mut sub = gw.subscribe().await.unwrap();
        drain(&mut sub);
        gw.handle_webhook(None, close).await.unwrap();
        gw.close_trade(
            "w1",
            CloseTradeRequest {
                exit_price: Decimal::from(110),
                outcome: None,
                pnl: None,
                pnl_percent: None,
                notes: None,
                checklist_grade: None,
            },
        )
        .await
        .unwrap();

        assert!(drain(&mut sub).is_empty());
        assert_eq!(gw.get_memory().await.unwrap(), memory);
        assert_eq!(gw.list_learning_events(10).await.unwrap().len(), events);
        assert_eq!(gw.metrics().get_counter(metrics::TRADES_CLOSED).await, 1);

        // a note added after the fact is an update, not another close
        gw.close_trade(
            "w1",
            CloseTradeRequest {
                exit_price: Decimal::from(110),
                outcome: None,
                pnl: None,
                pnl_percent: None,
                notes: Some("late fill".to_string()),
                checklist_grade: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(drain(&mut sub), vec!["trade_update", "stats_update"]);
        assert_eq!(gw.get_memory().await.unwrap().current_xp, memory.current_xp);
    }

    #[tokio::test]
    async fn test_webhook_secret_checked_first() {
        let gw = gateway();
        let body = json!({ "action": "NOT_AN_ACTION", "secret": "wrong" });
        assert!(matches!(
            gw.handle_webhook(None, body).await,
            Err(JournalError::Unauthorized)
        ));

        let body = json!({ "action": "NOT_AN_ACTION" });
        assert!(matches!(
            gw.handle_webhook(Some("hook"), body).await,
            Err(JournalError::Validation(_))
        ));
        assert_eq!(gw.metrics().get_counter(metrics::WEBHOOK_REJECTED).await, 1);
    }

    #[tokio::test]
    async fn test_webhook_close_unknown_synthesizes_trade() {
        let gw = gateway();
        let body = json!({
            "action": "TRADE_CLOSE",
            "id": "remote-1",
            "pair": "BTCUSDT",
            "direction": "SHORT",
            "entry_price": "200",
            "exit_price": "210",
            "leverage": 3
        });
        let receipt = gw.handle_webhook(Some("hook"), body).await.unwrap();
        let WebhookReceipt::Trade(trade) = receipt else {
            panic!("expected a trade receipt");
        };
        assert_eq!(trade.id, "remote-1");
        assert_eq!(trade.source, TradeSource::Webhook);
        assert_eq!(trade.outcome, Outcome::Loss);
        assert_eq!(trade.pnl, Decimal::from(-30));
        assert!(trade.closed_at.is_some());

        let partial = json!({ "action": "TRADE_CLOSE", "id": "remote-2", "exit_price": "1" });
        assert!(matches!(
            gw.handle_webhook(Some("hook"), partial).await,
            Err(JournalError::Validation(_))
        ));
        assert!(gw.get_trade("remote-2").await.is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_secret_rejects_everything() {
        let gw = IngestionGateway::new(
            Arc::new(InMemoryRepository::new()),
            EventHub::default(),
            Arc::new(CannedInsight),
            MetricsCollector::new(),
            GatewaySettings {
                webhook_secret: None,
                ..GatewaySettings::default()
            },
        );
        let body = json!({ "action": "SIGNAL", "secret": "" });
        assert!(matches!(
            gw.handle_webhook(Some(""), body).await,
            Err(JournalError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_sync_memory_merges_and_broadcasts() {
        let gw = gateway();
        let mut sub = gw.subscribe().await.unwrap();
        drain(&mut sub);

        let mut local = AgentMemory::seed();
        local.add_lesson("offline lesson", "RANGING");
        local.add_experience(150);

        let merged = gw.sync_memory(local.clone()).await.unwrap();
        assert_eq!(merged.level, 2);
        assert!(merged.lessons.iter().any(|l| l.insight == "offline lesson"));
        assert_eq!(gw.get_memory().await.unwrap(), merged);
        assert_eq!(drain(&mut sub), vec!["memory_sync"]);

        let again = gw.sync_memory(local).await.unwrap();
        assert_eq!(again, merged);
    }

    #[tokio::test]
    async fn test_signal_lifecycle_events() {
        let gw = gateway();
        let mut sub = gw.subscribe().await.unwrap();
        drain(&mut sub);

        gw.create_signal(SignalInput {
            id: Some("s1".to_string()),
            pair: Some("SOLUSDT".to_string()),
            direction: Some(Direction::Long),
            entry_price: Some(Decimal::from(20)),
            ..Default::default()
        })
        .await
        .unwrap();
        gw.update_signal_status("s1", SignalStatus::Triggered, None).await.unwrap();
        gw.update_signal_status("s1", SignalStatus::Triggered, None).await.unwrap();

        assert_eq!(drain(&mut sub), vec!["signal_new", "signal_update"]);
    }
}
