use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::JournalError;

/// Position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "trade_direction", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

/// Trade outcome. `Open` is the only non-terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "trade_outcome", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Open,
    Win,
    Loss,
    Breakeven,
}

impl Outcome {
    pub fn is_closed(&self) -> bool {
        !matches!(self, Outcome::Open)
    }
}

/// Where a trade or signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "trade_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TradeSource {
    Manual,
    Webhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "signal_confidence", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Medium
    }
}

/// Signal lifecycle: WATCHING -> TRIGGERED -> {WON, LOST, EXPIRED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "signal_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Watching,
    Triggered,
    Won,
    Lost,
    Expired,
}

impl SignalStatus {
    fn rank(&self) -> u8 {
        match self {
            SignalStatus::Watching => 0,
            SignalStatus::Triggered => 1,
            SignalStatus::Won | SignalStatus::Lost | SignalStatus::Expired => 2,
        }
    }

    /// Forward-only: a status may only move to a strictly later stage.
    pub fn can_transition_to(&self, next: SignalStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }
}

/// Learning pattern tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "pattern_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    ConsecutiveLosses,
    TimePerformance,
    StrategyPerformance,
}

/// Trade entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub leverage: u32,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub outcome: Outcome,
    pub strategy: String,
    pub notes: Option<String>,
    pub checklist_grade: Option<String>,
    pub source: TradeSource,
    pub timestamp: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.outcome.is_closed()
    }
}

/// Watch-list signal entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub strategy: String,
    pub confidence: Confidence,
    pub status: SignalStatus,
    pub reasoning: String,
    pub pnl: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only learning fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEvent {
    pub id: String,
    pub trade_id: Option<String>,
    pub lesson: String,
    pub pattern_type: PatternType,
    pub trend_context: Option<String>,
    pub market_context: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Trade DB model (uses BigDecimal for SQLx compatibility)
#[derive(Debug, Clone, FromRow)]
pub struct TradeRow {
    pub id: String,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: BigDecimal,
    pub exit_price: Option<BigDecimal>,
    pub stop_loss: Option<BigDecimal>,
    pub take_profit: Option<BigDecimal>,
    pub leverage: i32,
    pub pnl: BigDecimal,
    pub pnl_percent: BigDecimal,
    pub outcome: Outcome,
    pub strategy: String,
    pub notes: Option<String>,
    pub checklist_grade: Option<String>,
    pub source: TradeSource,
    pub timestamp: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = JournalError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let leverage = u32::try_from(row.leverage)
            .map_err(|_| JournalError::Transient(format!("trade {} has invalid leverage {}", row.id, row.leverage)))?;
        Ok(Self {
            entry_price: decimal_from_bigdecimal(&row.entry_price)?,
            exit_price: row.exit_price.as_ref().map(decimal_from_bigdecimal).transpose()?,
            stop_loss: row.stop_loss.as_ref().map(decimal_from_bigdecimal).transpose()?,
            take_profit: row.take_profit.as_ref().map(decimal_from_bigdecimal).transpose()?,
            pnl: decimal_from_bigdecimal(&row.pnl)?,
            pnl_percent: decimal_from_bigdecimal(&row.pnl_percent)?,
            leverage,
            id: row.id,
            pair: row.pair,
            direction: row.direction,
            outcome: row.outcome,
            strategy: row.strategy,
            notes: row.notes,
            checklist_grade: row.checklist_grade,
            source: row.source,
            timestamp: row.timestamp,
            closed_at: row.closed_at,
        })
    }
}

/// Signal DB model
#[derive(Debug, Clone, FromRow)]
pub struct SignalRow {
    pub id: String,
    pub pair: String,
    pub direction: Direction,
    pub entry_price: BigDecimal,
    pub stop_loss: Option<BigDecimal>,
    pub take_profit: Option<BigDecimal>,
    pub strategy: String,
    pub confidence: Confidence,
    pub status: SignalStatus,
    pub reasoning: String,
    pub pnl: Option<BigDecimal>,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<SignalRow> for Signal {
    type Error = JournalError;

    fn try_from(row: SignalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            entry_price: decimal_from_bigdecimal(&row.entry_price)?,
            stop_loss: row.stop_loss.as_ref().map(decimal_from_bigdecimal).transpose()?,
            take_profit: row.take_profit.as_ref().map(decimal_from_bigdecimal).transpose()?,
            pnl: row.pnl.as_ref().map(decimal_from_bigdecimal).transpose()?,
            id: row.id,
            pair: row.pair,
            direction: row.direction,
            strategy: row.strategy,
            confidence: row.confidence,
            status: row.status,
            reasoning: row.reasoning,
            timestamp: row.timestamp,
        })
    }
}

/// Learning event DB model
#[derive(Debug, Clone, FromRow)]
pub struct LearningEventRow {
    pub id: String,
    pub trade_id: Option<String>,
    pub lesson: String,
    pub pattern_type: PatternType,
    pub trend_context: Option<String>,
    pub market_context: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<LearningEventRow> for LearningEvent {
    fn from(row: LearningEventRow) -> Self {
        Self {
            id: row.id,
            trade_id: row.trade_id,
            lesson: row.lesson,
            pattern_type: row.pattern_type,
            trend_context: row.trend_context,
            market_context: row.market_context,
            timestamp: row.timestamp,
        }
    }
}

// Helper conversions between BigDecimal and Decimal
pub fn decimal_from_bigdecimal(bd: &BigDecimal) -> Result<Decimal, JournalError> {
    bd.to_string()
        .parse()
        .map_err(|e| JournalError::Transient(format!("numeric column out of range ({}): {}", bd, e)))
}

pub fn bigdecimal_from_decimal(d: &Decimal) -> BigDecimal {
    // Decimal's textual form is always a valid BigDecimal literal
    d.to_string().parse().unwrap_or_default()
}

// Request types for API

/// Create-or-update trade payload. Every field is optional so a
/// re-submission only touches what it carries.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TradeInput {
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub pair: Option<String>,
    pub direction: Option<Direction>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    #[validate(range(min = 1, max = 1000))]
    pub leverage: Option<u32>,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    pub outcome: Option<Outcome>,
    #[validate(length(min = 1, max = 64))]
    pub strategy: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    #[validate(length(max = 16))]
    pub checklist_grade: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Close payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CloseTradeRequest {
    pub exit_price: Decimal,
    pub outcome: Option<Outcome>,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    #[validate(length(max = 16))]
    pub checklist_grade: Option<String>,
}

/// Explicit correction of any trade field
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TradeUpdateRequest {
    #[validate(length(min = 1, max = 32))]
    pub pair: Option<String>,
    pub direction: Option<Direction>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    #[validate(range(min = 1, max = 1000))]
    pub leverage: Option<u32>,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    pub outcome: Option<Outcome>,
    #[validate(length(min = 1, max = 64))]
    pub strategy: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    #[validate(length(max = 16))]
    pub checklist_grade: Option<String>,
}

/// Create-or-update signal payload
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignalInput {
    #[validate(length(min = 1, max = 128))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub pair: Option<String>,
    pub direction: Option<Direction>,
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    #[validate(length(min = 1, max = 64))]
    pub strategy: Option<String>,
    pub confidence: Option<Confidence>,
    pub status: Option<SignalStatus>,
    #[validate(length(max = 4000))]
    pub reasoning: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalStatusRequest {
    pub status: SignalStatus,
    pub pnl: Option<Decimal>,
}

/// Trade leg pushed by a webhook
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct WebhookTrade {
    #[serde(alias = "id")]
    #[validate(length(min = 1, max = 128))]
    pub trade_id: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub pair: Option<String>,
    pub direction: Option<Direction>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    #[validate(range(min = 1, max = 1000))]
    pub leverage: Option<u32>,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    pub outcome: Option<Outcome>,
    #[validate(length(min = 1, max = 64))]
    pub strategy: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

impl WebhookTrade {
    pub fn into_trade_input(self) -> TradeInput {
        TradeInput {
            id: self.trade_id,
            pair: self.pair,
            direction: self.direction,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            leverage: self.leverage,
            pnl: self.pnl,
            pnl_percent: self.pnl_percent,
            outcome: self.outcome,
            strategy: self.strategy,
            notes: self.notes,
            checklist_grade: None,
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSignalUpdate {
    #[serde(alias = "signal_id")]
    pub id: String,
    pub status: SignalStatus,
    pub pnl: Option<Decimal>,
}

/// Inbound webhook body, dispatched on `action`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookAction {
    TradeOpen(WebhookTrade),
    TradeClose(WebhookTrade),
    Signal(SignalInput),
    SignalUpdate(WebhookSignalUpdate),
}

/// What a webhook call produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum WebhookReceipt {
    Trade(Trade),
    Signal(Signal),
}

/// Pagination query
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { limit: default_limit(), offset: 0 }
    }
}

/// Upper bound applied to every list request
pub const MAX_PAGE_SIZE: usize = 500;
