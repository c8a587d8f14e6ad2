//! PostgreSQL repository

use agent_memory::AgentMemory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use super::JournalRepository;
use crate::db::Db;
use crate::error::{JournalError, Result};
use crate::models::{
    bigdecimal_from_decimal, LearningEvent, LearningEventRow, Signal, SignalRow, Trade, TradeRow,
};

const TRADE_COLUMNS: &str = "id, pair, direction, entry_price, exit_price, stop_loss, take_profit, \
    leverage, pnl, pnl_percent, outcome, strategy, notes, checklist_grade, source, timestamp, closed_at";

const SIGNAL_COLUMNS: &str = "id, pair, direction, entry_price, stop_loss, take_profit, strategy, \
    confidence, status, reasoning, pnl, timestamp";

/// Single-row key of the shared memory replica
const MEMORY_ROW_ID: i16 = 1;

#[derive(Clone)]
pub struct PgRepository {
    pool: Db,
}

impl PgRepository {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }

    async fn fetch_trades(&self, sql: &str, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<Trade>> {
        let mut query = sqlx::query_as::<_, TradeRow>(sql);
        if let Some(limit) = limit {
            query = query.bind(to_i64(limit));
        }
        if let Some(offset) = offset {
            query = query.bind(to_i64(offset));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Trade::try_from).collect()
    }
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl JournalRepository for PgRepository {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_trade(&self, id: &str) -> Result<Option<Trade>> {
        let row = sqlx::query_as::<_, TradeRow>(&format!("SELECT {} FROM trades WHERE id = $1", TRADE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trade::try_from).transpose()
    }

    async fn save_trade(&self, trade: &Trade) -> Result<()> {
        let leverage = i32::try_from(trade.leverage)
            .map_err(|_| JournalError::Validation(format!("leverage {} out of range", trade.leverage)))?;

        sqlx::query(
            r#"
            INSERT INTO trades (
                id, pair, direction, entry_price, exit_price, stop_loss, take_profit,
                leverage, pnl, pnl_percent, outcome, strategy, notes, checklist_grade,
                source, timestamp, closed_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, clock_timestamp())
            ON CONFLICT (id) DO UPDATE SET
                pair = EXCLUDED.pair,
                direction = EXCLUDED.direction,
                entry_price = EXCLUDED.entry_price,
                exit_price = EXCLUDED.exit_price,
                stop_loss = EXCLUDED.stop_loss,
                take_profit = EXCLUDED.take_profit,
                leverage = EXCLUDED.leverage,
                pnl = EXCLUDED.pnl,
                pnl_percent = EXCLUDED.pnl_percent,
                outcome = EXCLUDED.outcome,
                strategy = EXCLUDED.strategy,
                notes = EXCLUDED.notes,
                checklist_grade = EXCLUDED.checklist_grade,
                source = EXCLUDED.source,
                timestamp = EXCLUDED.timestamp,
                closed_at = EXCLUDED.closed_at,
                updated_at = clock_timestamp()
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.pair)
        .bind(trade.direction)
        .bind(bigdecimal_from_decimal(&trade.entry_price))
        .bind(trade.exit_price.as_ref().map(bigdecimal_from_decimal))
        .bind(trade.stop_loss.as_ref().map(bigdecimal_from_decimal))
        .bind(trade.take_profit.as_ref().map(bigdecimal_from_decimal))
        .bind(leverage)
        .bind(bigdecimal_from_decimal(&trade.pnl))
        .bind(bigdecimal_from_decimal(&trade.pnl_percent))
        .bind(trade.outcome)
        .bind(&trade.strategy)
        .bind(&trade.notes)
        .bind(&trade.checklist_grade)
        .bind(trade.source)
        .bind(trade.timestamp)
        .bind(trade.closed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_trades(&self, limit: usize, offset: usize) -> Result<Vec<Trade>> {
        let sql = format!(
            "SELECT {} FROM trades ORDER BY timestamp DESC, updated_at DESC LIMIT $1 OFFSET $2",
            TRADE_COLUMNS
        );
        self.fetch_trades(&sql, Some(limit), Some(offset)).await
    }

    async fn list_trades_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, TradeRow>(&format!(
            "SELECT {} FROM trades WHERE timestamp >= $1 AND timestamp < $2 ORDER BY timestamp ASC, updated_at ASC",
            TRADE_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn list_open_trades(&self) -> Result<Vec<Trade>> {
        let sql = format!(
            "SELECT {} FROM trades WHERE outcome = 'OPEN' ORDER BY timestamp DESC, updated_at DESC",
            TRADE_COLUMNS
        );
        self.fetch_trades(&sql, None, None).await
    }

    async fn list_closed_trades(&self) -> Result<Vec<Trade>> {
        let sql = format!(
            "SELECT {} FROM trades WHERE outcome <> 'OPEN' ORDER BY timestamp DESC, updated_at DESC",
            TRADE_COLUMNS
        );
        self.fetch_trades(&sql, None, None).await
    }

    async fn recent_closed_trades(&self, limit: usize) -> Result<Vec<Trade>> {
        let sql = format!(
            "SELECT {} FROM trades WHERE outcome <> 'OPEN' ORDER BY closed_at DESC, updated_at DESC LIMIT $1",
            TRADE_COLUMNS
        );
        self.fetch_trades(&sql, Some(limit), None).await
    }

    async fn get_signal(&self, id: &str) -> Result<Option<Signal>> {
        let row = sqlx::query_as::<_, SignalRow>(&format!("SELECT {} FROM signals WHERE id = $1", SIGNAL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Signal::try_from).transpose()
    }

    async fn save_signal(&self, signal: &Signal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO signals (
                id, pair, direction, entry_price, stop_loss, take_profit, strategy,
                confidence, status, reasoning, pnl, timestamp, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, clock_timestamp())
            ON CONFLICT (id) DO UPDATE SET
                pair = EXCLUDED.pair,
                direction = EXCLUDED.direction,
                entry_price = EXCLUDED.entry_price,
                stop_loss = EXCLUDED.stop_loss,
                take_profit = EXCLUDED.take_profit,
                strategy = EXCLUDED.strategy,
                confidence = EXCLUDED.confidence,
                status = EXCLUDED.status,
                reasoning = EXCLUDED.reasoning,
                pnl = EXCLUDED.pnl,
                timestamp = EXCLUDED.timestamp,
                updated_at = clock_timestamp()
            "#,
        )
        .bind(&signal.id)
        .bind(&signal.pair)
        .bind(signal.direction)
        .bind(bigdecimal_from_decimal(&signal.entry_price))
        .bind(signal.stop_loss.as_ref().map(bigdecimal_from_decimal))
        .bind(signal.take_profit.as_ref().map(bigdecimal_from_decimal))
        .bind(&signal.strategy)
        .bind(signal.confidence)
        .bind(signal.status)
        .bind(&signal.reasoning)
        .bind(signal.pnl.as_ref().map(bigdecimal_from_decimal))
        .bind(signal.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_signals(&self, limit: usize) -> Result<Vec<Signal>> {
        let rows = sqlx::query_as::<_, SignalRow>(&format!(
            "SELECT {} FROM signals ORDER BY timestamp DESC, updated_at DESC LIMIT $1",
            SIGNAL_COLUMNS
        ))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Signal::try_from).collect()
    }

    async fn append_learning_event(&self, event: &LearningEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO learning_events (id, trade_id, lesson, pattern_type, trend_context, market_context, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&event.id)
        .bind(&event.trade_id)
        .bind(&event.lesson)
        .bind(event.pattern_type)
        .bind(&event.trend_context)
        .bind(&event.market_context)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_learning_events(&self, limit: usize) -> Result<Vec<LearningEvent>> {
        let rows = sqlx::query_as::<_, LearningEventRow>(
            "SELECT id, trade_id, lesson, pattern_type, trend_context, market_context, timestamp \
             FROM learning_events ORDER BY seq DESC LIMIT $1",
        )
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LearningEvent::from).collect())
    }

    async fn load_memory(&self) -> Result<Option<AgentMemory>> {
        let row: Option<(Json<AgentMemory>,)> = sqlx::query_as("SELECT state FROM agent_memory WHERE id = $1")
            .bind(MEMORY_ROW_ID)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(memory),)| memory))
    }

    async fn save_memory(&self, memory: &AgentMemory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_memory (id, state, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            "#,
        )
        .bind(MEMORY_ROW_ID)
        .bind(Json(memory))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
