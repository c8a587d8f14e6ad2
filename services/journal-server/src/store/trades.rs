//! Trade lifecycle rules

use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{Change, JournalRepository};
use crate::error::{JournalError, Result};
use crate::models::{
    CloseTradeRequest, Outcome, PageQuery, Trade, TradeInput, TradeSource, TradeUpdateRequest, MAX_PAGE_SIZE,
};
use crate::pnl;

/// Strategy label used when a trade arrives without one
pub const DEFAULT_STRATEGY: &str = "general";

#[derive(Clone)]
pub struct TradeStore {
    repo: Arc<dyn JournalRepository>,
    offset: FixedOffset,
}

impl TradeStore {
    /// `offset` defines the local calendar day used by date queries
    pub fn new(repo: Arc<dyn JournalRepository>, offset: FixedOffset) -> Self {
        Self { repo, offset }
    }

    /// Insert an unseen trade, or apply correction fields to a known one.
    ///
    /// A known trade only takes pair, direction, prices other than exit,
    /// leverage and strategy from the payload. Exit and `closed_at` of a
    /// stored trade are never touched here; a closed trade whose direction,
    /// entry or leverage moved gets pnl and outcome re-derived from its
    /// stored exit, so a correction lands the same before or after the close.
    pub async fn upsert(&self, input: TradeInput, source: TradeSource) -> Result<Change<Trade>> {
        input.validate()?;

        if let Some(id) = input.id.as_deref() {
            if let Some(existing) = self.repo.get_trade(id).await? {
                return self.correct(existing, input).await;
            }
        }

        let trade = new_trade(input, source)?;
        self.repo.save_trade(&trade).await?;
        Ok(Change::Created(trade))
    }

    async fn correct(&self, existing: Trade, input: TradeInput) -> Result<Change<Trade>> {
        let mut trade = existing.clone();
        if let Some(pair) = input.pair {
            trade.pair = non_empty("pair", pair)?;
        }
        if let Some(direction) = input.direction {
            trade.direction = direction;
        }
        if let Some(entry) = input.entry_price {
            trade.entry_price = positive("entry_price", entry)?;
        }
        if input.stop_loss.is_some() {
            trade.stop_loss = input.stop_loss;
        }
        if input.take_profit.is_some() {
            trade.take_profit = input.take_profit;
        }
        if let Some(leverage) = input.leverage {
            trade.leverage = leverage;
        }
        if let Some(strategy) = input.strategy {
            trade.strategy = non_empty("strategy", strategy)?;
        }

        let prices_moved = trade.direction != existing.direction
            || trade.entry_price != existing.entry_price
            || trade.leverage != existing.leverage;
        match trade.exit_price {
            Some(exit) if prices_moved && trade.is_closed() => {
                let derived = pnl::derive(trade.direction, trade.entry_price, exit, trade.leverage)?;
                trade.pnl = derived.pnl;
                trade.pnl_percent = derived.pnl_percent;
                trade.outcome = derived.outcome;
            }
            _ => {}
        }

        if trade == existing {
            return Ok(Change::Unchanged(trade));
        }
        self.repo.save_trade(&trade).await?;
        Ok(Change::Updated(trade))
    }

    /// Close a stored trade. Re-closing with different values re-applies
    /// them and moves `closed_at` to now; replaying the same close is
    /// `Unchanged` and keeps the stored `closed_at`.
    pub async fn close(&self, id: &str, req: CloseTradeRequest) -> Result<Change<Trade>> {
        req.validate()?;
        let existing = self.get(id).await?;
        let mut trade = existing.clone();
        let exit = non_negative("exit_price", req.exit_price)?;

        let derived = pnl::resolve(
            trade.direction,
            trade.entry_price,
            exit,
            trade.leverage,
            req.pnl,
            req.pnl_percent,
            req.outcome,
        )?;
        trade.exit_price = Some(exit);
        trade.pnl = derived.pnl;
        trade.pnl_percent = derived.pnl_percent;
        trade.outcome = derived.outcome;
        if req.notes.is_some() {
            trade.notes = req.notes;
        }
        if req.checklist_grade.is_some() {
            trade.checklist_grade = req.checklist_grade;
        }

        if existing.is_closed() && trade == existing {
            return Ok(Change::Unchanged(trade));
        }
        trade.closed_at = Some(Utc::now());
        self.repo.save_trade(&trade).await?;
        Ok(Change::Updated(trade))
    }

    /// Explicit correction: any field may change, including outcome
    pub async fn update(&self, id: &str, patch: TradeUpdateRequest) -> Result<Trade> {
        patch.validate()?;
        let mut trade = self.get(id).await?;
        let was_open = !trade.is_closed();

        let prices_touched = patch.direction.is_some()
            || patch.entry_price.is_some()
            || patch.exit_price.is_some()
            || patch.leverage.is_some();

        if let Some(pair) = patch.pair {
            trade.pair = non_empty("pair", pair)?;
        }
        if let Some(direction) = patch.direction {
            trade.direction = direction;
        }
        if let Some(entry) = patch.entry_price {
            trade.entry_price = positive("entry_price", entry)?;
        }
        if let Some(exit) = patch.exit_price {
            trade.exit_price = Some(non_negative("exit_price", exit)?);
        }
        if patch.stop_loss.is_some() {
            trade.stop_loss = patch.stop_loss;
        }
        if patch.take_profit.is_some() {
            trade.take_profit = patch.take_profit;
        }
        if let Some(leverage) = patch.leverage {
            trade.leverage = leverage;
        }
        if let Some(strategy) = patch.strategy {
            trade.strategy = non_empty("strategy", strategy)?;
        }
        if patch.notes.is_some() {
            trade.notes = patch.notes;
        }
        if patch.checklist_grade.is_some() {
            trade.checklist_grade = patch.checklist_grade;
        }

        // An exit price on an open trade closes it unless OPEN is explicit
        let closing = patch
            .outcome
            .map(|o| o.is_closed())
            .unwrap_or(!was_open || patch.exit_price.is_some());

        if !closing {
            reopen(&mut trade);
        } else {
            let rederive = was_open
                || prices_touched
                || patch.pnl.is_some()
                || patch.pnl_percent.is_some()
                || patch.outcome.is_some();
            if rederive {
                match trade.exit_price {
                    Some(exit) => {
                        let derived = pnl::resolve(
                            trade.direction,
                            trade.entry_price,
                            exit,
                            trade.leverage,
                            patch.pnl,
                            patch.pnl_percent,
                            patch.outcome,
                        )?;
                        trade.pnl = derived.pnl;
                        trade.pnl_percent = derived.pnl_percent;
                        trade.outcome = derived.outcome;
                    }
                    None => {
                        let stored_pnl = (!was_open).then_some(trade.pnl);
                        let pnl = pnl::bounded_pnl(patch.pnl.or(stored_pnl).ok_or_else(|| {
                            JournalError::Validation("closing a trade requires exit_price or pnl".to_string())
                        })?)?;
                        if let Some(pct) = patch.pnl_percent {
                            trade.pnl_percent = pct;
                        } else if was_open {
                            trade.pnl_percent = Decimal::ZERO;
                        }
                        trade.pnl = pnl;
                        trade.outcome = patch
                            .outcome
                            .filter(Outcome::is_closed)
                            .unwrap_or_else(|| pnl::outcome_for(pnl));
                    }
                }
            }
            trade.closed_at = trade.closed_at.or_else(|| Some(Utc::now()));
        }

        self.repo.save_trade(&trade).await?;
        Ok(trade)
    }

    pub async fn find(&self, id: &str) -> Result<Option<Trade>> {
        self.repo.get_trade(id).await
    }

    pub async fn get(&self, id: &str) -> Result<Trade> {
        self.repo
            .get_trade(id)
            .await?
            .ok_or_else(|| JournalError::not_found("trade", id))
    }

    /// Newest first
    pub async fn list(&self, page: &PageQuery) -> Result<Vec<Trade>> {
        self.repo.list_trades(page.limit.min(MAX_PAGE_SIZE), page.offset).await
    }

    /// Trades opened on the given local calendar day
    pub async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Trade>> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let start = Utc.from_utc_datetime(&(local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()))));
        let end = start + Duration::days(1);
        self.repo.list_trades_between(start, end).await
    }

    pub async fn list_open(&self) -> Result<Vec<Trade>> {
        self.repo.list_open_trades().await
    }

    pub async fn list_closed(&self) -> Result<Vec<Trade>> {
        self.repo.list_closed_trades().await
    }

    /// Most recently closed first
    pub async fn recent_closed(&self, limit: usize) -> Result<Vec<Trade>> {
        self.repo.recent_closed_trades(limit).await
    }
}

fn new_trade(input: TradeInput, source: TradeSource) -> Result<Trade> {
    let pair = non_empty("pair", required("pair", input.pair)?)?;
    let direction = required("direction", input.direction)?;
    let entry_price = positive("entry_price", required("entry_price", input.entry_price)?)?;
    let exit_price = input.exit_price.map(|e| non_negative("exit_price", e)).transpose()?;
    let leverage = input.leverage.unwrap_or(1);
    let strategy = match input.strategy {
        Some(s) => non_empty("strategy", s)?,
        None => DEFAULT_STRATEGY.to_string(),
    };
    let now = Utc::now();

    let mut trade = Trade {
        id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        pair,
        direction,
        entry_price,
        exit_price,
        stop_loss: input.stop_loss,
        take_profit: input.take_profit,
        leverage,
        pnl: Decimal::ZERO,
        pnl_percent: Decimal::ZERO,
        outcome: Outcome::Open,
        strategy,
        notes: input.notes,
        checklist_grade: input.checklist_grade,
        source,
        timestamp: input.timestamp.unwrap_or(now),
        closed_at: None,
    };

    let closed_by_outcome = input.outcome.map(|o| o.is_closed()).unwrap_or(false);
    match exit_price {
        Some(exit) if input.outcome != Some(Outcome::Open) => {
            let derived = pnl::resolve(
                direction,
                entry_price,
                exit,
                leverage,
                input.pnl,
                input.pnl_percent,
                input.outcome,
            )?;
            trade.pnl = derived.pnl;
            trade.pnl_percent = derived.pnl_percent;
            trade.outcome = derived.outcome;
            trade.closed_at = Some(now);
        }
        Some(_) => trade.exit_price = None,
        None if closed_by_outcome => {
            let pnl = pnl::bounded_pnl(input.pnl.ok_or_else(|| {
                JournalError::Validation("a closed trade requires exit_price or pnl".to_string())
            })?)?;
            trade.pnl = pnl;
            trade.pnl_percent = input.pnl_percent.unwrap_or(Decimal::ZERO);
            trade.outcome = input
                .outcome
                .filter(Outcome::is_closed)
                .unwrap_or_else(|| pnl::outcome_for(pnl));
            trade.closed_at = Some(now);
        }
        None => {}
    }

    Ok(trade)
}

fn reopen(trade: &mut Trade) {
    trade.outcome = Outcome::Open;
    trade.exit_price = None;
    trade.pnl = Decimal::ZERO;
    trade.pnl_percent = Decimal::ZERO;
    trade.closed_at = None;
}

pub(crate) fn required<T>(field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| JournalError::Validation(format!("{} is required", field)))
}

pub(crate) fn non_empty(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(JournalError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn positive(field: &str, value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(JournalError::Validation(format!("{} must be positive", field)));
    }
    below_max_price(field, value)
}

fn non_negative(field: &str, value: Decimal) -> Result<Decimal> {
    if value < Decimal::ZERO {
        return Err(JournalError::Validation(format!("{} must not be negative", field)));
    }
    below_max_price(field, value)
}

fn below_max_price(field: &str, value: Decimal) -> Result<Decimal> {
    if value > pnl::MAX_PRICE {
        return Err(JournalError::Validation(format!("{} must not exceed {}", field, pnl::MAX_PRICE)));
    }
    Ok(value)
}
