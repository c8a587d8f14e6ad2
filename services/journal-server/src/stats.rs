//! Statistics derived from closed trades
//!
//! Everything here is a pure function of the current trade set and is
//! recomputed per request, so re-closing a trade can never double-count.
//! Sums saturate instead of overflowing; ingestion bounds pnl well below
//! the point where that matters, but rows already stored are summed as-is.

use chrono::{FixedOffset, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::{Outcome, Trade};

/// Bounds of the strategy weight score
pub const MIN_STRATEGY_WEIGHT: f64 = 0.1;
pub const MAX_STRATEGY_WEIGHT: f64 = 5.0;

const AVG_SCALE: u32 = 8;

/// Aggregate performance of a set of closed trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub total_trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub breakeven: u64,
    pub total_pnl: Decimal,
    pub win_rate: f64,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub profit_factor: f64,
    pub avg_risk_reward: f64,
}

/// Per-strategy performance with its ranking weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub strategy: String,
    #[serde(flatten)]
    pub stats: TradeStats,
    pub weight: f64,
}

/// One local calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub trades: u64,
    pub pnl: Decimal,
    pub wins: u64,
    pub losses: u64,
}

#[derive(Default)]
struct Tally {
    total: u64,
    wins: u64,
    losses: u64,
    breakeven: u64,
    total_pnl: Decimal,
    gross_win: Decimal,
    gross_loss: Decimal,
}

impl Tally {
    fn add(&mut self, trade: &Trade) {
        self.total += 1;
        self.total_pnl = self.total_pnl.saturating_add(trade.pnl);
        match trade.outcome {
            Outcome::Win => {
                self.wins += 1;
                self.gross_win = self.gross_win.saturating_add(trade.pnl);
            }
            Outcome::Loss => {
                self.losses += 1;
                self.gross_loss = self.gross_loss.saturating_add(trade.pnl);
            }
            Outcome::Breakeven => self.breakeven += 1,
            Outcome::Open => {}
        }
    }

    fn finish(&self) -> TradeStats {
        let avg_win = mean(self.gross_win, self.wins);
        let avg_loss = mean(self.gross_loss, self.losses);

        let win_rate = if self.total == 0 {
            0.0
        } else {
            self.wins as f64 / self.total as f64 * 100.0
        };

        // |avg_win * wins| / (|avg_loss * losses|, floored to 1 when zero)
        let loss_value = self.gross_loss.abs();
        let denominator = if loss_value.is_zero() { Decimal::ONE } else { loss_value };
        let profit_factor = ratio(self.gross_win.abs(), denominator);

        let avg_risk_reward = if avg_loss.is_zero() {
            0.0
        } else {
            ratio(avg_win.abs(), avg_loss.abs())
        };

        TradeStats {
            total_trades: self.total,
            wins: self.wins,
            losses: self.losses,
            breakeven: self.breakeven,
            total_pnl: self.total_pnl,
            win_rate,
            avg_win,
            avg_loss,
            profit_factor,
            avg_risk_reward,
        }
    }

    /// `clamp(0.1, 5.0, (wins * |avg_win|) / (losses * |avg_loss| + 1))`
    fn weight(&self) -> f64 {
        let raw = ratio(self.gross_win.abs(), self.gross_loss.abs().saturating_add(Decimal::ONE));
        raw.clamp(MIN_STRATEGY_WEIGHT, MAX_STRATEGY_WEIGHT)
    }
}

fn mean(sum: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (sum / Decimal::from(count)).round_dp(AVG_SCALE)
    }
}

// Finite f64 ratio; a zero or unrepresentable divisor yields 0
fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    numerator
        .checked_div(denominator)
        .and_then(|r| r.to_f64())
        .filter(|r| r.is_finite())
        .unwrap_or(0.0)
}

/// Overall stats over closed trades. Open trades are ignored.
pub fn trade_stats(trades: &[Trade]) -> TradeStats {
    let mut tally = Tally::default();
    for trade in trades.iter().filter(|t| t.is_closed()) {
        tally.add(trade);
    }
    tally.finish()
}

/// Stats grouped by strategy label, highest weight first
pub fn strategy_stats(trades: &[Trade]) -> Vec<StrategyStats> {
    let mut groups: HashMap<&str, Tally> = HashMap::new();
    for trade in trades.iter().filter(|t| t.is_closed()) {
        groups.entry(trade.strategy.as_str()).or_default().add(trade);
    }

    let mut out: Vec<StrategyStats> = groups
        .into_iter()
        .map(|(strategy, tally)| StrategyStats {
            strategy: strategy.to_string(),
            weight: tally.weight(),
            stats: tally.finish(),
        })
        .collect();
    out.sort_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.strategy.cmp(&b.strategy))
    });
    out
}

/// Stats for one strategy, if it has any closed trades
pub fn stats_for_strategy(trades: &[Trade], strategy: &str) -> Option<StrategyStats> {
    strategy_stats(trades).into_iter().find(|s| s.strategy == strategy)
}

/// Closed trades grouped by the local calendar day they closed on
pub fn calendar_stats(trades: &[Trade], offset: FixedOffset) -> Vec<CalendarDay> {
    let mut days: BTreeMap<NaiveDate, CalendarDay> = BTreeMap::new();
    for trade in trades.iter().filter(|t| t.is_closed()) {
        let closed_at = trade.closed_at.unwrap_or(trade.timestamp);
        let date = closed_at.with_timezone(&offset).date_naive();
        let day = days.entry(date).or_insert_with(|| CalendarDay {
            date,
            trades: 0,
            pnl: Decimal::ZERO,
            wins: 0,
            losses: 0,
        });
        day.trades += 1;
        day.pnl = day.pnl.saturating_add(trade.pnl);
        match trade.outcome {
            Outcome::Win => day.wins += 1,
            Outcome::Loss => day.losses += 1,
            _ => {}
        }
    }
    days.into_values().collect()
}
