//! Behavioral pattern detection over the tail of closed trades
//!
//! Detection is advisory. Callers log and drop a failed analysis instead of
//! failing the close that triggered it.

use chrono::{FixedOffset, Timelike, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{LearningEvent, Outcome, PatternType, Trade};
use crate::stats;
use crate::store::TradeStore;

/// How many recent closed trades the detector looks at
pub const LOOKBACK: usize = 20;

/// Losses in a row needed before a streak is reported
pub const LOSS_STREAK_THRESHOLD: usize = 3;

pub const STRONG_PROFIT_FACTOR: f64 = 2.0;
pub const WEAK_PROFIT_FACTOR: f64 = 0.5;

pub const TREND_LOSING_STREAK: &str = "LOSING_STREAK";
pub const TREND_FAVORABLE_HOUR: &str = "FAVORABLE_HOUR";
pub const TREND_STRATEGY_STRONG: &str = "STRATEGY_STRONG";
pub const TREND_STRATEGY_WEAK: &str = "STRATEGY_WEAK";

#[derive(Debug, Clone, Copy)]
pub struct PatternDetector {
    offset: FixedOffset,
}

impl PatternDetector {
    /// `offset` is the local time zone used for hour-of-day observations
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Load the trade tail and run every rule against the trade just closed
    pub async fn analyze(&self, trades: &TradeStore, closed: &Trade) -> Result<Vec<LearningEvent>> {
        let recent = trades.recent_closed(LOOKBACK).await?;
        let all_closed = trades.list_closed().await?;
        Ok(self.detect(closed, &recent, &all_closed))
    }

    /// `recent` is newest first and already contains `closed`
    pub fn detect(&self, closed: &Trade, recent: &[Trade], all_closed: &[Trade]) -> Vec<LearningEvent> {
        let mut events = Vec::new();

        let streak = loss_streak(recent);
        if streak >= LOSS_STREAK_THRESHOLD {
            events.push(self.event(
                closed,
                PatternType::ConsecutiveLosses,
                TREND_LOSING_STREAK,
                format!(
                    "{} consecutive losses. Pause and review the setup before the next entry.",
                    streak
                ),
            ));
        }

        if closed.outcome == Outcome::Win {
            let hour = self.local_hour(closed);
            let wins = recent.iter().filter(|t| t.outcome == Outcome::Win).collect::<Vec<_>>();
            let in_hour = wins.iter().filter(|t| self.local_hour(t) == hour).count();
            events.push(self.event(
                closed,
                PatternType::TimePerformance,
                TREND_FAVORABLE_HOUR,
                format!(
                    "Win closed around {:02}:00. {} of the last {} wins came in this hour.",
                    hour,
                    in_hour,
                    wins.len()
                ),
            ));
        }

        if let Some(strategy) = stats::stats_for_strategy(all_closed, &closed.strategy) {
            let pf = strategy.stats.profit_factor;
            if pf > STRONG_PROFIT_FACTOR {
                events.push(self.event(
                    closed,
                    PatternType::StrategyPerformance,
                    TREND_STRATEGY_STRONG,
                    format!("Strategy {} is performing well (profit factor {:.2}).", closed.strategy, pf),
                ));
            } else if pf < WEAK_PROFIT_FACTOR {
                events.push(self.event(
                    closed,
                    PatternType::StrategyPerformance,
                    TREND_STRATEGY_WEAK,
                    format!("Strategy {} needs review (profit factor {:.2}).", closed.strategy, pf),
                ));
            }
        }

        events
    }

    fn local_hour(&self, trade: &Trade) -> u32 {
        trade
            .closed_at
            .unwrap_or(trade.timestamp)
            .with_timezone(&self.offset)
            .hour()
    }

    fn event(&self, trade: &Trade, pattern_type: PatternType, trend: &str, lesson: String) -> LearningEvent {
        LearningEvent {
            id: Uuid::new_v4().to_string(),
            trade_id: Some(trade.id.clone()),
            lesson,
            pattern_type,
            trend_context: Some(trend.to_string()),
            market_context: Some(trade.pair.clone()),
            timestamp: trade.closed_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Losses counted from the newest trade until the first non-loss
pub fn loss_streak(recent: &[Trade]) -> usize {
    recent.iter().take_while(|t| t.outcome == Outcome::Loss).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tests::closed;
    use chrono::{DateTime, Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn kinds(events: &[LearningEvent]) -> Vec<PatternType> {
        events.iter().map(|e| e.pattern_type).collect()
    }

    fn detector() -> PatternDetector {
        PatternDetector::new(FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn test_three_losses_emit_streak() {
        let trades: Vec<Trade> = (0..3)
            .map(|i| closed(&format!("l{}", i), "s", -10, base() + Duration::minutes(i)))
            .rev()
            .collect();
        assert_eq!(loss_streak(&trades), 3);

        let events = detector().detect(&trades[0], &trades, &trades);
        assert!(kinds(&events).contains(&PatternType::ConsecutiveLosses));
        let streak = events
            .iter()
            .find(|e| e.pattern_type == PatternType::ConsecutiveLosses)
            .unwrap();
        assert_eq!(streak.trend_context.as_deref(), Some(TREND_LOSING_STREAK));
        assert_eq!(streak.trade_id.as_deref(), Some("l2"));
    }

    #[test]
    fn test_two_losses_do_not_emit() {
        let trades: Vec<Trade> = (0..2)
            .map(|i| closed(&format!("l{}", i), "s", -10, base() + Duration::minutes(i)))
            .rev()
            .collect();
        let events = detector().detect(&trades[0], &trades, &trades);
        assert!(!kinds(&events).contains(&PatternType::ConsecutiveLosses));
    }

    #[test]
    fn test_win_breaks_streak() {
        // newest first: loss, win, loss, loss, loss
        let recent = vec![
            closed("l4", "s", -5, base() + Duration::minutes(4)),
            closed("w3", "s", 5, base() + Duration::minutes(3)),
            closed("l2", "s", -5, base() + Duration::minutes(2)),
            closed("l1", "s", -5, base() + Duration::minutes(1)),
            closed("l0", "s", -5, base()),
        ];
        assert_eq!(loss_streak(&recent), 1);
        let events = detector().detect(&recent[0], &recent, &recent);
        assert!(!kinds(&events).contains(&PatternType::ConsecutiveLosses));
    }

    #[test]
    fn test_win_records_local_hour() {
        let detector = PatternDetector::new(FixedOffset::east_opt(3 * 3600).unwrap());
        let recent = vec![
            closed("w1", "s", 5, base() + Duration::minutes(30)),
            closed("w0", "s", 5, base()),
        ];
        let events = detector.detect(&recent[0], &recent, &recent);
        let hour = events
            .iter()
            .find(|e| e.pattern_type == PatternType::TimePerformance)
            .unwrap();
        assert!(hour.lesson.contains("12:00"));
        assert!(hour.lesson.contains("2 of the last 2"));
    }

    #[test]
    fn test_strategy_thresholds() {
        let strong = vec![closed("w", "breakout", 50, base())];
        let events = detector().detect(&strong[0], &strong, &strong);
        let e = events
            .iter()
            .find(|e| e.pattern_type == PatternType::StrategyPerformance)
            .unwrap();
        assert_eq!(e.trend_context.as_deref(), Some(TREND_STRATEGY_STRONG));

        let weak = vec![closed("l", "fade", -50, base())];
        let events = detector().detect(&weak[0], &weak, &weak);
        let e = events
            .iter()
            .find(|e| e.pattern_type == PatternType::StrategyPerformance)
            .unwrap();
        assert_eq!(e.trend_context.as_deref(), Some(TREND_STRATEGY_WEAK));

        // profit factor exactly 1.0 is neither
        let even = vec![
            closed("w", "mix", 10, base() + Duration::minutes(1)),
            closed("l", "mix", -10, base()),
        ];
        let events = detector().detect(&even[0], &even, &even);
        assert!(!kinds(&events).contains(&PatternType::StrategyPerformance));
    }
}
