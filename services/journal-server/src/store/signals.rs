//! Watch-list signals and their forward-only status machine

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::trades::{non_empty, positive, required, DEFAULT_STRATEGY};
use super::{Change, JournalRepository};
use crate::error::{JournalError, Result};
use crate::models::{Signal, SignalInput, SignalStatus, MAX_PAGE_SIZE};

#[derive(Clone)]
pub struct SignalStore {
    repo: Arc<dyn JournalRepository>,
}

impl SignalStore {
    pub fn new(repo: Arc<dyn JournalRepository>) -> Self {
        Self { repo }
    }

    /// Insert a signal, or update a known one in place. A status carried in
    /// the payload follows the same rule as [`SignalStore::update_status`].
    pub async fn create(&self, input: SignalInput) -> Result<Change<Signal>> {
        input.validate()?;

        if let Some(id) = input.id.as_deref() {
            if let Some(existing) = self.repo.get_signal(id).await? {
                return self.correct(existing, input).await;
            }
        }

        let signal = Signal {
            id: input.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            pair: non_empty("pair", required("pair", input.pair)?)?,
            direction: required("direction", input.direction)?,
            entry_price: positive("entry_price", required("entry_price", input.entry_price)?)?,
            stop_loss: input.stop_loss,
            take_profit: input.take_profit,
            strategy: match input.strategy {
                Some(s) => non_empty("strategy", s)?,
                None => DEFAULT_STRATEGY.to_string(),
            },
            confidence: input.confidence.unwrap_or_default(),
            status: input.status.unwrap_or(SignalStatus::Watching),
            reasoning: input.reasoning.unwrap_or_default(),
            pnl: None,
            timestamp: input.timestamp.unwrap_or_else(Utc::now),
        };
        self.repo.save_signal(&signal).await?;
        Ok(Change::Created(signal))
    }

    async fn correct(&self, existing: Signal, input: SignalInput) -> Result<Change<Signal>> {
        let mut signal = existing.clone();
        if let Some(pair) = input.pair {
            signal.pair = non_empty("pair", pair)?;
        }
        if let Some(direction) = input.direction {
            signal.direction = direction;
        }
        if let Some(entry) = input.entry_price {
            signal.entry_price = positive("entry_price", entry)?;
        }
        if input.stop_loss.is_some() {
            signal.stop_loss = input.stop_loss;
        }
        if input.take_profit.is_some() {
            signal.take_profit = input.take_profit;
        }
        if let Some(strategy) = input.strategy {
            signal.strategy = non_empty("strategy", strategy)?;
        }
        if let Some(confidence) = input.confidence {
            signal.confidence = confidence;
        }
        if let Some(reasoning) = input.reasoning {
            signal.reasoning = reasoning;
        }
        if let Some(status) = input.status {
            check_transition(&signal, status)?;
            signal.status = status;
        }

        if signal == existing {
            return Ok(Change::Unchanged(signal));
        }
        self.repo.save_signal(&signal).await?;
        Ok(Change::Updated(signal))
    }

    /// Move a signal forward. Re-applying the current status is a no-op.
    pub async fn update_status(&self, id: &str, status: SignalStatus, pnl: Option<Decimal>) -> Result<Change<Signal>> {
        let mut signal = self.get(id).await?;
        if signal.status == status {
            return Ok(Change::Unchanged(signal));
        }
        check_transition(&signal, status)?;

        signal.status = status;
        if pnl.is_some() {
            signal.pnl = pnl;
        }
        self.repo.save_signal(&signal).await?;
        Ok(Change::Updated(signal))
    }

    pub async fn get(&self, id: &str) -> Result<Signal> {
        self.repo
            .get_signal(id)
            .await?
            .ok_or_else(|| JournalError::not_found("signal", id))
    }

    /// Newest first
    pub async fn list(&self, limit: usize) -> Result<Vec<Signal>> {
        self.repo.list_signals(limit.min(MAX_PAGE_SIZE)).await
    }
}

fn check_transition(signal: &Signal, next: SignalStatus) -> Result<()> {
    if signal.status == next || signal.status.can_transition_to(next) {
        return Ok(());
    }
    if signal.status.is_terminal() {
        return Err(JournalError::Validation(format!(
            "signal {} is already settled as {:?}",
            signal.id, signal.status
        )));
    }
    Err(JournalError::Validation(format!(
        "signal {} cannot move from {:?} to {:?}",
        signal.id, signal.status, next
    )))
}
