//! In-process repository used for development and tests

use agent_memory::AgentMemory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::JournalRepository;
use crate::error::Result;
use crate::models::{LearningEvent, Signal, Trade};

/// Record plus the write sequence it was last saved at
#[derive(Debug, Clone)]
struct Versioned<T> {
    rev: u64,
    value: T,
}

#[derive(Default)]
struct State {
    rev: u64,
    trades: HashMap<String, Versioned<Trade>>,
    signals: HashMap<String, Versioned<Signal>>,
    learning: Vec<LearningEvent>,
    memory: Option<AgentMemory>,
}

impl State {
    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.rev
    }

    fn trades_newest_first(&self) -> Vec<&Versioned<Trade>> {
        let mut all: Vec<_> = self.trades.values().collect();
        all.sort_by(|a, b| {
            b.value
                .timestamp
                .cmp(&a.value.timestamp)
                .then_with(|| b.rev.cmp(&a.rev))
        });
        all
    }
}

/// Whole-record writes behind one `RwLock`
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JournalRepository for InMemoryRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_trade(&self, id: &str) -> Result<Option<Trade>> {
        let state = self.state.read().await;
        Ok(state.trades.get(id).map(|v| v.value.clone()))
    }

    async fn save_trade(&self, trade: &Trade) -> Result<()> {
        let mut state = self.state.write().await;
        let rev = state.next_rev();
        state.trades.insert(
            trade.id.clone(),
            Versioned {
                rev,
                value: trade.clone(),
            },
        );
        Ok(())
    }

    async fn list_trades(&self, limit: usize, offset: usize) -> Result<Vec<Trade>> {
        let state = self.state.read().await;
        Ok(state
            .trades_newest_first()
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|v| v.value.clone())
            .collect())
    }

    async fn list_trades_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Trade>> {
        let state = self.state.read().await;
        Ok(state
            .trades_newest_first()
            .into_iter()
            .rev()
            .filter(|v| v.value.timestamp >= from && v.value.timestamp < to)
            .map(|v| v.value.clone())
            .collect())
    }

    async fn list_open_trades(&self) -> Result<Vec<Trade>> {
        let state = self.state.read().await;
        Ok(state
            .trades_newest_first()
            .into_iter()
            .filter(|v| !v.value.is_closed())
            .map(|v| v.value.clone())
            .collect())
    }

    async fn list_closed_trades(&self) -> Result<Vec<Trade>> {
        let state = self.state.read().await;
        Ok(state
            .trades_newest_first()
            .into_iter()
            .filter(|v| v.value.is_closed())
            .map(|v| v.value.clone())
            .collect())
    }

    async fn recent_closed_trades(&self, limit: usize) -> Result<Vec<Trade>> {
        let state = self.state.read().await;
        let mut closed: Vec<&Versioned<Trade>> = state.trades.values().filter(|v| v.value.is_closed()).collect();
        closed.sort_by(|a, b| {
            b.value
                .closed_at
                .cmp(&a.value.closed_at)
                .then_with(|| b.rev.cmp(&a.rev))
        });
        Ok(closed.into_iter().take(limit).map(|v| v.value.clone()).collect())
    }

    async fn get_signal(&self, id: &str) -> Result<Option<Signal>> {
        let state = self.state.read().await;
        Ok(state.signals.get(id).map(|v| v.value.clone()))
    }

    async fn save_signal(&self, signal: &Signal) -> Result<()> {
        let mut state = self.state.write().await;
        let rev = state.next_rev();
        state.signals.insert(
            signal.id.clone(),
            Versioned {
                rev,
                value: signal.clone(),
            },
        );
        Ok(())
    }

    async fn list_signals(&self, limit: usize) -> Result<Vec<Signal>> {
        let state = self.state.read().await;
        let mut signals: Vec<&Versioned<Signal>> = state.signals.values().collect();
        signals.sort_by(|a, b| {
            b.value
                .timestamp
                .cmp(&a.value.timestamp)
                .then_with(|| b.rev.cmp(&a.rev))
        });
        Ok(signals.into_iter().take(limit).map(|v| v.value.clone()).collect())
    }

    async fn append_learning_event(&self, event: &LearningEvent) -> Result<()> {
        let mut state = self.state.write().await;
        state.learning.push(event.clone());
        Ok(())
    }

    async fn list_learning_events(&self, limit: usize) -> Result<Vec<LearningEvent>> {
        let state = self.state.read().await;
        Ok(state.learning.iter().rev().take(limit).cloned().collect())
    }

    async fn load_memory(&self) -> Result<Option<AgentMemory>> {
        Ok(self.state.read().await.memory.clone())
    }

    async fn save_memory(&self, memory: &AgentMemory) -> Result<()> {
        self.state.write().await.memory = Some(memory.clone());
        Ok(())
    }
}
