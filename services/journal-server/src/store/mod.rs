//! Durable record of trades, signals, learning events and the server memory
//! replica.
//!
//! Storage is reached only through [`JournalRepository`]; the domain rules
//! live in [`TradeStore`] and [`SignalStore`] on top of it.

pub mod memory;
pub mod postgres;
pub mod signals;
pub mod trades;

use agent_memory::AgentMemory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{LearningEvent, Signal, Trade};

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;
pub use signals::SignalStore;
pub use trades::TradeStore;

/// What a store write did to the record it targeted
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Created(T),
    Updated(T),
    /// The write matched the stored record; nothing was saved
    Unchanged(T),
}

impl<T> Change<T> {
    pub fn get(&self) -> &T {
        match self {
            Change::Created(v) | Change::Updated(v) | Change::Unchanged(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Change::Created(v) | Change::Updated(v) | Change::Unchanged(v) => v,
        }
    }
}

/// Storage backend. Every write replaces one whole record.
#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// Backend name for health output
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    async fn get_trade(&self, id: &str) -> Result<Option<Trade>>;

    /// Insert or fully replace a trade
    async fn save_trade(&self, trade: &Trade) -> Result<()>;

    /// Newest `timestamp` first
    async fn list_trades(&self, limit: usize, offset: usize) -> Result<Vec<Trade>>;

    /// Trades whose `timestamp` falls in `[from, to)`, oldest first
    async fn list_trades_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Trade>>;

    async fn list_open_trades(&self) -> Result<Vec<Trade>>;

    async fn list_closed_trades(&self) -> Result<Vec<Trade>>;

    /// Most recently closed first
    async fn recent_closed_trades(&self, limit: usize) -> Result<Vec<Trade>>;

    async fn get_signal(&self, id: &str) -> Result<Option<Signal>>;

    async fn save_signal(&self, signal: &Signal) -> Result<()>;

    /// Newest first
    async fn list_signals(&self, limit: usize) -> Result<Vec<Signal>>;

    async fn append_learning_event(&self, event: &LearningEvent) -> Result<()>;

    /// Newest first
    async fn list_learning_events(&self, limit: usize) -> Result<Vec<LearningEvent>>;

    async fn load_memory(&self) -> Result<Option<AgentMemory>>;

    async fn save_memory(&self, memory: &AgentMemory) -> Result<()>;
}
