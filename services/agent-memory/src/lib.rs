//! Agent Memory
//!
//! Level, experience and lessons of the trading agent, replicated between a
//! local copy and the journal server's shared copy.

pub mod client;
pub mod guard;
pub mod memory;
pub mod replica;
pub mod sync;

pub use client::{MemoryRemote, MemorySyncClient};
pub use guard::{SyncGuard, SyncPermit, SyncSkipped, DEFAULT_SYNC_COOLDOWN};
pub use memory::{brain_version, merge, AgentMemory, Lesson, GENESIS_LESSON_ID, MAX_LESSONS};
pub use replica::{LocalReplica, MemoryError};
pub use sync::{MemorySyncer, SyncOutcome};
