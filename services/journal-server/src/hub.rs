//! In-process event fan-out
//!
//! Each subscriber owns a bounded channel. Publishing never waits: a full
//! channel loses that one event for that one subscriber, a closed channel
//! is unregistered on the spot.

use agent_memory::AgentMemory;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::{LearningEvent, Signal, Trade};
use crate::stats::TradeStats;

/// State handed to a subscriber when it connects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitSnapshot {
    pub stats: TradeStats,
    pub trades: Vec<Trade>,
    pub signals: Vec<Signal>,
}

/// Everything a viewer can be told about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JournalEvent {
    Connected { subscriber_id: u64 },
    Init(Box<InitSnapshot>),
    TradeOpen(Trade),
    TradeClose(Trade),
    TradeUpdate(Trade),
    SignalNew(Signal),
    SignalUpdate(Signal),
    StatsUpdate(TradeStats),
    LearningUpdate(LearningEvent),
    MemorySync(AgentMemory),
    Heartbeat,
}

impl JournalEvent {
    /// Wire name, same as the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            JournalEvent::Connected { .. } => "connected",
            JournalEvent::Init(_) => "init",
            JournalEvent::TradeOpen(_) => "trade_open",
            JournalEvent::TradeClose(_) => "trade_close",
            JournalEvent::TradeUpdate(_) => "trade_update",
            JournalEvent::SignalNew(_) => "signal_new",
            JournalEvent::SignalUpdate(_) => "signal_update",
            JournalEvent::StatsUpdate(_) => "stats_update",
            JournalEvent::LearningUpdate(_) => "learning_update",
            JournalEvent::MemorySync(_) => "memory_sync",
            JournalEvent::Heartbeat => "heartbeat",
        }
    }
}

type Registry = Mutex<HubInner>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<JournalEvent>>,
}

struct Shared {
    registry: Registry,
    capacity: usize,
    dropped: AtomicU64,
}

/// Default per-subscriber buffer
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventHub {
    shared: Arc<Shared>,
}

impl EventHub {
    /// `capacity` is the per-subscriber buffer; it always fits the two
    /// greeting events.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(HubInner::default()),
                capacity: capacity.max(2),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HubInner> {
        lock(&self.shared.registry)
    }

    /// Register a subscriber whose channel already holds `connected` and
    /// `init`. Callers hold the writer lock so no mutation lands between
    /// the snapshot and the registration.
    pub fn subscribe(&self, init: InitSnapshot) -> Subscription {
        let (tx, rx) = mpsc::channel(self.shared.capacity);
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = registry.next_id;

        // Fresh channel with capacity >= 2, these cannot fail
        let _ = tx.try_send(JournalEvent::Connected { subscriber_id: id });
        let _ = tx.try_send(JournalEvent::Init(Box::new(init)));
        registry.subscribers.insert(id, tx);
        debug!(subscriber_id = id, total = registry.subscribers.len(), "Subscriber registered");

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.shared),
        }
    }

    /// Deliver to every live subscriber without waiting on any of them
    pub fn publish(&self, event: JournalEvent) {
        let mut registry = self.registry();
        let mut closed = Vec::new();

        for (id, tx) in registry.subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(subscriber_id = id, event = event.kind(), "Subscriber buffer full, event dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            registry.subscribers.remove(&id);
            debug!(subscriber_id = id, "Subscriber channel closed, unregistered");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }

    /// Events lost to full subscriber buffers since start
    pub fn dropped_events(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Send `heartbeat` on a fixed period. The task ends once every handle
    /// to the hub is gone.
    pub fn spawn_heartbeat(&self, period: Duration) -> JoinHandle<()> {
        let hub = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(shared) = hub.upgrade() else {
                    break;
                };
                EventHub { shared }.publish(JournalEvent::Heartbeat);
            }
        })
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

// A panicked publisher cannot leave the registry half-written, so a
// poisoned lock is still safe to use.
fn lock(registry: &Registry) -> MutexGuard<'_, HubInner> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Receiving end of one subscriber. Dropping it unregisters.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<JournalEvent>,
    hub: Weak<Shared>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<JournalEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<JournalEvent> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> impl Stream<Item = JournalEvent> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.hub.upgrade() {
            let mut registry = lock(&shared.registry);
            registry.subscribers.remove(&self.id);
            debug!(subscriber_id = self.id, "Subscriber dropped");
        }
    }
}
