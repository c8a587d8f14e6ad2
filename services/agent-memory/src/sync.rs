//! Periodic reconciliation of the local replica with the shared one

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::client::MemoryRemote;
use crate::guard::{SyncGuard, SyncSkipped};
use crate::memory::AgentMemory;
use crate::replica::LocalReplica;

/// Result of one sync attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Synced(AgentMemory),
    Skipped(SyncSkipped),
}

/// Drives push → merge → absorb rounds for one local replica
pub struct MemorySyncer {
    replica: Arc<LocalReplica>,
    remote: Arc<dyn MemoryRemote>,
    guard: SyncGuard,
}

impl MemorySyncer {
    pub fn new(replica: Arc<LocalReplica>, remote: Arc<dyn MemoryRemote>) -> Self {
        Self::with_guard(replica, remote, SyncGuard::default())
    }

    pub fn with_guard(replica: Arc<LocalReplica>, remote: Arc<dyn MemoryRemote>, guard: SyncGuard) -> Self {
        Self { replica, remote, guard }
    }

    /// Run one round trip: push the local snapshot, then merge the returned
    /// replica back so both sides reach the same fixed point.
    pub async fn sync_once(&self) -> anyhow::Result<SyncOutcome> {
        let _permit = match self.guard.try_begin() {
            Ok(permit) => permit,
            Err(skipped) => {
                debug!("Memory sync skipped: {}", skipped);
                return Ok(SyncOutcome::Skipped(skipped));
            }
        };

        let local = self.replica.snapshot().await;
        let returned = self.remote.push(&local).await?;
        let merged = self.replica.absorb(&returned).await?;

        info!(
            level = merged.level,
            lessons = merged.lessons.len(),
            "Agent memory synced"
        );
        Ok(SyncOutcome::Synced(merged))
    }

    /// Sync on a fixed period until the task is dropped
    pub async fn run(self, period: Duration) {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sync_once().await {
                error!("Memory sync error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::merge;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tokio_test::assert_ok;

    /// Shared replica kept in memory, applying the server's half of the protocol
    struct InMemoryRemote {
        stored: Mutex<AgentMemory>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait::async_trait]
    impl MemoryRemote for InMemoryRemote {
        async fn push(&self, memory: &AgentMemory) -> anyhow::Result<AgentMemory> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let mut stored = self.stored.lock().unwrap();
            let merged = merge(memory, &stored);
            *stored = merged.clone();
            Ok(merged)
        }
    }

    struct FailingRemote;

    #[async_trait::async_trait]
    impl MemoryRemote for FailingRemote {
        async fn push(&self, _memory: &AgentMemory) -> anyhow::Result<AgentMemory> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    /// Refuses the first push, then accepts everything
    #[derive(Default)]
    struct FlakyRemote {
        pushes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MemoryRemote for FlakyRemote {
        async fn push(&self, memory: &AgentMemory) -> anyhow::Result<AgentMemory> {
            if self.pushes.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(anyhow::anyhow!("connection reset"));
            }
            Ok(memory.clone())
        }
    }

    async fn replica_in(dir: &tempfile::TempDir, name: &str) -> Arc<LocalReplica> {
        Arc::new(LocalReplica::open(dir.path().join(name)).await.unwrap())
    }

    #[tokio::test]
    async fn test_two_replicas_converge() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(InMemoryRemote {
            stored: Mutex::new(AgentMemory::seed()),
            gate: None,
        });

        let phone = replica_in(&dir, "phone.json").await;
        let laptop = replica_in(&dir, "laptop.json").await;
        phone.add_lesson("phone lesson", "TRENDING_UP").await.unwrap();
        phone.add_experience(250).await.unwrap();
        laptop.add_lesson("laptop lesson", "RANGING").await.unwrap();

        let phone_sync = MemorySyncer::with_guard(phone.clone(), remote.clone(), SyncGuard::new(Duration::ZERO));
        let laptop_sync = MemorySyncer::with_guard(laptop.clone(), remote.clone(), SyncGuard::new(Duration::ZERO));

        phone_sync.sync_once().await.unwrap();
        laptop_sync.sync_once().await.unwrap();
        phone_sync.sync_once().await.unwrap();

        let a = phone.snapshot().await;
        let b = laptop.snapshot().await;
        assert_eq!(a.lessons, b.lessons);
        assert_eq!(a.level, b.level);
        assert_eq!(a.level, 3);
        assert_eq!(a.lessons.len(), 3);
    }

    #[tokio::test]
    async fn test_overlapping_sync_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let remote = Arc::new(InMemoryRemote {
            stored: Mutex::new(AgentMemory::seed()),
            gate: Some(gate.clone()),
        });
        let syncer = Arc::new(MemorySyncer::with_guard(
            replica_in(&dir, "m.json").await,
            remote,
            SyncGuard::new(Duration::ZERO),
        ));

        let first = {
            let syncer = syncer.clone();
            tokio::spawn(async move { syncer.sync_once().await })
        };
        while !syncer.guard.is_in_flight() {
            tokio::task::yield_now().await;
        }

        let second = syncer.sync_once().await.unwrap();
        assert_eq!(second, SyncOutcome::Skipped(SyncSkipped::InFlight));

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, SyncOutcome::Synced(_)));
    }

    #[tokio::test]
    async fn test_failed_push_releases_guard() {
        let dir = tempfile::tempdir().unwrap();
        let syncer = MemorySyncer::with_guard(
            replica_in(&dir, "m.json").await,
            Arc::new(FailingRemote),
            SyncGuard::new(Duration::ZERO),
        );
        assert!(syncer.sync_once().await.is_err());
        assert!(!syncer.guard.is_in_flight());
    }

    #[tokio::test]
    async fn test_cooldown_skips_second_round() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(InMemoryRemote {
            stored: Mutex::new(AgentMemory::seed()),
            gate: None,
        });
        let syncer = MemorySyncer::new(replica_in(&dir, "m.json").await, remote);

        assert!(matches!(syncer.sync_once().await.unwrap(), SyncOutcome::Synced(_)));
        assert!(matches!(
            syncer.sync_once().await.unwrap(),
            SyncOutcome::Skipped(SyncSkipped::Cooldown { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_keeps_syncing_after_a_failed_round() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Arc::new(FlakyRemote::default());
        let syncer = MemorySyncer::with_guard(
            replica_in(&dir, "m.json").await,
            remote.clone(),
            SyncGuard::new(Duration::ZERO),
        );
        let task = tokio::spawn(syncer.run(Duration::from_millis(10)));

        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while remote.pushes.load(Ordering::SeqCst) < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        task.abort();
        assert_ok!(waited);
    }
}
