//! Mutual exclusion and cooldown for replica syncs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum interval between two sync attempts
pub const DEFAULT_SYNC_COOLDOWN: Duration = Duration::from_secs(60);

/// Why a sync attempt did not start
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncSkipped {
    #[error("sync already in flight")]
    InFlight,

    #[error("sync cooldown active ({remaining:?} remaining)")]
    Cooldown { remaining: Duration },
}

/// Allows at most one sync at a time and rejects attempts that come too soon
/// after the previous one. Rejected attempts are skipped, never queued.
pub struct SyncGuard {
    in_flight: AtomicBool,
    last_attempt: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl SyncGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            last_attempt: Mutex::new(None),
            cooldown,
        }
    }

    /// Try to start a sync. The returned permit releases the guard on drop.
    pub fn try_begin(&self) -> Result<SyncPermit<'_>, SyncSkipped> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncSkipped::InFlight);
        }

        let now = Instant::now();
        let mut last = self.last_attempt.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let elapsed = now.duration_since(prev);
            if elapsed < self.cooldown {
                self.in_flight.store(false, Ordering::Release);
                return Err(SyncSkipped::Cooldown {
                    remaining: self.cooldown - elapsed,
                });
            }
        }
        *last = Some(now);

        Ok(SyncPermit { guard: self })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Default for SyncGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_COOLDOWN)
    }
}

/// Held for the duration of one sync
pub struct SyncPermit<'a> {
    guard: &'a SyncGuard,
}

impl Drop for SyncPermit<'_> {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}
