//! Best-effort locking for shared non-display state
//!
//! Callers wait a bounded time for the lock; if it is still held they skip
//! their update instead of stalling the event context. Skips are counted so
//! staleness shows up in diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(100);

/// Counters for lock acquisitions and skips
#[derive(Debug, Default)]
pub struct LockMetrics {
    pub acquired: AtomicU64,
    pub skipped: AtomicU64,
}

impl LockMetrics {
    pub fn record_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LockMetricsSnapshot {
        LockMetricsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockMetricsSnapshot {
    pub acquired: u64,
    pub skipped: u64,
}

/// A mutex acquired with a bounded wait
#[derive(Debug)]
pub struct BestEffortLock<T> {
    name: &'static str,
    inner: Mutex<T>,
    wait: Duration,
    metrics: LockMetrics,
}

impl<T> BestEffortLock<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self::with_wait(name, value, DEFAULT_LOCK_WAIT)
    }

    pub fn with_wait(name: &'static str, value: T, wait: Duration) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
            wait,
            metrics: LockMetrics::default(),
        }
    }

    /// Wait up to the configured bound; `None` means the caller skips
    pub async fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match tokio::time::timeout(self.wait, self.inner.lock()).await {
            Ok(guard) => {
                self.metrics.record_acquired();
                Some(guard)
            }
            Err(_) => {
                self.metrics.record_skipped();
                debug!("{} lock busy after {:?}, skipping", self.name, self.wait);
                None
            }
        }
    }

    /// Non-waiting variant for synchronous callers
    pub fn try_lock_now(&self) -> Option<MutexGuard<'_, T>> {
        match self.inner.try_lock() {
            Ok(guard) => {
                self.metrics.record_acquired();
                Some(guard)
            }
            Err(_) => {
                self.metrics.record_skipped();
                debug!("{} lock busy, skipping", self.name);
                None
            }
        }
    }

    /// Unbounded acquire, for writers that run off the event context
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        let guard = self.inner.lock().await;
        self.metrics.record_acquired();
        guard
    }

    pub fn metrics(&self) -> LockMetricsSnapshot {
        self.metrics.snapshot()
    }
}
