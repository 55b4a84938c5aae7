//! Fire-and-forget background work with a result channel
//!
//! The launcher hands work to the tokio runtime and gives the caller nothing
//! but a [`TaskId`]: there is no join handle and no way to cancel. When the
//! work ends, a [`TaskReport`] is sent back onto the controller channel, so a
//! failed task is distinguishable from one that is still running.

use crate::error::Result;
use crate::events::{ControllerEvent, EventSink};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Download,
    Decrypt,
    Compress,
    Decompress,
    LibraryScan,
    QueueCleanup,
    CoverArt,
    GamepadPoll,
    SaveData,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Download => "download",
            TaskKind::Decrypt => "decrypt",
            TaskKind::Compress => "compress",
            TaskKind::Decompress => "decompress",
            TaskKind::LibraryScan => "library scan",
            TaskKind::QueueCleanup => "queue cleanup",
            TaskKind::CoverArt => "cover art",
            TaskKind::GamepadPoll => "gamepad",
            TaskKind::SaveData => "save data",
        };
        f.write_str(name)
    }
}

/// Why a task did not succeed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TaskFailure {
    pub category: &'static str,
    pub message: String,
    pub panicked: bool,
}

/// Completion report delivered as [`ControllerEvent::TaskFinished`]
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub id: TaskId,
    pub kind: TaskKind,
    pub label: String,
    pub outcome: std::result::Result<(), TaskFailure>,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Counters for launched and finished tasks
#[derive(Debug, Default)]
pub struct TaskMetrics {
    pub launched: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
}

impl TaskMetrics {
    fn record_launched(&self) {
        self.launched.fetch_add(1, Ordering::Relaxed);
    }

    fn record_outcome(&self, ok: bool) {
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> TaskMetricsSnapshot {
        TaskMetricsSnapshot {
            launched: self.launched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskMetricsSnapshot {
    pub launched: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl TaskMetricsSnapshot {
    pub fn in_flight(&self) -> u64 {
        self.launched.saturating_sub(self.succeeded).saturating_sub(self.failed)
    }
}

/// Launches work on the shared worker pool
#[derive(Debug, Clone)]
pub struct TaskLauncher {
    handle: Handle,
    events: EventSink,
    next_id: Arc<AtomicU64>,
    metrics: Arc<TaskMetrics>,
}

impl TaskLauncher {
    pub fn new(handle: Handle, events: EventSink) -> Self {
        Self {
            handle,
            events,
            next_id: Arc::new(AtomicU64::new(1)),
            metrics: Arc::new(TaskMetrics::default()),
        }
    }

    /// Launcher on the runtime of the calling context
    pub fn current(events: EventSink) -> Self {
        Self::new(Handle::current(), events)
    }

    pub fn metrics(&self) -> TaskMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run an async unit of work in the background
    pub fn launch<S, F>(&self, kind: TaskKind, label: S, work: F) -> TaskId
    where
        S: Into<String>,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let join = self.handle.spawn(work);
        self.watch(kind, label.into(), join)
    }

    /// Run blocking work (archive, decrypt) on the blocking pool
    pub fn launch_blocking<S, F>(&self, kind: TaskKind, label: S, work: F) -> TaskId
    where
        S: Into<String>,
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let join = self.handle.spawn_blocking(work);
        self.watch(kind, label.into(), join)
    }

    fn watch(&self, kind: TaskKind, label: String, join: tokio::task::JoinHandle<Result<()>>) -> TaskId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let events = self.events.clone();
        let metrics = self.metrics.clone();
        metrics.record_launched();
        debug!("Launched {} task #{}: {}", kind, id, label);

        self.handle.spawn(async move {
            let outcome = match join.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(TaskFailure {
                    category: e.category(),
                    message: e.to_string(),
                    panicked: false,
                }),
                Err(e) => Err(TaskFailure {
                    category: "panic",
                    message: format!("task aborted: {}", e),
                    panicked: e.is_panic(),
                }),
            };

            metrics.record_outcome(outcome.is_ok());
            match &outcome {
                Ok(()) => info!("{} task #{} finished: {}", kind, id, label),
                Err(failure) => warn!("{} task #{} failed ({}): {}: {}", kind, id, failure.category, label, failure),
            }

            let report = TaskReport { id, kind, label, outcome };
            if !events.send(ControllerEvent::TaskFinished(report)) {
                debug!("Controller gone, dropping report for task #{}", id);
            }
        });

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShelfError;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn next_report(rx: &mut UnboundedReceiver<ControllerEvent>) -> TaskReport {
        loop {
            match rx.recv().await {
                Some(ControllerEvent::TaskFinished(report)) => return report,
                Some(_) => continue,
                None => panic!("channel closed"),
            }
        }
    }

    #[tokio::test]
    async fn test_success_is_reported() {
        let (sink, mut rx) = EventSink::channel();
        let launcher = TaskLauncher::current(sink);

        let id = launcher.launch(TaskKind::Compress, "saves", async { Ok(()) });
        let report = next_report(&mut rx).await;

        assert_eq!(report.id, id);
        assert_eq!(report.kind, TaskKind::Compress);
        assert!(report.succeeded());
        assert_eq!(launcher.metrics().succeeded, 1);
    }

    #[tokio::test]
    async fn test_failure_carries_typed_reason() {
        let (sink, mut rx) = EventSink::channel();
        let launcher = TaskLauncher::current(sink);

        launcher.launch_blocking(TaskKind::Decrypt, "/library/game", || {
            Err(ShelfError::collaborator("decrypt", "bad ticket"))
        });
        let report = next_report(&mut rx).await;

        let failure = report.outcome.unwrap_err();
        assert_eq!(failure.category, "collaborator");
        assert!(failure.message.contains("bad ticket"));
        assert!(!failure.panicked);
        assert_eq!(launcher.metrics().failed, 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let (sink, mut rx) = EventSink::channel();
        let launcher = TaskLauncher::current(sink);

        launcher.launch(TaskKind::LibraryScan, "rescan", async {
            if true {
                panic!("scanner crashed");
            }
            Ok(())
        });
        let report = next_report(&mut rx).await;

        let failure = report.outcome.unwrap_err();
        assert!(failure.panicked);
        assert_eq!(launcher.metrics().in_flight(), 0);
    }

    #[test]
    fn test_in_flight_tolerates_torn_snapshot() {
        // Completion counted after the launch counter was read
        let snapshot = TaskMetricsSnapshot {
            launched: 1,
            succeeded: 1,
            failed: 1,
        };
        assert_eq!(snapshot.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (sink, _rx) = EventSink::channel();
        let launcher = TaskLauncher::current(sink);
        let a = launcher.launch(TaskKind::Download, "a", async { Ok(()) });
        let b = launcher.launch(TaskKind::Download, "b", async { Ok(()) });
        assert_ne!(a, b);
    }
}
