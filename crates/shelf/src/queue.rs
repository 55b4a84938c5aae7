//! Download queue bookkeeping
//!
//! Every accepted transfer gets a row. When the upstream queue reports a batch
//! as finished, each row is handed to a cleanup task (decrypt/finalize of its
//! directory). The row only disappears after that task's report arrives, so a
//! directory is never dropped from view while it is still being read.

use crate::collaborators::Decryptor;
use crate::progress::{ProgressCallback, ProgressDisplay, ProgressEvent, ProgressSample, ProgressSource, size_human};
use crate::tasks::{TaskId, TaskKind, TaskLauncher, TaskReport};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifier assigned by the queue source; duplicate names stay distinct
pub type EntryId = u64;

/// One in-flight background transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: EntryId,
    pub name: String,
    pub total_size: u64,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Active,
    CleanupPending { task: TaskId },
    /// Cleanup failed; the row stays until removal is requested again
    CleanupFailed { reason: String },
}

/// A displayed queue row with its live progress indicator
#[derive(Debug, Clone)]
pub struct QueueRow {
    pub entry: QueueEntry,
    pub size_label: String,
    pub progress: ProgressDisplay,
    pub state: EntryState,
}

/// What became of a finished cleanup task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResolution {
    Removed(QueueEntry),
    Stuck { entry: EntryId, reason: String },
    /// The report did not belong to a queue cleanup
    Unrelated,
}

pub struct DownloadQueue {
    rows: Vec<QueueRow>,
    pending: HashMap<TaskId, EntryId>,
    launcher: TaskLauncher,
    cleanup: Arc<dyn Decryptor>,
    progress: ProgressCallback,
}

impl DownloadQueue {
    pub fn new(launcher: TaskLauncher, cleanup: Arc<dyn Decryptor>, progress: ProgressCallback) -> Self {
        Self {
            rows: Vec::new(),
            pending: HashMap::new(),
            launcher,
            cleanup,
            progress,
        }
    }

    /// Append a row; never replaces an existing one
    pub fn add(&mut self, entry: QueueEntry) {
        debug!("Queue add #{} {} ({} bytes)", entry.id, entry.name, entry.total_size);
        self.rows.push(QueueRow {
            size_label: size_human(entry.total_size),
            progress: ProgressDisplay::idle(),
            state: EntryState::Active,
            entry,
        });
    }

    /// Launch cleanup for a displayed entry and defer the row removal
    ///
    /// Returns the cleanup task, or `None` when nothing was launched (entry
    /// not displayed, or its cleanup already pending).
    pub fn request_removal(&mut self, id: EntryId) -> Option<TaskId> {
        let row = self.rows.iter_mut().find(|row| row.entry.id == id)?;
        if let EntryState::CleanupPending { task } = row.state {
            debug!("Cleanup for #{} already pending as task #{}", id, task);
            return None;
        }

        let cleanup = self.cleanup.clone();
        let progress = self.progress.clone();
        let directory = row.entry.directory.clone();
        let task = self.launcher.launch(TaskKind::QueueCleanup, row.entry.name.clone(), async move {
            let result = cleanup.decrypt(&directory, progress.clone()).await;
            progress(ProgressEvent::done(ProgressSource::Decrypt));
            result
        });

        row.state = EntryState::CleanupPending { task };
        self.pending.insert(task, id);
        Some(task)
    }

    /// Request removal of each entry, in the order given
    pub fn finish_all(&mut self, entries: &[QueueEntry]) -> Vec<TaskId> {
        entries
            .iter()
            .filter_map(|entry| self.request_removal(entry.id))
            .collect()
    }

    /// Apply a task report; removes the row only when its cleanup succeeded
    pub fn resolve_cleanup(&mut self, report: &TaskReport) -> CleanupResolution {
        let Some(id) = self.pending.remove(&report.id) else {
            return CleanupResolution::Unrelated;
        };
        let Some(index) = self.rows.iter().position(|row| row.entry.id == id) else {
            return CleanupResolution::Unrelated;
        };

        match &report.outcome {
            Ok(()) => {
                let row = self.rows.remove(index);
                info!("Queue entry {} finalized", row.entry.name);
                CleanupResolution::Removed(row.entry)
            }
            Err(failure) => {
                warn!("Queue entry {} stuck: cleanup failed: {}", self.rows[index].entry.name, failure);
                self.rows[index].state = EntryState::CleanupFailed {
                    reason: failure.message.clone(),
                };
                CleanupResolution::Stuck {
                    entry: id,
                    reason: failure.message.clone(),
                }
            }
        }
    }

    /// Refresh the live progress indicator of one row
    pub fn update_progress(&mut self, id: EntryId, sample: &ProgressSample) -> bool {
        match self.rows.iter_mut().find(|row| row.entry.id == id) {
            Some(row) => {
                row.progress = sample.render();
                true
            }
            None => false,
        }
    }

    pub fn rows(&self) -> &[QueueRow] {
        &self.rows
    }

    pub fn row(&self, id: EntryId) -> Option<&QueueRow> {
        self.rows.iter().find(|row| row.entry.id == id)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.row(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
