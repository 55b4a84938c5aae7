//! Events delivered onto the controller's single event context
//!
//! Background tasks and collaborators never touch display state. They hold an
//! [`EventSink`] and send one of these; the controller applies them serially.

use crate::collaborators::LibraryEntry;
use crate::navigation::GamepadEvent;
use crate::progress::{ProgressCallback, ProgressEvent, ProgressSample, ProgressSource};
use crate::queue::{EntryId, QueueEntry};
use crate::tasks::TaskReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Download queue accepted a transfer
    QueueEntryAdded(QueueEntry),
    /// Download queue finished a batch, in its completion order
    QueueFinished(Vec<QueueEntry>),
    /// Live progress for one queued transfer
    QueueProgress {
        entry: EntryId,
        received: u64,
        total: u64,
        elapsed: Duration,
    },
    Progress(ProgressEvent),
    DecryptStarted,
    DecryptFinished,
    /// Installed content found by the library scan
    LibraryEntryAdded(Arc<LibraryEntry>),
    /// Database title known to the library
    TitleAdded(Arc<LibraryEntry>),
    LibraryLoaded,
    Gamepad(GamepadEvent),
    TaskFinished(TaskReport),
    TabChanged(usize),
    ProcessStarted,
    ProcessExited { code: Option<i32> },
    /// Informational message for the status line
    Status(String),
}

/// Sending half of the controller channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns false once the controller has shut down
    pub fn send(&self, event: ControllerEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Progress callback that forwards into the controller channel
    pub fn progress_callback(&self) -> ProgressCallback {
        let sink = self.clone();
        Arc::new(move |event| {
            sink.send(ControllerEvent::Progress(event));
        })
    }

    /// Shorthand for producers that report one source
    pub fn report(&self, source: ProgressSource, sample: ProgressSample) -> bool {
        self.send(ControllerEvent::Progress(ProgressEvent::sample(source, sample)))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_callback_forwards() {
        let (sink, mut rx) = EventSink::channel();
        let callback = sink.progress_callback();
        callback(ProgressEvent::done(ProgressSource::Decrypt));

        match rx.recv().await {
            Some(ControllerEvent::Progress(ProgressEvent::Done { source, .. })) => {
                assert_eq!(source, ProgressSource::Decrypt)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_send_after_close_reports_false() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.send(ControllerEvent::LibraryLoaded));
    }
}
