//! Progress aggregation for the shared progress display
//!
//! Three producers report progress in different shapes: archive and library
//! work report a plain `current/max`, the decrypter reports bytes plus a file
//! counter, and downloads report bytes with elapsed time. Every sample is
//! tagged with its source and a timestamp; the display shows the newest one.
//! A producer sends [`ProgressEvent::Done`] when its operation ends so its
//! last sample does not linger.

pub mod format;
pub mod reporter;

pub use format::{DownloadSpeed, SpeedUnit, size_human};
pub use reporter::{ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter, ProgressReporter};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress callback handed to background producers
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Which operation produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressSource {
    Archive,
    Decrypt,
    Library,
    Download,
}

/// One progress report in one of the three producer shapes
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressSample {
    Basic {
        current: u64,
        max: u64,
    },
    MultiFile {
        current: u64,
        max: u64,
        file_index: u32,
        file_count: u32,
    },
    Download {
        received: u64,
        total: u64,
        elapsed: Duration,
    },
}

/// What the progress bar shows
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressDisplay {
    pub max: u64,
    pub value: u64,
    pub label: String,
}

impl ProgressDisplay {
    pub fn idle() -> Self {
        Self {
            max: 100,
            value: 0,
            label: String::new(),
        }
    }
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self::idle()
    }
}

impl ProgressSample {
    /// Compute the full display state for this sample
    pub fn render(&self) -> ProgressDisplay {
        match *self {
            ProgressSample::Basic { current, max } => ProgressDisplay {
                max,
                value: current.min(max),
                label: format!("{}/{}", current, max),
            },
            ProgressSample::MultiFile {
                current,
                max,
                file_index,
                file_count,
            } => {
                let percent = format::percentage(current, max);
                ProgressDisplay {
                    max: 100,
                    value: percent.min(100.0) as u64,
                    label: format!(
                        "{}% {} / {} | {} / {} files",
                        format::significant(percent, 3),
                        size_human(current),
                        size_human(max),
                        file_index,
                        file_count
                    ),
                }
            }
            ProgressSample::Download {
                received,
                total,
                elapsed,
            } => {
                let percent = format::percentage(received, total);
                let speed = DownloadSpeed::measure(received, elapsed);
                ProgressDisplay {
                    max: 100,
                    value: percent.min(100.0) as u64,
                    label: format!(
                        "{}% {} / {} | {}",
                        percent as u64,
                        size_human(received),
                        size_human(total),
                        speed
                    ),
                }
            }
        }
    }
}

/// A sample tagged with where and when it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub source: ProgressSource,
    pub sample: ProgressSample,
    pub at: Instant,
}

impl ProgressUpdate {
    pub fn now(source: ProgressSource, sample: ProgressSample) -> Self {
        Self {
            source,
            sample,
            at: Instant::now(),
        }
    }
}

/// Events emitted by progress producers
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Sample(ProgressUpdate),
    Done { source: ProgressSource, at: Instant },
}

impl ProgressEvent {
    pub fn sample(source: ProgressSource, sample: ProgressSample) -> Self {
        ProgressEvent::Sample(ProgressUpdate::now(source, sample))
    }

    pub fn done(source: ProgressSource) -> Self {
        ProgressEvent::Done {
            source,
            at: Instant::now(),
        }
    }
}

/// Keeps the single shared progress display in sync with the newest sample
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    current: Option<ProgressUpdate>,
    finished: HashMap<ProgressSource, Instant>,
    display: ProgressDisplay,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event; returns true when the display changed
    pub fn apply(&mut self, event: ProgressEvent) -> bool {
        match event {
            ProgressEvent::Sample(update) => self.apply_sample(update),
            ProgressEvent::Done { source, at } => self.apply_done(source, at),
        }
    }

    fn apply_sample(&mut self, update: ProgressUpdate) -> bool {
        if let Some(done_at) = self.finished.get(&update.source) {
            if update.at <= *done_at {
                return false;
            }
        }
        if let Some(current) = &self.current {
            if update.at < current.at {
                return false;
            }
        }
        let display = update.sample.render();
        self.current = Some(update);
        let changed = display != self.display;
        self.display = display;
        changed
    }

    fn apply_done(&mut self, source: ProgressSource, at: Instant) -> bool {
        self.finished.insert(source, at);
        match &self.current {
            Some(current) if current.source == source => {
                self.current = None;
                self.display = ProgressDisplay::idle();
                true
            }
            _ => false,
        }
    }

    pub fn display(&self) -> &ProgressDisplay {
        &self.display
    }

    /// Source of the sample on display, if any
    pub fn showing(&self) -> Option<ProgressSource> {
        self.current.as_ref().map(|u| u.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_render() {
        let display = ProgressSample::Basic { current: 5, max: 10 }.render();
        assert_eq!(display.max, 10);
        assert_eq!(display.value, 5);
        assert_eq!(display.label, "5/10");
    }

    #[test]
    fn test_multi_file_render() {
        let display = ProgressSample::MultiFile {
            current: 1024,
            max: 3072,
            file_index: 2,
            file_count: 7,
        }
        .render();
        assert_eq!(display.max, 100);
        assert_eq!(display.value, 33);
        assert_eq!(display.label, "33.3% 1.00 KB / 3.00 KB | 2 / 7 files");
    }

    #[test]
    fn test_download_render() {
        let display = ProgressSample::Download {
            received: 2048,
            total: 4096,
            elapsed: Duration::from_secs(1),
        }
        .render();
        assert_eq!(display.value, 50);
        assert_eq!(display.label, "50% 2.00 KB / 4.00 KB | 2.0 kB/s");
    }

    #[test]
    fn test_overshoot_is_clamped_to_full() {
        let files = ProgressSample::MultiFile {
            current: 300,
            max: 200,
            file_index: 3,
            file_count: 3,
        }
        .render();
        assert_eq!(files.value, 100);

        let download = ProgressSample::Download {
            received: 5000,
            total: 4096,
            elapsed: Duration::from_secs(1),
        }
        .render();
        assert_eq!(download.value, download.max);
    }

    #[test]
    fn test_latest_sample_wins_across_shapes() {
        let mut aggregator = ProgressAggregator::new();
        let t0 = Instant::now();

        let decrypt = ProgressUpdate {
            source: ProgressSource::Decrypt,
            sample: ProgressSample::MultiFile { current: 1, max: 2, file_index: 1, file_count: 1 },
            at: t0 + Duration::from_millis(10),
        };
        let archive = ProgressUpdate {
            source: ProgressSource::Archive,
            sample: ProgressSample::Basic { current: 3, max: 4 },
            at: t0,
        };

        assert!(aggregator.apply(ProgressEvent::Sample(decrypt)));
        // Older sample from another producer arrives late and is ignored
        assert!(!aggregator.apply(ProgressEvent::Sample(archive)));
        assert_eq!(aggregator.showing(), Some(ProgressSource::Decrypt));
    }

    #[test]
    fn test_done_clears_display_and_drops_stale_samples() {
        let mut aggregator = ProgressAggregator::new();
        let t0 = Instant::now();
        let sample = |at| {
            ProgressEvent::Sample(ProgressUpdate {
                source: ProgressSource::Archive,
                sample: ProgressSample::Basic { current: 1, max: 2 },
                at,
            })
        };

        aggregator.apply(sample(t0));
        assert!(aggregator.apply(ProgressEvent::Done {
            source: ProgressSource::Archive,
            at: t0 + Duration::from_millis(5),
        }));
        assert_eq!(aggregator.display(), &ProgressDisplay::idle());
        assert_eq!(aggregator.showing(), None);

        // Emitted before done, delivered after: stale
        assert!(!aggregator.apply(sample(t0 + Duration::from_millis(1))));
        // A new operation from the same source shows again
        assert!(aggregator.apply(sample(t0 + Duration::from_millis(10))));
    }

    #[test]
    fn test_done_from_other_source_keeps_display() {
        let mut aggregator = ProgressAggregator::new();
        aggregator.apply(ProgressEvent::sample(
            ProgressSource::Download,
            ProgressSample::Download { received: 1, total: 2, elapsed: Duration::from_secs(1) },
        ));
        assert!(!aggregator.apply(ProgressEvent::done(ProgressSource::Archive)));
        assert_eq!(aggregator.showing(), Some(ProgressSource::Download));
    }
}
