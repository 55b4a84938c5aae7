//! Reporter-style hooks over [`ProgressEvent`]s

use super::{ProgressCallback, ProgressEvent, ProgressSample, ProgressSource};
use std::sync::Arc;
use std::time::Duration;

/// Trait for progress reporting with one hook per sample shape
pub trait ProgressReporter: Send + Sync {
    fn on_basic(&self, _source: ProgressSource, _current: u64, _max: u64) {}
    fn on_multi_file(&self, _source: ProgressSource, _current: u64, _max: u64, _file_index: u32, _file_count: u32) {}
    fn on_download(&self, _source: ProgressSource, _received: u64, _total: u64, _elapsed: Duration) {}
    fn on_done(&self, _source: ProgressSource) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::Sample(update) => match update.sample {
                ProgressSample::Basic { current, max } => {
                    self.on_basic(update.source, current, max);
                }
                ProgressSample::MultiFile { current, max, file_index, file_count } => {
                    self.on_multi_file(update.source, current, max, file_index, file_count);
                }
                ProgressSample::Download { received, total, elapsed } => {
                    self.on_download(update.source, received, total, elapsed);
                }
            },
            ProgressEvent::Done { source, .. } => self.on_done(source),
        })
    }
}

/// Prints rendered samples to stdout
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn print(&self, source: ProgressSource, sample: ProgressSample) {
        if self.verbose {
            println!("[{:?}] {}", source, sample.render().label);
        }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_basic(&self, source: ProgressSource, current: u64, max: u64) {
        self.print(source, ProgressSample::Basic { current, max });
    }

    fn on_multi_file(&self, source: ProgressSource, current: u64, max: u64, file_index: u32, file_count: u32) {
        self.print(source, ProgressSample::MultiFile { current, max, file_index, file_count });
    }

    fn on_download(&self, source: ProgressSource, received: u64, total: u64, elapsed: Duration) {
        self.print(source, ProgressSample::Download { received, total, elapsed });
    }

    fn on_done(&self, source: ProgressSource) {
        println!("[{:?}] done", source);
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}
