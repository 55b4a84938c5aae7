//! Subscriber setup for stderr and the optional debug log file
//!
//! The file layer writes through [`SkippingFileWriter`]: when another thread
//! holds the file, the line is dropped and counted instead of waiting.

use crate::error::{Result, ShelfError};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*};

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Debug level on stderr instead of info
    pub verbose: bool,
    /// Debug log file; `None` leaves file logging off
    pub log_file: Option<PathBuf>,
}

/// Log file writer that never waits for the file
#[derive(Debug, Clone)]
pub struct SkippingFileWriter {
    file: Arc<Mutex<File>>,
    skipped: Arc<AtomicU64>,
}

impl SkippingFileWriter {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ShelfError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ShelfError::io(path, e))?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            skipped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Lines dropped because the file was busy
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// One event's writer handed out by [`SkippingFileWriter`]
pub struct SkippingWriter {
    file: Arc<Mutex<File>>,
    skipped: Arc<AtomicU64>,
}

impl Write for SkippingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.try_lock() {
            Ok(mut file) => file.write_all(buf)?,
            Err(TryLockError::WouldBlock) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.try_lock() {
            Ok(mut file) => file.flush(),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SkippingFileWriter {
    type Writer = SkippingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SkippingWriter {
            file: Arc::clone(&self.file),
            skipped: Arc::clone(&self.skipped),
        }
    }
}

/// Install the global subscriber
///
/// Returns the file writer when file logging is on so callers can read the
/// skip count. A subscriber that is already installed is left in place.
pub fn init_logging(options: &LoggingOptions) -> Result<Option<SkippingFileWriter>> {
    let console_level = if options.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(Targets::new().with_default(console_level));

    let writer = options.log_file.as_deref().map(SkippingFileWriter::open).transpose()?;
    let file_layer = writer.clone().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(Targets::new().with_default(LevelFilter::DEBUG))
    });

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("Subscriber already installed, keeping it");
    }

    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writer_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("shelf.log");
        let writer = SkippingFileWriter::open(&path).unwrap();

        writer.make_writer().write_all(b"first\n").unwrap();
        writer.make_writer().write_all(b"second\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert_eq!(writer.skipped(), 0);
    }

    #[test]
    fn test_busy_file_drops_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shelf.log");
        let writer = SkippingFileWriter::open(&path).unwrap();

        let held = writer.file.lock().unwrap();
        let written = writer.make_writer().write(b"dropped\n").unwrap();
        drop(held);

        assert_eq!(written, 8);
        assert_eq!(writer.skipped(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_init_with_file() {
        let dir = tempdir().unwrap();
        let options = LoggingOptions {
            verbose: true,
            log_file: Some(dir.path().join("shelf.log")),
        };
        let writer = init_logging(&options).unwrap();
        assert!(writer.is_some());
        assert!(dir.path().join("shelf.log").is_file());
    }
}
