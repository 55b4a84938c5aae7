//! Shelf
//!
//! Core of a front-end for a local library of installable content packages
//! (base titles, add-on content and patches) named by 16 character hex
//! content IDs.
//!
//! Long-running work (downloads, decrypting, archiving, library rescans) runs
//! on the tokio runtime and reports back as [`ControllerEvent`]s. The
//! [`Controller`] applies those events one at a time and owns all display
//! state: the library and title lists, the download queue rows and the
//! shared progress display.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use shelf::{ConfigStore, Controller, EventSink, RuntimeConfig, Services, TaskLauncher};
//!
//! # async fn example(services: Services) -> shelf::Result<()> {
//! let store = ConfigStore::new("/home/me/.shelf");
//! let settings = store.load_or_create()?;
//!
//! let (events, rx) = EventSink::channel();
//! let launcher = TaskLauncher::current(events.clone());
//! let mut controller = Controller::new(services, settings, store, RuntimeConfig::default(), events, launcher);
//!
//! controller.start().await?;
//! controller.run(rx).await;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Content identity**: validation and base/add-on/patch variant derivation
//! - **Download queue**: rows are removed only after their cleanup task reports
//! - **Progress**: tagged, timestamped samples; the newest one is shown
//! - **Navigation**: wrap-around cursor movement that skips hidden rows
//! - **Filtering**: wildcard region/text filter under a best-effort settings lock
//! - **Typed task reports**: every background task reports success or failure

pub mod collaborators;
pub mod config;
pub mod content_id;
pub mod controller;
pub mod error;
pub mod events;
pub mod filter;
pub mod lock;
pub mod logging;
pub mod navigation;
pub mod process;
pub mod progress;
pub mod queue;
pub mod tasks;

// Re-export commonly used types for convenience
pub use collaborators::{LibraryEntry, Services};
pub use config::{ConfigStore, RuntimeConfig, Settings};
pub use content_id::{ContentId, Variant};
pub use controller::{ActionOutcome, ContextAction, ContextMenu, Controller};
pub use error::{ErrorSeverity, Result, ShelfError};
pub use events::{ControllerEvent, EventSink};
pub use filter::{FilterEngine, FilterQuery, FilterReport};
pub use lock::BestEffortLock;
pub use logging::{LoggingOptions, init_logging};
pub use navigation::{GamepadEvent, NavInput};
pub use progress::{ProgressAggregator, ProgressDisplay, ProgressEvent, ProgressSample, ProgressSource};
pub use queue::{DownloadQueue, QueueEntry};
pub use tasks::{TaskId, TaskKind, TaskLauncher, TaskReport};
