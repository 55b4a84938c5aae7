//! Contracts with the external collaborators
//!
//! The core reaches decrypting, archiving, the library database, downloads,
//! the gamepad, the foreground process and confirmation prompts only through
//! these traits. Implementations are injected into the controller through
//! [`Services`].

use crate::content_id::ContentId;
use crate::error::Result;
use crate::events::EventSink;
use crate::process::LaunchCommand;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Title metadata file, half of the decrypt companion pair
pub const METADATA_FILE: &str = "tmd";
/// Ticket file, the other half of the decrypt companion pair
pub const TICKET_FILE: &str = "cetk";

/// One title known to the library
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub id: ContentId,
    pub name: String,
    pub region: String,
    /// Content directory holding the companion files
    pub directory: PathBuf,
    /// Executable image inside the content directory
    pub executable: PathBuf,
    /// Installed metadata descriptor
    pub metadata: PathBuf,
    pub cover_art: PathBuf,
}

impl LibraryEntry {
    /// Row label, `[REGION] Name`; the filter matches against this
    pub fn display_name(&self) -> String {
        format!("[{}] {}", self.region, self.name)
    }

    /// Name shown in menus: the directory name, or the title name
    pub fn short_name(&self) -> String {
        self.directory
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn has_executable(&self) -> bool {
        self.executable.is_file()
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.is_file()
    }

    /// Both decrypt companion files exist in the content directory
    pub fn has_ticket_pair(&self) -> bool {
        has_ticket_pair(&self.directory)
    }

    pub fn cover_exists(&self) -> bool {
        self.cover_art.is_file()
    }
}

pub fn has_ticket_pair(directory: &Path) -> bool {
    directory.join(METADATA_FILE).is_file() && directory.join(TICKET_FILE).is_file()
}

/// Decrypts downloaded content in place
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, directory: &Path, progress: ProgressCallback) -> Result<()>;
}

/// Archive creation and extraction
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn compress(&self, source: &Path, destination: &Path, progress: ProgressCallback) -> Result<()>;
    async fn decompress(&self, source: &Path, destination: &Path, progress: ProgressCallback) -> Result<()>;
}

/// The download queue source
///
/// `download` queues a title; the service then reports through the sink with
/// `QueueEntryAdded`, `QueueProgress` and `QueueFinished` events.
#[async_trait]
pub trait DownloadService: Send + Sync {
    async fn download(&self, id: &ContentId, base_dir: &Path, events: EventSink) -> Result<()>;
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}

/// The game library database and scanner
#[async_trait]
pub trait Library: Send + Sync {
    async fn init(&self, base_dir: &Path, events: EventSink) -> Result<()>;
    /// Scan `dir`, emitting `LibraryEntryAdded`/`TitleAdded` and finally `LibraryLoaded`
    async fn setup_library(&self, dir: &Path, rescan: bool, events: EventSink) -> Result<()>;
    fn entry(&self, id: &ContentId) -> Option<Arc<LibraryEntry>>;
    /// Path of the persisted library database
    fn database_path(&self) -> PathBuf;
    async fn remove_entry(&self, id: &ContentId) -> Result<()>;
    async fn backup_save(&self, entry: &LibraryEntry, backup_dir: &Path) -> Result<()>;
    async fn import_save(&self, entry: &LibraryEntry, archive: &Path) -> Result<()>;
    async fn purge_save(&self, entry: &LibraryEntry) -> Result<()>;
}

/// Gamepad driver
#[async_trait]
pub trait Gamepad: Send + Sync {
    /// Poll until `shutdown` fires, sending `ControllerEvent::Gamepad` events
    async fn poll(&self, events: EventSink, shutdown: CancellationToken) -> Result<()>;
    fn set_enabled(&self, enabled: bool);
}

/// The foreground content process
pub trait ProcessRunner: Send + Sync {
    fn start(&self, command: LaunchCommand) -> Result<()>;
    fn is_running(&self) -> bool;
    fn terminate(&self) -> Result<()>;
}

/// Yes/no confirmation for destructive actions
pub trait Prompt: Send + Sync {
    fn confirm(&self, title: &str, question: &str) -> bool;
}

/// Everything the controller talks to
#[derive(Clone)]
pub struct Services {
    pub decryptor: Arc<dyn Decryptor>,
    pub archiver: Arc<dyn Archiver>,
    pub downloads: Arc<dyn DownloadService>,
    pub library: Arc<dyn Library>,
    pub gamepad: Arc<dyn Gamepad>,
    pub process: Arc<dyn ProcessRunner>,
    pub prompt: Arc<dyn Prompt>,
}
