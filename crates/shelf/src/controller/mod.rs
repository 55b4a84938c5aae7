//! Window controller: the single event context
//!
//! The controller owns every piece of display state (the two lists, the
//! download queue rows, the shared progress display, menu state and the
//! status line). Background work reports back through [`ControllerEvent`]s
//! which [`Controller::handle`] applies one at a time.

pub mod actions;


pub use actions::{ActionOutcome, ContextAction, ContextMenu, context_actions};

use crate::collaborators::{LibraryEntry, METADATA_FILE, Services, TICKET_FILE};
use crate::config::{ConfigStore, RuntimeConfig, Settings, keys};
use crate::content_id::{ContentId, Variant};
use crate::error::{Result, ShelfError};
use crate::events::{ControllerEvent, EventSink};
use crate::filter::{FilterEngine, FilterQuery, FilterReport};
use crate::lock::BestEffortLock;
use crate::navigation::{ActiveListSelector, Lists, NavOutcome, Navigator, TitleList};
use crate::process::LaunchCommand;
use crate::progress::{ProgressAggregator, ProgressDisplay, ProgressEvent, ProgressSample, ProgressSource};
use crate::queue::{CleanupResolution, DownloadQueue, EntryId};
use crate::tasks::{TaskId, TaskKind, TaskLauncher, TaskReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Oldest failure reports are dropped beyond this
pub const MAX_FAILED_TASKS: usize = 64;

pub struct Controller {
    services: Services,
    settings: Arc<BestEffortLock<Settings>>,
    store: ConfigStore,
    runtime: RuntimeConfig,
    events: EventSink,
    launcher: TaskLauncher,

    lists: Lists,
    selector: ActiveListSelector,
    navigator: Navigator,
    queue: DownloadQueue,
    progress: ProgressAggregator,
    filter: FilterEngine,
    query: FilterQuery,

    menu_enabled: bool,
    decrypts_in_flight: usize,
    status: String,
    failed_tasks: Vec<TaskReport>,
    gamepad_started: bool,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn new(
        services: Services,
        settings: Settings,
        store: ConfigStore,
        runtime: RuntimeConfig,
        events: EventSink,
        launcher: TaskLauncher,
    ) -> Self {
        let queue = DownloadQueue::new(launcher.clone(), services.decryptor.clone(), events.progress_callback());
        Self {
            settings: Arc::new(BestEffortLock::with_wait("settings", settings, runtime.lock_wait)),
            filter: FilterEngine::new(runtime.filter_concurrency),
            lists: Lists::default(),
            selector: ActiveListSelector::default(),
            navigator: Navigator,
            queue,
            progress: ProgressAggregator::new(),
            query: FilterQuery::default(),
            menu_enabled: true,
            decrypts_in_flight: 0,
            status: String::new(),
            failed_tasks: Vec::new(),
            gamepad_started: false,
            shutdown: CancellationToken::new(),
            services,
            store,
            runtime,
            events,
            launcher,
        }
    }

    /// Kick off the initial library load and the gamepad poller if enabled
    pub async fn start(&mut self) -> Result<()> {
        let settings = self.settings_snapshot().await;
        if let Some(base_dir) = settings.base_directory() {
            let library = self.services.library.clone();
            let events = self.events.clone();
            self.launcher.launch(TaskKind::LibraryScan, "init", async move {
                library.init(&base_dir, events).await
            });
        } else {
            info!("No base directory configured, library stays empty");
        }

        let gamepad = settings.get_bool(keys::GAMEPAD);
        self.services.gamepad.set_enabled(gamepad);
        if gamepad {
            self.start_gamepad();
        }
        Ok(())
    }

    /// Drain events until the channel closes or shutdown is requested
    pub async fn run(&mut self, mut rx: UnboundedReceiver<ControllerEvent>) {
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Controller shutting down");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                }
            }
        }
    }

    /// Token that stops [`Controller::run`] and the gamepad poller
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::QueueEntryAdded(entry) => self.queue.add(entry),
            ControllerEvent::QueueFinished(entries) => {
                self.progress.apply(ProgressEvent::done(ProgressSource::Download));
                self.queue.finish_all(&entries);
            }
            ControllerEvent::QueueProgress {
                entry,
                received,
                total,
                elapsed,
            } => {
                let sample = ProgressSample::Download {
                    received,
                    total,
                    elapsed,
                };
                self.queue.update_progress(entry, &sample);
                self.progress.apply(ProgressEvent::sample(ProgressSource::Download, sample));
            }
            ControllerEvent::Progress(event) => {
                self.progress.apply(event);
            }
            ControllerEvent::DecryptStarted => self.menu_enabled = false,
            ControllerEvent::DecryptFinished => self.menu_enabled = self.decrypts_in_flight == 0,
            ControllerEvent::LibraryEntryAdded(entry) => {
                self.lists.library.push_unique_label(entry);
            }
            ControllerEvent::TitleAdded(entry) => self.lists.titles.push(entry),
            ControllerEvent::LibraryLoaded => {
                info!(
                    "Library loaded: {} installed, {} titles",
                    self.lists.library.len(),
                    self.lists.titles.len()
                );
                self.apply_filter().await;
            }
            ControllerEvent::Gamepad(event) => {
                let outcome = self.navigator.handle(event, &self.selector, &mut self.lists);
                self.apply_navigation(outcome).await;
            }
            ControllerEvent::TaskFinished(report) => self.task_finished(report),
            ControllerEvent::TabChanged(tab) => self.selector.set_tab(tab),
            ControllerEvent::ProcessStarted => self.selector.set_foreground_active(true),
            ControllerEvent::ProcessExited { code } => {
                debug!("Foreground process exit code {:?}", code);
                self.selector.set_foreground_active(false);
            }
            ControllerEvent::Status(message) => self.status = message,
        }
    }

    async fn apply_navigation(&mut self, outcome: NavOutcome) {
        match outcome {
            NavOutcome::Launch(content) => {
                if let Err(e) = self.launch_content(&content).await {
                    warn!("Launch failed: {}", e);
                    self.status = e.to_string();
                }
            }
            NavOutcome::Terminate => {
                if let Err(e) = self.services.process.terminate() {
                    warn!("Terminate failed: {}", e);
                }
            }
            NavOutcome::TabChanged(tab) => self.selector.set_tab(tab),
            NavOutcome::Moved { .. } | NavOutcome::Ignored => {}
        }
    }

    fn task_finished(&mut self, report: TaskReport) {
        match self.queue.resolve_cleanup(&report) {
            CleanupResolution::Removed(entry) => {
                self.status = format!("{} is ready", entry.name);
                return;
            }
            CleanupResolution::Stuck { reason, .. } => {
                self.status = format!("{} could not be finalized: {}", report.label, reason);
                self.record_failure(report);
                return;
            }
            CleanupResolution::Unrelated => {}
        }

        match report.kind {
            // A decrypt that died before sending DecryptFinished must not leave the menu off
            TaskKind::Decrypt => {
                self.decrypts_in_flight = self.decrypts_in_flight.saturating_sub(1);
                self.menu_enabled = self.decrypts_in_flight == 0;
            }
            TaskKind::GamepadPoll => self.gamepad_started = false,
            _ => {}
        }

        match &report.outcome {
            Ok(()) => self.status = format!("Finished {}: {}", report.kind, report.label),
            Err(failure) => {
                self.status = format!("{} failed: {}", report.kind, failure);
                self.record_failure(report);
            }
        }
    }

    fn record_failure(&mut self, report: TaskReport) {
        if self.failed_tasks.len() == MAX_FAILED_TASKS {
            self.failed_tasks.remove(0);
        }
        self.failed_tasks.push(report);
    }

    async fn settings_snapshot(&self) -> Settings {
        self.settings.lock().await.clone()
    }

    async fn update_settings<F: FnOnce(&mut Settings)>(&self, update: F) -> Result<()> {
        let mut settings = self.settings.lock().await;
        update(&mut settings);
        self.store.save(&settings)
    }

    async fn base_directory(&self) -> Result<PathBuf> {
        self.settings_snapshot().await.base_directory().ok_or_else(|| ShelfError::Settings {
            message: "no library directory configured".to_string(),
            key: Some(keys::BASE_DIRECTORY.to_string()),
        })
    }

    // ----- library -----

    /// Point the library at `dir` and rescan it
    pub async fn change_library(&mut self, dir: &Path) -> Result<TaskId> {
        if !dir.is_dir() {
            return Err(ShelfError::MissingFile { path: dir.to_path_buf() });
        }
        self.lists.library.clear();
        self.update_settings(|s| s.set_base_directory(dir)).await?;
        info!("Library directory set to {}", dir.display());
        Ok(self.launch_scan(dir.to_path_buf()))
    }

    /// Drop the library database and rescan the configured directory
    pub async fn refresh_library(&mut self) -> Result<TaskId> {
        let base_dir = self.base_directory().await?;
        let database = self.services.library.database_path();
        match std::fs::remove_file(&database) {
            Ok(()) => info!("Removed library database {}", database.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ShelfError::io(&database, e)),
        }
        self.lists.library.clear();
        Ok(self.launch_scan(base_dir))
    }

    fn launch_scan(&self, dir: PathBuf) -> TaskId {
        let library = self.services.library.clone();
        let events = self.events.clone();
        let label = dir.display().to_string();
        self.launcher.launch(TaskKind::LibraryScan, label, async move {
            library.setup_library(&dir, true, events).await
        })
    }

    // ----- content operations -----

    /// Decrypt a directory holding the metadata/ticket pair
    pub fn decrypt_content(&mut self, dir: &Path) -> Result<TaskId> {
        for name in [METADATA_FILE, TICKET_FILE] {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(ShelfError::MissingFile { path });
            }
        }

        info!("Decrypting {}", dir.display());
        self.decrypts_in_flight += 1;
        self.menu_enabled = false;
        let decryptor = self.services.decryptor.clone();
        let events = self.events.clone();
        let dir = dir.to_path_buf();
        Ok(self.launcher.launch(TaskKind::Decrypt, dir.display().to_string(), async move {
            events.send(ControllerEvent::DecryptStarted);
            let result = decryptor.decrypt(&dir, events.progress_callback()).await;
            events.send(ControllerEvent::Progress(ProgressEvent::done(ProgressSource::Decrypt)));
            events.send(ControllerEvent::DecryptFinished);
            result
        }))
    }

    /// Archive `dir` into `<dir>.<ext>` beside it
    pub fn compress(&mut self, dir: &Path) -> Result<TaskId> {
        if !dir.is_dir() {
            return Err(ShelfError::MissingFile { path: dir.to_path_buf() });
        }
        let destination = self.runtime.archive_path_for(dir);
        info!("Compressing {} to {}", dir.display(), destination.display());
        Ok(self.launch_archive(TaskKind::Compress, dir.to_path_buf(), destination))
    }

    /// Extract `archive` into a sibling directory named after its stem
    pub fn decompress(&mut self, archive: &Path) -> Result<TaskId> {
        if !archive.is_file() {
            return Err(ShelfError::MissingFile {
                path: archive.to_path_buf(),
            });
        }
        let stem = archive.file_stem().ok_or_else(|| ShelfError::MissingFile {
            path: archive.to_path_buf(),
        })?;
        let destination = archive.with_file_name(stem);
        info!("Extracting {} to {}", archive.display(), destination.display());
        Ok(self.launch_archive(TaskKind::Decompress, archive.to_path_buf(), destination))
    }

    fn launch_archive(&self, kind: TaskKind, source: PathBuf, destination: PathBuf) -> TaskId {
        let archiver = self.services.archiver.clone();
        let events = self.events.clone();
        let label = source.display().to_string();
        self.launcher.launch(kind, label, async move {
            let progress = events.progress_callback();
            let result = match kind {
                TaskKind::Compress => archiver.compress(&source, &destination, progress).await,
                _ => archiver.decompress(&source, &destination, progress).await,
            };
            events.send(ControllerEvent::Progress(ProgressEvent::done(ProgressSource::Archive)));
            result
        })
    }

    // ----- downloads -----

    /// Queue a download for a typed-in content ID
    pub async fn download_title(&mut self, raw: &str) -> Result<TaskId> {
        let id = ContentId::parse_input(raw)?;
        self.download(id).await
    }

    /// Queue the sibling variant of `id`
    pub async fn download_variant(&mut self, id: &ContentId, variant: Variant) -> Result<TaskId> {
        self.download(id.with_variant(variant)).await
    }

    async fn download(&mut self, id: ContentId) -> Result<TaskId> {
        let base_dir = self.base_directory().await?;
        info!("Queueing download of {}", id);
        let downloads = self.services.downloads.clone();
        let events = self.events.clone();
        Ok(self.launcher.launch(TaskKind::Download, id.to_string(), async move {
            downloads.download(&id, &base_dir, events).await
        }))
    }

    /// Fetch the covers archive if absent, then extract it if not yet extracted
    pub fn fetch_cover_art(&mut self) -> Option<TaskId> {
        let dir = self.store.persistent_directory();
        let archive = dir.join(&self.runtime.cover_art_archive);
        let covers = dir.join(&self.runtime.cover_art_directory);
        if archive.is_file() && covers.is_dir() {
            debug!("Cover art already present in {}", covers.display());
            return None;
        }

        let downloads = self.services.downloads.clone();
        let archiver = self.services.archiver.clone();
        let events = self.events.clone();
        let url = self.runtime.cover_art_url.clone();
        Some(self.launcher.launch(TaskKind::CoverArt, url.clone(), async move {
            if !archive.is_file() {
                downloads.fetch(&url, &archive).await?;
            }
            if !covers.is_dir() {
                archiver.decompress(&archive, &covers, events.progress_callback()).await?;
                events.send(ControllerEvent::Progress(ProgressEvent::done(ProgressSource::Archive)));
            }
            Ok(())
        }))
    }

    // ----- filter and flags -----

    pub async fn set_filter(&mut self, query: FilterQuery) -> FilterReport {
        self.query = query;
        self.apply_filter().await
    }

    pub async fn apply_filter(&mut self) -> FilterReport {
        let report = self
            .filter
            .apply(&mut self.lists.titles, &self.query, &self.settings)
            .await;
        if report.skipped > 0 {
            warn!("Filter skipped {} titles on a busy settings lock", report.skipped);
        }
        report
    }

    pub async fn set_show_all(&mut self, show_all: bool) -> Result<FilterReport> {
        self.update_settings(|s| s.set_bool(keys::SHOW_ALL_TITLES, show_all)).await?;
        Ok(self.apply_filter().await)
    }

    pub async fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()> {
        self.update_settings(|s| s.set_bool(keys::FULLSCREEN, fullscreen)).await
    }

    pub async fn set_debug_logging(&mut self, enabled: bool) -> Result<()> {
        self.update_settings(|s| s.set_bool(keys::DEBUG_LOGGING, enabled)).await
    }

    /// Turn emulator integration on or off
    ///
    /// Enabling needs an emulator executable, either `emulator` or the one
    /// already configured; without one the flag stays off.
    pub async fn set_integrate_emulator(&mut self, enabled: bool, emulator: Option<PathBuf>) -> Result<()> {
        if !enabled {
            return self.update_settings(|s| s.set_bool(keys::INTEGRATE_EMULATOR, false)).await;
        }

        let path = match emulator {
            Some(path) => path,
            None => self
                .settings_snapshot()
                .await
                .emulator_path()
                .ok_or_else(|| ShelfError::Settings {
                    message: "no emulator configured".to_string(),
                    key: Some(keys::EMULATOR_PATH.to_string()),
                })?,
        };
        if !path.is_file() {
            return Err(ShelfError::MissingFile { path });
        }

        self.update_settings(|s| {
            s.set_string(keys::EMULATOR_PATH, path.display().to_string());
            s.set_bool(keys::INTEGRATE_EMULATOR, true);
        })
        .await
    }

    pub async fn set_gamepad_enabled(&mut self, enabled: bool) -> Result<()> {
        self.update_settings(|s| s.set_bool(keys::GAMEPAD, enabled)).await?;
        self.services.gamepad.set_enabled(enabled);
        if enabled {
            self.start_gamepad();
        }
        Ok(())
    }

    fn start_gamepad(&mut self) {
        if self.gamepad_started {
            return;
        }
        let gamepad = self.services.gamepad.clone();
        let events = self.events.clone();
        let stop = self.shutdown.child_token();
        self.launcher.launch(TaskKind::GamepadPoll, "gamepad", async move {
            gamepad.poll(events, stop).await
        });
        self.gamepad_started = true;
    }

    // ----- foreground process -----

    /// Launch the selected row of the active list
    pub async fn launch_selected(&mut self) -> Result<()> {
        let list = self.selector.active_list().ok_or_else(|| ShelfError::MissingSelection {
            action: "play".to_string(),
        })?;
        let executable = self
            .lists
            .get(list)
            .selected()
            .map(|row| row.entry.executable.clone())
            .ok_or_else(|| ShelfError::MissingSelection {
                action: "play".to_string(),
            })?;
        self.launch_content(&executable).await
    }

    pub async fn launch_content(&mut self, content: &Path) -> Result<()> {
        if !content.is_file() {
            return Err(ShelfError::MissingFile {
                path: content.to_path_buf(),
            });
        }
        let settings = self.settings_snapshot().await;
        let emulator = settings.emulator_path().ok_or_else(|| ShelfError::Settings {
            message: "no emulator configured".to_string(),
            key: Some(keys::EMULATOR_PATH.to_string()),
        })?;
        if !emulator.is_file() {
            return Err(ShelfError::MissingFile { path: emulator });
        }

        let command = LaunchCommand::compose(&emulator, content, settings.get_bool(keys::FULLSCREEN));
        self.services.process.start(command)
    }

    // ----- destructive and per-entry actions -----

    /// Remove settings and library files after confirmation
    pub async fn clear_settings(&mut self) -> Result<bool> {
        if !self
            .services
            .prompt
            .confirm("Warning", "Delete all settings and temporary files?")
        {
            return Ok(false);
        }
        self.store.clear()?;
        *self.settings.lock().await = Settings::default();
        info!("Settings cleared");
        Ok(true)
    }

    pub async fn delete_entry(&mut self, entry: &LibraryEntry) -> Result<bool> {
        if !self.services.prompt.confirm(&entry.display_name(), "Delete Entry?") {
            return Ok(false);
        }
        self.services.library.remove_entry(&entry.id).await?;
        self.lists.titles.remove_id(&entry.id);
        info!("Deleted entry {}", entry.display_name());
        Ok(true)
    }

    fn backup_directory(base_dir: &Path) -> PathBuf {
        base_dir.join("Backup")
    }

    pub async fn export_save(&mut self, entry: Arc<LibraryEntry>) -> Result<TaskId> {
        let base_dir = self.base_directory().await?;
        if !base_dir.is_dir() {
            return Err(ShelfError::MissingFile { path: base_dir });
        }
        let backup_dir = Self::backup_directory(&base_dir);
        let library = self.services.library.clone();
        Ok(self.launcher.launch(TaskKind::SaveData, entry.display_name(), async move {
            library.backup_save(&entry, &backup_dir).await
        }))
    }

    /// Directory the user picks a save archive from; created if missing
    pub async fn import_directory(&self, entry: &LibraryEntry) -> Result<PathBuf> {
        let dir = Self::backup_directory(&self.base_directory().await?).join(entry.display_name());
        std::fs::create_dir_all(&dir).map_err(|e| ShelfError::io(&dir, e))?;
        Ok(dir)
    }

    pub fn import_save(&mut self, entry: Arc<LibraryEntry>, archive: &Path) -> Result<TaskId> {
        if !archive.is_file() {
            return Err(ShelfError::MissingFile {
                path: archive.to_path_buf(),
            });
        }
        let library = self.services.library.clone();
        let archive = archive.to_path_buf();
        Ok(self.launcher.launch(TaskKind::SaveData, entry.display_name(), async move {
            library.import_save(&entry, &archive).await
        }))
    }

    pub fn purge_save(&mut self, entry: Arc<LibraryEntry>) -> Option<TaskId> {
        if !self.services.prompt.confirm(&entry.display_name(), "Purge Save Data?") {
            return None;
        }
        let library = self.services.library.clone();
        Some(self.launcher.launch(TaskKind::SaveData, entry.display_name(), async move {
            library.purge_save(&entry).await
        }))
    }

    pub async fn context_menu(&self, entry: &LibraryEntry) -> ContextMenu {
        let integrate = match self.settings.try_lock().await {
            Some(settings) => settings.get_bool(keys::INTEGRATE_EMULATOR),
            None => false,
        };
        context_actions(entry, integrate, self.menu_enabled)
    }

    pub async fn perform(&mut self, action: ContextAction, entry: Arc<LibraryEntry>) -> Result<ActionOutcome> {
        if !self.menu_enabled {
            return Err(ShelfError::Cancelled {
                reason: "menu disabled while decrypting".to_string(),
            });
        }
        debug!("Context action {:?} on {}", action, entry.display_name());

        let outcome = match action {
            ContextAction::Play => {
                self.launch_content(&entry.executable).await?;
                ActionOutcome::Started
            }
            ContextAction::ExportSave => ActionOutcome::Launched(self.export_save(entry).await?),
            ContextAction::ImportSave => ActionOutcome::ChooseArchive(self.import_directory(&entry).await?),
            ContextAction::PurgeSave => match self.purge_save(entry) {
                Some(task) => ActionOutcome::Launched(task),
                None => ActionOutcome::Declined,
            },
            ContextAction::DeleteEntry => match self.delete_entry(&entry).await? {
                true => ActionOutcome::Done,
                false => ActionOutcome::Declined,
            },
            ContextAction::Download(variant) => {
                ActionOutcome::Launched(self.download_variant(&entry.id, variant).await?)
            }
            ContextAction::Decrypt => ActionOutcome::Launched(self.decrypt_content(&entry.directory)?),
            ContextAction::CopyId => ActionOutcome::Clipboard(entry.id.to_string()),
        };
        Ok(outcome)
    }

    // ----- accessors -----

    pub fn library_list(&self) -> &TitleList {
        &self.lists.library
    }

    pub fn title_list(&self) -> &TitleList {
        &self.lists.titles
    }

    pub fn lists_mut(&mut self) -> &mut Lists {
        &mut self.lists
    }

    pub fn entry(&self, id: &ContentId) -> Option<Arc<LibraryEntry>> {
        self.services.library.entry(id)
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    /// Re-run cleanup for a queue row, e.g. one whose cleanup failed
    pub fn retry_cleanup(&mut self, entry: EntryId) -> Option<TaskId> {
        self.queue.request_removal(entry)
    }

    pub fn progress(&self) -> &ProgressDisplay {
        self.progress.display()
    }

    pub fn selector(&self) -> &ActiveListSelector {
        &self.selector
    }

    pub fn menu_enabled(&self) -> bool {
        self.menu_enabled
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Reports of background tasks that did not succeed
    pub fn failed_tasks(&self) -> &[TaskReport] {
        &self.failed_tasks
    }

    /// Hand over the recorded failures and start a fresh list
    pub fn take_failed_tasks(&mut self) -> Vec<TaskReport> {
        std::mem::take(&mut self.failed_tasks)
    }

    pub fn query(&self) -> &FilterQuery {
        &self.query
    }

    pub fn settings(&self) -> Arc<BestEffortLock<Settings>> {
        Arc::clone(&self.settings)
    }

    pub fn launcher(&self) -> &TaskLauncher {
        &self.launcher
    }
}
