//! Per-entry context menu
//!
//! Which actions an entry offers depends only on files present on disk, the
//! emulator integration flag and whether a decrypt is running.

use crate::collaborators::LibraryEntry;
use crate::content_id::Variant;
use crate::tasks::TaskId;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    Play,
    ExportSave,
    ImportSave,
    PurgeSave,
    DeleteEntry,
    Download(Variant),
    Decrypt,
    CopyId,
}

impl ContextAction {
    pub fn label(&self, entry: &LibraryEntry) -> String {
        match self {
            ContextAction::Play => format!("[Play] {}", entry.short_name()),
            ContextAction::ExportSave => "Export Save Data".to_string(),
            ContextAction::ImportSave => "Import Save Data".to_string(),
            ContextAction::PurgeSave => "Purge Save Data".to_string(),
            ContextAction::DeleteEntry => "Delete Entry".to_string(),
            ContextAction::Download(variant) => variant.download_label().to_string(),
            ContextAction::Decrypt => "Decrypt Content".to_string(),
            ContextAction::CopyId => "Copy ID".to_string(),
        }
    }

    /// Needs the user to confirm before it runs
    pub fn is_destructive(&self) -> bool {
        matches!(self, ContextAction::PurgeSave | ContextAction::DeleteEntry)
    }
}

/// Offered actions for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenu {
    pub title: String,
    /// False while a decrypt runs; the actions are listed but inert
    pub enabled: bool,
    pub actions: Vec<ContextAction>,
}

impl ContextMenu {
    pub fn offers(&self, action: ContextAction) -> bool {
        self.actions.contains(&action)
    }

    pub fn labels(&self, entry: &LibraryEntry) -> Vec<String> {
        self.actions.iter().map(|a| a.label(entry)).collect()
    }
}

pub fn context_actions(entry: &LibraryEntry, integrate_emulator: bool, menu_enabled: bool) -> ContextMenu {
    let mut actions = Vec::new();
    let playable = entry.has_executable();

    if playable {
        actions.push(ContextAction::Play);
        if integrate_emulator {
            actions.extend([ContextAction::ExportSave, ContextAction::ImportSave, ContextAction::PurgeSave]);
        }
    }
    if !entry.has_metadata() {
        actions.push(ContextAction::DeleteEntry);
    }
    actions.extend(entry.id.offerable_variants().into_iter().map(ContextAction::Download));
    if entry.has_ticket_pair() {
        actions.push(ContextAction::Decrypt);
    }
    actions.push(ContextAction::CopyId);

    ContextMenu {
        title: entry.short_name(),
        enabled: menu_enabled,
        actions,
    }
}

/// Result of performing an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Background work was started
    Launched(TaskId),
    /// Foreground process started
    Started,
    /// Text for the clipboard
    Clipboard(String),
    /// The user must pick a save archive from this directory
    ChooseArchive(PathBuf),
    /// Finished on the spot
    Done,
    /// The user declined the confirmation
    Declined,
}
