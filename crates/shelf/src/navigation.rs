//! Cursor movement over the two selectable lists
//!
//! The library list (installed content) and the title list (database titles)
//! both hold [`TitleRow`]s. Which one the gamepad drives depends on the
//! foreground tab; a running foreground process suppresses navigation.

use crate::collaborators::LibraryEntry;
use crate::content_id::ContentId;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Library, titles and the download queue
pub const TAB_COUNT: usize = 3;

/// One selectable row
#[derive(Debug, Clone)]
pub struct TitleRow {
    pub entry: Arc<LibraryEntry>,
    pub label: String,
    pub hidden: bool,
}

impl TitleRow {
    pub fn new(entry: Arc<LibraryEntry>) -> Self {
        Self {
            label: entry.display_name(),
            entry,
            hidden: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Down,
    Up,
}

/// A list of rows with an optional cursor
#[derive(Debug, Clone, Default)]
pub struct TitleList {
    rows: Vec<TitleRow>,
    current: Option<usize>,
}

impl TitleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Arc<LibraryEntry>) {
        self.rows.push(TitleRow::new(entry));
    }

    /// Append unless a row with the same label exists; returns whether it was added
    pub fn push_unique_label(&mut self, entry: Arc<LibraryEntry>) -> bool {
        let row = TitleRow::new(entry);
        if self.rows.iter().any(|r| r.label == row.label) {
            debug!("Skipping duplicate library row {}", row.label);
            return false;
        }
        self.rows.push(row);
        true
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.current = None;
    }

    /// Drop every row for `id`; the cursor is cleared when anything went
    pub fn remove_id(&mut self, id: &ContentId) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| &row.entry.id != id);
        let removed = before - self.rows.len();
        if removed > 0 {
            self.current = None;
        }
        removed
    }

    pub fn rows(&self) -> &[TitleRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [TitleRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Select a row by index; out-of-range indexes are ignored
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.rows.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<&TitleRow> {
        self.current.and_then(|i| self.rows.get(i))
    }

    pub fn visible_labels(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| !r.hidden)
            .map(|r| r.label.as_str())
            .collect()
    }

    pub fn step_down(&mut self) -> Option<usize> {
        self.step(Direction::Down)
    }

    pub fn step_up(&mut self) -> Option<usize> {
        self.step(Direction::Up)
    }

    /// Move to the next visible row, wrapping, visiting each row at most once
    ///
    /// With no cursor the search starts just outside the list, so down lands
    /// on the first visible row and up on the last. When nothing is visible
    /// the cursor stays where it was.
    fn step(&mut self, direction: Direction) -> Option<usize> {
        let len = self.rows.len();
        if len == 0 {
            return None;
        }

        let start = match (self.current, direction) {
            (Some(i), _) => i.min(len - 1),
            (None, Direction::Down) => len - 1,
            (None, Direction::Up) => 0,
        };

        let mut index = start;
        for _ in 0..len {
            index = match direction {
                Direction::Down => (index + 1) % len,
                Direction::Up => (index + len - 1) % len,
            };
            if !self.rows[index].hidden {
                self.current = Some(index);
                return Some(index);
            }
        }

        debug!("No visible row to move to");
        None
    }
}

/// Which list the gamepad currently drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveList {
    Library,
    Titles,
}

/// Tab index plus the foreground process flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveListSelector {
    tab: usize,
    foreground_active: bool,
}

impl ActiveListSelector {
    pub fn tab(&self) -> usize {
        self.tab
    }

    pub fn set_tab(&mut self, tab: usize) {
        self.tab = tab.min(TAB_COUNT - 1);
    }

    pub fn foreground_active(&self) -> bool {
        self.foreground_active
    }

    pub fn set_foreground_active(&mut self, active: bool) {
        self.foreground_active = active;
    }

    /// `None` for tabs without a selectable list
    pub fn active_list(&self) -> Option<ActiveList> {
        match self.tab {
            0 => Some(ActiveList::Library),
            1 => Some(ActiveList::Titles),
            _ => None,
        }
    }
}

/// Discrete gamepad inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavInput {
    Up,
    Down,
    Start,
    Close,
    PrevTab,
    NextTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamepadEvent {
    pub input: NavInput,
    pub pressed: bool,
}

impl GamepadEvent {
    pub fn press(input: NavInput) -> Self {
        Self { input, pressed: true }
    }

    pub fn release(input: NavInput) -> Self {
        Self { input, pressed: false }
    }
}

/// What the controller should do after an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Ignored,
    Moved { list: ActiveList, index: usize },
    Launch(PathBuf),
    Terminate,
    TabChanged(usize),
}

/// The two selectable lists
#[derive(Debug, Default)]
pub struct Lists {
    pub library: TitleList,
    pub titles: TitleList,
}

impl Lists {
    pub fn get(&self, list: ActiveList) -> &TitleList {
        match list {
            ActiveList::Library => &self.library,
            ActiveList::Titles => &self.titles,
        }
    }

    pub fn get_mut(&mut self, list: ActiveList) -> &mut TitleList {
        match list {
            ActiveList::Library => &mut self.library,
            ActiveList::Titles => &mut self.titles,
        }
    }
}

/// Maps gamepad events onto cursor moves and process requests
#[derive(Debug, Clone, Copy, Default)]
pub struct Navigator;

impl Navigator {
    pub fn handle(&self, event: GamepadEvent, selector: &ActiveListSelector, lists: &mut Lists) -> NavOutcome {
        if !event.pressed {
            return NavOutcome::Ignored;
        }

        if selector.foreground_active() {
            return match event.input {
                NavInput::Close => NavOutcome::Terminate,
                _ => NavOutcome::Ignored,
            };
        }

        match event.input {
            NavInput::Close => NavOutcome::Ignored,
            NavInput::PrevTab => NavOutcome::TabChanged(selector.tab().saturating_sub(1)),
            NavInput::NextTab => NavOutcome::TabChanged((selector.tab() + 1).min(TAB_COUNT - 1)),
            NavInput::Up | NavInput::Down | NavInput::Start => {
                let Some(active) = selector.active_list() else {
                    return NavOutcome::Ignored;
                };
                let list = lists.get_mut(active);
                match event.input {
                    NavInput::Down => list
                        .step_down()
                        .map_or(NavOutcome::Ignored, |index| NavOutcome::Moved { list: active, index }),
                    NavInput::Up => list
                        .step_up()
                        .map_or(NavOutcome::Ignored, |index| NavOutcome::Moved { list: active, index }),
                    _ => match list.selected() {
                        Some(row) if row.entry.has_executable() => NavOutcome::Launch(row.entry.executable.clone()),
                        Some(row) => {
                            debug!("{} has no executable", row.label);
                            NavOutcome::Ignored
                        }
                        None => NavOutcome::Ignored,
                    },
                }
            }
        }
    }
}
