//! Persisted settings and runtime tuning
//!
//! [`Settings`] is the user-facing key/value store kept in `settings.json`.
//! [`RuntimeConfig`] holds the knobs the core itself needs and is never
//! persisted.

use crate::error::{Result, ShelfError};
use crate::lock::DEFAULT_LOCK_WAIT;
use crate::progress::size_human;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const SETTINGS_FILE: &str = "settings.json";
pub const LIBRARY_FILE: &str = "library.json";

/// Setting keys
pub mod keys {
    pub const FULLSCREEN: &str = "Fullscreen";
    pub const INTEGRATE_EMULATOR: &str = "IntegrateEmulator";
    pub const SHOW_ALL_TITLES: &str = "ShowAllTitles";
    pub const GAMEPAD: &str = "Gamepad";
    pub const DEBUG_LOGGING: &str = "DebugLogging";
    pub const EMULATOR_PATH: &str = "EmulatorPath";
    pub const BASE_DIRECTORY: &str = "BaseDirectory";

    pub const BOOLEANS: [&str; 5] = [FULLSCREEN, INTEGRATE_EMULATOR, SHOW_ALL_TITLES, GAMEPAD, DEBUG_LOGGING];
    pub const STRINGS: [&str; 2] = [EMULATOR_PATH, BASE_DIRECTORY];
}

/// User settings; unknown keys are kept as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

impl Settings {
    /// Missing or non-boolean keys read as false
    pub fn get_bool(&self, key: &str) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), Value::Bool(value));
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn set_string<S: Into<String>>(&mut self, key: &str, value: S) {
        self.values.insert(key.to_string(), Value::String(value.into()));
    }

    /// Set a key from command-line text; booleans accept `true`/`false`
    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<()> {
        if keys::BOOLEANS.contains(&key) {
            let value = raw.parse::<bool>().map_err(|_| ShelfError::Settings {
                message: format!("expected true or false, got {:?}", raw),
                key: Some(key.to_string()),
            })?;
            self.set_bool(key, value);
        } else if keys::STRINGS.contains(&key) {
            self.set_string(key, raw);
        } else {
            return Err(ShelfError::Settings {
                message: "unknown setting".to_string(),
                key: Some(key.to_string()),
            });
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn base_directory(&self) -> Option<PathBuf> {
        self.get_string(keys::BASE_DIRECTORY)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn set_base_directory(&mut self, dir: &Path) {
        self.set_string(keys::BASE_DIRECTORY, dir.display().to_string());
    }

    pub fn emulator_path(&self) -> Option<PathBuf> {
        self.get_string(keys::EMULATOR_PATH)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn size_human(&self, bytes: u64) -> String {
        size_human(bytes)
    }
}

/// Loads and saves [`Settings`] in the persistent directory
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn persistent_directory(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn library_path(&self) -> PathBuf {
        self.dir.join(LIBRARY_FILE)
    }

    pub fn load(&self) -> Result<Settings> {
        let path = self.settings_path();
        let text = std::fs::read_to_string(&path).map_err(|e| ShelfError::io(&path, e))?;
        let settings = serde_json::from_str(&text)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ShelfError::io(&self.dir, e))?;
        let path = self.settings_path();
        let text = serde_json::to_string_pretty(settings)?;
        std::fs::write(&path, text).map_err(|e| ShelfError::io(&path, e))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Load the settings, writing defaults first when none exist yet
    pub fn load_or_create(&self) -> Result<Settings> {
        if self.settings_path().is_file() {
            return self.load();
        }
        info!("No settings at {}, creating defaults", self.settings_path().display());
        let settings = Settings::default();
        self.save(&settings)?;
        Ok(settings)
    }

    /// Remove the settings and library files
    pub fn clear(&self) -> Result<()> {
        for path in [self.settings_path(), self.library_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => info!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ShelfError::io(&path, e)),
            }
        }
        Ok(())
    }
}

/// Tuning used by the core at runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bound on waiting for the shared settings lock
    pub lock_wait: Duration,
    /// Concurrent match evaluations in one filter pass
    pub filter_concurrency: usize,
    pub cover_art_url: String,
    /// Covers archive and extracted directory, relative to the persistent directory
    pub cover_art_archive: String,
    pub cover_art_directory: String,
    pub archive_extension: String,
    pub log_file: String,
}

impl RuntimeConfig {
    /// `<dir>.<ext>` next to the directory
    pub fn archive_path_for(&self, dir: &Path) -> PathBuf {
        let mut name = dir.as_os_str().to_os_string();
        name.push(".");
        name.push(&self.archive_extension);
        PathBuf::from(name)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lock_wait: DEFAULT_LOCK_WAIT,
            filter_concurrency: 8,
            cover_art_url: "http://pixxy.in/mapleseed/covers.qta".to_string(),
            cover_art_archive: "covers.qta".to_string(),
            cover_art_directory: "covers".to_string(),
            archive_extension: "qta".to_string(),
            log_file: "shelf.log".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_keys_read_false() {
        let settings = Settings::default();
        assert!(!settings.get_bool(keys::FULLSCREEN));
        assert_eq!(settings.emulator_path(), None);
    }

    #[test]
    fn test_set_from_str() {
        let mut settings = Settings::default();
        settings.set_from_str(keys::SHOW_ALL_TITLES, "true").unwrap();
        settings.set_from_str(keys::EMULATOR_PATH, "/emu/cemu").unwrap();
        assert!(settings.get_bool(keys::SHOW_ALL_TITLES));
        assert_eq!(settings.emulator_path(), Some(PathBuf::from("/emu/cemu")));

        assert!(settings.set_from_str(keys::GAMEPAD, "yes").is_err());
        let err = settings.set_from_str("Volume", "3").unwrap_err();
        assert_eq!(err.category(), "settings");
    }

    #[test]
    fn test_store_round_trip_keeps_unknown_keys() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::write(store.settings_path(), r#"{"Fullscreen": true, "WindowWidth": 800}"#).unwrap();

        let mut settings = store.load().unwrap();
        assert!(settings.get_bool(keys::FULLSCREEN));
        settings.set_bool(keys::GAMEPAD, true);
        store.save(&settings).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, settings);
        assert!(reloaded.iter().any(|(k, _)| k == "WindowWidth"));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested"));
        assert!(store.load().is_err());

        let settings = store.load_or_create().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(store.settings_path().is_file());
    }

    #[test]
    fn test_clear_removes_both_files() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store.save(&Settings::default()).unwrap();
        std::fs::write(store.library_path(), "{}").unwrap();

        store.clear().unwrap();
        assert!(!store.settings_path().exists());
        assert!(!store.library_path().exists());
        // Clearing again is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_archive_path() {
        let config = RuntimeConfig::default();
        assert_eq!(
            config.archive_path_for(Path::new("/library/Game")),
            PathBuf::from("/library/Game.qta")
        );
    }
}
