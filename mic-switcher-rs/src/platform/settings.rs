//! JSON settings store.
//!
//! Settings live in `%LOCALAPPDATA%\MicSwitcher\MicSwitcher_config.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const APP_DIR: &str = "MicSwitcher";
const CONFIG_FILE: &str = "MicSwitcher_config.json";

/// User configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// Fallback device when no headset is unmuted.
    pub stand_mic_id: Option<String>,

    /// Headset ids in priority order.
    pub headset_mic_ids: Vec<String>,

    /// Start with Windows.
    pub autostart: bool,
}

impl Settings {
    /// The stand mic id, with an empty string treated as unset.
    pub fn stand_mic(&self) -> Option<&str> {
        self.stand_mic_id.as_deref().filter(|id| !id.is_empty())
    }

    /// A stand mic and at least one headset are configured.
    pub fn is_complete(&self) -> bool {
        self.stand_mic().is_some() && !self.headset_mic_ids.is_empty()
    }

    /// Append `id` to the headset list unless already present.
    pub fn add_headset(&mut self, id: &str) -> bool {
        if self.headset_mic_ids.iter().any(|h| h == id) {
            return false;
        }
        self.headset_mic_ids.push(id.to_string());
        true
    }

    pub fn remove_headset(&mut self, id: &str) -> bool {
        let before = self.headset_mic_ids.len();
        self.headset_mic_ids.retain(|h| h != id);
        self.headset_mic_ids.len() != before
    }
}

/// Settings persistence error types.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings could not be serialized: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No local application data directory available")]
    NoSettingsDirectory,
}

/// Loads and saves [`Settings`].
pub trait SettingsStore: Send + Sync {
    /// Missing or unreadable settings yield defaults; only a failure to
    /// locate the store is an error.
    fn load(&self) -> Result<Settings, SettingsError>;

    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Settings kept as pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    /// Store at the per-user default location.
    pub fn new() -> Result<Self, SettingsError> {
        let dir = dirs::data_local_dir().ok_or(SettingsError::NoSettingsDirectory)?;
        Ok(Self::at(dir.join(APP_DIR).join(CONFIG_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "settings file unreadable, using defaults");
                return Ok(Settings::default());
            }
        };

        match serde_json::from_str(&text) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "settings file invalid, using defaults");
                Ok(Settings::default())
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    fn scratch_store() -> (JsonSettingsStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "mic-switcher-settings-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = fs::remove_dir_all(&dir);
        (JsonSettingsStore::at(dir.join("nested").join(CONFIG_FILE)), dir)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (store, dir) = scratch_store();
        assert_eq!(store.load().unwrap(), Settings::default());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_save_creates_directory_and_reloads() {
        let (store, dir) = scratch_store();
        let settings = Settings {
            stand_mic_id: Some("{stand}".into()),
            headset_mic_ids: vec!["{h1}".into(), "{h2}".into()],
            autostart: true,
        };
        store.save(&settings).unwrap();

        assert_eq!(store.load().unwrap(), settings);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_keys_are_pascal_case() {
        let settings = Settings {
            stand_mic_id: Some("s".into()),
            headset_mic_ids: vec!["h".into()],
            autostart: false,
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["StandMicId"], "s");
        assert_eq!(json["HeadsetMicIds"][0], "h");
        assert_eq!(json["Autostart"], false);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"HeadsetMicIds": ["a"]}"#).unwrap();
        assert_eq!(settings.stand_mic_id, None);
        assert_eq!(settings.headset_mic_ids, vec!["a"]);
        assert!(!settings.autostart);
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let (store, dir) = scratch_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.load().unwrap(), Settings::default());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_empty_stand_mic_is_unset() {
        let settings = Settings {
            stand_mic_id: Some(String::new()),
            headset_mic_ids: vec!["h".into()],
            autostart: false,
        };
        assert_eq!(settings.stand_mic(), None);
        assert!(!settings.is_complete());
    }

    #[test]
    fn test_headset_list_edits_keep_order() {
        let mut settings = Settings::default();
        assert!(settings.add_headset("a"));
        assert!(settings.add_headset("b"));
        assert!(!settings.add_headset("a"));
        assert!(settings.remove_headset("a"));
        assert!(!settings.remove_headset("a"));
        assert_eq!(settings.headset_mic_ids, vec!["b"]);
    }
}
