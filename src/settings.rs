use crate::control::DEFAULT_INTERVAL_US;
use crate::error::SettingsError;
use crate::program::DEFAULT_TEST_IMAGE;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted monitor preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// pacing interval in milliseconds
    pub interval_ms: u64,
    pub rows: usize,
    pub cols: usize,
    pub base: u16,

    // panel visibility
    pub show_memory: bool,
    pub show_settings: bool,
    pub show_help: bool,

    pub test_image: PathBuf,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_US / 1000,
            rows: 16,
            cols: 16,
            base: 0x8000,
            show_memory: true,
            show_settings: false,
            show_help: true,
            test_image: PathBuf::from(DEFAULT_TEST_IMAGE),
        }
    }
}

impl MonitorSettings {
    /// where settings live by default
    pub fn default_path() -> PathBuf {
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_dir)
                .join("m6502-monitor")
                .join("settings.json")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("m6502-monitor")
                .join("settings.json")
        } else {
            PathBuf::from(".m6502-monitor.json")
        }
    }

    /// Load settings, falling back to defaults if the file is missing or
    /// unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = MonitorSettings::load(&dir.path().join("nope.json"));
        assert_eq!(s, MonitorSettings::default());
        assert_eq!(s.interval_ms, 17);
    }

    #[test]
    fn test_save_and_load() -> Result<(), SettingsError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sub").join("settings.json");
        let s = MonitorSettings {
            rows: 8,
            show_help: false,
            ..MonitorSettings::default()
        };
        s.save(&path)?;
        assert_eq!(MonitorSettings::load(&path), s);
        Ok(())
    }

    #[test]
    fn test_partial_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "cols": 4 }"#).unwrap();
        let s = MonitorSettings::load(&path);
        assert_eq!(s.cols, 4);
        assert_eq!(s.rows, 16);

        fs::write(&path, "not json").unwrap();
        assert_eq!(MonitorSettings::load(&path), MonitorSettings::default());
    }
}
