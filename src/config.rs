use std::path::PathBuf;

use crate::labels::normalize_language;
use crate::models::{Settings, SettingsFile};
use crate::storage::{KeyValueStorage, StorageError};

pub const SETTINGS_KEY: &str = "settings";
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;
pub const DATA_DIR_ENV: &str = "LIFEOS_DATA_DIR";
const APP_DIR_NAME: &str = "lifeos";

/// Data directory outside the desktop shell: `LIFEOS_DATA_DIR`, else the per-user config dir.
pub fn data_dir() -> Option<PathBuf> {
    resolve_data_dir(|name| std::env::var_os(name).map(PathBuf::from))
}

fn resolve_data_dir(var: impl Fn(&str) -> Option<PathBuf>) -> Option<PathBuf> {
    if let Some(dir) = var(DATA_DIR_ENV).filter(|dir| !dir.as_os_str().is_empty()) {
        return Some(dir);
    }
    if cfg!(windows) {
        return var("APPDATA").map(|dir| dir.join(APP_DIR_NAME));
    }
    var("HOME").map(|dir| dir.join(".config").join(APP_DIR_NAME))
}

pub fn normalize_settings(mut settings: Settings) -> Settings {
    settings.language = normalize_language(&settings.language);
    settings.dispatch_interval_secs = settings.dispatch_interval_secs.max(1);
    settings
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings(storage: &dyn KeyValueStorage) -> Settings {
    let bytes = match storage.get(SETTINGS_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Settings::default(),
        Err(err) => {
            log::warn!("failed to read settings, using defaults: {err}");
            return Settings::default();
        }
    };
    match serde_json::from_slice::<SettingsFile>(&bytes) {
        Ok(file) => normalize_settings(file.settings),
        Err(err) => {
            log::warn!("settings file unreadable, using defaults: {err}");
            Settings::default()
        }
    }
}

pub fn save_settings(storage: &dyn KeyValueStorage, settings: &Settings) -> Result<(), StorageError> {
    let file = SettingsFile {
        schema_version: SETTINGS_SCHEMA_VERSION,
        settings: settings.clone(),
    };
    let json = serde_json::to_vec_pretty(&file)?;
    storage.set(SETTINGS_KEY, &json)
}
