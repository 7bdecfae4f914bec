use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppSettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings path unavailable")]
    MissingSettingsPath,
}

pub type Result<T> = std::result::Result<T, AppSettingsError>;

/// Which metadata categories may be written back to items and files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub save_tags: bool,
    pub save_face_tags: bool,
    pub save_rating: bool,
    pub save_date_time: bool,
    /// Governs both titles and comments.
    pub save_comments: bool,
    pub save_color_label: bool,
    pub save_pick_label: bool,
    pub save_template: bool,
    pub save_position: bool,
    /// Queue file writes instead of performing them immediately.
    pub use_lazy_sync: bool,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            save_tags: true,
            save_face_tags: true,
            save_rating: true,
            save_date_time: true,
            save_comments: true,
            save_color_label: true,
            save_pick_label: true,
            save_template: true,
            save_position: true,
            use_lazy_sync: false,
        }
    }
}

impl MetadataSettings {
    pub fn all_disabled() -> Self {
        Self {
            save_tags: false,
            save_face_tags: false,
            save_rating: false,
            save_date_time: false,
            save_comments: false,
            save_color_label: false,
            save_pick_label: false,
            save_template: false,
            save_position: false,
            use_lazy_sync: false,
        }
    }

    pub fn with_lazy_sync(mut self, enabled: bool) -> Self {
        self.use_lazy_sync = enabled;
        self
    }

    pub fn with_tags(mut self, enabled: bool) -> Self {
        self.save_tags = enabled;
        self
    }

    pub fn with_rating(mut self, enabled: bool) -> Self {
        self.save_rating = enabled;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    pub last_catalog: Option<PathBuf>,
    #[serde(default)]
    pub metadata: MetadataSettings,
}

impl AppSettings {
    /// Platform settings, or defaults when nothing has been saved yet.
    pub fn load() -> Result<Self> {
        platform::load()
    }

    pub fn save(&self) -> Result<()> {
        platform::save(self)
    }

    /// Reads settings from an explicit JSON file, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(AppSettings::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(path, payload)?;
        Ok(())
    }

    pub fn get_last_catalog(&self) -> Option<PathBuf> {
        self.last_catalog.clone()
    }

    pub fn set_last_catalog(&mut self, path: PathBuf) {
        self.last_catalog = Some(path);
    }

    pub fn metadata(&self) -> &MetadataSettings {
        &self.metadata
    }
}

/// Settings live as one JSON value in the registry on Windows and as a JSON
/// file in the user's config directory everywhere else.
#[cfg(target_os = "windows")]
mod platform {
    use super::{AppSettings, Result};
    use winreg::enums::{HKEY_CURRENT_USER, KEY_READ, KEY_WRITE};
    use winreg::RegKey;

    const KEY_PATH: &str = "Software\\Tessera";
    const VALUE_NAME: &str = "AppSettings";

    pub fn load() -> Result<AppSettings> {
        let payload = RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey_with_flags(KEY_PATH, KEY_READ)
            .and_then(|key| key.get_value::<String, _>(VALUE_NAME));
        match payload {
            Ok(payload) => Ok(serde_json::from_str(&payload)?),
            Err(_) => Ok(AppSettings::default()),
        }
    }

    pub fn save(settings: &AppSettings) -> Result<()> {
        let (key, _) =
            RegKey::predef(HKEY_CURRENT_USER).create_subkey_with_flags(KEY_PATH, KEY_WRITE)?;
        key.set_value(VALUE_NAME, &serde_json::to_string(settings)?)?;
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::{AppSettings, AppSettingsError, Result};
    use std::path::PathBuf;

    pub fn load() -> Result<AppSettings> {
        AppSettings::load_from(&settings_file_path()?)
    }

    pub fn save(settings: &AppSettings) -> Result<()> {
        settings.save_to(&settings_file_path()?)
    }

    fn settings_file_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("org", "Tessera", "tessera")
            .ok_or(AppSettingsError::MissingSettingsPath)?;
        Ok(dirs.config_dir().join("settings.json"))
    }
}
