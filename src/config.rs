use crate::backup::DEFAULT_BACKUP_SUFFIX;
use crate::cleaner::CleanupSettings;
use crate::filter::SearchMode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "CleanupConfig::default_preview_mode")]
    pub preview_mode: bool,
    #[serde(default = "CleanupConfig::default_create_backups")]
    pub create_backups: bool,
    #[serde(default = "CleanupConfig::default_backup_suffix")]
    pub backup_suffix: String,
    #[serde(default = "CleanupConfig::default_neutral_shader")]
    pub neutral_shader: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub include_inactive: Option<bool>,
    pub preview_mode: Option<bool>,
    pub create_backups: Option<bool>,
    pub search_mode: Option<SearchMode>,
    pub search_query: Option<String>,
}

impl CleanupConfig {
    const fn default_preview_mode() -> bool {
        true
    }

    const fn default_create_backups() -> bool {
        true
    }

    fn default_backup_suffix() -> String {
        DEFAULT_BACKUP_SUFFIX.to_string()
    }

    fn default_neutral_shader() -> String {
        "Standard".to_string()
    }

    pub fn settings(&self) -> CleanupSettings {
        CleanupSettings { preview: self.preview_mode, create_backups: self.create_backups }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            preview_mode: Self::default_preview_mode(),
            create_backups: Self::default_create_backups(),
            backup_suffix: Self::default_backup_suffix(),
            neutral_shader: Self::default_neutral_shader(),
        }
    }
}

impl ManagerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Reading manager config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Manager config {} is not valid JSON", path.display()))
    }

    /// Like `load`, but an unusable file only costs a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|err| {
            log::warn!("[config] Ignoring {} and using default settings: {err:#}", path.display());
            Self::default()
        })
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(include_inactive) = overrides.include_inactive {
            self.scan.include_inactive = include_inactive;
        }
        if let Some(preview) = overrides.preview_mode {
            self.cleanup.preview_mode = preview;
        }
        if let Some(backups) = overrides.create_backups {
            self.cleanup.create_backups = backups;
        }
        if let Some(mode) = overrides.search_mode {
            self.search.mode = mode;
        }
        if let Some(query) = overrides.search_query.as_ref() {
            self.search.query = query.clone();
        }
    }
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.include_inactive.is_none()
            && self.preview_mode.is_none()
            && self.create_backups.is_none()
            && self.search_mode.is_none()
            && self.search_query.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.include_inactive.is_some() {
            fields.push("include_inactive");
        }
        if self.preview_mode.is_some() {
            fields.push("preview_mode");
        }
        if self.create_backups.is_some() {
            fields.push("create_backups");
        }
        if self.search_mode.is_some() {
            fields.push("search_mode");
        }
        if self.search_query.is_some() {
            fields.push("search_query");
        }
        fields
    }
}
