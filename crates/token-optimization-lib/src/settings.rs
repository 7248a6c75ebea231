//! File-backed settings store shared with the host application.
//!
//! The host owns a JSON document of the shape
//!
//! ```json
//! { "mcpServers": { "token-optimization": { "config": { "optimization": {
//!     "compressionLevel": "Balanced", "batchSize": 10, "windowSize": 1000,
//!     "semanticMode": true, "ui": { "showStats": true, "theme": { ... } } } } } } }
//! ```
//!
//! Reads tolerate the absence of any nested key, and a malformed key only
//! drops itself. Writes shallow-merge into the
//! `optimization` object and always overwrite its `ui` sub-object. Neither
//! direction raises: failures are logged and degrade to defaults or a no-op.
//
// Rust guideline compliant 2026-02-13

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::SettingsError;
use crate::model::optimization_config::{CompressionLevel, ConfigPatch, ThemeColors};

/// Key of this server inside `mcpServers`.
pub const DEFAULT_SERVER_KEY: &str = "token-optimization";

/// Environment variable that overrides the default settings path.
pub const SETTINGS_PATH_ENV: &str = "TOKEN_OPTIMIZATION_SETTINGS";

/// Location of the host settings file relative to the user config directory.
const HOST_SETTINGS_RELATIVE: &str =
    "Code - Insiders/User/globalStorage/saoudrizwan.claude-dev/settings/cline_mcp_settings.json";

/// Resolve the settings path used when none is given explicitly.
///
/// `TOKEN_OPTIMIZATION_SETTINGS` wins; otherwise the host file under the
/// platform config directory (`%APPDATA%` on Windows).
pub fn default_settings_path() -> PathBuf {
    if let Some(path) = env::var_os(SETTINGS_PATH_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HOST_SETTINGS_RELATIVE)
}

/// Reads and writes the optimization section of the host settings document.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    server_key: String,
}

impl SettingsStore {
    /// Store backed by `path`, using the default server key.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            server_key: DEFAULT_SERVER_KEY.to_string(),
        }
    }

    /// Use a different `mcpServers` entry name.
    pub fn with_server_key(mut self, server_key: impl Into<String>) -> Self {
        self.server_key = server_key.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn server_key(&self) -> &str {
        &self.server_key
    }

    /// Load stored overrides. Returns an empty patch on any failure.
    pub fn load(&self) -> ConfigPatch {
        match self.try_load() {
            Ok(patch) => patch,
            Err(err) => {
                log::warn!("could not load optimization settings, using defaults: {err}");
                ConfigPatch::default()
            }
        }
    }

    /// Load the control panel theme, falling back per colour to the defaults.
    pub fn load_theme(&self) -> ThemeColors {
        let doc = match self.read_document() {
            Ok(doc) => doc,
            Err(err) => {
                log::warn!("could not load theme settings, using default theme: {err}");
                return ThemeColors::default();
            }
        };
        let theme = self
            .optimization_section(&doc)
            .and_then(|section| section.get("ui"))
            .and_then(|ui| ui.get("theme"));
        match theme {
            Some(theme) => serde_json::from_value(theme.clone()).unwrap_or_else(|err| {
                log::warn!("ignoring malformed theme in settings: {err}");
                ThemeColors::default()
            }),
            None => ThemeColors::default(),
        }
    }

    /// Merge `patch` into the stored optimization section and write the
    /// document back pretty-printed.
    ///
    /// An unreadable document or a missing server entry makes this a no-op.
    /// Write failures are logged.
    pub fn save(&self, patch: &ConfigPatch, theme: &ThemeColors) {
        if let Err(err) = self.try_save(patch, theme) {
            match err {
                SettingsError::Io { .. } if self.path.exists() => {
                    log::error!("failed to save optimization settings: {err}");
                }
                _ => log::warn!("optimization settings not saved: {err}"),
            }
        }
    }

    fn try_load(&self) -> Result<ConfigPatch, SettingsError> {
        let doc = self.read_document()?;
        match self.optimization_section(&doc) {
            Some(Value::Object(section)) => Ok(patch_from_section(section)),
            Some(_) => Err(SettingsError::NotAnObject("optimization")),
            None => {
                log::debug!(
                    "no optimization section for '{}' in {}",
                    self.server_key,
                    self.path.display()
                );
                Ok(ConfigPatch::default())
            }
        }
    }

    fn try_save(&self, patch: &ConfigPatch, theme: &ThemeColors) -> Result<(), SettingsError> {
        let mut doc = self.read_document()?;

        let server = doc
            .get_mut("mcpServers")
            .and_then(|servers| servers.get_mut(&self.server_key))
            .ok_or_else(|| SettingsError::MissingServerEntry(self.server_key.clone()))?
            .as_object_mut()
            .ok_or(SettingsError::NotAnObject("mcpServers entry"))?;
        let config = child_object(server, "config")?;
        let optimization = child_object(config, "optimization")?;

        let incoming = serde_json::to_value(patch).map_err(|source| SettingsError::Json {
            path: self.path.clone(),
            source,
        })?;
        if let Value::Object(fields) = incoming {
            for (key, value) in fields {
                optimization.insert(key, value);
            }
        }
        optimization.insert(
            "ui".to_string(),
            serde_json::json!({ "showStats": true, "theme": theme }),
        );

        let rendered = serde_json::to_string_pretty(&doc).map_err(|source| SettingsError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, rendered).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("saved optimization settings to {}", self.path.display());
        Ok(())
    }

    fn read_document(&self) -> Result<Value, SettingsError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn optimization_section<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        doc.get("mcpServers")?
            .get(&self.server_key)?
            .get("config")?
            .get("optimization")
            .filter(|section| section.is_object())
    }
}

/// Get `parent[key]` as an object, creating it when missing or null.
fn child_object<'a>(
    parent: &'a mut Map<String, Value>,
    key: &'static str,
) -> Result<&'a mut Map<String, Value>, SettingsError> {
    let slot = parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut().ok_or(SettingsError::NotAnObject(key))
}

/// Read each stored key on its own so one bad value keeps its siblings.
fn patch_from_section(section: &Map<String, Value>) -> ConfigPatch {
    let compression_level = section.get("compressionLevel").and_then(|value| {
        let parsed = match value.as_str() {
            Some(name) => name.parse::<CompressionLevel>().map_err(|err| err.to_string()),
            None => Err(format!("expected a string, got {value}")),
        };
        parsed
            .map_err(|err| log::warn!("ignoring stored `compressionLevel`: {err}"))
            .ok()
    });
    ConfigPatch {
        compression_level,
        batch_size: stored_field(section, "batchSize"),
        window_size: stored_field(section, "windowSize"),
        semantic_mode: stored_field(section, "semanticMode"),
    }
}

fn stored_field<T: DeserializeOwned>(section: &Map<String, Value>, key: &str) -> Option<T> {
    let value = section.get(key)?;
    serde_json::from_value(value.clone())
        .map_err(|err| log::warn!("ignoring stored `{key}`: {err}"))
        .ok()
}
