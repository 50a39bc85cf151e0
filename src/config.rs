use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Serialize, Deserialize};
use serde_json::Value as Json;

use crate::error::SettingsError;
use crate::types::FormatSpec;

/// Key under which preset settings are stored.
pub const SETTINGS_KEY: &str = "presetSettings";

/// Limits for the `{js}` evaluator, threaded through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Wall-clock budget for one evaluation; 0 runs it inline with no limit.
    pub eval_timeout_ms: u64,
    /// Maximum nesting of sub-expressions.
    pub max_depth: usize,
    /// Identifiers rejected in addition to the built-in deny-list.
    pub extra_denied_words: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { eval_timeout_ms: 1000, max_depth: 16, extra_denied_words: Vec::new() }
    }
}

impl EngineConfig {
    pub fn eval_timeout(&self) -> Option<Duration> {
        (self.eval_timeout_ms > 0).then(|| Duration::from_millis(self.eval_timeout_ms))
    }
}

/// User settings: which presets are shown, in what order, plus custom formats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled_presets: Vec<String>,
    pub preset_order: Vec<String>,
    pub custom_formats: Vec<FormatSpec>,
    pub engine: EngineConfig,
}

impl Settings {
    /// Every given preset enabled, in the given order.
    pub fn defaults(preset_ids: &[&str]) -> Self {
        let ids: Vec<String> = preset_ids.iter().map(|s| s.to_string()).collect();
        Settings { enabled_presets: ids.clone(), preset_order: ids, ..Default::default() }
    }

    /// Load settings from `store`. When nothing is stored yet the defaults
    /// are written back; when the store or the stored JSON is unusable the
    /// defaults are used without saving.
    pub fn load(store: &mut dyn SettingsStore, preset_ids: &[&str]) -> Self {
        let stored = match store.get(SETTINGS_KEY) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read settings; using defaults");
                return Self::defaults(preset_ids);
            }
        };
        match stored {
            Some(json) => Self::merge_over_defaults(json, preset_ids).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stored settings are invalid; using defaults");
                Self::defaults(preset_ids)
            }),
            None => {
                let settings = Self::defaults(preset_ids);
                if let Err(e) = settings.save(store) {
                    tracing::warn!(error = %e, "failed to save default settings");
                }
                settings
            }
        }
    }

    /// Stored fields override the defaults; missing ones keep them.
    fn merge_over_defaults(stored: Json, preset_ids: &[&str]) -> Result<Self, serde_json::Error> {
        let mut base = serde_json::to_value(Self::defaults(preset_ids))?;
        if let (Json::Object(base_map), Json::Object(stored_map)) = (&mut base, stored) {
            for (k, v) in stored_map {
                base_map.insert(k, v);
            }
        }
        serde_json::from_value(base)
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        store.set(SETTINGS_KEY, serde_json::to_value(self)?)
    }
}

/// Key-value settings storage with simple get/set calls.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Result<Option<Json>, SettingsError>;
    fn set(&mut self, key: &str, value: Json) -> Result<(), SettingsError>;
}

/// In-process store; nothing outlives the value.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Json>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Json>, SettingsError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Json) -> Result<(), SettingsError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by one JSON object in a file, rewritten whole on every set.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<serde_json::Map<String, Json>, SettingsError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(serde_json::Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Json>, SettingsError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Json) -> Result<(), SettingsError> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&Json::Object(all))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Settings file location: `$COPYTAB_CONFIG`, else `copytab/settings.json`
/// under the user's config directory.
pub fn settings_path() -> PathBuf {
    if let Ok(p) = env::var("COPYTAB_CONFIG") {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    config_dir().join("copytab").join("settings.json")
}

fn config_dir() -> PathBuf {
    if let Ok(dir) = env::var("XDG_CONFIG_HOME") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if cfg!(windows) {
        if let Ok(appdata) = env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    let home = env::var("HOME").or_else(|_| env::var("USERPROFILE")).unwrap_or_default();
    PathBuf::from(home).join(".config")
}
