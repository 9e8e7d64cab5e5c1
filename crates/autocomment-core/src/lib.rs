pub mod discover;
pub mod languages;
pub mod task;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use discover::{derive_output, discover};
pub use languages::language_for;
pub use task::Task;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "mistral";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_CLOUD_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_commented";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a valid settings file: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("unknown setting: {0}")]
    UnknownKey(String),
}

// --- Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "api_endpoint")]
    pub endpoint: String,
    pub model: String,
    /// Let the model catalog pick the local model instead of using `model`.
    pub auto_select_model: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_api_key: Option<String>,
    pub cloud_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_gpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_gpu: Option<u32>,
    pub supported_extensions: Vec<String>,
    pub output_suffix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            auto_select_model: true,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            cloud_api_key: None,
            cloud_model: DEFAULT_CLOUD_MODEL.to_string(),
            cloud_base_url: None,
            num_gpu: None,
            main_gpu: None,
            supported_extensions: [".py", ".js", ".ts", ".java", ".cpp", ".c", ".cs", ".go", ".rb"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
        }
    }
}

impl Settings {
    /// The cloud key, if one is set. Blank keys count as missing.
    pub fn cloud_credential(&self) -> Option<&str> {
        self.cloud_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Pull out-of-range values loaded from disk back into range.
    fn normalize(&mut self) {
        if !(0.0..=1.0).contains(&self.temperature) {
            let clamped = if self.temperature.is_nan() {
                DEFAULT_TEMPERATURE
            } else {
                self.temperature.clamp(0.0, 1.0)
            };
            log::warn!(
                "temperature {} is outside [0, 1], using {}",
                self.temperature,
                clamped
            );
            self.temperature = clamped;
        }
        if self.max_tokens == 0 {
            log::warn!("max_tokens must be positive, using {}", DEFAULT_MAX_TOKENS);
            self.max_tokens = DEFAULT_MAX_TOKENS;
        }
    }
}

// --- Storage ---

/// Resolve the settings directory (~/.autocomment/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".autocomment")
}

pub fn default_settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

/// Settings loaded from a JSON file. Every setter writes the file back before returning.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path`, writing a default file if none exists yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        if !path.exists() {
            let store = Self {
                path,
                settings: Settings::default(),
            };
            store.save()?;
            log::info!("created default settings file: {}", store.path.display());
            return Ok(store);
        }
        let settings = read_settings(&path)?;
        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        write_settings(&self.path, &self.settings)
    }

    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<(), SettingsError> {
        self.settings.endpoint = parse_url("api_endpoint", endpoint)?;
        self.save()
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), SettingsError> {
        self.settings.model = non_empty("model", model)?;
        self.save()
    }

    pub fn set_auto_select_model(&mut self, enabled: bool) -> Result<(), SettingsError> {
        self.settings.auto_select_model = enabled;
        self.save()
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(invalid("temperature", "must be between 0 and 1"));
        }
        self.settings.temperature = temperature;
        self.save()
    }

    pub fn set_max_tokens(&mut self, max_tokens: u32) -> Result<(), SettingsError> {
        if max_tokens == 0 {
            return Err(invalid("max_tokens", "must be positive"));
        }
        self.settings.max_tokens = max_tokens;
        self.save()
    }

    /// An empty key clears the credential.
    pub fn set_cloud_api_key(&mut self, key: &str) -> Result<(), SettingsError> {
        let key = key.trim();
        self.settings.cloud_api_key = (!key.is_empty()).then(|| key.to_string());
        self.save()
    }

    pub fn set_cloud_model(&mut self, model: &str) -> Result<(), SettingsError> {
        self.settings.cloud_model = non_empty("cloud_model", model)?;
        self.save()
    }

    /// An empty URL restores the provider's default base.
    pub fn set_cloud_base_url(&mut self, url: &str) -> Result<(), SettingsError> {
        self.settings.cloud_base_url = if url.trim().is_empty() {
            None
        } else {
            Some(parse_url("cloud_base_url", url)?)
        };
        self.save()
    }

    /// Set a value by its JSON key name. Used by `autocomment config set`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        match key {
            "api_endpoint" | "endpoint" => self.set_endpoint(value),
            "model" => self.set_model(value),
            "auto_select_model" => self.set_auto_select_model(parse_value(key, value)?),
            "temperature" => self.set_temperature(parse_value(key, value)?),
            "max_tokens" => self.set_max_tokens(parse_value(key, value)?),
            "cloud_api_key" => self.set_cloud_api_key(value),
            "cloud_model" => self.set_cloud_model(value),
            "cloud_base_url" => self.set_cloud_base_url(value),
            "num_gpu" => {
                self.settings.num_gpu = parse_optional(key, value)?;
                self.save()
            }
            "main_gpu" => {
                self.settings.main_gpu = parse_optional(key, value)?;
                self.save()
            }
            "supported_extensions" => {
                self.settings.supported_extensions = value
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(|e| {
                        if e.starts_with('.') {
                            e.to_string()
                        } else {
                            format!(".{e}")
                        }
                    })
                    .collect();
                self.save()
            }
            "output_suffix" => {
                self.settings.output_suffix = non_empty(key, value)?;
                self.save()
            }
            other => Err(SettingsError::UnknownKey(other.to_string())),
        }
    }
}

pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: Settings =
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    settings.normalize();
    Ok(settings)
}

/// Write settings as pretty JSON.
///
/// Goes through a temp file and a rename so an interrupted write never leaves
/// a truncated settings file behind.
pub fn write_settings(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let write_err = |source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "settings.json".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, json).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)
}

fn invalid(key: &str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(key: &str, value: &str) -> Result<String, SettingsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    Ok(value.to_string())
}

fn parse_url(key: &str, value: &str) -> Result<String, SettingsError> {
    let value = non_empty(key, value)?;
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(invalid(key, "must start with http:// or https://"));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, &e.to_string()))
}

/// Empty or `none` clears an optional numeric setting.
fn parse_optional<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>, SettingsError>
where
    T::Err: std::fmt::Display,
{
    match value.trim() {
        "" | "none" => Ok(None),
        v => parse_value(key, v).map(Some),
    }
}
