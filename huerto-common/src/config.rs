//! Configuration loading, root folder resolution and credential lookup
//!
//! Priority order for every setting that can come from more than one place:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup: a warning is logged
//! and compiled defaults are used instead.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "HUERTO_ROOT_FOLDER";
/// Environment variable holding the telemetry API key id
pub const API_KEY_ID_ENV: &str = "HUERTO_API_KEY_ID";
/// Environment variable holding the telemetry API secret
pub const API_SECRET_ENV: &str = "HUERTO_API_SECRET";

/// SenseCAP open API endpoint listing telemetry samples
pub const DEFAULT_TELEMETRY_URL: &str = "https://sensecap.seeed.cc/openapi/list_telemetry_data";

/// Soil sensor nodes installed in the garden
pub const DEFAULT_DEVICES: [&str; 4] = [
    "2CF7F1C0523000A2",
    "2CF7F1C05230009C",
    "2CF7F1C05230001D",
    "2CF7F1C043500730",
];

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            dirs::data_local_dir()
                .map(|d| d.join("huerto"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/huerto"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("huerto"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/huerto"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("huerto"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\huerto"))
        } else {
            PathBuf::from("./huerto_data")
        };

        Self {
            root_folder,
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry API section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_devices")]
    pub devices: Vec<String>,

    #[serde(default = "default_channel_index")]
    pub channel_index: u32,

    /// First day requested on every refresh
    #[serde(default = "default_epoch_start")]
    pub epoch_start: NaiveDate,

    /// Per-request deadline
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            devices: default_devices(),
            channel_index: default_channel_index(),
            epoch_start: default_epoch_start(),
            timeout_secs: default_timeout_secs(),
            api_key_id: None,
            api_secret: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_TELEMETRY_URL.to_string()
}

fn default_devices() -> Vec<String> {
    DEFAULT_DEVICES.iter().map(|d| d.to_string()).collect()
}

fn default_channel_index() -> u32 {
    1
}

fn default_epoch_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 8).unwrap_or(NaiveDate::MIN)
}

fn default_timeout_secs() -> u64 {
    60
}

/// Solar calendar section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SolarConfig {
    /// Alternative calendar file; the embedded table is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_path: Option<PathBuf>,
}

/// Classifier artifact section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Defaults to `<root_folder>/day_night_model.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
}

/// HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Complete TOML configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub solar: SolarConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl TomlConfig {
    /// Parse configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load the file if possible, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) => p,
            None => {
                warn!("Could not determine config directory, using compiled defaults");
                return Self::default();
            }
        };

        if !path.exists() {
            warn!("Config file {} not found, using compiled defaults", path.display());
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{}; using compiled defaults", e);
                Self::default()
            }
        }
    }
}

/// Default configuration file path (`<config_dir>/huerto/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("huerto").join("config.toml"))
}

/// Root folder resolution following CLI → ENV → TOML → default
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml_root: Option<PathBuf>) -> Self {
        Self { cli_arg, toml_root }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Root folder layout and creation
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Single-slot dataset cache
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("huerto.db")
    }

    /// Default location of the exported classifier
    pub fn model_path(&self) -> PathBuf {
        self.root_folder.join("day_night_model.json")
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }
}

/// HTTP Basic credential pair for the telemetry API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Resolve telemetry credentials from environment, then TOML
///
/// Returns `None` when neither source holds a complete, non-blank pair.
pub fn resolve_credentials(telemetry: &TelemetryConfig) -> Option<Credentials> {
    let from_env = credential_pair(
        std::env::var(API_KEY_ID_ENV).ok(),
        std::env::var(API_SECRET_ENV).ok(),
    );
    let from_toml = credential_pair(telemetry.api_key_id.clone(), telemetry.api_secret.clone());

    match (from_env, from_toml) {
        (Some(env), Some(_)) => {
            warn!("Telemetry credentials found in environment and TOML; using environment");
            Some(env)
        }
        (Some(env), None) => {
            info!("Telemetry credentials loaded from environment");
            Some(env)
        }
        (None, Some(toml)) => {
            info!("Telemetry credentials loaded from TOML config");
            Some(toml)
        }
        (None, None) => None,
    }
}

fn credential_pair(key_id: Option<String>, secret: Option<String>) -> Option<Credentials> {
    match (key_id, secret) {
        (Some(key_id), Some(secret)) if !key_id.trim().is_empty() && !secret.trim().is_empty() => {
            Some(Credentials { key_id, secret })
        }
        _ => None,
    }
}
