use coursenotes_core::api::DEFAULT_CSRF_COOKIE;
use coursenotes_core::FlatDeletePolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Base URL of the course notes backend
    pub server_url: ConfigValue<String>,
    /// Directory holding the saved session
    pub data_dir: ConfigValue<PathBuf>,
    /// Cookie the backend stores its CSRF token in
    pub csrf_cookie: ConfigValue<String>,
    /// What a failed account deletion does to local state
    pub flat_delete: ConfigValue<FlatDeletePolicy>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    server_url: Option<String>,
    data_dir: Option<PathBuf>,
    csrf_cookie: Option<String>,
    flat_delete: Option<FlatDeletePolicy>,
}

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5555";

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut server_url =
            ConfigValue::new(DEFAULT_SERVER_URL.to_string(), ConfigSource::Default);
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut csrf_cookie =
            ConfigValue::new(DEFAULT_CSRF_COOKIE.to_string(), ConfigSource::Default);
        let mut flat_delete = ConfigValue::new(FlatDeletePolicy::default(), ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(url) = file_config.server_url {
                server_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(cookie) = file_config.csrf_cookie {
                csrf_cookie = ConfigValue::new(cookie, ConfigSource::File);
            }
            if let Some(policy) = file_config.flat_delete {
                flat_delete = ConfigValue::new(policy, ConfigSource::File);
            }
        }

        // Apply environment variable overrides
        if let Ok(url) = std::env::var("NOTES_SERVER_URL") {
            server_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(dir) = std::env::var("NOTES_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(cookie) = std::env::var("NOTES_CSRF_COOKIE") {
            csrf_cookie = ConfigValue::new(cookie, ConfigSource::Environment);
        }
        if let Ok(policy) = std::env::var("NOTES_FLAT_DELETE") {
            let policy = policy
                .parse()
                .map_err(|e| ConfigError::InvalidValue("NOTES_FLAT_DELETE", e))?;
            flat_delete = ConfigValue::new(policy, ConfigSource::Environment);
        }

        Ok(Self {
            server_url,
            data_dir,
            csrf_cookie,
            flat_delete,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/coursenotes/
    /// - macOS: ~/Library/Application Support/coursenotes/
    /// - Windows: %APPDATA%/coursenotes/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coursenotes")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/coursenotes/
    /// - macOS: ~/Library/Application Support/coursenotes/
    /// - Windows: %APPDATA%/coursenotes/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coursenotes")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }

    /// Path of the saved login session.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.value.join("session.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(key, e) => write!(f, "Invalid value for {}: {}", key, e),
        }
    }
}

impl std::error::Error for ConfigError {}
