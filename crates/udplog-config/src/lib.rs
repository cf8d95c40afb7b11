//! Configuration for the udplog service.
//!
//! Configuration lives in a single JSON file. Every key is optional and falls
//! back to a default; unknown keys are ignored. A missing file is not an
//! error, the service simply runs with defaults.
//!
//! ```rust
//! use udplog_config::AppConfig;
//!
//! let config = AppConfig::from_json(r#"{"udp_port": 6514, "keep_days": 7}"#).unwrap();
//! assert_eq!(config.udp_port, 6514);
//! assert_eq!(config.web_port, 8080);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

pub use error::{ConfigError, Result};

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// UDP port the datagram listener binds on all interfaces.
    pub udp_port: u16,
    /// HTTP port for the query API, live stream and viewer page.
    pub web_port: u16,
    /// Ring buffer capacity.
    pub max_memory_logs: usize,
    /// Directory for day files.
    pub log_dir: PathBuf,
    /// Days of files to keep; zero or less disables retention.
    pub keep_days: i64,
    /// CORS origins; `"*"` or an empty list allows any origin.
    pub allowed_origins: Vec<String>,
    /// Persist entries to day files.
    pub write_to_file: bool,
    /// Sender addresses allowed to submit logs; empty allows all.
    pub udp_whitelist: Vec<String>,
    /// Shared secret required by the live stream when set.
    pub websocket_token: Option<String>,
    /// Forward every entry to Telegram.
    pub telegram_enabled: bool,
    /// Telegram bot token.
    pub telegram_bot_token: Option<String>,
    /// Telegram chat id. Numeric ids in the file are accepted.
    #[serde(deserialize_with = "string_or_number")]
    pub telegram_chat_id: Option<String>,
    /// Queue capacity of each live-stream subscriber.
    pub subscriber_queue_size: usize,
    /// Capacity of the queue between the UDP socket and the engine.
    pub ingest_queue_size: usize,
    /// Seconds between retention sweeps.
    pub retention_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            udp_port: 5140,
            web_port: 8080,
            max_memory_logs: 10_000,
            log_dir: PathBuf::from("./logs"),
            keep_days: 3,
            allowed_origins: vec!["*".to_string()],
            write_to_file: true,
            udp_whitelist: Vec::new(),
            websocket_token: None,
            telegram_enabled: false,
            telegram_bot_token: None,
            telegram_chat_id: None,
            subscriber_queue_size: 1000,
            ingest_queue_size: 10_000,
            retention_interval_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, using defaults if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, is not valid
    /// JSON, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = Self::from_json(&content)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parses and validates configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or validation fails.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut json = self.to_json_pretty()?;
        json.push('\n');
        fs::write(path, json).map_err(io_err)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.subscriber_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "subscriber_queue_size must be greater than 0".to_string(),
            ));
        }
        if self.ingest_queue_size == 0 {
            return Err(ConfigError::Invalid(
                "ingest_queue_size must be greater than 0".to_string(),
            ));
        }
        if self.retention_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory to persist into, or `None` when file output is off.
    #[must_use]
    pub fn persistence_dir(&self) -> Option<&Path> {
        self.write_to_file.then_some(self.log_dir.as_path())
    }

    /// Returns true if the retention sweeper should run.
    #[must_use]
    pub const fn retention_enabled(&self) -> bool {
        self.write_to_file && self.keep_days > 0
    }

    /// Pause between retention sweeps.
    #[must_use]
    pub const fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }

    /// The live-stream token, if one is set and non-empty.
    #[must_use]
    pub fn websocket_token(&self) -> Option<&str> {
        self.websocket_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns true if any origin may call the HTTP API.
    #[must_use]
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.udp_port, 5140);
        assert_eq!(config.web_port, 8080);
        assert_eq!(config.max_memory_logs, 10_000);
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.keep_days, 3);
        assert_eq!(config.allowed_origins, vec!["*"]);
        assert!(config.write_to_file);
        assert!(config.udp_whitelist.is_empty());
        assert!(config.websocket_token.is_none());
        assert!(!config.telegram_enabled);
        assert_eq!(config.subscriber_queue_size, 1000);
        assert_eq!(config.ingest_queue_size, 10_000);
        assert_eq!(config.retention_interval(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "udp_port": 9999,
                "udp_whitelist": ["10.0.0.1"],
                "websocket_token": "secret"
            }"#,
        )
        .unwrap();

        assert_eq!(config.udp_port, 9999);
        assert_eq!(config.udp_whitelist, vec!["10.0.0.1"]);
        assert_eq!(config.websocket_token(), Some("secret"));
        assert_eq!(config.web_port, 8080);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = AppConfig::from_json(r#"{"theme": "dark", "web_port": 81}"#).unwrap();
        assert_eq!(config.web_port, 81);
    }

    #[test_case(r#"{"telegram_chat_id": -1001234}"#, Some("-1001234") ; "numeric")]
    #[test_case(r#"{"telegram_chat_id": "@channel"}"#, Some("@channel") ; "text")]
    #[test_case(r#"{"telegram_chat_id": null}"#, None ; "null")]
    fn chat_id_accepts_string_or_number(json: &str, expected: Option<&str>) {
        let config = AppConfig::from_json(json).unwrap();
        assert_eq!(config.telegram_chat_id.as_deref(), expected);
    }

    #[test_case(r#"{"subscriber_queue_size": 0}"# ; "subscriber queue")]
    #[test_case(r#"{"ingest_queue_size": 0}"# ; "ingest queue")]
    #[test_case(r#"{"retention_interval_secs": 0}"# ; "retention interval")]
    fn zero_sizes_rejected(json: &str) {
        assert!(matches!(
            AppConfig::from_json(json),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        assert!(matches!(
            AppConfig::from_json(r#"{"udp_port": "fast"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(temp.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn directory_path_is_io_error() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            AppConfig::load(temp.path()),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn saved_file_loads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("etc/udplog/config.json");
        let config = AppConfig {
            keep_days: 14,
            telegram_chat_id: Some("42".to_string()),
            ..AppConfig::default()
        };

        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn empty_token_means_no_token() {
        let config = AppConfig {
            websocket_token: Some(String::new()),
            ..AppConfig::default()
        };
        assert!(config.websocket_token().is_none());
    }

    #[test]
    fn persistence_and_retention_follow_write_to_file() {
        let mut config = AppConfig::default();
        assert_eq!(config.persistence_dir(), Some(Path::new("./logs")));
        assert!(config.retention_enabled());

        config.keep_days = 0;
        assert!(!config.retention_enabled());

        config.keep_days = 3;
        config.write_to_file = false;
        assert!(config.persistence_dir().is_none());
        assert!(!config.retention_enabled());
    }

    #[test_case(vec!["*"], true ; "wildcard")]
    #[test_case(vec![], true ; "empty")]
    #[test_case(vec!["https://logs.example.com"], false ; "explicit")]
    fn any_origin_detection(origins: Vec<&str>, expected: bool) {
        let config = AppConfig {
            allowed_origins: origins.into_iter().map(str::to_string).collect(),
            ..AppConfig::default()
        };
        assert_eq!(config.allows_any_origin(), expected);
    }
}
