//! # Service Configuration
//!
//! Configuration management for the stoplist service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     STOPLIST_DATABASE_PATH=/var/lib/stoplist/stoplist.db                │
//! │     STOPLIST_TIMEZONE=Europe/Moscow                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/tracker/stoplist.toml (Linux)                             │
//! │     ~/Library/Application Support/com.stoplist.tracker/stoplist.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     UTC, whole-day window, report at 23:55                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # stoplist.toml
//! [database]
//! path = "stoplist.db"
//!
//! [source]
//! path = "stop_list.json"
//!
//! [sync]
//! poll_interval_secs = 0  # 0 = webhook only
//!
//! [report]
//! timezone = "Europe/Moscow"
//! window_start = "00:00"
//! window_end = "00:00"     # <= start means "next day"
//! send_at = "23:55"
//!
//! [webhook]
//! port = 8000
//!
//! [notify]
//! recipients = ["123456789"]
//! ```

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use stoplist_core::validation::{parse_clock_time, parse_timezone};
use stoplist_core::ReportWindow;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where the interval store lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite file. Created on first start.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Pool size. Writes are serialized regardless.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("stoplist.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Source Settings
// =============================================================================

/// Where the provider's stop-list payload is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Path to the stop-list JSON the provider exports.
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

fn default_source_path() -> PathBuf {
    PathBuf::from("stop_list.json")
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            path: default_source_path(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Event-driven sync behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between polled syncs. `0` disables polling, leaving the
    /// webhook as the only trigger.
    #[serde(default)]
    pub poll_interval_secs: u64,
}

// =============================================================================
// Report Settings
// =============================================================================

/// Daily report window and send time.
///
/// ## Window Selection
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                        Report Window Rules                              │
/// │                                                                         │
/// │  window_start < window_end   same local day      08:00 → 21:00          │
/// │  window_end <= window_start  ends the next day   18:00 → 02:00          │
/// │                              (00:00 → 00:00 is the full day)            │
/// │                                                                         │
/// │  At send_at the report covers the latest window that has started.       │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// Whether the daily scheduler runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// IANA timezone the window and send time are written in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Local window start, `HH:MM`.
    #[serde(default = "default_window_start")]
    pub window_start: String,

    /// Local window end, `HH:MM`.
    #[serde(default = "default_window_end")]
    pub window_end: String,

    /// Local time the daily report is sent, `HH:MM`.
    #[serde(default = "default_send_at")]
    pub send_at: String,
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_window_start() -> String {
    "00:00".to_string()
}

fn default_window_end() -> String {
    "00:00".to_string()
}

fn default_send_at() -> String {
    "23:55".to_string()
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            enabled: true,
            timezone: default_timezone(),
            window_start: default_window_start(),
            window_end: default_window_end(),
            send_at: default_send_at(),
        }
    }
}

// =============================================================================
// Webhook Settings
// =============================================================================

/// Listener for provider push events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// Whether `serve` starts the listener.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address (default: 0.0.0.0 for all interfaces).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Listener port.
    #[serde(default = "default_webhook_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_webhook_port() -> u16 {
    8000
}

impl Default for WebhookSettings {
    fn default() -> Self {
        WebhookSettings {
            enabled: true,
            bind_addr: default_bind_addr(),
            port: default_webhook_port(),
        }
    }
}

impl WebhookSettings {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Notify Settings
// =============================================================================

/// Who receives summaries and reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifySettings {
    /// Messenger chat ids.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Send a sync summary even when nothing changed.
    #[serde(default)]
    pub always_send: bool,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub report: ReportSettings,

    #[serde(default)]
    pub webhook: WebhookSettings,

    #[serde(default)]
    pub notify: NotifySettings,
}

impl ServiceConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stoplist.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        self.timezone()?;
        self.window_times()?;
        self.send_at()?;

        if self.database.path.as_os_str().is_empty() {
            return Err(SyncError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(SyncError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.webhook.enabled && self.webhook.port == 0 {
            return Err(SyncError::InvalidConfig("webhook.port must not be 0".into()));
        }

        if self.notify.recipients.iter().any(|r| r.trim().is_empty()) {
            return Err(SyncError::InvalidConfig("notify.recipients contains an empty entry".into()));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides read through `lookup`, so tests don't touch the
    /// process environment.
    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("STOPLIST_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(tz) = lookup("STOPLIST_TIMEZONE") {
            debug!(timezone = %tz, "Overriding timezone from environment");
            self.report.timezone = tz;
        }

        if let Some(path) = lookup("STOPLIST_SOURCE_PATH") {
            self.source.path = PathBuf::from(path);
        }

        if let Some(port) = lookup("STOPLIST_WEBHOOK_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding webhook port from environment");
                    self.webhook.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring non-numeric STOPLIST_WEBHOOK_PORT"),
            }
        }

        if let Some(time) = lookup("STOPLIST_REPORT_TIME") {
            self.report.send_at = time;
        }

        if let Some(list) = lookup("STOPLIST_RECIPIENTS") {
            self.notify.recipients = list
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stoplist", "tracker")
            .map(|dirs| dirs.config_dir().join("stoplist.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The report timezone.
    pub fn timezone(&self) -> SyncResult<Tz> {
        parse_timezone(&self.report.timezone)
            .map_err(|e| SyncError::InvalidConfig(format!("report.timezone: {}", e)))
    }

    /// Local `(start, end)` of the daily window.
    pub fn window_times(&self) -> SyncResult<(NaiveTime, NaiveTime)> {
        let start = parse_clock_time(&self.report.window_start)
            .map_err(|e| SyncError::InvalidConfig(format!("report.window_start: {}", e)))?;
        let end = parse_clock_time(&self.report.window_end)
            .map_err(|e| SyncError::InvalidConfig(format!("report.window_end: {}", e)))?;
        Ok((start, end))
    }

    /// Local time the daily report fires.
    pub fn send_at(&self) -> SyncResult<NaiveTime> {
        parse_clock_time(&self.report.send_at)
            .map_err(|e| SyncError::InvalidConfig(format!("report.send_at: {}", e)))
    }

    /// The report window for a local date.
    pub fn report_window_for(&self, date: NaiveDate) -> SyncResult<ReportWindow> {
        let (start, end) = self.window_times()?;
        Ok(ReportWindow::for_day(date, start, end, self.timezone()?))
    }

    /// Poll period, or `None` when polling is off.
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.sync.poll_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timezone().unwrap(), chrono_tz::UTC);
        assert_eq!(config.poll_interval(), None);
        assert_eq!(config.webhook.bind_address(), "0.0.0.0:8000");
        assert!(!config.notify.always_send);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServiceConfig::default();

        config.report.timezone = "Mars/Olympus".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.report.timezone = "Europe/Moscow".into();
        config.report.send_at = "25:00".into();
        assert!(config.validate().is_err());

        config.report.send_at = "23:55".into();
        config.notify.recipients = vec!["42".into(), " ".into()];
        assert!(config.validate().is_err());

        config.notify.recipients = vec!["42".into()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STOPLIST_DATABASE_PATH", "/data/stops.db"),
            ("STOPLIST_TIMEZONE", "Europe/Moscow"),
            ("STOPLIST_WEBHOOK_PORT", "9001"),
            ("STOPLIST_REPORT_TIME", "22:00"),
            ("STOPLIST_RECIPIENTS", "111, 222,,333"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/stops.db"));
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Moscow);
        assert_eq!(config.webhook.port, 9001);
        assert_eq!(config.send_at().unwrap(), NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(config.notify.recipients, vec!["111", "222", "333"]);
    }

    #[test]
    fn test_bad_port_override_is_ignored() {
        let mut config = ServiceConfig::default();
        config.apply_overrides_from(|key| {
            (key == "STOPLIST_WEBHOOK_PORT").then(|| "eighty".to_string())
        });
        assert_eq!(config.webhook.port, 8000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [report]
            timezone = "Europe/Moscow"
            window_start = "08:00"
            window_end = "21:00"

            [sync]
            poll_interval_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.report.send_at, "23:55");
        assert_eq!(config.webhook.port, 8000);
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(30)));

        let window = config
            .report_window_for(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .unwrap();
        assert_eq!(window.label(), "01.03.2026 08:00-21:00");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stoplist.toml");

        let mut config = ServiceConfig::default();
        config.report.timezone = "Asia/Yekaterinburg".into();
        config.notify.recipients = vec!["42".into()];
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[report]"));

        let loaded: ServiceConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.report.timezone, "Asia/Yekaterinburg");
        assert_eq!(loaded.notify.recipients, vec!["42"]);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = ServiceConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.report.send_at, "23:55");
        assert_eq!(config.webhook.port, 8000);
        assert!(!path.exists());
    }

    #[test]
    fn test_malformed_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stoplist.toml");
        std::fs::write(&path, "[report\ntimezone = ").unwrap();

        let err = ServiceConfig::load(Some(path)).unwrap_err();
        assert!(err.is_config_error());
    }
}
