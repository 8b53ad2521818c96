use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default daily notification expiry window, in days.
pub const DEFAULT_NOTIFICATION_EXPIRY_DAYS: i64 = 15;

/// Top-level config (certtrack.toml + CERTTRACK_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertTrackConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Default for CertTrackConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            retry: RetryConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Task-level retry policy for transient store failures.
///
/// Delay for attempt `n` is `base_secs * 2^n`, capped at `cap_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_secs")]
    pub base_secs: u64,
    #[serde(default = "default_retry_cap_secs")]
    pub cap_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_secs: default_retry_base_secs(),
            cap_secs: default_retry_cap_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Days after creation before an undelivered notification expires.
    #[serde(default = "default_expiry_days")]
    pub expiry_days: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            expiry_days: default_expiry_days(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.certtrack/certtrack.db", home)
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_secs() -> u64 {
    60
}
fn default_retry_cap_secs() -> u64 {
    600
}
fn default_expiry_days() -> i64 {
    DEFAULT_NOTIFICATION_EXPIRY_DAYS
}

impl CertTrackConfig {
    /// Load config from a TOML file with CERTTRACK_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.certtrack/certtrack.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CertTrackConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CERTTRACK_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.certtrack/certtrack.toml", home)
}
