/*
[INPUT]:  Optional TOML file, MARQUEE_* environment variables
[OUTPUT]: Validated settings converted into client and session configuration
[POS]:    Configuration layer - process start-up
[UPDATE]: When adding configuration options or changing their defaults
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File};
use marquee_session::{ClientConfig, FileStore, SessionConfig};
use serde::Deserialize;

/// Default configuration file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "marquee.toml";

const MAX_RETRY_LIMIT: u32 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_lease_minutes")]
    pub lease_minutes: u64,
    #[serde(default = "default_expiring_window_minutes")]
    pub expiring_window_minutes: u64,
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Session file; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSettings {
    /// When set, logs are also written to a daily file in this directory
    pub directory: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_prefix() -> String {
    "api".to_string()
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_refresh_timeout_secs() -> u64 {
    10
}

fn default_retry_limit() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    300
}

fn default_lease_minutes() -> u64 {
    55
}

fn default_expiring_window_minutes() -> u64 {
    5
}

fn default_sign_in_path() -> String {
    "/auth/signin".to_string()
}

fn default_monitor_interval_secs() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            prefix: default_prefix(),
            version: default_version(),
            timeout_secs: default_timeout_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            retry_limit: default_retry_limit(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lease_minutes: default_lease_minutes(),
            expiring_window_minutes: default_expiring_window_minutes(),
            sign_in_path: default_sign_in_path(),
            monitor_interval_secs: default_monitor_interval_secs(),
        }
    }
}

impl Settings {
    /// Load from `path` (or `marquee.toml`, optional) layered under `MARQUEE_*` variables.
    ///
    /// Nested keys use `__`, e.g. `MARQUEE_API__BASE_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Self = builder
            .add_source(
                Environment::with_prefix("MARQUEE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("parse configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = &self.api.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("api.base_url must be an http(s) URL, got {base_url:?}");
        }
        if self.api.retry_limit > MAX_RETRY_LIMIT {
            bail!(
                "api.retry_limit must be at most {MAX_RETRY_LIMIT}, got {}",
                self.api.retry_limit
            );
        }
        if self.session.expiring_window_minutes >= self.session.lease_minutes {
            bail!("session.expiring_window_minutes must be shorter than session.lease_minutes");
        }
        if !self.session.sign_in_path.starts_with('/') {
            bail!("session.sign_in_path must be an absolute path");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.clone(),
            api_prefix: self.api.prefix.clone(),
            api_version: self.api.version.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            refresh_timeout: Duration::from_secs(self.api.refresh_timeout_secs),
            retry_limit: self.api.retry_limit,
            initial_backoff: Duration::from_millis(self.api.initial_backoff_ms),
            ..ClientConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            lease: Duration::from_secs(self.session.lease_minutes * 60),
            expiring_window: Duration::from_secs(self.session.expiring_window_minutes * 60),
            sign_in_path: self.session.sign_in_path.clone(),
            refresh_timeout: Duration::from_secs(self.api.refresh_timeout_secs),
            monitor_interval: Duration::from_secs(self.session.monitor_interval_secs),
            ..SessionConfig::default()
        }
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => FileStore::default_path().context("could not determine a data directory"),
        }
    }
}
