use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL (overridden by `DATABASE_URL`)
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    pub merchant: MerchantConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Bounds on every storage round-trip made by the transaction FSM
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub timeout_ms: u64,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_connections: 25,
            acquire_timeout_ms: 5_000,
        }
    }
}

/// Merchant credentials the payment provider presents via Basic-Auth
#[derive(Clone, Serialize, Deserialize)]
pub struct MerchantConfig {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for MerchantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerchantConfig")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Offset used to pick the accounting month and format payment times.
    pub utc_offset_minutes: i32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        // Asia/Tashkent
        Self {
            utc_offset_minutes: 300,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifierConfig {
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    pub queue_size: usize,
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            queue_size: 1024,
            max_attempts: 5,
            base_delay_ms: 250,
            max_delay_ms: 10_000,
            timeout_ms: 5_000,
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml` and apply environment overrides.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Secrets and deployment-specific endpoints usually come from the environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.postgres_url = Some(url);
        }
        if let Some(login) = lookup("PAYME_LOGIN") {
            self.merchant.login = login;
        }
        if let Some(password) = lookup("PAYME_PASSWORD") {
            self.merchant.password = password;
        }
        if let Some(url) = lookup("NOTIFY_URL") {
            self.notifier.url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merchant.login.is_empty() || self.merchant.password.is_empty() {
            return Err(ConfigError::Invalid(
                "merchant login and password must be set (PAYME_LOGIN / PAYME_PASSWORD)".into(),
            ));
        }
        if self.storage.timeout_ms == 0 {
            return Err(ConfigError::Invalid("storage.timeout_ms must be > 0".into()));
        }
        if self.notifier.enabled && self.notifier.url.is_none() {
            return Err(ConfigError::Invalid(
                "notifier.url is required when notifier.enabled = true".into(),
            ));
        }
        if self.notifier.queue_size == 0 {
            return Err(ConfigError::Invalid("notifier.queue_size must be > 0".into()));
        }
        Ok(())
    }
}
