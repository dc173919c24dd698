use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Lead time the chain opens bookings ahead of a class.
pub const BOOKING_WINDOW_HOURS: i64 = 24;
/// A trigger older than this at fire time is skipped, not queued.
pub const MISFIRE_GRACE_SECS: u64 = 60;
pub const PROVIDER_TIMEOUT_SECS: u64 = 5;
pub const RETRY_ATTEMPTS: u32 = 2;
pub const RETRY_DELAY_SECS: u64 = 5;

/// Top-level config (gymbot.toml + GYMBOT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymbotConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Confirmation mail. When absent, notifications are silently dropped.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl Default for GymbotConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            vault: VaultConfig::default(),
            provider: ProviderConfig::default(),
            booking: BookingConfig::default(),
            scheduler: SchedulerConfig::default(),
            smtp: None,
        }
    }
}

impl GymbotConfig {
    /// Load from `config_path` > `GYMBOT_CONFIG` > `~/.gymbot/gymbot.toml`,
    /// with `GYMBOT_*` env vars overriding individual keys.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: GymbotConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("GYMBOT_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Bearer-token signing for the gateway's own users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_secret")]
    pub secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_auth_secret(),
            token_ttl_hours: default_token_ttl_hours(),
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

/// Key material for reversible credential encryption.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    /// Base64-encoded 32-byte AES-256-GCM key. Required at startup;
    /// generate one with `gymbot-gateway --generate-vault-key`.
    #[serde(default)]
    pub key: String,
}

/// The chain's booking API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Execution-engine knobs: booking window and retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_misfire_grace_secs")]
    pub misfire_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            misfire_grace_secs: default_misfire_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    #[serde(default = "default_smtp_from_name")]
    pub from_name: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_auth_secret() -> String {
    "change-me".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.gymbot/gymbot.db", home)
}

fn default_provider_base_url() -> String {
    "https://gimnasios.vivagym.es".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    PROVIDER_TIMEOUT_SECS
}

fn default_window_hours() -> i64 {
    BOOKING_WINDOW_HOURS
}

fn default_retry_attempts() -> u32 {
    RETRY_ATTEMPTS
}

fn default_retry_delay_secs() -> u64 {
    RETRY_DELAY_SECS
}

fn default_misfire_grace_secs() -> u64 {
    MISFIRE_GRACE_SECS
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from_name() -> String {
    "Gymbot".to_string()
}

fn default_config_path() -> String {
    if let Ok(path) = std::env::var("GYMBOT_CONFIG") {
        return path;
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.gymbot/gymbot.toml", home)
}
