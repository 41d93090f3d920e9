//! Configuration Loader
//!
//! Loads and validates TOML configuration matching config.toml structure.
//! Secrets (the wallet encryption key, venue API keys) come from the
//! environment, never from the file.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::adapters::chain::{CipherError, KeyCipher};
use crate::domain::BPS_SCALE;

/// Main configuration structure matching config.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain: ChainSection,
    pub wallet: WalletSection,
    pub registry: RegistrySection,
    pub router: RouterSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub logging: LoggingSection,
    pub venues: VenuesSection,
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    /// RPC endpoint (use a private RPC for production).
    pub rpc_url: String,
    /// Asset id of the chain-native asset.
    pub native_asset: String,
}

impl ChainSection {
    /// RPC URL with environment override: `SWAPDECK_RPC_URL` wins over the
    /// config value.
    pub fn effective_rpc_url(&self) -> String {
        std::env::var("SWAPDECK_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }
}

/// Wallet storage and key-encryption configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletSection {
    /// Path of the JSON wallet store file.
    pub store_path: String,
    /// Environment variable holding the 32-byte hex encryption key.
    #[serde(default = "default_key_env")]
    pub encryption_key_env: String,
}

fn default_key_env() -> String {
    "WALLET_ENCRYPTION_KEY".to_string()
}

impl WalletSection {
    /// Build the key cipher from the configured environment variable.
    pub fn load_cipher(&self) -> Result<KeyCipher, ConfigError> {
        let key = std::env::var(&self.encryption_key_env)
            .map_err(|_| ConfigError::MissingSecret(self.encryption_key_env.clone()))?;
        Ok(KeyCipher::from_hex_key(&key)?)
    }
}

/// Verified-asset feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    pub url: String,
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,
}

fn default_refresh_minutes() -> u64 {
    30
}

impl RegistrySection {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes * 60)
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    /// Service fee in basis points, deducted before the slippage floor.
    pub service_fee_bps: u16,
    /// Readable amounts below this report as zero.
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold: Decimal,
    /// Asset curve pairs trade against; also the pooled venues' first hop.
    pub trade_asset: String,
    /// Stable-value asset for valuations and the second routing hop.
    pub stable_asset: String,
}

fn default_dust_threshold() -> Decimal {
    Decimal::new(1, 6)
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_inactivity_hours")]
    pub inactivity_hours: u64,
    #[serde(default = "default_sweep_minutes")]
    pub sweep_minutes: u64,
}

fn default_inactivity_hours() -> u64 {
    12
}

fn default_sweep_minutes() -> u64 {
    60
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            inactivity_hours: default_inactivity_hours(),
            sweep_minutes: default_sweep_minutes(),
        }
    }
}

impl SessionSection {
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_hours * 3600)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_minutes * 60)
    }
}

/// Network retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_network_attempts")]
    pub network_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_network_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    300
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            network_attempts: default_network_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Venue registration. Order within each list is the router's preference
/// order (tie-breaks go to the earliest entry).
#[derive(Debug, Clone, Deserialize)]
pub struct VenuesSection {
    #[serde(default)]
    pub pooled: Vec<PooledVenueSection>,
    #[serde(default)]
    pub curve: Vec<CurveVenueSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PooledVenueSection {
    pub name: String,
    pub api_url: String,
    /// Environment variable holding this venue's API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_venue_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurveVenueSection {
    pub name: String,
    pub api_url: String,
    #[serde(default = "default_venue_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_venue_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("secret not set in environment: {0}")]
    MissingSecret(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.rpc_url.is_empty() {
            return Err(ConfigError::Invalid("chain.rpc_url is empty".into()));
        }
        if self.chain.native_asset.is_empty() {
            return Err(ConfigError::Invalid("chain.native_asset is empty".into()));
        }
        if u64::from(self.router.service_fee_bps) >= BPS_SCALE {
            return Err(ConfigError::Invalid(format!(
                "router.service_fee_bps must be below {BPS_SCALE}, got {}",
                self.router.service_fee_bps
            )));
        }
        if self.router.dust_threshold < Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "router.dust_threshold must not be negative".into(),
            ));
        }
        if self.venues.pooled.is_empty() && self.venues.curve.is_empty() {
            return Err(ConfigError::Invalid("no venues configured".into()));
        }
        for venue in &self.venues.pooled {
            if venue.api_url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "pooled venue {} has an empty api_url",
                    venue.name
                )));
            }
        }
        for venue in &self.venues.curve {
            if venue.api_url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "curve venue {} has an empty api_url",
                    venue.name
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
