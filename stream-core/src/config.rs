//! Configuration for the engine

use serde::{Deserialize, Serialize};

use crate::fees::MAX_FEE_BPS;
use crate::types::AccountId;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Account allowed to change the fee rate and sweep fees
    pub admin: AccountId,

    /// Fee configuration
    pub fee: FeeConfig,

    /// Channel configuration
    pub channels: ChannelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "stream-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            admin: AccountId::new("admin"),
            fee: FeeConfig::default(),
            channels: ChannelConfig::default(),
        }
    }
}

/// Fee configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Fee rate at startup, basis points
    pub initial_bps: u16,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self { initial_bps: 0 }
    }
}

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Actor mailbox depth; senders block once it fills
    pub mailbox_capacity: usize,

    /// Events buffered per broadcast subscriber before it lags
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            event_buffer: 256,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(admin) = std::env::var("FLOWRAIL_ADMIN") {
            config.admin = AccountId::new(admin);
        }

        if let Ok(bps) = std::env::var("FLOWRAIL_FEE_BPS") {
            config.fee.initial_bps = bps
                .parse()
                .map_err(|_| crate::Error::Config(format!("Invalid FLOWRAIL_FEE_BPS: {}", bps)))?;
        }

        if let Ok(capacity) = std::env::var("FLOWRAIL_MAILBOX_CAPACITY") {
            config.channels.mailbox_capacity = capacity.parse().map_err(|_| {
                crate::Error::Config(format!("Invalid FLOWRAIL_MAILBOX_CAPACITY: {}", capacity))
            })?;
        }

        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.admin.is_empty() {
            return Err(crate::Error::Config("admin account is empty".to_string()));
        }
        if self.fee.initial_bps > MAX_FEE_BPS {
            return Err(crate::Error::Config(format!(
                "initial fee {} bps exceeds cap of {} bps",
                self.fee.initial_bps, MAX_FEE_BPS
            )));
        }
        if self.channels.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox capacity must be positive".to_string(),
            ));
        }
        if self.channels.event_buffer == 0 {
            return Err(crate::Error::Config(
                "event buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
