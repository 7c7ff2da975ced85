//! # Configuration
//!
//! Settings are layered with the `config` crate.
//!
//! ## Sources (later wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults (this file)                                               │
//! │  2. shopkeep.toml (optional, working directory or --config path)       │
//! │  3. Environment: SHOPKEEP__SECTION__KEY                                │
//! │     e.g. SHOPKEEP__SERVER__BIND_ADDR=0.0.0.0:9000                      │
//! │          SHOPKEEP__DATABASE__PATH=/var/lib/shopkeep/shop.db            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The result is validated once at startup; handlers can trust it.

use std::net::SocketAddr;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use shopkeep_core::loyalty::LoyaltyPolicy;
use shopkeep_core::DEFAULT_LOW_STOCK_THRESHOLD;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub inventory: InventoryConfig,
    pub analytics: AnalyticsConfig,
    pub loyalty: LoyaltyPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `:memory:` for a throwaway database.
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: "shopkeep.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Shown on receipts.
    pub name: String,
    /// Local time offset used for hourly reports.
    pub utc_offset_minutes: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            name: "Shopkeep".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// At or below this many units a batch shows as low stock.
    pub low_stock_threshold: i64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        InventoryConfig {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub slow_moving_days: i64,
    pub slow_moving_max_units: i64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            slow_moving_days: 30,
            slow_moving_max_units: 2,
        }
    }
}

impl AppConfig {
    /// Loads defaults, then the optional file, then the environment.
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(file.unwrap_or("shopkeep")).required(file.is_some()))
            .add_source(
                Environment::with_prefix("SHOPKEEP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        if self.database.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue("database.path".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database.max_connections".to_string(),
            ));
        }
        if self.store.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ConfigError::InvalidValue(
                "store.utc_offset_minutes".to_string(),
            ));
        }
        if self.inventory.low_stock_threshold < 0 {
            return Err(ConfigError::InvalidValue(
                "inventory.low_stock_threshold".to_string(),
            ));
        }
        if self.analytics.slow_moving_days <= 0 || self.analytics.slow_moving_max_units < 0 {
            return Err(ConfigError::InvalidValue("analytics".to_string()));
        }

        self.loyalty
            .validate()
            .map_err(|e| ConfigError::InvalidValue(format!("loyalty: {}", e)))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.bind_addr".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),
}
