//! # Register Configuration
//!
//! Configuration management for the register layer.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VESTA_LEDGER_TIMEOUT_MS=8000                                       │
//! │     VESTA_SHIFT_RECENT_ORDERS=25                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/vesta-pos/register.toml (Linux)                          │
//! │     ~/Library/Application Support/com.vesta.pos/register.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     5 second ledger timeout, 10 recent orders                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # register.toml
//! [ledger]
//! timeout_ms = 5000   # How long to wait for the refund ledger
//!
//! [shift]
//! recent_orders = 10  # Size of the recent-activity window on the shift screen
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use vesta_core::DEFAULT_RECENT_ORDERS;

use crate::error::{RegisterError, RegisterResult};

// =============================================================================
// Ledger Settings
// =============================================================================

/// Settings for calls to the external refund ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Upper bound on a single ledger submission, in milliseconds.
    /// When exceeded the attempt is marked FAILED and reported retryable.
    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_ledger_timeout_ms() -> u64 {
    5000
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            timeout_ms: default_ledger_timeout_ms(),
        }
    }
}

// =============================================================================
// Shift Settings
// =============================================================================

/// Settings for the cashier's shift book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftSettings {
    /// How many recent orders the shift snapshot keeps (most recent first).
    #[serde(default = "default_recent_orders")]
    pub recent_orders: usize,
}

fn default_recent_orders() -> usize {
    DEFAULT_RECENT_ORDERS
}

impl Default for ShiftSettings {
    fn default() -> Self {
        ShiftSettings {
            recent_orders: default_recent_orders(),
        }
    }
}

// =============================================================================
// Main Register Configuration
// =============================================================================

/// Complete register configuration.
///
/// ## Example Config File
/// ```toml
/// [ledger]
/// timeout_ms = 5000
///
/// [shift]
/// recent_orders = 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Refund ledger settings.
    #[serde(default)]
    pub ledger: LedgerSettings,

    /// Shift book settings.
    #[serde(default)]
    pub shift: ShiftSettings,
}

impl RegisterConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (register.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> RegisterResult<Self> {
        let mut config = Self::default();

        // Try to load from config file
        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        // Override with environment variables
        config.apply_env_overrides();

        // Validate the configuration
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load register config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> RegisterResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| RegisterError::ConfigSaveFailed("No config path available".into()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Register config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> RegisterResult<()> {
        if self.ledger.timeout_ms == 0 {
            return Err(RegisterError::InvalidConfig(
                "ledger.timeout_ms must be greater than 0".into(),
            ));
        }

        if self.shift.recent_orders == 0 {
            return Err(RegisterError::InvalidConfig(
                "shift.recent_orders must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // Ledger timeout
        if let Ok(raw) = std::env::var("VESTA_LEDGER_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => {
                    debug!(timeout_ms = ms, "Overriding ledger timeout from environment");
                    self.ledger.timeout_ms = ms;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid VESTA_LEDGER_TIMEOUT_MS"),
            }
        }

        // Recent-order window
        if let Ok(raw) = std::env::var("VESTA_SHIFT_RECENT_ORDERS") {
            match raw.parse::<usize>() {
                Ok(n) => {
                    debug!(recent_orders = n, "Overriding recent-order window from environment");
                    self.shift.recent_orders = n;
                }
                Err(_) => warn!(value = %raw, "Ignoring invalid VESTA_SHIFT_RECENT_ORDERS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "vesta", "pos").map(|dirs| {
            let config_dir = dirs.config_dir();
            config_dir.join("register.toml")
        })
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the ledger timeout as a `Duration`.
    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger.timeout_ms)
    }

    /// Returns the recent-order window size.
    pub fn recent_orders(&self) -> usize {
        self.shift.recent_orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegisterConfig::default();
        assert_eq!(config.ledger.timeout_ms, 5000);
        assert_eq!(config.shift.recent_orders, DEFAULT_RECENT_ORDERS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RegisterConfig::default();
        assert!(config.validate().is_ok());

        // Zero timeout should fail
        config.ledger.timeout_ms = 0;
        assert!(config.validate().is_err());

        // Zero window should fail
        config.ledger.timeout_ms = 5000;
        config.shift.recent_orders = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        // A file that only sets the ledger section leaves shift at defaults
        let config: RegisterConfig = toml::from_str("[ledger]\ntimeout_ms = 250\n").unwrap();
        assert_eq!(config.ledger.timeout_ms, 250);
        assert_eq!(config.shift.recent_orders, DEFAULT_RECENT_ORDERS);
    }

    #[test]
    fn test_toml_serialization() {
        let config = RegisterConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[ledger]"));
        assert!(toml_str.contains("[shift]"));
    }

    #[test]
    fn test_ledger_timeout_duration() {
        let mut config = RegisterConfig::default();
        config.ledger.timeout_ms = 1500;
        assert_eq!(config.ledger_timeout(), Duration::from_millis(1500));
    }
}
