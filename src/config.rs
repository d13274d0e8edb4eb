//! Player configuration.
//!
//! Defaults match the organ's wiring: bus 0, chip select 0, 100 kHz, SPI
//! mode 0. A JSON file can override any subset of fields, e.g.
//!
//! ```json
//! { "max_clock_hz": 5000000, "reset_on_exit": true }
//! ```

use crate::bus::BusSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("max_clock_hz must be non-zero")]
    ZeroClock,

    #[error("SPI mode must be 0-3, got {0}")]
    InvalidMode(u8),
}

/// Everything the player needs besides the scroll itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Device selection and clocking.
    #[serde(flatten)]
    pub bus: BusSettings,

    /// Write an all-zero frame before closing the bus so no solenoid is
    /// left energized.
    pub reset_on_exit: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            bus: BusSettings::default(),
            reset_on_exit: true,
        }
    }
}

impl PlayerConfig {
    /// Loads a configuration from a JSON file. Missing fields take their
    /// defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Rejects settings no SPI controller accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.max_clock_hz == 0 {
            return Err(ConfigError::ZeroClock);
        }
        if self.bus.mode > 3 {
            return Err(ConfigError::InvalidMode(self.bus.mode));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(PlayerConfig::from_json("{}").unwrap(), PlayerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config =
            PlayerConfig::from_json(r#"{ "device": 1, "max_clock_hz": 5000000 }"#).unwrap();
        assert_eq!(config.bus.device, 1);
        assert_eq!(config.bus.max_clock_hz, 5_000_000);
        assert_eq!(config.bus.bus, 0);
        assert!(config.reset_on_exit);
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut config = PlayerConfig::default();
        config.bus.mode = 2;
        config.reset_on_exit = false;
        let json = config.to_json().unwrap();
        assert!(json.contains("\"mode\": 2"));
        assert_eq!(PlayerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            PlayerConfig::from_json(r#"{ "max_clock_hz": 0 }"#),
            Err(ConfigError::ZeroClock)
        ));
        assert!(matches!(
            PlayerConfig::from_json(r#"{ "mode": 4 }"#),
            Err(ConfigError::InvalidMode(4))
        ));
        assert!(matches!(
            PlayerConfig::from_json("[1, 2]"),
            Err(ConfigError::Json(_))
        ));
    }
}
