//! Panel configuration.
//!
//! Defaults describe the S6E3HA8 as wired on reference boards. Timings may
//! be lengthened but never shortened below the panel's minimums.

use crate::resources::ResetPolarity;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Shortest reset pulse the panel recognises, in microseconds.
pub const MIN_RESET_PULSE_US: u32 = 10;

/// Time the panel needs after leaving reset before it accepts commands, in milliseconds.
pub const MIN_BOOT_SETTLE_MS: u32 = 120;

/// Panel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// What a failed prepare leaves behind
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Supply rail names
    #[serde(default)]
    pub supplies: SupplyConfig,

    /// Reset line configuration
    #[serde(default)]
    pub reset: ResetConfig,
}

/// Supply rail names, in enable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyConfig {
    /// Enabled first, disabled last
    #[serde(default = "default_primary_supply")]
    pub primary: String,

    /// Enabled second, disabled first
    #[serde(default = "default_interface_supply")]
    pub interface: String,
}

/// Reset line configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetConfig {
    /// GPIO name
    #[serde(default = "default_reset_gpio")]
    pub gpio: String,

    /// Electrical polarity
    #[serde(default)]
    pub polarity: ResetPolarity,

    /// How long reset is held asserted, in microseconds
    #[serde(default = "default_pulse_us")]
    pub pulse_us: u32,

    /// Wait after releasing reset, in milliseconds
    #[serde(default = "default_boot_settle_ms")]
    pub boot_settle_ms: u32,
}

/// Behaviour when `prepare` fails part way through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Leave supplies and reset exactly as they were when the failure hit.
    #[default]
    LeavePowered,
    /// Assert reset and switch off every supply the failed prepare enabled.
    PowerDown,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_supply(),
            interface: default_interface_supply(),
        }
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            gpio: default_reset_gpio(),
            polarity: ResetPolarity::default(),
            pulse_us: default_pulse_us(),
            boot_settle_ms: default_boot_settle_ms(),
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            supplies: SupplyConfig::default(),
            reset: ResetConfig::default(),
        }
    }
}

fn default_primary_supply() -> String {
    "vddi".to_string()
}

fn default_interface_supply() -> String {
    "vci".to_string()
}

fn default_reset_gpio() -> String {
    "reset".to_string()
}

fn default_pulse_us() -> u32 {
    MIN_RESET_PULSE_US
}

fn default_boot_settle_ms() -> u32 {
    MIN_BOOT_SETTLE_MS
}

impl PanelConfig {
    /// Checks the configuration against the panel's hard limits.
    pub fn validate(&self) -> Result<()> {
        if self.reset.pulse_us < MIN_RESET_PULSE_US {
            return Err(Error::InvalidConfig(format!(
                "reset pulse {}us is shorter than {}us",
                self.reset.pulse_us, MIN_RESET_PULSE_US
            )));
        }
        if self.reset.boot_settle_ms < MIN_BOOT_SETTLE_MS {
            return Err(Error::InvalidConfig(format!(
                "boot settle {}ms is shorter than {}ms",
                self.reset.boot_settle_ms, MIN_BOOT_SETTLE_MS
            )));
        }
        if self.supplies.primary.is_empty() || self.supplies.interface.is_empty() {
            return Err(Error::InvalidConfig("supply names must not be empty".into()));
        }
        if self.supplies.primary == self.supplies.interface {
            return Err(Error::InvalidConfig(format!(
                "both supplies are named {:?}",
                self.supplies.primary
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::LeavePowered => write!(f, "leave-powered"),
            FailurePolicy::PowerDown => write!(f, "power-down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PanelConfig::default();
        assert_eq!(config.supplies.primary, "vddi");
        assert_eq!(config.supplies.interface, "vci");
        assert_eq!(config.reset.pulse_us, 10);
        assert_eq!(config.reset.boot_settle_ms, 120);
        assert_eq!(config.reset.polarity, ResetPolarity::ActiveLow);
        assert_eq!(config.failure_policy, FailurePolicy::LeavePowered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_short_timings() {
        let mut config = PanelConfig::default();
        config.reset.pulse_us = 5;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = PanelConfig::default();
        config.reset.boot_settle_ms = 100;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_accepts_longer_timings() {
        let mut config = PanelConfig::default();
        config.reset.pulse_us = 50;
        config.reset.boot_settle_ms = 200;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_supplies() {
        let mut config = PanelConfig::default();
        config.supplies.interface = "vddi".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config: PanelConfig = toml::from_str(
            r#"
            failure_policy = "power-down"

            [reset]
            polarity = "active-high"
            boot_settle_ms = 150
            "#,
        )
        .unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::PowerDown);
        assert_eq!(config.reset.polarity, ResetPolarity::ActiveHigh);
        assert_eq!(config.reset.boot_settle_ms, 150);
        assert_eq!(config.reset.pulse_us, 10);
        assert_eq!(config.supplies.primary, "vddi");
    }
}
