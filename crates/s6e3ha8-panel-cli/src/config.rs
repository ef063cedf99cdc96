//! Configuration management.

use anyhow::{Context, Result};
use s6e3ha8_panel_hw::bench::Fault;
use s6e3ha8_panel_hw::PanelConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Panel sequencing configuration
    #[serde(default)]
    pub panel: PanelConfig,

    /// Bench configuration
    #[serde(default)]
    pub bench: BenchConfig,
}

/// Bench wiring and fault injection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// DSI device name the panel binds to
    #[serde(default = "default_dsi_device")]
    pub dsi_device: String,

    /// Whether the reset GPIO is wired
    #[serde(default = "default_reset_wired")]
    pub reset_wired: bool,

    /// Faults to inject (e.g. "supply:vci", "command:exit-sleep")
    #[serde(default)]
    pub faults: Vec<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            dsi_device: default_dsi_device(),
            reset_wired: default_reset_wired(),
            faults: Vec::new(),
        }
    }
}

fn default_dsi_device() -> String {
    "dsi0.0".to_string()
}

fn default_reset_wired() -> bool {
    true
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        config
            .panel
            .validate()
            .context("Invalid panel configuration")?;
        Ok(config)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

impl BenchConfig {
    /// Parses the configured fault list.
    pub fn parsed_faults(&self) -> Result<Vec<Fault>> {
        self.faults
            .iter()
            .map(|f| {
                f.parse::<Fault>()
                    .with_context(|| format!("Invalid fault in configuration: {}", f))
            })
            .collect()
    }
}
