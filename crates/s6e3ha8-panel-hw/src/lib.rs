//! S6E3HA8 Panel Library
//!
//! Power, reset and DCS sequencing for the Samsung S6E3HA8, a 1440x2960
//! AMOLED panel driven over a command-mode MIPI DSI link.

pub mod bench;
pub mod binding;
pub mod config;
pub mod error;
pub mod panel;
pub mod resources;
pub mod state;

pub use binding::{
    probe, remove, DsiConfig, PanelRegistry, ProbeError, ResourceProvider, COMPATIBLE,
};
pub use config::{FailurePolicy, PanelConfig};
pub use error::{Error, Result};
pub use panel::{Connector, DisplayMode, Panel, S6e3ha8, S6E3HA8_TIMING};
pub use resources::{DcsTransport, DsiDevice, Regulator, ResetLine, StdDelay, Supplies};
pub use state::{LifecycleState, Operation};

/// Panel name reported to the display pipeline.
pub const PANEL_NAME: &str = "Samsung S6E3HA8";
