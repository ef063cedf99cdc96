//! Panel module.
//!
//! Lifecycle sequencing, DCS encoding and the fixed display mode for the
//! S6E3HA8 command-mode panel.

mod device;

pub mod dcs;
pub mod mode;

pub use dcs::{DcsCommand, TearMode};
pub use device::{Panel, S6e3ha8};
pub use mode::{Connector, DisplayInfo, DisplayMode, DisplayTiming, ModeType, S6E3HA8_TIMING};
