//! Hardware resources consumed by the panel: supply rails, the DSI command
//! link and the reset line.
//!
//! Supplies and the DSI host are abstracted by small traits so the sequencer
//! can run against real hardware or the [`bench`](crate::bench). The reset
//! line is any `embedded-hal` output pin.

use crate::binding::DsiConfig;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// A controllable supply rail.
pub trait Regulator {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Supply name as wired on the board (e.g. `vddi`).
    fn name(&self) -> &str;

    /// Energizes the rail. Blocks until the rail is up or has failed.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Releases the rail. Failures are not reported at this layer.
    fn disable(&mut self);
}

/// A link able to deliver MIPI DCS writes to the panel.
pub trait DcsTransport {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one DCS write made of `opcode` followed by `params`.
    fn write_dcs(&mut self, opcode: u8, params: &[u8]) -> Result<(), Self::Error>;
}

/// A DSI peripheral endpoint on the host's bus.
pub trait DsiDevice: DcsTransport {
    /// Device name on the host bus. Used as the registry key.
    fn name(&self) -> &str;

    /// Applies the link parameters the panel requires.
    fn configure(&mut self, config: &DsiConfig);

    /// Attaches the peripheral to the host so commands can flow.
    fn attach(&mut self) -> Result<(), Self::Error>;

    /// Detaches the peripheral. Never fails.
    fn detach(&mut self);
}

/// The panel's two supply rails.
///
/// `primary` is enabled first. Disabling happens in reverse order.
#[derive(Debug)]
pub struct Supplies<R> {
    pub primary: R,
    pub interface: R,
}

/// Electrical polarity of the reset line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolarity {
    /// Low level holds the panel in reset.
    #[default]
    ActiveLow,
    /// High level holds the panel in reset.
    ActiveHigh,
}

/// Logical reset level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetLevel {
    /// Panel held in reset.
    Asserted,
    /// Panel running.
    Deasserted,
}

impl ResetPolarity {
    /// Physical pin state that produces `level`.
    pub fn pin_state(&self, level: ResetLevel) -> PinState {
        match (self, level) {
            (ResetPolarity::ActiveLow, ResetLevel::Asserted) => PinState::Low,
            (ResetPolarity::ActiveLow, ResetLevel::Deasserted) => PinState::High,
            (ResetPolarity::ActiveHigh, ResetLevel::Asserted) => PinState::High,
            (ResetPolarity::ActiveHigh, ResetLevel::Deasserted) => PinState::Low,
        }
    }
}

/// Optional reset GPIO driven by logical level.
///
/// Setting a level on an absent line is a no-op. Pin errors are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct ResetLine<P> {
    pin: Option<P>,
    polarity: ResetPolarity,
}

impl<P: OutputPin> ResetLine<P> {
    pub fn new(pin: Option<P>, polarity: ResetPolarity) -> Self {
        Self { pin, polarity }
    }

    /// A board without a reset GPIO.
    pub fn absent() -> Self {
        Self {
            pin: None,
            polarity: ResetPolarity::default(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.pin.is_some()
    }

    pub fn set(&mut self, level: ResetLevel) {
        let Some(pin) = self.pin.as_mut() else {
            return;
        };
        if let Err(e) = pin.set_state(self.polarity.pin_state(level)) {
            warn!("Failed to drive reset line {:?}: {:?}", level, e);
        }
    }
}

/// Blocking delay backed by `std::thread::sleep`.
///
/// Sleeps for at least the requested time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
