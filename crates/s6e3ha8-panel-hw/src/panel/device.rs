//! S6E3HA8 lifecycle controller.

use crate::config::{FailurePolicy, PanelConfig};
use crate::resources::{DcsTransport, Regulator, ResetLevel, ResetLine, Supplies};
use crate::state::{LifecycleState, Operation};
use crate::{Error, Result, PANEL_NAME};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use tracing::{debug, error, info};

use super::dcs::{DcsCommand, TearMode};
use super::mode::{try_to_string, Connector, DisplayInfo, DisplayMode, ModeType, S6E3HA8_TIMING};

/// Operations the display pipeline invokes on a panel.
pub trait Panel {
    /// Powers the panel up and brings it out of sleep.
    fn prepare(&mut self) -> Result<()>;

    /// Puts the panel to sleep and powers it down.
    fn unprepare(&mut self) -> Result<()>;

    /// Turns display output on.
    fn enable(&mut self) -> Result<()>;

    /// Turns display output off.
    fn disable(&mut self) -> Result<()>;

    /// Adds the panel's modes to `connector` and returns how many were added.
    fn get_modes(&self, connector: &mut Connector) -> Result<usize>;

    /// Dispatches a lifecycle operation by name.
    fn run(&mut self, operation: Operation) -> Result<()> {
        match operation {
            Operation::Prepare => self.prepare(),
            Operation::Unprepare => self.unprepare(),
            Operation::Enable => self.enable(),
            Operation::Disable => self.disable(),
        }
    }
}

/// Supplies switched on so far during a prepare.
#[derive(Debug, Default, Clone, Copy)]
struct PoweredRails {
    primary: bool,
    interface: bool,
}

/// Lifecycle controller for one S6E3HA8 panel.
///
/// Callers must serialize operations; `&mut self` enforces that.
pub struct S6e3ha8<R, P, T, D> {
    supplies: Supplies<R>,
    reset: ResetLine<P>,
    dsi: T,
    delay: D,
    reset_pulse_us: u32,
    boot_settle_ms: u32,
    failure_policy: FailurePolicy,
    state: LifecycleState,
}

impl<R, P, T, D> S6e3ha8<R, P, T, D>
where
    R: Regulator,
    P: OutputPin,
    T: DcsTransport,
    D: DelayNs,
{
    /// Builds a controller from already acquired resources.
    ///
    /// The panel starts `Unpowered`; the reset line should already be asserted.
    pub fn new(
        supplies: Supplies<R>,
        reset: ResetLine<P>,
        dsi: T,
        delay: D,
        config: &PanelConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(supplies, reset, dsi, delay, config))
    }

    /// Builds a controller from a configuration that already passed validation.
    pub(crate) fn from_parts(
        supplies: Supplies<R>,
        reset: ResetLine<P>,
        dsi: T,
        delay: D,
        config: &PanelConfig,
    ) -> Self {
        Self {
            supplies,
            reset,
            dsi,
            delay,
            reset_pulse_us: config.reset.pulse_us,
            boot_settle_ms: config.reset.boot_settle_ms,
            failure_policy: config.failure_policy,
            state: LifecycleState::Unpowered,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn has_reset(&self) -> bool {
        self.reset.is_present()
    }

    /// Takes the controller apart, handing every resource back.
    pub fn release(self) -> (Supplies<R>, ResetLine<P>, T, D) {
        (self.supplies, self.reset, self.dsi, self.delay)
    }

    fn check(&self, operation: Operation) -> Result<LifecycleState> {
        self.state.transition(operation).ok_or_else(|| {
            error!("Cannot {} panel while {}", operation, self.state);
            Error::InvalidState {
                operation,
                state: self.state,
            }
        })
    }

    fn send(&mut self, command: DcsCommand) -> Result<()> {
        debug!(
            "DCS {:#04x} {:02X?} ({})",
            command.opcode(),
            command.params(),
            command.action()
        );
        command.send(&mut self.dsi).map_err(|e| {
            error!("Failed to {} ({})", command.action(), e);
            Error::Command {
                action: command.action(),
                source: Box::new(e),
            }
        })
    }

    fn enable_supply(supply: &mut R) -> Result<()> {
        supply.enable().map_err(|e| {
            error!("Failed to enable {} supply ({})", supply.name(), e);
            Error::Power {
                supply: supply.name().to_string(),
                source: Box::new(e),
            }
        })
    }

    /// Pulses reset and waits for the panel's internal boot.
    fn hard_reset(&mut self) {
        if !self.reset.is_present() {
            debug!("No reset GPIO, skipping reset pulse");
            return;
        }
        self.reset.set(ResetLevel::Asserted);
        self.delay.delay_us(self.reset_pulse_us);
        self.reset.set(ResetLevel::Deasserted);
        self.delay.delay_ms(self.boot_settle_ms);
        debug!(
            "Reset pulsed ({}us), waited {}ms for boot",
            self.reset_pulse_us, self.boot_settle_ms
        );
    }

    fn power_up(&mut self, powered: &mut PoweredRails) -> Result<()> {
        Self::enable_supply(&mut self.supplies.primary)?;
        powered.primary = true;
        Self::enable_supply(&mut self.supplies.interface)?;
        powered.interface = true;

        self.hard_reset();

        self.send(DcsCommand::SetTearOn(TearMode::VBlank))?;
        self.send(DcsCommand::ExitSleepMode)?;
        Ok(())
    }

    /// Applies the failure policy after a prepare that did not complete.
    fn abandon_prepare(&mut self, powered: PoweredRails) {
        match self.failure_policy {
            FailurePolicy::LeavePowered => {
                if powered.primary {
                    debug!("Prepare failed, leaving supplies as they are");
                }
            }
            FailurePolicy::PowerDown => {
                self.reset.set(ResetLevel::Asserted);
                if powered.interface {
                    self.supplies.interface.disable();
                }
                if powered.primary {
                    self.supplies.primary.disable();
                }
                debug!("Prepare failed, panel powered down");
            }
        }
    }
}

impl<R, P, T, D> Panel for S6e3ha8<R, P, T, D>
where
    R: Regulator,
    P: OutputPin,
    T: DcsTransport,
    D: DelayNs,
{
    fn prepare(&mut self) -> Result<()> {
        let next = self.check(Operation::Prepare)?;

        let mut powered = PoweredRails::default();
        if let Err(e) = self.power_up(&mut powered) {
            self.abandon_prepare(powered);
            return Err(e);
        }

        self.state = next;
        info!("Panel prepared");
        Ok(())
    }

    fn unprepare(&mut self) -> Result<()> {
        let next = self.check(Operation::Unprepare)?;

        self.send(DcsCommand::EnterSleepMode)?;

        self.reset.set(ResetLevel::Asserted);
        self.supplies.interface.disable();
        self.supplies.primary.disable();

        self.state = next;
        info!("Panel unprepared");
        Ok(())
    }

    fn enable(&mut self) -> Result<()> {
        let next = self.check(Operation::Enable)?;
        self.send(DcsCommand::SetDisplayOn)?;
        self.state = next;
        info!("Panel display on");
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let next = self.check(Operation::Disable)?;
        self.send(DcsCommand::SetDisplayOff)?;
        self.state = next;
        info!("Panel display off");
        Ok(())
    }

    /// Every allocation is fallible. On [`Error::NoMemory`] the connector is
    /// left untouched.
    fn get_modes(&self, connector: &mut Connector) -> Result<usize> {
        let t = &S6E3HA8_TIMING;
        let added = reserve_modes(connector, 1)
            .and_then(|()| DisplayMode::duplicate(t, ModeType::DRIVER | ModeType::PREFERRED))
            .and_then(|mode| Ok((mode, try_to_string(PANEL_NAME)?)));
        let (mode, name) = added.map_err(|e| {
            error!("Failed to add mode {}x{}@{}", t.hdisplay, t.vdisplay, t.vrefresh);
            e
        })?;

        connector.display_info = DisplayInfo {
            name,
            width_mm: mode.timing.width_mm,
            height_mm: mode.timing.height_mm,
        };
        connector.probed_modes.push(mode);

        Ok(1)
    }
}

/// Makes room for `count` more modes without aborting on allocation failure.
fn reserve_modes(connector: &mut Connector, count: usize) -> Result<()> {
    connector
        .probed_modes
        .try_reserve(count)
        .map_err(|_| Error::NoMemory)
}
