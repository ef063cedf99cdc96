//! MIPI DCS command definitions and encoding.
//!
//! Only the standard commands needed to sequence a command-mode panel:
//! - 0x10 / 0x11: enter / exit sleep mode
//! - 0x28 / 0x29: display off / on
//! - 0x34 / 0x35: tearing effect line off / on (one mode byte)

use crate::resources::DcsTransport;
use crate::{Error, Result};
use std::str::FromStr;

/// DSI data type for a DCS short write without parameter.
pub const DCS_SHORT_WRITE: u8 = 0x05;

/// DSI data type for a DCS short write with one parameter.
pub const DCS_SHORT_WRITE_PARAM: u8 = 0x15;

/// DSI data type for a DCS long write.
pub const DCS_LONG_WRITE: u8 = 0x39;

/// DCS opcodes.
pub const ENTER_SLEEP_MODE: u8 = 0x10;
pub const EXIT_SLEEP_MODE: u8 = 0x11;
pub const SET_DISPLAY_OFF: u8 = 0x28;
pub const SET_DISPLAY_ON: u8 = 0x29;
pub const SET_TEAR_OFF: u8 = 0x34;
pub const SET_TEAR_ON: u8 = 0x35;

/// When the panel pulses its tearing effect line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TearMode {
    /// Vertical blanking only.
    VBlank = 0x00,
    /// Vertical and horizontal blanking.
    VHBlank = 0x01,
}

/// A standard DCS command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcsCommand {
    EnterSleepMode,
    ExitSleepMode,
    SetDisplayOff,
    SetDisplayOn,
    SetTearOff,
    SetTearOn(TearMode),
}

impl DcsCommand {
    pub fn opcode(&self) -> u8 {
        match self {
            DcsCommand::EnterSleepMode => ENTER_SLEEP_MODE,
            DcsCommand::ExitSleepMode => EXIT_SLEEP_MODE,
            DcsCommand::SetDisplayOff => SET_DISPLAY_OFF,
            DcsCommand::SetDisplayOn => SET_DISPLAY_ON,
            DcsCommand::SetTearOff => SET_TEAR_OFF,
            DcsCommand::SetTearOn(_) => SET_TEAR_ON,
        }
    }

    pub fn params(&self) -> &'static [u8] {
        match self {
            DcsCommand::SetTearOn(TearMode::VBlank) => &[TearMode::VBlank as u8],
            DcsCommand::SetTearOn(TearMode::VHBlank) => &[TearMode::VHBlank as u8],
            _ => &[],
        }
    }

    /// What the command does, phrased for "failed to ..." diagnostics.
    pub fn action(&self) -> &'static str {
        match self {
            DcsCommand::EnterSleepMode => "enter sleep mode",
            DcsCommand::ExitSleepMode => "exit sleep mode",
            DcsCommand::SetDisplayOff => "turn display off",
            DcsCommand::SetDisplayOn => "turn display on",
            DcsCommand::SetTearOff => "disable TE",
            DcsCommand::SetTearOn(TearMode::VBlank) => "enable vblank TE",
            DcsCommand::SetTearOn(TearMode::VHBlank) => "enable vhblank TE",
        }
    }

    /// Sends the command over `transport`.
    pub fn send<T: DcsTransport>(&self, transport: &mut T) -> std::result::Result<(), T::Error> {
        transport.write_dcs(self.opcode(), self.params())
    }
}

/// DSI packet data type a DCS write of `params_len` parameter bytes travels in.
pub fn packet_data_type(params_len: usize) -> u8 {
    match params_len {
        0 => DCS_SHORT_WRITE,
        1 => DCS_SHORT_WRITE_PARAM,
        _ => DCS_LONG_WRITE,
    }
}

/// Short name for an opcode, falling back to hex for unknown ones.
pub fn opcode_name(opcode: u8) -> String {
    match opcode {
        ENTER_SLEEP_MODE => "enter-sleep".to_string(),
        EXIT_SLEEP_MODE => "exit-sleep".to_string(),
        SET_DISPLAY_OFF => "display-off".to_string(),
        SET_DISPLAY_ON => "display-on".to_string(),
        SET_TEAR_OFF => "tear-off".to_string(),
        SET_TEAR_ON => "tear-on".to_string(),
        other => format!("{:#04x}", other),
    }
}

impl FromStr for DcsCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "enter-sleep" | "enter_sleep" => Ok(DcsCommand::EnterSleepMode),
            "exit-sleep" | "exit_sleep" => Ok(DcsCommand::ExitSleepMode),
            "display-off" | "display_off" => Ok(DcsCommand::SetDisplayOff),
            "display-on" | "display_on" => Ok(DcsCommand::SetDisplayOn),
            "tear-off" | "tear_off" => Ok(DcsCommand::SetTearOff),
            "tear-on" | "tear_on" => Ok(DcsCommand::SetTearOn(TearMode::VBlank)),
            _ => Err(Error::UnknownCommand(s.to_string())),
        }
    }
}
