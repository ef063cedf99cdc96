//! Display mode reported to the display pipeline.
//!
//! The panel runs in command mode, so these timings never drive a video
//! stream. They only tell the pipeline what the panel looks like.

use crate::{Error, Result};
use serde::Serialize;
use std::fmt::Write;

/// Longest `WxH` name two `u16` dimensions can produce.
const MODE_NAME_CAPACITY: usize = 11;

/// Mode type flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModeType(u8);

impl ModeType {
    /// The mode the sink prefers.
    pub const PREFERRED: ModeType = ModeType(1 << 3);
    /// The mode comes from the panel driver.
    pub const DRIVER: ModeType = ModeType(1 << 6);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: ModeType) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ModeType {
    type Output = ModeType;

    fn bitor(self, rhs: ModeType) -> ModeType {
        ModeType(self.0 | rhs.0)
    }
}

/// Fixed panel timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayTiming {
    /// Pixel clock in kHz
    pub clock_khz: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    /// Refresh rate in Hz
    pub vrefresh: u32,
    pub width_mm: u16,
    pub height_mm: u16,
}

/// The single mode the S6E3HA8 supports.
pub const S6E3HA8_TIMING: DisplayTiming = DisplayTiming {
    clock_khz: 342_651,
    hdisplay: 1440,
    hsync_start: 1440 + 116,
    hsync_end: 1440 + 116 + 44,
    htotal: 1440 + 116 + 44 + 116,
    vdisplay: 2960,
    vsync_start: 2960 + 124,
    vsync_end: 2960 + 124 + 120,
    vtotal: 2960 + 124 + 120 + 124,
    vrefresh: 60,
    width_mm: 70,
    height_mm: 144,
};

impl DisplayTiming {
    /// Refresh rate derived from the pixel clock and totals, rounded to Hz.
    pub fn computed_refresh(&self) -> u32 {
        let pixels = u64::from(self.htotal) * u64::from(self.vtotal);
        if pixels == 0 {
            return 0;
        }
        let hz_x1000 = u64::from(self.clock_khz) * 1_000_000 / pixels;
        ((hz_x1000 + 500) / 1000) as u32
    }

    /// Writes the standard mode name, e.g. `1440x2960`.
    pub fn write_mode_name<W: Write>(&self, out: &mut W) -> std::fmt::Result {
        write!(out, "{}x{}", self.hdisplay, self.vdisplay)
    }
}

/// A mode handed to the pipeline. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayMode {
    pub name: String,
    pub mode_type: ModeType,
    #[serde(flatten)]
    pub timing: DisplayTiming,
}

impl DisplayMode {
    /// Copies `timing` into a new named mode.
    ///
    /// Fails with [`Error::NoMemory`] instead of aborting when the name cannot
    /// be allocated.
    pub fn duplicate(timing: &DisplayTiming, mode_type: ModeType) -> Result<Self> {
        let mut name = try_string_with_capacity(MODE_NAME_CAPACITY)?;
        timing
            .write_mode_name(&mut name)
            .map_err(|_| Error::NoMemory)?;
        Ok(Self {
            name,
            mode_type,
            timing: *timing,
        })
    }

    pub fn is_preferred(&self) -> bool {
        self.mode_type.contains(ModeType::PREFERRED)
    }
}

/// Sink properties reported alongside the modes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub name: String,
    pub width_mm: u16,
    pub height_mm: u16,
}

/// Copies `s` into a new string, failing instead of aborting on allocation failure.
pub(crate) fn try_to_string(s: &str) -> Result<String> {
    let mut out = try_string_with_capacity(s.len())?;
    out.push_str(s);
    Ok(out)
}

fn try_string_with_capacity(capacity: usize) -> Result<String> {
    let mut out = String::new();
    out.try_reserve_exact(capacity)
        .map_err(|_| Error::NoMemory)?;
    Ok(out)
}

/// Caller-owned storage filled in by [`Panel::get_modes`](crate::Panel::get_modes).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Connector {
    pub display_info: DisplayInfo,
    pub probed_modes: Vec<DisplayMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_constants() {
        let t = S6E3HA8_TIMING;
        assert_eq!(t.hsync_start, 1556);
        assert_eq!(t.hsync_end, 1600);
        assert_eq!(t.htotal, 1716);
        assert_eq!(t.vsync_start, 3084);
        assert_eq!(t.vsync_end, 3204);
        assert_eq!(t.vtotal, 3328);
    }

    #[test]
    fn test_computed_refresh_matches_nominal() {
        assert_eq!(S6E3HA8_TIMING.computed_refresh(), S6E3HA8_TIMING.vrefresh);
    }

    #[test]
    fn test_duplicate() {
        let mode = DisplayMode::duplicate(&S6E3HA8_TIMING, ModeType::DRIVER | ModeType::PREFERRED)
            .unwrap();
        assert_eq!(mode.name, "1440x2960");
        assert!(mode.is_preferred());
        assert!(mode.mode_type.contains(ModeType::DRIVER));
        assert_eq!(mode.timing, S6E3HA8_TIMING);
    }

    #[test]
    fn test_widest_mode_name_fits() {
        let timing = DisplayTiming {
            hdisplay: u16::MAX,
            vdisplay: u16::MAX,
            ..S6E3HA8_TIMING
        };
        let mode = DisplayMode::duplicate(&timing, ModeType::DRIVER).unwrap();
        assert_eq!(mode.name, "65535x65535");
    }

    #[test]
    fn test_allocation_overflow_is_no_memory() {
        assert!(matches!(try_string_with_capacity(usize::MAX), Err(Error::NoMemory)));
        assert_eq!(try_to_string("Samsung S6E3HA8").unwrap(), "Samsung S6E3HA8");
    }

    #[test]
    fn test_mode_type_bits() {
        assert_eq!((ModeType::DRIVER | ModeType::PREFERRED).bits(), 0x48);
        assert!(!ModeType::DRIVER.contains(ModeType::PREFERRED));
    }
}
