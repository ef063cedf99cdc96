//! Device binding.
//!
//! Matches a DSI peripheral by compatible string, applies the panel's link
//! configuration, acquires its supplies and reset GPIO, and registers the
//! panel with the display pipeline.

use crate::config::PanelConfig;
use crate::error::BoxError;
use crate::panel::S6e3ha8;
use crate::resources::{DsiDevice, Regulator, ResetLevel, ResetLine, Supplies};
use crate::{Error, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use serde::Serialize;
use tracing::{debug, error, info};

/// Device tree compatible string of the panel.
pub const COMPATIBLE: &str = "samsung,s6e3ha8";

/// Driver name.
pub const DRIVER_NAME: &str = "panel-samsung-s6e3ha8";

/// Pixel format on the DSI link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb888,
    Rgb666,
    Rgb666Packed,
    Rgb565,
}

impl PixelFormat {
    pub fn bits_per_pixel(&self) -> u8 {
        match self {
            PixelFormat::Rgb888 => 24,
            PixelFormat::Rgb666 | PixelFormat::Rgb666Packed => 18,
            PixelFormat::Rgb565 => 16,
        }
    }
}

/// DSI link mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModeFlags(u32);

impl ModeFlags {
    /// Video mode. Absent for command-mode panels.
    pub const VIDEO: ModeFlags = ModeFlags(1 << 0);
    /// End-of-transmission packet handling.
    pub const EOT_PACKET: ModeFlags = ModeFlags(1 << 9);
    /// Clock lane may stop between transfers.
    pub const CLOCK_NON_CONTINUOUS: ModeFlags = ModeFlags(1 << 10);
    /// Commands are sent in low power mode.
    pub const LPM: ModeFlags = ModeFlags(1 << 11);

    pub const fn union(self, other: ModeFlags) -> Self {
        ModeFlags(self.0 | other.0)
    }

    pub const fn contains(&self, other: ModeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_video_mode(&self) -> bool {
        self.contains(ModeFlags::VIDEO)
    }
}

impl std::ops::BitOr for ModeFlags {
    type Output = ModeFlags;

    fn bitor(self, rhs: ModeFlags) -> ModeFlags {
        self.union(rhs)
    }
}

/// DSI link parameters required by a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DsiConfig {
    pub lanes: u8,
    pub format: PixelFormat,
    pub mode_flags: ModeFlags,
}

/// Four lanes, RGB888, command mode. Only commands are sent, so the clock
/// lane need not run continuously.
pub const S6E3HA8_DSI_CONFIG: DsiConfig = DsiConfig {
    lanes: 4,
    format: PixelFormat::Rgb888,
    mode_flags: ModeFlags::CLOCK_NON_CONTINUOUS
        .union(ModeFlags::EOT_PACKET)
        .union(ModeFlags::LPM),
};

const MATCH_TABLE: &[(&str, DsiConfig)] = &[(COMPATIBLE, S6E3HA8_DSI_CONFIG)];

/// Looks up the link configuration for a compatible string.
pub fn of_match(compatible: &str) -> Option<&'static DsiConfig> {
    MATCH_TABLE
        .iter()
        .find(|(name, _)| *name == compatible)
        .map(|(_, config)| config)
}

/// Why a resource could not be handed out.
#[derive(thiserror::Error, Debug)]
pub enum AcquireError {
    /// The providing subsystem has not probed yet.
    #[error("not ready")]
    NotReady,
    /// The resource does not exist or cannot be used.
    #[error(transparent)]
    Failed(BoxError),
}

/// Hands out the board resources a panel needs.
pub trait ResourceProvider {
    type Regulator: Regulator;
    type ResetPin: OutputPin;

    /// Looks up a supply by name.
    fn regulator(&mut self, name: &str) -> std::result::Result<Self::Regulator, AcquireError>;

    /// Looks up an optional output GPIO and drives it to `initial`.
    ///
    /// Returns `Ok(None)` when the board does not wire the GPIO.
    fn optional_gpio(
        &mut self,
        name: &str,
        initial: PinState,
    ) -> std::result::Result<Option<Self::ResetPin>, AcquireError>;
}

fn acquired<T>(result: std::result::Result<T, AcquireError>, resource: &str) -> Result<T> {
    result.map_err(|e| match e {
        AcquireError::NotReady => {
            debug!("{} not ready, deferring", resource);
            Error::ResourceUnavailable {
                resource: resource.to_string(),
            }
        }
        AcquireError::Failed(source) => {
            error!("Failed to get {} ({})", resource, source);
            Error::Acquire {
                resource: resource.to_string(),
                source,
            }
        }
    })
}

/// A failed [`probe`], with the DSI peripheral handed back so binding can be
/// retried.
pub struct ProbeError<T> {
    pub error: Error,
    pub dsi: T,
}

impl<T> ProbeError<T> {
    /// See [`Error::is_retry_later`].
    pub fn is_retry_later(&self) -> bool {
        self.error.is_retry_later()
    }

    pub fn into_parts(self) -> (Error, T) {
        (self.error, self.dsi)
    }
}

impl<T> std::fmt::Debug for ProbeError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Display for ProbeError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for ProbeError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

/// Panels currently known to the display pipeline.
#[derive(Debug, Default)]
pub struct PanelRegistry {
    panels: Vec<String>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a panel by device name.
    pub fn add(&mut self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(Error::AlreadyRegistered(name.to_string()));
        }
        self.panels.push(name.to_string());
        Ok(())
    }

    /// Unregisters a panel. Returns false if it was not registered.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.panels.len();
        self.panels.retain(|p| p != name);
        self.panels.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.panels.iter().any(|p| p == name)
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

/// Binds a panel to a DSI peripheral.
///
/// On failure the peripheral comes back inside the [`ProbeError`]. A
/// retry-later error means a provider was not ready and binding should be
/// attempted again with the same peripheral.
pub fn probe<T, RP, D>(
    compatible: &str,
    mut dsi: T,
    provider: &mut RP,
    delay: D,
    registry: &mut PanelRegistry,
    config: &PanelConfig,
) -> std::result::Result<S6e3ha8<RP::Regulator, RP::ResetPin, T, D>, ProbeError<T>>
where
    T: DsiDevice,
    RP: ResourceProvider,
    D: DelayNs,
{
    let dsi_config = match config.validate().and_then(|()| {
        of_match(compatible).ok_or_else(|| Error::NoMatch(compatible.to_string()))
    }) {
        Ok(dsi_config) => dsi_config,
        Err(error) => return Err(ProbeError { error, dsi }),
    };
    dsi.configure(dsi_config);

    let (supplies, reset) = match acquire(provider, config) {
        Ok(resources) => resources,
        Err(error) => return Err(ProbeError { error, dsi }),
    };

    let name = dsi.name().to_string();
    if let Err(error) = registry.add(&name) {
        return Err(ProbeError { error, dsi });
    }

    if let Err(e) = dsi.attach() {
        error!("Failed to attach {} ({})", name, e);
        registry.remove(&name);
        return Err(ProbeError {
            error: Error::Attach(Box::new(e)),
            dsi,
        });
    }

    info!(
        "{} bound to {} ({} lanes, {} bpp, {} mode, reset {})",
        DRIVER_NAME,
        name,
        dsi_config.lanes,
        dsi_config.format.bits_per_pixel(),
        if dsi_config.mode_flags.is_video_mode() {
            "video"
        } else {
            "command"
        },
        if reset.is_present() { "wired" } else { "absent" }
    );

    Ok(S6e3ha8::from_parts(supplies, reset, dsi, delay, config))
}

/// Acquires both supplies and the optional reset GPIO.
///
/// The GPIO is acquired asserted, so the panel stays in reset until prepare.
fn acquire<RP: ResourceProvider>(
    provider: &mut RP,
    config: &PanelConfig,
) -> Result<(Supplies<RP::Regulator>, ResetLine<RP::ResetPin>)> {
    let primary = acquired(
        provider.regulator(&config.supplies.primary),
        &config.supplies.primary,
    )?;
    let interface = acquired(
        provider.regulator(&config.supplies.interface),
        &config.supplies.interface,
    )?;

    let polarity = config.reset.polarity;
    let initial = polarity.pin_state(ResetLevel::Asserted);
    let reset_pin = acquired(
        provider.optional_gpio(&config.reset.gpio, initial),
        &config.reset.gpio,
    )?;

    Ok((Supplies { primary, interface }, ResetLine::new(reset_pin, polarity)))
}

/// Unbinds a panel whatever its lifecycle state.
///
/// Detaches the DSI peripheral, drops the panel from the registry and
/// releases its supplies and reset GPIO. The DSI peripheral is handed back
/// to the host.
pub fn remove<R, P, T, D>(panel: S6e3ha8<R, P, T, D>, registry: &mut PanelRegistry) -> T
where
    R: Regulator,
    P: OutputPin,
    T: DsiDevice,
    D: DelayNs,
{
    let state = panel.state();
    let (_supplies, _reset, mut dsi, _delay) = panel.release();
    dsi.detach();
    registry.remove(dsi.name());
    info!("{} unbound from {} (was {})", DRIVER_NAME, dsi.name(), state);
    dsi
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{Bench, Event, Fault};
    use crate::panel::Panel;
    use crate::state::{LifecycleState, Operation};
    use crate::StdDelay;

    #[test]
    fn test_of_match() {
        let config = of_match("samsung,s6e3ha8").unwrap();
        assert_eq!(config.lanes, 4);
        assert_eq!(config.format, PixelFormat::Rgb888);
        assert_eq!(config.format.bits_per_pixel(), 24);
        assert!(config.mode_flags.contains(ModeFlags::CLOCK_NON_CONTINUOUS));
        assert!(config.mode_flags.contains(ModeFlags::LPM));
        assert!(config.mode_flags.contains(ModeFlags::EOT_PACKET));
        assert!(!config.mode_flags.is_video_mode());
        assert!(of_match("samsung,s6d16d0").is_none());
    }

    #[test]
    fn test_bind_cycle_unbind() {
        let bench = Bench::new();
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();

        let mut panel = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .unwrap();

        assert!(registry.contains("dsi0.0"));
        assert!(bench.is_attached());
        assert_eq!(bench.dsi_config(), Some(S6E3HA8_DSI_CONFIG));
        assert_eq!(bench.pin_high("reset"), Some(false));

        let mut states = vec![panel.state()];
        for op in Operation::SEQUENCE {
            panel.run(op).unwrap();
            states.push(panel.state());
        }
        assert_eq!(states.first(), Some(&LifecycleState::Unpowered));
        assert_eq!(states.last(), Some(&LifecycleState::Unpowered));

        remove(panel, &mut registry);
        assert!(registry.is_empty());
        assert!(!bench.is_attached());
        assert_eq!(bench.events().last(), Some(&Event::Detached));
    }

    #[test]
    fn test_unknown_compatible() {
        let bench = Bench::new();
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();

        let err = probe(
            "samsung,s6e63m0",
            bench.dsi("dsi0.0"),
            &mut provider,
            StdDelay,
            &mut registry,
            &PanelConfig::default(),
        )
        .err()
        .unwrap()
        .error;

        assert!(matches!(err, Error::NoMatch(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_supply_not_ready_defers() {
        let bench = Bench::new();
        bench.inject(Fault::NotReady("vci".into()));
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();

        let err = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .err()
        .unwrap()
        .error;

        assert!(err.is_retry_later());
        assert!(registry.is_empty());
        assert!(!bench.is_attached());
    }

    #[test]
    fn test_deferred_bind_retries_with_same_peripheral() {
        let bench = Bench::new();
        bench.inject(Fault::NotReady("vci".into()));
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();
        let config = PanelConfig::default();

        let err = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &config,
        )
        .err()
        .unwrap();
        assert!(err.is_retry_later());
        let (_, dsi) = err.into_parts();

        bench.clear_faults();
        let panel = probe(COMPATIBLE, dsi, &mut provider, bench.delay(), &mut registry, &config)
            .unwrap();

        assert!(registry.contains("dsi0.0"));
        assert!(bench.is_attached());
        assert_eq!(panel.state(), LifecycleState::Unpowered);
    }

    #[test]
    fn test_supply_hard_failure() {
        let bench = Bench::new();
        bench.inject(Fault::AcquireFailed("vddi".into()));
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();

        let err = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .err()
        .unwrap();

        assert!(!err.is_retry_later());
        assert!(matches!(err.error, Error::Acquire { ref resource, .. } if resource == "vddi"));
        assert_eq!(err.dsi.name(), "dsi0.0");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_gpio_hard_failure() {
        let bench = Bench::new();
        bench.inject(Fault::AcquireFailed("reset".into()));
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();

        let err = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .err()
        .unwrap()
        .error;

        assert!(matches!(err, Error::Acquire { ref resource, .. } if resource == "reset"));
        assert!(!err.is_retry_later());
    }

    #[test]
    fn test_missing_reset_gpio_is_legal() {
        let bench = Bench::without_reset_gpio();
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();

        let panel = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .unwrap();

        assert!(!panel.has_reset());
        assert_eq!(bench.pin_high("reset"), None);
    }

    #[test]
    fn test_attach_failure_unregisters() {
        let bench = Bench::new();
        bench.inject(Fault::Attach);
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();

        let err = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .err()
        .unwrap()
        .error;

        assert!(matches!(err, Error::Attach(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_registration() {
        let bench = Bench::new();
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();
        registry.add("dsi0.0").unwrap();

        let err = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .err()
        .unwrap()
        .error;

        assert!(matches!(err, Error::AlreadyRegistered(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unbind_while_enabled() {
        let bench = Bench::new();
        let mut provider = bench.clone();
        let mut registry = PanelRegistry::new();
        let mut panel = probe(
            COMPATIBLE,
            bench.dsi("dsi0.0"),
            &mut provider,
            bench.delay(),
            &mut registry,
            &PanelConfig::default(),
        )
        .unwrap();
        panel.prepare().unwrap();
        panel.enable().unwrap();

        remove(panel, &mut registry);

        assert!(registry.is_empty());
        assert!(!bench.is_attached());
    }

    #[test]
    fn test_registry() {
        let mut registry = PanelRegistry::new();
        registry.add("a").unwrap();
        assert!(registry.add("a").is_err());
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
    }
}
