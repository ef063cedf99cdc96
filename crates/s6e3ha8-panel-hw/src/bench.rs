//! Bench hardware.
//!
//! In-process stand-ins for the panel's supplies, reset GPIO, DSI host and
//! clock. All of them share one [`Bench`] handle, which keeps an ordered,
//! timestamped event log and injects faults on request. Time only advances
//! through [`BenchDelay`], so recorded timestamps are exact.

use crate::binding::{AcquireError, DsiConfig, ResourceProvider};
use crate::panel::dcs::{self, DcsCommand};
use crate::resources::{DcsTransport, DsiDevice, Regulator};
use crate::{Error, Result};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin, PinState};
use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Something that happened on the bench.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SupplyEnabled(String),
    SupplyDisabled(String),
    PinSet { name: String, high: bool },
    Dcs { opcode: u8, params: Vec<u8> },
    Configured(DsiConfig),
    Attached,
    Detached,
}

/// An event and the bench time it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub at_ns: u64,
    pub event: Event,
}

/// A failure the bench should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The named supply refuses to enable.
    Supply(String),
    /// The DSI host rejects this DCS opcode.
    Command(u8),
    /// The named resource is not ready yet.
    NotReady(String),
    /// The named resource cannot be acquired at all.
    AcquireFailed(String),
    /// The DSI host refuses to attach.
    Attach,
}

/// Errors produced by bench hardware.
#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("supply {0} refused to enable")]
    Supply(String),
    #[error("DSI host rejected DCS {0:#04x}")]
    Dcs(u8),
    #[error("DSI host refused attach")]
    Attach,
    #[error("no resource named {0}")]
    NoSuchResource(String),
}

#[derive(Debug, Default)]
struct BenchState {
    now_ns: u64,
    records: Vec<Record>,
    faults: Vec<Fault>,
    supplies: HashMap<String, u32>,
    pins: HashMap<String, bool>,
    dsi_config: Option<DsiConfig>,
    attached: bool,
    gpios_wired: bool,
}

impl BenchState {
    fn record(&mut self, event: Event) {
        self.records.push(Record {
            at_ns: self.now_ns,
            event,
        });
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }

    fn acquire(&self, name: &str) -> std::result::Result<(), AcquireError> {
        if self.has_fault(&Fault::NotReady(name.to_string())) {
            return Err(AcquireError::NotReady);
        }
        if self.has_fault(&Fault::AcquireFailed(name.to_string())) {
            return Err(AcquireError::Failed(Box::new(BenchError::NoSuchResource(
                name.to_string(),
            ))));
        }
        Ok(())
    }
}

/// Shared handle to the simulated hardware.
#[derive(Debug, Clone)]
pub struct Bench {
    state: Arc<Mutex<BenchState>>,
}

impl Default for Bench {
    fn default() -> Self {
        Self::new()
    }
}

impl Bench {
    /// A bench with a reset GPIO wired to the panel.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BenchState {
                gpios_wired: true,
                ..BenchState::default()
            })),
        }
    }

    /// A bench where the panel's reset line is not connected.
    pub fn without_reset_gpio() -> Self {
        Self {
            state: Arc::new(Mutex::new(BenchState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BenchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn inject(&self, fault: Fault) {
        debug!("Bench fault armed: {}", fault);
        self.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn regulator(&self, name: &str) -> BenchRegulator {
        BenchRegulator {
            name: name.to_string(),
            bench: self.clone(),
        }
    }

    pub fn pin(&self, name: &str) -> BenchPin {
        BenchPin {
            name: name.to_string(),
            bench: self.clone(),
        }
    }

    pub fn dsi(&self, name: &str) -> BenchDsi {
        BenchDsi {
            name: name.to_string(),
            bench: self.clone(),
        }
    }

    pub fn delay(&self) -> BenchDelay {
        BenchDelay {
            bench: self.clone(),
        }
    }

    /// Bench time in nanoseconds.
    pub fn now_ns(&self) -> u64 {
        self.lock().now_ns
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().records.iter().map(|r| r.event.clone()).collect()
    }

    /// Forgets recorded events. Hardware state and time are kept.
    pub fn clear_records(&self) {
        self.lock().records.clear();
    }

    /// How many times the supply is currently enabled.
    pub fn supply_use_count(&self, name: &str) -> u32 {
        self.lock().supplies.get(name).copied().unwrap_or(0)
    }

    pub fn supply_enabled(&self, name: &str) -> bool {
        self.supply_use_count(name) > 0
    }

    /// Level last driven on a pin, `None` if never driven.
    pub fn pin_high(&self, name: &str) -> Option<bool> {
        self.lock().pins.get(name).copied()
    }

    /// Opcodes of every DCS write delivered, in order.
    pub fn dcs_opcodes(&self) -> Vec<u8> {
        self.lock()
            .records
            .iter()
            .filter_map(|r| match r.event {
                Event::Dcs { opcode, .. } => Some(opcode),
                _ => None,
            })
            .collect()
    }

    pub fn is_attached(&self) -> bool {
        self.lock().attached
    }

    pub fn dsi_config(&self) -> Option<DsiConfig> {
        self.lock().dsi_config
    }
}

impl ResourceProvider for Bench {
    type Regulator = BenchRegulator;
    type ResetPin = BenchPin;

    fn regulator(&mut self, name: &str) -> std::result::Result<BenchRegulator, AcquireError> {
        self.lock().acquire(name)?;
        Ok(BenchRegulator {
            name: name.to_string(),
            bench: self.clone(),
        })
    }

    fn optional_gpio(
        &mut self,
        name: &str,
        initial: PinState,
    ) -> std::result::Result<Option<BenchPin>, AcquireError> {
        {
            let state = self.lock();
            state.acquire(name)?;
            if !state.gpios_wired {
                return Ok(None);
            }
        }
        let mut pin = self.pin(name);
        if let Err(e) = pin.set_state(initial) {
            match e {}
        }
        Ok(Some(pin))
    }
}

/// Simulated supply rail with an enable use-count.
#[derive(Debug)]
pub struct BenchRegulator {
    name: String,
    bench: Bench,
}

impl Regulator for BenchRegulator {
    type Error = BenchError;

    fn name(&self) -> &str {
        &self.name
    }

    fn enable(&mut self) -> std::result::Result<(), BenchError> {
        let mut state = self.bench.lock();
        if state.has_fault(&Fault::Supply(self.name.clone())) {
            return Err(BenchError::Supply(self.name.clone()));
        }
        *state.supplies.entry(self.name.clone()).or_insert(0) += 1;
        state.record(Event::SupplyEnabled(self.name.clone()));
        Ok(())
    }

    fn disable(&mut self) {
        let mut state = self.bench.lock();
        match state.supplies.get_mut(&self.name) {
            Some(count) if *count > 0 => {
                *count -= 1;
                state.record(Event::SupplyDisabled(self.name.clone()));
            }
            _ => warn!("Unbalanced disable of supply {}", self.name),
        }
    }
}

/// Simulated output GPIO.
#[derive(Debug)]
pub struct BenchPin {
    name: String,
    bench: Bench,
}

impl BenchPin {
    fn drive(&mut self, high: bool) {
        let mut state = self.bench.lock();
        state.pins.insert(self.name.clone(), high);
        state.record(Event::PinSet {
            name: self.name.clone(),
            high,
        });
    }
}

impl ErrorType for BenchPin {
    type Error = Infallible;
}

impl OutputPin for BenchPin {
    fn set_low(&mut self) -> std::result::Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> std::result::Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

/// Simulated DSI peripheral.
#[derive(Debug)]
pub struct BenchDsi {
    name: String,
    bench: Bench,
}

impl DcsTransport for BenchDsi {
    type Error = BenchError;

    fn write_dcs(&mut self, opcode: u8, params: &[u8]) -> std::result::Result<(), BenchError> {
        let mut state = self.bench.lock();
        if state.has_fault(&Fault::Command(opcode)) {
            return Err(BenchError::Dcs(opcode));
        }
        state.record(Event::Dcs {
            opcode,
            params: params.to_vec(),
        });
        Ok(())
    }
}

impl DsiDevice for BenchDsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, config: &DsiConfig) {
        let mut state = self.bench.lock();
        state.dsi_config = Some(*config);
        state.record(Event::Configured(*config));
    }

    fn attach(&mut self) -> std::result::Result<(), BenchError> {
        let mut state = self.bench.lock();
        if state.has_fault(&Fault::Attach) {
            return Err(BenchError::Attach);
        }
        state.attached = true;
        state.record(Event::Attached);
        Ok(())
    }

    fn detach(&mut self) {
        let mut state = self.bench.lock();
        state.attached = false;
        state.record(Event::Detached);
    }
}

/// Delay that advances bench time instead of sleeping.
#[derive(Debug, Clone)]
pub struct BenchDelay {
    bench: Bench,
}

impl DelayNs for BenchDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.bench.lock().now_ns += u64::from(ns);
    }
}

impl FromStr for Fault {
    type Err = Error;

    /// Parses `supply:NAME`, `command:NAME|0xNN`, `not-ready:NAME`,
    /// `acquire:NAME` or `attach`.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        match (kind.to_lowercase().as_str(), arg) {
            ("attach", None) => Ok(Fault::Attach),
            ("supply", Some(name)) if !name.is_empty() => Ok(Fault::Supply(name.to_string())),
            ("not-ready", Some(name)) if !name.is_empty() => {
                Ok(Fault::NotReady(name.to_string()))
            }
            ("acquire", Some(name)) if !name.is_empty() => {
                Ok(Fault::AcquireFailed(name.to_string()))
            }
            ("command", Some(cmd)) => {
                if let Some(hex) = cmd.strip_prefix("0x") {
                    u8::from_str_radix(hex, 16)
                        .map(Fault::Command)
                        .map_err(|_| Error::InvalidFault(s.to_string()))
                } else {
                    Ok(Fault::Command(cmd.parse::<DcsCommand>()?.opcode()))
                }
            }
            _ => Err(Error::InvalidFault(s.to_string())),
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::Supply(name) => write!(f, "supply:{}", name),
            Fault::Command(opcode) => write!(f, "command:{}", dcs::opcode_name(*opcode)),
            Fault::NotReady(name) => write!(f, "not-ready:{}", name),
            Fault::AcquireFailed(name) => write!(f, "acquire:{}", name),
            Fault::Attach => write!(f, "attach"),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::SupplyEnabled(name) => write!(f, "supply {} on", name),
            Event::SupplyDisabled(name) => write!(f, "supply {} off", name),
            Event::PinSet { name, high } => {
                write!(f, "gpio {} {}", name, if *high { "high" } else { "low" })
            }
            Event::Dcs { opcode, params } => write!(
                f,
                "dcs {:#04x} {} {:02X?}",
                dcs::packet_data_type(params.len()),
                dcs::opcode_name(*opcode),
                params
            ),
            Event::Configured(config) => write!(
                f,
                "dsi configured: {} lanes, {:?}, flags {:#06x}",
                config.lanes,
                config.format,
                config.mode_flags.bits()
            ),
            Event::Attached => write!(f, "dsi attached"),
            Event::Detached => write!(f, "dsi detached"),
        }
    }
}
