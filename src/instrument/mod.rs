//! Device classes
//!
//! A device class drives one instrument through the host's measurement
//! lifecycle. The host calls, in order:
//!
//! 1. `initialize` once per run
//! 2. `configure`, then `poweron`
//! 3. per sweep point: `apply(value)`, `trigger`, `measure`, `read_result`, `call`
//! 4. `poweroff`, then `deinitialize`
//!
//! Every step defaults to a no-op, so a driver only implements the steps its
//! instrument needs. `call` returns one number per [`Variable`] the driver
//! declared.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::ScpiPort;
use crate::config::{DeviceDefinition, DeviceType};
use crate::error::{DeviceError, DeviceResult};
use crate::waveform::CanonicalParameter;

pub mod agilent_33220a;
pub mod agilent_n6705a_signal;
pub mod fluke_8842a;
pub mod keithley_617;
pub mod keysight_n6705_signal;
pub mod keysight_n6705_smu;
pub mod nf_ca5351;

pub use agilent_33220a::Agilent33220A;
pub use agilent_n6705a_signal::AgilentN6705ASignal;
pub use fluke_8842a::Fluke8842A;
pub use keithley_617::Keithley617;
pub use keysight_n6705_signal::KeysightN6705Signal;
pub use keysight_n6705_smu::KeysightN6705Smu;
pub use nf_ca5351::NfCa5351;

/// A measured or reported quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// Column name.
    pub name: String,
    /// Unit label.
    pub unit: String,
    /// Offered for plotting.
    pub plot: bool,
    /// Written to the data file.
    pub save: bool,
}

impl Variable {
    /// Plotted and saved.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            plot: true,
            save: true,
        }
    }

    /// Saved but not plotted (flags such as overrange).
    pub fn saved_only(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            plot: false,
            ..Self::new(name, unit)
        }
    }
}

/// The quantity a signal source sweeps, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SweepMode {
    /// Measure at fixed settings.
    #[default]
    None,
    /// Sweep this parameter.
    Parameter(CanonicalParameter),
}

impl SweepMode {
    /// Swept parameter, if any.
    pub fn parameter(self) -> Option<CanonicalParameter> {
        match self {
            SweepMode::None => None,
            SweepMode::Parameter(p) => Some(p),
        }
    }
}

impl TryFrom<String> for SweepMode {
    type Error = DeviceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim() {
            "None" | "" => Ok(SweepMode::None),
            other => other.parse().map(SweepMode::Parameter),
        }
    }
}

impl From<SweepMode> for String {
    fn from(mode: SweepMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepMode::None => f.write_str("None"),
            SweepMode::Parameter(p) => write!(f, "{p}"),
        }
    }
}

/// Reject a sweep parameter the driver does not offer.
pub(crate) fn check_sweep_mode(
    driver: &str,
    mode: SweepMode,
    offered: &[CanonicalParameter],
) -> DeviceResult<()> {
    match mode.parameter() {
        Some(p) if !offered.contains(&p) => Err(DeviceError::InvalidInput(format!(
            "{driver} cannot sweep {p}"
        ))),
        _ => Ok(()),
    }
}

/// Channel number from a host device string such as `CH2`.
pub(crate) fn channel_from_device(device: &str) -> DeviceResult<u8> {
    device
        .chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .filter(|n| (1..=4).contains(n))
        .map(|n| n as u8)
        .ok_or_else(|| {
            DeviceError::InvalidInput(format!("'{device}' does not name a channel CH1..CH4"))
        })
}

/// Duration from a configured number of seconds, no shorter than `floor`.
pub(crate) fn seconds(key: &str, value: f64, floor: f64) -> DeviceResult<Duration> {
    Duration::try_from_secs_f64(value.max(floor)).map_err(|e| {
        DeviceError::Configuration(format!("{key} = {value} is not a usable duration: {e}"))
    })
}

/// Lifecycle of one instrument.
#[async_trait]
pub trait DeviceClass: Send {
    /// Short name shown by the host.
    fn name(&self) -> String;

    /// Quantities returned by [`DeviceClass::call`], in order.
    fn variables(&self) -> Vec<Variable>;

    /// Bring the instrument to a known state.
    async fn initialize(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Send the configured settings.
    async fn configure(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Leave the instrument in a safe state.
    async fn deinitialize(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Enable the output or input.
    async fn poweron(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Disable the output or input.
    async fn poweroff(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Move to the next sweep value.
    async fn apply(&mut self, _value: f64) -> DeviceResult<()> {
        Ok(())
    }

    /// Start an acquisition when the instrument needs a software trigger.
    async fn trigger(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Request the reading for this point.
    async fn measure(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Wait for and collect the requested reading.
    async fn read_result(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Values of [`DeviceClass::variables`] for the current sweep point.
    async fn call(&mut self) -> DeviceResult<Vec<f64>>;
}

fn parameters<T: serde::de::DeserializeOwned>(definition: &DeviceDefinition) -> DeviceResult<T> {
    toml::Value::Table(definition.parameters.clone())
        .try_into()
        .map_err(|e| {
            DeviceError::Configuration(format!(
                "invalid parameters for device '{}': {e}",
                definition.id
            ))
        })
}

/// Build the device class `definition` names on top of `port`.
pub fn create<P>(definition: &DeviceDefinition, port: P) -> DeviceResult<Box<dyn DeviceClass>>
where
    P: ScpiPort + 'static,
{
    let device: Box<dyn DeviceClass> = match definition.device_type {
        DeviceType::Agilent33220A => Box::new(Agilent33220A::new(port, parameters(definition)?)?),
        DeviceType::KeysightN6705Signal => {
            Box::new(KeysightN6705Signal::new(port, parameters(definition)?)?)
        }
        DeviceType::AgilentN6705ASignal => {
            Box::new(AgilentN6705ASignal::new(port, parameters(definition)?)?)
        }
        DeviceType::KeysightN6705Smu => {
            Box::new(KeysightN6705Smu::new(port, parameters(definition)?)?)
        }
        DeviceType::Fluke8842A => Box::new(Fluke8842A::new(port, parameters(definition)?)),
        DeviceType::Keithley617 => Box::new(Keithley617::new(port, parameters(definition)?)),
        DeviceType::NfCa5351 => Box::new(NfCa5351::new(port, parameters(definition)?)),
    };
    tracing::info!(id = %definition.id, device = %device.name(), "device class created");
    Ok(device)
}
