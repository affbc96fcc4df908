//! Station configuration using Figment
//!
//! A station file lists the instruments of one measurement setup. Each device
//! names its class, the port it is reached through and the host parameters the
//! class receives. Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables prefixed with `DEVCLASS_`, nested keys split on `__`
//!
//! ```text
//! DEVCLASS_APPLICATION__LOG_LEVEL=debug
//! ```
//!
//! # Example
//!
//! ```toml
//! [application]
//! name = "IV station"
//! log_level = "info"
//!
//! [[devices]]
//! id = "generator"
//! type = "agilent_33220a"
//! port = { resource = "192.168.1.20:5025" }
//!
//! [devices.parameters]
//! SweepMode = "Frequency in Hz"
//! Waveform = "Square"
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::adapters::PortSettings;
use crate::error::{DeviceError, DeviceResult};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level station configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Device definitions
    #[serde(default)]
    pub devices: Vec<DeviceDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// Device class implementations known to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Agilent 33220A function generator.
    #[serde(rename = "agilent_33220a")]
    Agilent33220A,
    /// Keysight N6705 channel as an arbitrary transient source.
    #[serde(rename = "keysight_n6705_signal")]
    KeysightN6705Signal,
    /// Agilent N6705A channel driven by direct ARB parameters.
    #[serde(rename = "agilent_n6705a_signal")]
    AgilentN6705ASignal,
    /// Keysight N6705 channel as a source/measure unit.
    #[serde(rename = "keysight_n6705_smu")]
    KeysightN6705Smu,
    /// Fluke 8842A multimeter.
    #[serde(rename = "fluke_8842a")]
    Fluke8842A,
    /// Keithley 617 electrometer.
    #[serde(rename = "keithley_617")]
    Keithley617,
    /// NF CA5351 current amplifier.
    #[serde(rename = "nf_ca5351")]
    NfCa5351,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Agilent33220A => "agilent_33220a",
            DeviceType::KeysightN6705Signal => "keysight_n6705_signal",
            DeviceType::AgilentN6705ASignal => "agilent_n6705a_signal",
            DeviceType::KeysightN6705Smu => "keysight_n6705_smu",
            DeviceType::Fluke8842A => "fluke_8842a",
            DeviceType::Keithley617 => "keithley_617",
            DeviceType::NfCa5351 => "nf_ca5351",
        };
        f.write_str(name)
    }
}

/// One instrument of the station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDefinition {
    /// Unique device identifier
    pub id: String,
    /// Device class to instantiate
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Whether this device takes part in the run
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// How to reach the instrument
    #[serde(default)]
    pub port: PortSettings,
    /// Host parameters, keyed by their host labels
    #[serde(default)]
    pub parameters: toml::Table,
}

fn default_name() -> String {
    "devclass".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

impl StationConfig {
    /// Load and validate a station file, applying `DEVCLASS_` overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DeviceResult<Self> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DEVCLASS_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a station from TOML text, without overrides.
    pub fn from_toml_str(text: &str) -> DeviceResult<Self> {
        let config: Self = Figment::new().merge(Toml::string(text)).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject bad log levels, blank or duplicate ids and enabled devices without a resource.
    pub fn validate(&self) -> DeviceResult<()> {
        if !LOG_LEVELS.contains(&self.application.log_level.as_str()) {
            return Err(DeviceError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        let mut ids = HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(DeviceError::Configuration(
                    "Device id cannot be empty".to_string(),
                ));
            }
            if !ids.insert(device.id.as_str()) {
                return Err(DeviceError::Configuration(format!(
                    "Duplicate device ID: '{}'",
                    device.id
                )));
            }
            if device.enabled && device.port.resource.trim().is_empty() {
                return Err(DeviceError::Configuration(format!(
                    "Device '{}': 'port.resource' cannot be empty",
                    device.id
                )));
            }
        }

        Ok(())
    }

    /// Devices that take part in the run, in file order.
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceDefinition> {
        self.devices.iter().filter(|d| d.enabled)
    }
}
