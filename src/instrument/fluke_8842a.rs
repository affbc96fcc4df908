//! Fluke 8842A digital multimeter (GPIB)
//!
//! The meter is put into SRQ mode at initialization so the status byte flags
//! data available (bit 5) and overrange (bit 0). With an external trigger the
//! reading only exists once the trigger fired, so `read_result` polls the
//! status byte until data is available or the trigger timeout elapses. A
//! timeout is reported as [`DeviceError::TriggerTimeout`], which asks the host
//! to stop the run.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{seconds, DeviceClass, Variable};
use crate::adapters::ScpiPort;
use crate::error::{parse_reading, DeviceError, DeviceResult};

const DATA_AVAILABLE: u8 = 1 << 5;
const OVERRANGE: u8 = 1;

/// Measurement function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// `F1`.
    #[default]
    #[serde(rename = "DC voltage")]
    DcVoltage,
    /// `F2`.
    #[serde(rename = "AC voltage")]
    AcVoltage,
    /// `F3`.
    #[serde(rename = "2-wire resistance")]
    TwoWireResistance,
    /// `F4`.
    #[serde(rename = "4-wire resistance")]
    FourWireResistance,
    /// `F5`.
    #[serde(rename = "DC current")]
    DcCurrent,
    /// `F6`.
    #[serde(rename = "AC current")]
    AcCurrent,
}

impl Mode {
    fn command(self) -> &'static str {
        match self {
            Mode::DcVoltage => "F1",
            Mode::AcVoltage => "F2",
            Mode::TwoWireResistance => "F3",
            Mode::FourWireResistance => "F4",
            Mode::DcCurrent => "F5",
            Mode::AcCurrent => "F6",
        }
    }

    fn variable(self) -> Variable {
        match self {
            Mode::DcVoltage => Variable::new("DC voltage", "V"),
            Mode::AcVoltage => Variable::new("AC voltage", "V"),
            Mode::TwoWireResistance | Mode::FourWireResistance => {
                Variable::new("Resistance", "Ohm")
            }
            Mode::DcCurrent => Variable::new("DC current", "A"),
            Mode::AcCurrent => Variable::new("AC current", "A"),
        }
    }
}

/// Measurement range; labels list what each code means per function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Range {
    /// `R0`, autorange.
    #[default]
    #[serde(rename = "Autorange ON")]
    Auto,
    /// `R1`.
    #[serde(rename = "200 mV, 200 Ohm")]
    R1,
    /// `R2`.
    #[serde(rename = "2 V, 2 kOhm")]
    R2,
    /// `R3`.
    #[serde(rename = "20 V, 20 kOhm")]
    R3,
    /// `R4`.
    #[serde(rename = "200 V, 200 kOhm, 200 mA")]
    R4,
    /// `R5`.
    #[serde(rename = "1000 V DC, 700 V AC, 2 MOhm, 2000 mA")]
    R5,
    /// `R6`.
    #[serde(rename = "20 MOhm")]
    R6,
    /// `R8`, fast ohms/millivolt range.
    #[serde(rename = "20 mV, 20 Ohm")]
    R8,
}

impl Range {
    fn command(self) -> &'static str {
        match self {
            Range::Auto => "R0",
            Range::R1 => "R1",
            Range::R2 => "R2",
            Range::R3 => "R3",
            Range::R4 => "R4",
            Range::R5 => "R5",
            Range::R6 => "R6",
            Range::R8 => "R8",
        }
    }
}

/// Reading rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rate {
    /// `S2`, 100 readings/s.
    #[default]
    Fast,
    /// `S1`, 20 readings/s.
    Medium,
    /// `S0`, 2.5 readings/s.
    Slow,
}

impl Rate {
    fn command(self) -> &'static str {
        match self {
            Rate::Fast => "S2",
            Rate::Medium => "S1",
            Rate::Slow => "S0",
        }
    }
}

/// Trigger mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trigger {
    /// `T0`, continuous.
    #[default]
    Auto,
    /// `T1`.
    #[serde(rename = "External with settling delay")]
    ExternalWithDelay,
    /// `T3`.
    #[serde(rename = "External without settling delay")]
    ExternalWithoutDelay,
}

impl Trigger {
    fn command(self) -> &'static str {
        match self {
            Trigger::Auto => "T0",
            Trigger::ExternalWithDelay => "T1",
            Trigger::ExternalWithoutDelay => "T3",
        }
    }
}

/// Host parameters of the Fluke 8842A class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fluke8842AParameters {
    /// Measurement function.
    #[serde(rename = "Mode")]
    pub mode: Mode,
    /// Reading rate.
    #[serde(rename = "Rate")]
    pub rate: Rate,
    /// Range.
    #[serde(rename = "Range")]
    pub range: Range,
    /// Trigger mode.
    #[serde(rename = "Trigger")]
    pub trigger: Trigger,
    /// How long to wait for an external trigger, in seconds.
    pub trigger_timeout_s: f64,
    /// Status byte poll interval while waiting, in seconds.
    pub poll_interval_s: f64,
}

impl Default for Fluke8842AParameters {
    fn default() -> Self {
        Self {
            mode: Mode::DcVoltage,
            rate: Rate::Fast,
            range: Range::Auto,
            trigger: Trigger::Auto,
            trigger_timeout_s: 30.0,
            poll_interval_s: 0.5,
        }
    }
}

/// Fluke 8842A digital multimeter on a GPIB port.
pub struct Fluke8842A<P> {
    port: P,
    params: Fluke8842AParameters,
    reading: Option<(f64, bool)>,
}

impl<P: ScpiPort> Fluke8842A<P> {
    /// Meter on `port`; nothing is sent until `initialize`.
    pub fn new(port: P, params: Fluke8842AParameters) -> Self {
        Self {
            port,
            params,
            reading: None,
        }
    }

    /// Poll the status byte until data is available.
    async fn wait_for_trigger(&mut self) -> DeviceResult<u8> {
        let timeout = seconds("trigger_timeout_s", self.params.trigger_timeout_s, 0.0)?;
        let interval = seconds("poll_interval_s", self.params.poll_interval_s, 0.001)?;
        let mut waited = Duration::ZERO;
        while waited < timeout {
            let status = self.port.read_status_byte().await?;
            if status & DATA_AVAILABLE != 0 {
                debug!(?waited, status, "external trigger received");
                return Ok(status);
            }
            tokio::time::sleep(interval).await;
            waited += interval;
        }
        warn!(?waited, "no external trigger");
        Err(DeviceError::TriggerTimeout { waited })
    }
}

#[async_trait]
impl<P: ScpiPort> DeviceClass for Fluke8842A<P> {
    fn name(&self) -> String {
        "Fluke8842A".to_string()
    }

    fn variables(&self) -> Vec<Variable> {
        vec![
            self.params.mode.variable(),
            Variable::saved_only("overrange", "bool"),
        ]
    }

    async fn initialize(&mut self) -> DeviceResult<()> {
        self.port.write("*").await?; // reset
        self.port.write("X0").await?; // clear error register
        self.port.write("Y1").await?; // reading suffix
        self.port.write("N17 P1").await // SRQ on overrange and data available
    }

    async fn configure(&mut self) -> DeviceResult<()> {
        self.port.write(self.params.mode.command()).await?;
        self.port.write(self.params.range.command()).await?;
        self.port.write(self.params.rate.command()).await?;
        self.port.write(self.params.trigger.command()).await
    }

    async fn measure(&mut self) -> DeviceResult<()> {
        // Empty message: group execute trigger.
        self.port.write("").await
    }

    async fn read_result(&mut self) -> DeviceResult<()> {
        self.reading = None;
        let mut status = self.port.read_status_byte().await?;
        if self.params.trigger != Trigger::Auto {
            status = self.wait_for_trigger().await?;
        }

        let answer = self.port.read().await?;
        let (value, _label) = answer
            .split_once(',')
            .ok_or_else(|| DeviceError::malformed("Fluke 8842A reading", answer.as_str()))?;
        let value = parse_reading("Fluke 8842A reading", value)?;
        self.reading = Some((value, status & OVERRANGE != 0));
        Ok(())
    }

    async fn call(&mut self) -> DeviceResult<Vec<f64>> {
        let (value, overrange) = self
            .reading
            .ok_or_else(|| DeviceError::InvalidInput("no reading, read_result did not run".into()))?;
        Ok(vec![value, if overrange { 1.0 } else { 0.0 }])
    }
}
