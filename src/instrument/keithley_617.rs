//! Keithley 617 programmable electrometer (GPIB)
//!
//! Device-dependent commands end with `X` to execute. Readings come back with
//! a four character prefix, e.g. `NDCV-1.23456E+00`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DeviceClass, Variable};
use crate::adapters::ScpiPort;
use crate::error::{parse_reading, DeviceError, DeviceResult};

/// Zero check, zero correct and back off, as the manual proposes.
const AUTO_ZERO: &str = "C1XZ1XC0X";

/// Measurement function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// `F0`.
    #[default]
    Volts,
    /// `F1`.
    Amps,
    /// `F2`.
    Ohms,
    /// `F3`.
    Coulombs,
    /// `F4`.
    #[serde(rename = "External feedback")]
    ExternalFeedback,
    /// `F5`, resistance from the voltage source and measured current.
    #[serde(rename = "V/I Ohms")]
    VoltsPerAmpOhms,
}

impl Mode {
    fn command(self) -> &'static str {
        match self {
            Mode::Volts => "F0",
            Mode::Amps => "F1",
            Mode::Ohms => "F2",
            Mode::Coulombs => "F3",
            Mode::ExternalFeedback => "F4",
            Mode::VoltsPerAmpOhms => "F5",
        }
    }

    fn variable(self) -> Variable {
        match self {
            Mode::Volts | Mode::ExternalFeedback => Variable::new("Voltage", "V"),
            Mode::Amps => Variable::new("Current", "A"),
            Mode::Ohms => Variable::new("Resistance", "Ohm"),
            Mode::Coulombs => Variable::new("Charge", "C"),
            Mode::VoltsPerAmpOhms => Variable::new("Resistance V/I", "Ohm"),
        }
    }
}

/// Enable, disable or leave a setting as the front panel has it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Toggle {
    /// Send the off code.
    #[default]
    #[serde(alias = "Off")]
    Disabled,
    /// Send the on code.
    #[serde(alias = "On")]
    Enabled,
    /// Send nothing.
    #[serde(rename = "As is")]
    AsIs,
}

/// What the front panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// The reading.
    #[default]
    Electrometer,
    /// The source level.
    #[serde(rename = "Voltage source")]
    VoltageSource,
}

/// Trigger mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trigger {
    /// Continuous, triggered by GET.
    #[default]
    Internal,
    /// Continuous, triggered by the external trigger input.
    External,
}

/// Host parameters of the Keithley 617 class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keithley617Parameters {
    /// Measurement function.
    #[serde(rename = "Mode")]
    pub mode: Mode,
    /// `R0` (auto) to `R14`; the meaning depends on the mode.
    #[serde(rename = "Range")]
    pub range: String,
    /// Source level in V, set in 50 mV steps.
    #[serde(rename = "Voltage source in V")]
    pub voltage_source: f64,
    /// Run the auto zero sequence during `configure`.
    #[serde(rename = "Auto zero")]
    pub auto_zero: bool,
    /// Accepted for completeness; zero check is only toggled by auto zero.
    #[serde(rename = "Zero check")]
    pub zero_check: Toggle,
    /// Zero correct.
    #[serde(rename = "Zero correct")]
    pub zero_correct: Toggle,
    /// Baseline suppression.
    #[serde(rename = "Baseline suppression")]
    pub baseline_suppression: Toggle,
    /// Front panel display.
    #[serde(rename = "Display mode")]
    pub display_mode: DisplayMode,
    /// Trigger mode.
    #[serde(rename = "Trigger")]
    pub trigger: Trigger,
}

impl Default for Keithley617Parameters {
    fn default() -> Self {
        Self {
            mode: Mode::Volts,
            range: "R0".to_string(),
            voltage_source: 0.0,
            auto_zero: false,
            zero_check: Toggle::Disabled,
            zero_correct: Toggle::Disabled,
            baseline_suppression: Toggle::Disabled,
            display_mode: DisplayMode::Electrometer,
            trigger: Trigger::Internal,
        }
    }
}

/// Round to the 50 mV resolution of the voltage source.
fn source_step(value: f64) -> f64 {
    let level = (value * 20.0).round() / 20.0;
    // No negative zero on the wire.
    if level == 0.0 {
        0.0
    } else {
        level
    }
}

fn check_range(range: &str) -> DeviceResult<()> {
    range
        .strip_prefix('R')
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| *n <= 14)
        .map(|_| ())
        .ok_or_else(|| DeviceError::InvalidInput(format!("range '{range}' is not one of R0..R14")))
}

/// Keithley 617 programmable electrometer.
pub struct Keithley617<P> {
    port: P,
    params: Keithley617Parameters,
}

impl<P: ScpiPort> Keithley617<P> {
    /// Electrometer on `port`; the range is checked in `configure`.
    pub fn new(port: P, params: Keithley617Parameters) -> Self {
        Self { port, params }
    }

    /// Run the zero check / zero correct sequence.
    pub async fn auto_zero(&mut self) -> DeviceResult<()> {
        self.port.write(AUTO_ZERO).await
    }

    /// Change the voltage source level during a run.
    pub async fn reconfigure_voltage_source(&mut self, value: f64) -> DeviceResult<()> {
        self.params.voltage_source = value;
        self.write_voltage_source().await
    }

    async fn write_voltage_source(&mut self) -> DeviceResult<()> {
        let level = source_step(self.params.voltage_source);
        debug!(requested = self.params.voltage_source, level, "voltage source");
        self.port.write(&format!("V{level:.4}X")).await
    }
}

#[async_trait]
impl<P: ScpiPort> DeviceClass for Keithley617<P> {
    fn name(&self) -> String {
        "Keithley617".to_string()
    }

    fn variables(&self) -> Vec<Variable> {
        vec![self.params.mode.variable()]
    }

    async fn configure(&mut self) -> DeviceResult<()> {
        check_range(&self.params.range)?;

        self.port.write(&format!("{}X", self.params.mode.command())).await?;
        let trigger = match self.params.trigger {
            Trigger::Internal => "T2X",
            Trigger::External => "T6X",
        };
        self.port.write(trigger).await?;
        self.port.write(&format!("{}X", self.params.range)).await?;

        if self.params.auto_zero {
            self.auto_zero().await?;
        }
        match self.params.zero_correct {
            Toggle::Disabled => self.port.write("Z0X").await?,
            Toggle::Enabled => self.port.write("Z1X").await?,
            Toggle::AsIs => {}
        }
        match self.params.baseline_suppression {
            Toggle::Disabled => self.port.write("N0X").await?,
            Toggle::Enabled => self.port.write("N1X").await?,
            Toggle::AsIs => {}
        }

        self.port.write("B0X").await?; // electrometer reading
        let display = match self.params.display_mode {
            DisplayMode::Electrometer => "D0X",
            DisplayMode::VoltageSource => "D1X",
        };
        self.port.write(display).await?;
        self.port.write("Q7X").await?; // data store off
        self.port.write("G0X").await?; // reading with prefix

        self.write_voltage_source().await?;
        let operate = if self.params.voltage_source == 0.0 {
            "O0X"
        } else {
            "O1X"
        };
        self.port.write(operate).await
    }

    async fn measure(&mut self) -> DeviceResult<()> {
        if self.params.trigger == Trigger::Internal {
            self.port.write("GET").await?;
        }
        Ok(())
    }

    async fn call(&mut self) -> DeviceResult<Vec<f64>> {
        let answer = self.port.read().await?;
        let value = answer
            .trim()
            .get(4..)
            .ok_or_else(|| DeviceError::malformed("Keithley 617 reading", answer.as_str()))?;
        Ok(vec![parse_reading("Keithley 617 reading", value)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;

    #[test]
    fn test_source_step_rounds_to_50_mv() {
        assert_eq!(source_step(1.234), 1.25);
        assert_eq!(source_step(-0.02), 0.0);
        assert!(source_step(-0.02).is_sign_positive());
        assert_eq!(source_step(10.0), 10.0);
    }

    #[tokio::test]
    async fn test_configure_sequence() {
        let mock = MockAdapter::new();
        let log = mock.log();
        let params = Keithley617Parameters {
            mode: Mode::Amps,
            range: "R3".into(),
            voltage_source: 1.234,
            auto_zero: true,
            zero_correct: Toggle::Enabled,
            baseline_suppression: Toggle::AsIs,
            display_mode: DisplayMode::VoltageSource,
            trigger: Trigger::External,
            ..Default::default()
        };
        let mut meter = Keithley617::new(mock, params);
        meter.configure().await.unwrap();
        assert_eq!(
            log.writes(),
            vec![
                "F1X", "T6X", "R3X", AUTO_ZERO, "Z1X", "B0X", "D1X", "Q7X", "G0X", "V1.2500X",
                "O1X"
            ]
        );
        assert_eq!(meter.variables(), vec![Variable::new("Current", "A")]);
    }

    #[tokio::test]
    async fn test_zero_source_stays_off() {
        let mock = MockAdapter::new();
        let log = mock.log();
        let mut meter = Keithley617::new(mock, Keithley617Parameters::default());
        meter.configure().await.unwrap();
        let writes = log.writes();
        assert_eq!(writes[..5], ["F0X", "T2X", "R0X", "Z0X", "N0X"]);
        assert_eq!(writes[writes.len() - 2..], ["V0.0000X", "O0X"]);
    }

    #[tokio::test]
    async fn test_rejects_unknown_range() {
        let params = Keithley617Parameters {
            range: "R15".into(),
            ..Default::default()
        };
        let mut meter = Keithley617::new(MockAdapter::new(), params);
        assert!(matches!(
            meter.configure().await,
            Err(DeviceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_measure_and_call() {
        let mut mock = MockAdapter::new();
        mock.push_response("NDCV-1.23456E+00");
        let log = mock.log();
        let mut meter = Keithley617::new(mock, Keithley617Parameters::default());
        meter.measure().await.unwrap();
        assert_eq!(meter.call().await.unwrap(), vec![-1.23456]);
        assert_eq!(log.writes(), vec!["GET"]);
    }

    #[tokio::test]
    async fn test_external_trigger_skips_get() {
        let params = Keithley617Parameters {
            trigger: Trigger::External,
            ..Default::default()
        };
        let mock = MockAdapter::new();
        let log = mock.log();
        let mut meter = Keithley617::new(mock, params);
        meter.measure().await.unwrap();
        meter.reconfigure_voltage_source(-2.52).await.unwrap();
        assert_eq!(log.writes(), vec!["V-2.5000X"]);
    }

    #[tokio::test]
    async fn test_small_negative_source_writes_zero() {
        let mock = MockAdapter::new();
        let log = mock.log();
        let mut meter = Keithley617::new(mock, Keithley617Parameters::default());
        meter.reconfigure_voltage_source(-0.02).await.unwrap();
        assert_eq!(log.writes(), vec!["V0.0000X"]);
    }
}
