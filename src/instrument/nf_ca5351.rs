//! NF Corporation CA5351 current amplifier
//!
//! A switch-type device: it has no sweep and only reports the settings the
//! amplifier chose by itself (auto current suppression range, auto filter rise
//! time).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{seconds, DeviceClass, Variable};
use crate::adapters::ScpiPort;
use crate::error::{parse_reading, DeviceError, DeviceResult};

/// Execution error bit of the standard event status register.
const ESR_EXECUTION_ERROR: u32 = 1 << 4;

/// Input connector in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminals {
    /// Front panel BNC.
    #[default]
    Front,
    /// Rear panel BNC.
    Rear,
}

impl Terminals {
    fn command(self) -> &'static str {
        match self {
            Terminals::Front => "FRONT",
            Terminals::Rear => "REAR",
        }
    }
}

/// Current suppression range. The instrument addresses ranges by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SuppressionRange {
    /// Chosen by the amplifier.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// 8 nA.
    #[serde(rename = "8 nA")]
    NA8,
    /// 80 nA.
    #[serde(rename = "80 nA")]
    NA80,
    /// 800 nA.
    #[serde(rename = "800 nA")]
    NA800,
    /// 8 µA.
    #[serde(rename = "8 μA", alias = "8 uA")]
    UA8,
    /// 80 µA.
    #[serde(rename = "80 μA", alias = "80 uA")]
    UA80,
    /// 800 µA.
    #[serde(rename = "800 μA", alias = "800 uA")]
    UA800,
    /// 8 mA.
    #[serde(rename = "8 mA")]
    MA8,
}

impl SuppressionRange {
    const ALL: [SuppressionRange; 8] = [
        SuppressionRange::Auto,
        SuppressionRange::NA8,
        SuppressionRange::NA80,
        SuppressionRange::NA800,
        SuppressionRange::UA8,
        SuppressionRange::UA80,
        SuppressionRange::UA800,
        SuppressionRange::MA8,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|r| *r == self).unwrap_or(0)
    }

    /// Full scale in ampere, 0 for auto.
    pub fn value(self) -> f64 {
        match self {
            SuppressionRange::Auto => 0.0,
            SuppressionRange::NA8 => 8e-9,
            SuppressionRange::NA80 => 80e-9,
            SuppressionRange::NA800 => 800e-9,
            SuppressionRange::UA8 => 8e-6,
            SuppressionRange::UA80 => 80e-6,
            SuppressionRange::UA800 => 800e-6,
            SuppressionRange::MA8 => 8e-3,
        }
    }
}

/// Filter rise time, addressed by position like the suppression range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiseTime {
    /// Chosen by the amplifier.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// 1 µs.
    #[serde(rename = "1 us", alias = "1 μs")]
    Us1,
    /// 3 µs.
    #[serde(rename = "3 μs", alias = "3 us")]
    Us3,
    /// 10 µs.
    #[serde(rename = "10 μs", alias = "10 us")]
    Us10,
    /// 30 µs.
    #[serde(rename = "30 μs", alias = "30 us")]
    Us30,
    /// 100 µs.
    #[serde(rename = "100 μs", alias = "100 us")]
    Us100,
    /// 300 µs.
    #[serde(rename = "300 μs", alias = "300 us")]
    Us300,
    /// 1 ms.
    #[serde(rename = "1 ms")]
    Ms1,
    /// 3 ms.
    #[serde(rename = "3 ms")]
    Ms3,
    /// 10 ms.
    #[serde(rename = "10 ms")]
    Ms10,
    /// 30 ms.
    #[serde(rename = "30 ms")]
    Ms30,
    /// 100 ms.
    #[serde(rename = "100 ms")]
    Ms100,
    /// 300 ms.
    #[serde(rename = "300 ms")]
    Ms300,
}

impl RiseTime {
    const ALL: [RiseTime; 13] = [
        RiseTime::Auto,
        RiseTime::Us1,
        RiseTime::Us3,
        RiseTime::Us10,
        RiseTime::Us30,
        RiseTime::Us100,
        RiseTime::Us300,
        RiseTime::Ms1,
        RiseTime::Ms3,
        RiseTime::Ms10,
        RiseTime::Ms30,
        RiseTime::Ms100,
        RiseTime::Ms300,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|r| *r == self).unwrap_or(0)
    }

    /// Rise time in seconds, 0 for auto.
    pub fn value(self) -> f64 {
        match self {
            RiseTime::Auto => 0.0,
            RiseTime::Us1 => 1e-6,
            RiseTime::Us3 => 3e-6,
            RiseTime::Us10 => 10e-6,
            RiseTime::Us30 => 30e-6,
            RiseTime::Us100 => 100e-6,
            RiseTime::Us300 => 300e-6,
            RiseTime::Ms1 => 1e-3,
            RiseTime::Ms3 => 3e-3,
            RiseTime::Ms10 => 10e-3,
            RiseTime::Ms30 => 30e-3,
            RiseTime::Ms100 => 100e-3,
            RiseTime::Ms300 => 300e-3,
        }
    }
}

/// I/V gain in V/A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gain {
    /// 10³ V/A.
    #[default]
    #[serde(rename = "1E03")]
    E3,
    /// 10⁴ V/A.
    #[serde(rename = "1E04")]
    E4,
    /// 10⁵ V/A.
    #[serde(rename = "1E05")]
    E5,
    /// 10⁶ V/A.
    #[serde(rename = "1E06")]
    E6,
    /// 10⁷ V/A.
    #[serde(rename = "1E07")]
    E7,
    /// 10⁸ V/A.
    #[serde(rename = "1E08")]
    E8,
    /// 10⁹ V/A.
    #[serde(rename = "1E09")]
    E9,
    /// 10¹⁰ V/A.
    #[serde(rename = "1E010")]
    E10,
}

impl Gain {
    fn setting(self) -> u8 {
        match self {
            Gain::E3 => 1,
            Gain::E4 => 2,
            Gain::E5 => 3,
            Gain::E6 => 4,
            Gain::E7 => 5,
            Gain::E8 => 6,
            Gain::E9 => 7,
            Gain::E10 => 8,
        }
    }
}

/// Host parameters of the NF CA5351 class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfCa5351Parameters {
    /// Display backlight.
    #[serde(rename = "Backlight")]
    pub backlight: bool,
    /// Input connector.
    #[serde(rename = "Terminals")]
    pub terminals: Terminals,
    /// Input state, sent as `:INPUT:STATE ON/OFF`.
    #[serde(rename = "Zero check")]
    pub zero_check: bool,
    /// Transimpedance gain.
    #[serde(rename = "I/V Gain")]
    pub gain: Gain,
    /// Subtract a bias current from the input.
    #[serde(rename = "Use current suppression")]
    pub suppression: bool,
    /// Let the amplifier pick suppression current and range.
    #[serde(rename = "Auto settings")]
    pub auto_settings: bool,
    /// Suppression current in A when not automatic.
    #[serde(rename = "Current in A")]
    pub suppression_current: f64,
    /// Suppression range when not automatic.
    #[serde(rename = "Range")]
    pub suppression_range: SuppressionRange,
    /// Enable the low-pass filter.
    #[serde(rename = "Use filter")]
    pub filter: bool,
    /// Filter rise time.
    #[serde(rename = "Rise time")]
    pub rise_time: RiseTime,
    /// How long to wait for the automatic suppression setup, in seconds.
    pub auto_settings_timeout_s: f64,
    /// `*OPC?` poll interval while waiting, in seconds.
    pub poll_interval_s: f64,
}

impl Default for NfCa5351Parameters {
    fn default() -> Self {
        Self {
            backlight: true,
            terminals: Terminals::Front,
            zero_check: false,
            gain: Gain::E3,
            suppression: false,
            auto_settings: false,
            suppression_current: 0.0,
            suppression_range: SuppressionRange::Auto,
            filter: false,
            rise_time: RiseTime::Auto,
            auto_settings_timeout_s: 20.0,
            poll_interval_s: 0.5,
        }
    }
}

impl NfCa5351Parameters {
    fn reports_suppression(&self) -> bool {
        self.suppression && self.suppression_range == SuppressionRange::Auto
    }

    fn reports_rise_time(&self) -> bool {
        self.filter && self.rise_time == RiseTime::Auto
    }
}

/// NF CA5351 current amplifier.
pub struct NfCa5351<P> {
    port: P,
    params: NfCa5351Parameters,
}

impl<P: ScpiPort> NfCa5351<P> {
    /// Amplifier on `port`; nothing is sent until `configure`.
    pub fn new(port: P, params: NfCa5351Parameters) -> Self {
        Self { port, params }
    }

    async fn read_esr(&mut self) -> DeviceResult<u32> {
        let answer = self.port.query("*ESR?").await?;
        parse_reading("*ESR?", &answer)
    }

    /// Start the automatic suppression setup and wait for `*OPC?` to report 1.
    async fn run_auto_settings(&mut self) -> DeviceResult<()> {
        self.port.write(":INPUT:BIAS:CURRENT:AUTO EXEC; *OPC").await?;
        let timeout = seconds(
            "auto_settings_timeout_s",
            self.params.auto_settings_timeout_s,
            0.0,
        )?;
        let interval = seconds("poll_interval_s", self.params.poll_interval_s, 0.001)?;
        let mut waited = Duration::ZERO;
        while waited < timeout {
            let done: u8 = parse_reading("*OPC?", &self.port.query("*OPC?").await?)?;
            if done == 1 {
                debug!(?waited, "current suppression auto settings complete");
                return Ok(());
            }
            tokio::time::sleep(interval).await;
            waited += interval;
        }
        warn!(?waited, "current suppression auto settings did not complete");
        Err(DeviceError::OperationTimeout {
            operation: "current suppression auto settings".into(),
            waited,
        })
    }

    async fn configure_suppression(&mut self) -> DeviceResult<()> {
        self.port.write("*CLS").await?;
        if self.params.auto_settings {
            self.run_auto_settings().await?;
        } else {
            match self.params.suppression_range {
                SuppressionRange::Auto => {
                    self.port.write(":INPUT:BIAS:CURRENT:RANGE:AUTO ON").await?
                }
                range => {
                    self.port
                        .write(&format!(":INPUT:BIAS:CURRENT:RANGE {}", range.index()))
                        .await?
                }
            }
            self.port
                .write(&format!(
                    ":INPUT:BIAS:CURRENT {}",
                    self.params.suppression_current
                ))
                .await?;
        }

        let esr = self.read_esr().await?;
        if esr & ESR_EXECUTION_ERROR != 0 {
            return Err(DeviceError::Execution(
                "current suppression setup failed, verify current and range".into(),
            ));
        }
        self.port.write(":INPUT:BIAS:CURRENT:STATE ON").await
    }
}

#[async_trait]
impl<P: ScpiPort> DeviceClass for NfCa5351<P> {
    fn name(&self) -> String {
        "NF-CA5351".to_string()
    }

    fn variables(&self) -> Vec<Variable> {
        let mut variables = Vec::new();
        if self.params.reports_suppression() {
            variables.push(Variable::new("Current suppression", "A"));
            variables.push(Variable::new("Range", "A"));
        }
        if self.params.reports_rise_time() {
            variables.push(Variable::new("Filter rise time", "s"));
        }
        variables
    }

    async fn initialize(&mut self) -> DeviceResult<()> {
        self.port.write("*RST").await
    }

    async fn configure(&mut self) -> DeviceResult<()> {
        let brightness = if self.params.backlight { 3 } else { 0 };
        self.port
            .write(&format!(":DISPLAY:BRIGHTNESS {brightness}"))
            .await?;
        self.port
            .write(&format!(
                ":ROUTE:TERMINALS {}",
                self.params.terminals.command()
            ))
            .await?;
        let state = if self.params.zero_check { "ON" } else { "OFF" };
        self.port.write(&format!(":INPUT:STATE {state}")).await?;

        if self.params.suppression {
            self.configure_suppression().await?;
        }

        self.port
            .write(&format!(":INPUT:GAIN {}", self.params.gain.setting()))
            .await?;

        if self.params.filter {
            match self.params.rise_time {
                RiseTime::Auto => self.port.write(":INPUT:FILTER:TIME:AUTO ON").await?,
                rise_time => {
                    self.port
                        .write(&format!(":INPUT:FILTER:TIME {}", rise_time.index()))
                        .await?
                }
            }
            self.port.write(":INPUT:FILTER:STATE ON").await?;
        }
        Ok(())
    }

    async fn call(&mut self) -> DeviceResult<Vec<f64>> {
        let mut values = Vec::new();
        if self.params.reports_suppression() {
            let current = self.port.query(":INPUT:BIAS:CURRENT?").await?;
            values.push(parse_reading(":INPUT:BIAS:CURRENT?", &current)?);
            let answer = self.port.query(":INPUT:BIAS:CURRENT:RANGE?").await?;
            let range = parse_reading::<usize>(":INPUT:BIAS:CURRENT:RANGE?", &answer)
                .ok()
                .and_then(|i| SuppressionRange::ALL.get(i).copied())
                .ok_or_else(|| DeviceError::malformed(":INPUT:BIAS:CURRENT:RANGE?", answer.as_str()))?;
            values.push(range.value());
        }
        if self.params.reports_rise_time() {
            let answer = self.port.query(":INPUT:FILTER:TIME?").await?;
            let rise_time = parse_reading::<usize>(":INPUT:FILTER:TIME?", &answer)
                .ok()
                .and_then(|i| RiseTime::ALL.get(i).copied())
                .ok_or_else(|| DeviceError::malformed(":INPUT:FILTER:TIME?", answer.as_str()))?;
            values.push(rise_time.value());
        }
        Ok(values)
    }
}
