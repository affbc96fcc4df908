//! Keysight N6705 DC power analyzer channel as a source-measure unit
//!
//! Behaviour depends on the installed module, read with `SYST:CHAN:MODEL?`
//! during `configure`:
//! - N678x: compliance through `CURR:LIMIT` / `VOLT:PROT:REMOTE`
//! - N676x: simultaneous V/I digitizing, so current is fetched, not re-measured
//!
//! With `CheckPulse` the output runs the ARB PULSE shape and each sweep value
//! becomes the pulse top level.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{channel_from_device, DeviceClass, Variable};
use crate::adapters::ScpiPort;
use crate::error::{parse_reading, DeviceResult};

/// Integration points per reading at medium speed (one 50 Hz power-line cycle).
const MEDIUM_SWEEP_POINTS: u32 = 3906;

/// Quantity the channel sources; the other one is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SourceMode {
    /// Source voltage, measure current.
    #[default]
    #[serde(rename = "Voltage [V]")]
    Voltage,
    /// Source current, measure voltage.
    #[serde(rename = "Current [A]")]
    Current,
}

impl SourceMode {
    fn command(self) -> &'static str {
        match self {
            SourceMode::Voltage => "VOLT",
            SourceMode::Current => "CURR",
        }
    }

    fn pulse_function(self) -> &'static str {
        match self {
            SourceMode::Voltage => "VOLTAGE",
            SourceMode::Current => "CURRENT",
        }
    }
}

/// Current measurement range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurrentRange {
    /// 3.06 A.
    #[default]
    #[serde(rename = "3.06A")]
    A3_06,
    /// 100 mA.
    #[serde(rename = "100 mA")]
    MA100,
    /// Option 2UA.
    #[serde(rename = "200 uA")]
    UA200,
    /// Option 1UA.
    #[serde(rename = "100 uA")]
    UA100,
}

impl CurrentRange {
    fn value(self) -> &'static str {
        match self {
            CurrentRange::A3_06 => "3.06",
            CurrentRange::MA100 => "0.1",
            CurrentRange::UA200 => "0.0002",
            CurrentRange::UA100 => "0.0001",
        }
    }
}

/// Voltage measurement range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoltageRange {
    /// 51 V.
    #[default]
    #[serde(rename = "51V")]
    V51,
    /// 5.5 V.
    #[serde(rename = "5.5V")]
    V5_5,
}

impl VoltageRange {
    fn value(self) -> &'static str {
        match self {
            VoltageRange::V51 => "51",
            VoltageRange::V5_5 => "5.5",
        }
    }
}

/// Integration time, as a number of sweep points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Speed {
    /// Default aperture.
    #[default]
    Medium,
    /// A tenth of the medium aperture.
    Fast,
    /// Ten times the medium aperture.
    Slow,
}

impl Speed {
    /// `SENS:SWE:POIN` for this speed.
    pub fn sweep_points(self) -> u32 {
        match self {
            Speed::Medium => MEDIUM_SWEEP_POINTS,
            Speed::Fast => MEDIUM_SWEEP_POINTS / 10,
            Speed::Slow => MEDIUM_SWEEP_POINTS * 10,
        }
    }
}

/// Host parameters of the N6705 SMU class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysightN6705SmuParameters {
    /// Output channel, `CH1` to `CH4`.
    #[serde(rename = "Device")]
    pub device: String,
    /// Sourced quantity.
    #[serde(rename = "SweepMode")]
    pub source: SourceMode,
    /// Current range.
    #[serde(rename = "Range")]
    pub current_range: CurrentRange,
    /// Voltage range.
    #[serde(rename = "RangeVoltage")]
    pub voltage_range: VoltageRange,
    /// Limit on the measured quantity.
    #[serde(rename = "Compliance")]
    pub compliance: f64,
    /// Remote sense.
    #[serde(rename = "4wire")]
    pub four_wire: bool,
    /// Measurement speed.
    #[serde(rename = "Speed")]
    pub speed: Speed,
    /// Source a pulse train instead of a constant level.
    #[serde(rename = "CheckPulse")]
    pub pulse: bool,
    /// Pulse on time in s.
    #[serde(rename = "PulseOnTime")]
    pub pulse_on_time: f64,
    /// Pulse off time in s.
    #[serde(rename = "PulseOffTime")]
    pub pulse_off_time: f64,
    /// Level between pulses.
    #[serde(rename = "PulseOffLevel")]
    pub pulse_off_level: f64,
}

impl Default for KeysightN6705SmuParameters {
    fn default() -> Self {
        Self {
            device: "CH1".to_string(),
            source: SourceMode::Voltage,
            current_range: CurrentRange::A3_06,
            voltage_range: VoltageRange::V51,
            compliance: 100e-6,
            four_wire: false,
            speed: Speed::Medium,
            pulse: false,
            pulse_on_time: 0.5,
            pulse_off_time: 0.5,
            pulse_off_level: 0.0,
        }
    }
}

/// Keysight N6705 channel as a source/measure unit.
pub struct KeysightN6705Smu<P> {
    port: P,
    params: KeysightN6705SmuParameters,
    channel: u8,
    channel_model: String,
}

impl<P: ScpiPort> KeysightN6705Smu<P> {
    /// Parse the channel from `params.device`.
    pub fn new(port: P, params: KeysightN6705SmuParameters) -> DeviceResult<Self> {
        let channel = channel_from_device(&params.device)?;
        Ok(Self {
            port,
            params,
            channel,
            channel_model: String::new(),
        })
    }

    /// Module model read during `configure`, e.g. `N6781A`.
    pub fn channel_model(&self) -> &str {
        &self.channel_model
    }

    fn is_n678x(&self) -> bool {
        self.channel_model.starts_with("N678")
    }

    async fn send(&mut self, command: String) -> DeviceResult<()> {
        self.port.write(&command).await
    }
}

#[async_trait]
impl<P: ScpiPort> DeviceClass for KeysightN6705Smu<P> {
    fn name(&self) -> String {
        format!("Keysight N6705 CH{}", self.channel)
    }

    fn variables(&self) -> Vec<Variable> {
        vec![
            Variable::new("Voltage", "V"),
            Variable::new("Current", "A"),
            Variable::new("OVP", ""),
            Variable::new("OCP", ""),
        ]
    }

    async fn initialize(&mut self) -> DeviceResult<()> {
        self.port.write("*RST").await
    }

    async fn configure(&mut self) -> DeviceResult<()> {
        let ch = self.channel;
        let compliance = self.params.compliance;
        self.channel_model = self
            .port
            .query(&format!("SYST:CHAN:MODEL? (@{ch})"))
            .await?
            .trim()
            .to_string();
        info!(channel = ch, model = %self.channel_model, "channel module identified");

        match self.params.source {
            SourceMode::Voltage => {
                let sense = if self.params.four_wire { "EXT" } else { "INT" };
                self.send(format!("VOLT:SENSE:SOURCE {sense}, (@{ch})")).await?;
                self.send(format!("VOLT:MODE FIX, (@{ch})")).await?;
                if self.is_n678x() {
                    self.send(format!("CURR:LIMIT {compliance}, (@{ch})")).await?;
                } else {
                    self.send(format!("CURR {compliance}, (@{ch})")).await?;
                    self.send(format!("CURR:PROT:STAT ON, (@{ch})")).await?;
                }
            }
            SourceMode::Current => {
                self.send(format!("CURR:MODE FIX, (@{ch})")).await?;
                if self.is_n678x() {
                    self.send(format!("VOLT:PROT:REMOTE {compliance}, (@{ch})"))
                        .await?;
                } else {
                    self.send(format!("VOLT:PROT {compliance}, (@{ch})")).await?;
                }
            }
        }

        if self.params.pulse {
            let function = self.params.source.pulse_function();
            self.send(format!("{function}:MODE ARB, (@{ch})")).await?;
            self.send(format!("ARB:FUNC:SHAPE PULSE, (@{ch})")).await?;
            self.send(format!("ARB:FUNC:TYPE {function}, (@{ch})")).await?;
            self.send(format!("ARB:COUNT INF, (@{ch})")).await?;
        }

        let vrange = self.params.voltage_range.value();
        let irange = self.params.current_range.value();
        self.send(format!("SENSE:VOLT:RANGE {vrange}, (@{ch})")).await?;
        self.send(format!("SENSE:CURR:RANGE {irange}, (@{ch})")).await?;
        let points = self.params.speed.sweep_points();
        self.send(format!("SENSE:SWEEP:POINTS {points}, (@{ch})")).await
    }

    async fn poweron(&mut self) -> DeviceResult<()> {
        let ch = self.channel;
        if self.params.pulse {
            self.send(format!("ARB:COUNT INF, (@{ch})")).await?;
            self.port.write("TRIG:ARB:SOURCE IMM").await?;
            self.send(format!("OUTP ON, (@{ch})")).await?;
            self.send(format!("INIT:TRAN (@{ch})")).await
        } else {
            self.send(format!("OUTP ON, (@{ch})")).await
        }
    }

    async fn poweroff(&mut self) -> DeviceResult<()> {
        let ch = self.channel;
        self.send(format!("OUTP OFF, (@{ch})")).await?;
        if self.params.pulse {
            self.send(format!("ABORT:TRAN (@{ch})")).await?;
        }
        Ok(())
    }

    async fn apply(&mut self, value: f64) -> DeviceResult<()> {
        let ch = self.channel;
        if !self.params.pulse {
            let command = self.params.source.command();
            return self.send(format!("{command} {value}, (@{ch})")).await;
        }

        let arb = format!("ARB:{}:PULSE", self.params.source.pulse_function());
        let half_off = self.params.pulse_off_time / 2.0;
        let off_level = self.params.pulse_off_level;
        let on_time = self.params.pulse_on_time;
        self.send(format!("ABORT:TRAN (@{ch}); *WAI")).await?;
        self.send(format!("{arb}:START:TIME {half_off}, (@{ch})")).await?;
        self.send(format!("{arb}:START:LEVEL {off_level}, (@{ch})")).await?;
        self.send(format!("{arb}:TOP:TIME {on_time}, (@{ch})")).await?;
        self.send(format!("{arb}:TOP:LEVEL {value}, (@{ch})")).await?;
        self.send(format!("{arb}:END:TIME {half_off}, (@{ch})")).await?;
        self.send(format!("INIT:TRAN (@{ch})")).await
    }

    async fn call(&mut self) -> DeviceResult<Vec<f64>> {
        let ch = self.channel;
        let voltage: f64 =
            parse_reading("MEAS:VOLT?", &self.port.query(&format!("MEAS:VOLT? (@{ch})")).await?)?;

        let current_query = if self.channel_model.starts_with("N676") {
            format!("FETCH:CURR? (@{ch})")
        } else {
            format!("MEAS:CURR? (@{ch})")
        };
        let current: f64 = parse_reading(&current_query, &self.port.query(&current_query).await?)?;

        let questionable: u32 = parse_reading(
            "STAT:QUES:COND?",
            &self.port.query(&format!("STAT:QUES:COND? (@{ch})")).await?,
        )?;
        let ovp = f64::from(questionable & 1);
        let ocp = f64::from((questionable >> 1) & 1);

        Ok(vec![voltage, current, ovp, ocp])
    }
}
