//! Keysight N6705 DC power analyzer channel used as an arbitrary waveform source
//!
//! The channel's ARB sequencer is programmed with absolute levels and segment
//! times derived from the user's period/amplitude/delay selection. Amplitude is
//! peak. Every sweep point aborts the running transient, rewrites the shape and
//! restarts it; the reported values are the measured channel voltage and
//! current.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{channel_from_device, check_sweep_mode, DeviceClass, SweepMode, Variable};
use crate::adapters::ScpiPort;
use crate::error::{parse_reading, DeviceError, DeviceResult};
use crate::waveform::{
    affected_parameters, resolve, AmplitudeHiLevel, AxisValue, CanonicalParameter, CommandTable,
    DelayPhase, OffsetLoLevel, PeriodFrequency, ShapeAxis, SignalModel, SweepSelection,
    WaveformKind,
};

const SWEEPABLE: [CanonicalParameter; 14] = [
    CanonicalParameter::Period,
    CanonicalParameter::Frequency,
    CanonicalParameter::Amplitude,
    CanonicalParameter::HiLevel,
    CanonicalParameter::Offset,
    CanonicalParameter::LoLevel,
    CanonicalParameter::Phase,
    CanonicalParameter::Delay,
    CanonicalParameter::DutyCycle,
    CanonicalParameter::PulseWidth,
    CanonicalParameter::RiseTime,
    CanonicalParameter::FallTime,
    CanonicalParameter::NumberOfSteps,
    CanonicalParameter::TimeConstant,
];

/// Host parameters of the N6705 signal class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysightN6705SignalParameters {
    /// Host channel name, `CH1` to `CH4`.
    #[serde(rename = "Device")]
    pub device: String,
    /// Quantity swept by `apply`.
    #[serde(rename = "SweepMode")]
    pub sweep_mode: SweepMode,
    /// Signal shape.
    #[serde(rename = "Waveform")]
    pub waveform: WaveformKind,
    /// Period or frequency axis choice.
    #[serde(rename = "PeriodFrequency")]
    pub period_frequency: PeriodFrequency,
    /// Value for `period_frequency`.
    #[serde(rename = "PeriodFrequencyValue")]
    pub period_frequency_value: f64,
    /// Amplitude or high-level axis choice.
    #[serde(rename = "AmplitudeHiLevel")]
    pub amplitude_hilevel: AmplitudeHiLevel,
    /// Value for `amplitude_hilevel`.
    #[serde(rename = "AmplitudeHiLevelValue")]
    pub amplitude_hilevel_value: f64,
    /// Offset or low-level axis choice.
    #[serde(rename = "OffsetLoLevel")]
    pub offset_lolevel: OffsetLoLevel,
    /// Value for `offset_lolevel`.
    #[serde(rename = "OffsetLoLevelValue")]
    pub offset_lolevel_value: f64,
    /// Delay or phase axis choice.
    #[serde(rename = "DelayPhase")]
    pub delay_phase: DelayPhase,
    /// Value for `delay_phase`.
    #[serde(rename = "DelayPhaseValue")]
    pub delay_phase_value: f64,
    /// Shape axis choice.
    #[serde(rename = "DutyCyclePulseWidth")]
    pub duty_cycle_pulse_width: ShapeAxis,
    /// Value for `duty_cycle_pulse_width`.
    #[serde(rename = "DutyCyclePulseWidthValue")]
    pub duty_cycle_pulse_width_value: f64,
    /// Rising edge time in s.
    #[serde(rename = "RiseTime")]
    pub rise_time: f64,
    /// Falling edge time in s.
    #[serde(rename = "FallTime")]
    pub fall_time: f64,
}

impl Default for KeysightN6705SignalParameters {
    fn default() -> Self {
        Self {
            device: "CH1".to_string(),
            sweep_mode: SweepMode::Parameter(CanonicalParameter::Period),
            waveform: WaveformKind::Sine,
            period_frequency: PeriodFrequency::Period,
            period_frequency_value: 2.0,
            amplitude_hilevel: AmplitudeHiLevel::Amplitude,
            amplitude_hilevel_value: 1.0,
            offset_lolevel: OffsetLoLevel::Offset,
            offset_lolevel_value: 0.0,
            delay_phase: DelayPhase::Phase,
            delay_phase_value: 10.0,
            duty_cycle_pulse_width: ShapeAxis::DutyCycle,
            duty_cycle_pulse_width_value: 5.0,
            rise_time: 1.0,
            fall_time: 1.0,
        }
    }
}

impl KeysightN6705SignalParameters {
    /// Axis choices and values as a resolver selection.
    pub fn selection(&self) -> SweepSelection {
        SweepSelection {
            period_frequency: AxisValue::new(self.period_frequency, self.period_frequency_value),
            amplitude_hilevel: AxisValue::new(self.amplitude_hilevel, self.amplitude_hilevel_value),
            offset_lolevel: AxisValue::new(self.offset_lolevel, self.offset_lolevel_value),
            delay_phase: AxisValue::new(self.delay_phase, self.delay_phase_value),
            shape: AxisValue::new(self.duty_cycle_pulse_width, self.duty_cycle_pulse_width_value),
            rise_time: self.rise_time,
            fall_time: self.fall_time,
        }
    }
}

/// Keysight N6705 channel as an arbitrary transient source.
pub struct KeysightN6705Signal<P> {
    port: P,
    params: KeysightN6705SignalParameters,
    channel: u8,
    table: CommandTable,
    selection: SweepSelection,
}

impl<P: ScpiPort> KeysightN6705Signal<P> {
    /// Check the waveform, sweep mode and channel.
    pub fn new(port: P, params: KeysightN6705SignalParameters) -> DeviceResult<Self> {
        check_sweep_mode("Keysight N6705", params.sweep_mode, &SWEEPABLE)?;
        let channel = channel_from_device(&params.device)?;
        let table = CommandTable::keysight_n6705();
        if !table.contains(params.waveform) {
            return Err(DeviceError::UnsupportedWaveform(params.waveform));
        }
        if let Some(p) = params.sweep_mode.parameter() {
            if !affected_parameters(p)
                .iter()
                .any(|a| table.supports(params.waveform, *a))
            {
                warn!(channel, waveform = %params.waveform, "sweeping {p} has no effect on this waveform");
            }
        }
        let selection = params.selection();
        Ok(Self {
            port,
            params,
            channel,
            table,
            selection,
        })
    }

    /// Channel number, 1 to 4.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn label(&self) -> DeviceResult<&'static str> {
        self.table.label(self.params.waveform)
    }
}

#[async_trait]
impl<P: ScpiPort> DeviceClass for KeysightN6705Signal<P> {
    fn name(&self) -> String {
        format!("KeysightN6705 CH{}", self.channel)
    }

    fn variables(&self) -> Vec<Variable> {
        vec![
            Variable::new("Voltage in V", "V"),
            Variable::new("Current in A", "A"),
        ]
    }

    async fn initialize(&mut self) -> DeviceResult<()> {
        self.port.write("*RST").await
    }

    async fn configure(&mut self) -> DeviceResult<()> {
        let label = self.label()?;
        let resolved = resolve(
            SignalModel::ArbitraryTransient,
            self.params.waveform,
            &self.selection,
        )?;
        for active in resolved.active(&self.table)? {
            self.port
                .write(&format!(
                    "ARB:VOLTAGE:{label}:{} {}, (@{}); *WAI",
                    active.command.mnemonic, active.value, self.channel
                ))
                .await?;
        }
        Ok(())
    }

    async fn poweron(&mut self) -> DeviceResult<()> {
        let ch = self.channel;
        let label = self.label()?;
        self.port.write(&format!("VOLT:MODE ARB, (@{ch})")).await?;
        self.port.write(&format!("ARB:FUNC:TYPE VOLT, (@{ch})")).await?;
        self.port
            .write(&format!("ARB:FUNC:SHAPE {label}, (@{ch})"))
            .await?;
        self.port.write(&format!("ARB:COUNT INF, (@{ch})")).await?;
        self.port.write("TRIG:ARB:SOURCE IMM").await?;
        self.port.write(&format!("OUTP ON, (@{ch})")).await?;
        info!(channel = ch, waveform = %self.params.waveform, "arbitrary transient started");
        self.port.write(&format!("INIT:TRAN (@{ch})")).await
    }

    async fn poweroff(&mut self) -> DeviceResult<()> {
        let ch = self.channel;
        self.port.write(&format!("OUTP OFF, (@{ch})")).await?;
        self.port.write(&format!("ABORT:TRAN (@{ch})")).await
    }

    async fn apply(&mut self, value: f64) -> DeviceResult<()> {
        let Some(parameter) = self.params.sweep_mode.parameter() else {
            return Ok(());
        };
        self.selection = self.selection.with_sweep_value(parameter, value);
        let ch = self.channel;
        self.port.write(&format!("ABORT:TRAN (@{ch}); *WAI")).await?;
        self.configure().await?;
        self.port.write(&format!("INIT:TRAN (@{ch})")).await
    }

    async fn measure(&mut self) -> DeviceResult<()> {
        let ch = self.channel;
        self.port.write(&format!("MEAS:VOLT? (@{ch})")).await?;
        self.port.write(&format!("MEAS:CURR? (@{ch})")).await
    }

    async fn call(&mut self) -> DeviceResult<Vec<f64>> {
        let voltage = parse_reading("MEAS:VOLT?", &self.port.read().await?)?;
        let current = parse_reading("MEAS:CURR?", &self.port.read().await?)?;
        Ok(vec![voltage, current])
    }
}
