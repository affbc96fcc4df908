//! Agilent 33220A function/arbitrary waveform generator
//!
//! Amplitude is peak-to-peak around the offset. Parameters the selected
//! waveform does not declare are not transmitted.
//!
//! ## Trigger and burst
//!
//! With burst enabled, `BurstSignalRepetitions` periods are emitted per trigger
//! and `BurstDelay` is the internal burst period:
//! - `Internal`: the burst repeats every `BurstDelay` seconds.
//! - `External`: one burst per external trigger edge.
//! - `Bus`: one burst per `apply`, which sends `TRIG`.
//!
//! ```toml
//! [[devices]]
//! id = "generator"
//! type = "agilent_33220a"
//! port = { resource = "GPIB0::10::INSTR" }
//!
//! [devices.parameters]
//! SweepMode = "Frequency in Hz"
//! Waveform = "Square"
//! PeriodFrequency = "Frequency in Hz"
//! PeriodFrequencyValue = 1000.0
//! DutyCyclePulseWidth = "Duty cycle in %"
//! DutyCyclePulseWidthValue = 25.0
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{check_sweep_mode, DeviceClass, SweepMode, Variable};
use crate::adapters::ScpiPort;
use crate::error::{parse_reading, DeviceError, DeviceResult};
use crate::waveform::{
    affected_parameters, report, resolve, AmplitudeHiLevel, AxisValue, CanonicalParameter,
    CommandTable, DelayPhase, OffsetLoLevel, PeriodFrequency, ShapeAxis, SignalModel,
    SweepSelection, WaveformKind,
};

const SWEEPABLE: [CanonicalParameter; 9] = [
    CanonicalParameter::Frequency,
    CanonicalParameter::Period,
    CanonicalParameter::Amplitude,
    CanonicalParameter::Offset,
    CanonicalParameter::HiLevel,
    CanonicalParameter::LoLevel,
    CanonicalParameter::DutyCycle,
    CanonicalParameter::PulseWidth,
    CanonicalParameter::RiseTime,
];

/// Output load the amplitude is calibrated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Impedance {
    /// Open-circuit load.
    #[default]
    #[serde(rename = "High-Z")]
    HighZ,
    /// 50 Ω load.
    #[serde(rename = "50 Ohm")]
    FiftyOhm,
}

/// Trigger source for burst mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerSource {
    /// Immediate, free running.
    #[default]
    Internal,
    /// Rear-panel trigger input.
    External,
    /// Software `TRIG` sent on every `apply`.
    Bus,
}

impl TriggerSource {
    fn command(self) -> &'static str {
        match self {
            TriggerSource::Internal => "TRIG:SOURCE IMM",
            TriggerSource::External => "TRIG:SOURCE EXT",
            TriggerSource::Bus => "TRIG:SOURCE BUS",
        }
    }
}

/// Host parameters of the 33220A device class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Agilent33220AParameters {
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
    /// Shape axis choice.
    #[serde(rename = "DutyCyclePulseWidth")]
    pub duty_cycle_pulse_width: ShapeAxis,
    /// Value for `duty_cycle_pulse_width`.
    #[serde(rename = "DutyCyclePulseWidthValue")]
    pub duty_cycle_pulse_width_value: f64,
    /// Rising edge time in s.
    #[serde(rename = "RiseTime")]
    pub rise_time: f64,
    /// Output load.
    #[serde(rename = "Impedance")]
    pub impedance: Impedance,
    /// Burst trigger source.
    #[serde(rename = "Trigger")]
    pub trigger: TriggerSource,
    /// Comma-separated samples in -1..1, uploaded for the `Arb` waveform.
    #[serde(rename = "ArbitraryWaveformFile")]
    pub arbitrary_waveform_file: Option<PathBuf>,
    /// Enable burst mode.
    #[serde(rename = "BurstShowHide")]
    pub burst_enabled: bool,
    /// Cycles per burst.
    #[serde(rename = "BurstSignalRepetitions")]
    pub burst_signal_repetitions: u32,
    /// Delay from trigger to burst in s.
    #[serde(rename = "BurstDelay")]
    pub burst_delay: f64,
}

impl Default for Agilent33220AParameters {
    fn default() -> Self {
        Self {
            sweep_mode: SweepMode::Parameter(CanonicalParameter::Frequency),
            waveform: WaveformKind::Sine,
            period_frequency: PeriodFrequency::Period,
            period_frequency_value: 10.0,
            amplitude_hilevel: AmplitudeHiLevel::Amplitude,
            amplitude_hilevel_value: 1.0,
            offset_lolevel: OffsetLoLevel::Offset,
            offset_lolevel_value: 0.0,
            duty_cycle_pulse_width: ShapeAxis::PulseWidth,
            duty_cycle_pulse_width_value: 1.0,
            rise_time: 1.0,
            impedance: Impedance::HighZ,
            trigger: TriggerSource::Internal,
            arbitrary_waveform_file: None,
            burst_enabled: false,
            burst_signal_repetitions: 1,
            burst_delay: 60.0,
        }
    }
}

impl Agilent33220AParameters {
    /// Axis choices and values as a resolver selection.
    pub fn selection(&self) -> SweepSelection {
        SweepSelection {
            period_frequency: AxisValue::new(self.period_frequency, self.period_frequency_value),
            amplitude_hilevel: AxisValue::new(self.amplitude_hilevel, self.amplitude_hilevel_value),
            offset_lolevel: AxisValue::new(self.offset_lolevel, self.offset_lolevel_value),
            // No phase option without the external timebase.
            delay_phase: AxisValue::new(DelayPhase::Delay, 0.0),
            shape: AxisValue::new(self.duty_cycle_pulse_width, self.duty_cycle_pulse_width_value),
            rise_time: self.rise_time,
            fall_time: 0.0,
        }
    }
}

/// Query mnemonic and unit used to read back a swept quantity.
fn readback(parameter: CanonicalParameter) -> Option<(&'static str, &'static str)> {
    use CanonicalParameter::*;
    match parameter {
        Frequency => Some(("FREQ", "Hz")),
        Period => Some(("FREQ", "s")),
        Amplitude | HiLevel => Some(("VOLT", "V")),
        Offset | LoLevel => Some(("VOLT:OFFS", "V")),
        DutyCycle => Some(("FUNC:SQUARE:DCYCLE", "%")),
        PulseWidth => Some(("PULSE:WIDTH", "s")),
        RiseTime => Some(("FUNC:RAMP:SYMMETRY", "%")),
        _ => None,
    }
}

/// Agilent 33220A function generator.
pub struct Agilent33220A<P> {
    port: P,
    params: Agilent33220AParameters,
    table: CommandTable,
    selection: SweepSelection,
}

impl<P: ScpiPort> Agilent33220A<P> {
    /// Validate `params` against the instrument's command table.
    pub fn new(port: P, params: Agilent33220AParameters) -> DeviceResult<Self> {
        check_sweep_mode("Agilent 33220A", params.sweep_mode, &SWEEPABLE)?;
        let table = CommandTable::agilent_33220a();
        if !table.contains(params.waveform) {
            return Err(DeviceError::UnsupportedWaveform(params.waveform));
        }
        if let Some(p) = params.sweep_mode.parameter() {
            if !affected_parameters(p)
                .iter()
                .any(|a| table.supports(params.waveform, *a))
            {
                warn!(waveform = %params.waveform, "sweeping {p} has no effect on this waveform");
            }
        }
        let selection = params.selection();
        Ok(Self {
            port,
            params,
            table,
            selection,
        })
    }

    /// Parameters as configured.
    pub fn parameters(&self) -> &Agilent33220AParameters {
        &self.params
    }

    /// Underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    async fn upload_arbitrary(&mut self) -> DeviceResult<()> {
        let path = self.params.arbitrary_waveform_file.as_ref().ok_or_else(|| {
            DeviceError::InvalidInput("Arb waveform needs an ArbitraryWaveformFile".into())
        })?;
        let samples = tokio::fs::read_to_string(path).await?;
        let entry = self
            .table
            .lookup(WaveformKind::Arbitrary, CanonicalParameter::Samples)?;
        self.port
            .write(&format!("{} {}; *WAI", entry.mnemonic, samples.trim()))
            .await?;
        self.port.write("FUNC:USER VOLATILE").await?;
        let label = self.table.label(WaveformKind::Arbitrary)?;
        self.port.write(&format!("FUNC {label}")).await
    }
}

#[async_trait]
impl<P: ScpiPort> DeviceClass for Agilent33220A<P> {
    fn name(&self) -> String {
        "Agilent-33220A".to_string()
    }

    fn variables(&self) -> Vec<Variable> {
        self.params
            .sweep_mode
            .parameter()
            .and_then(|p| readback(p).map(|(_, unit)| Variable::new(p.name(), unit)))
            .into_iter()
            .collect()
    }

    async fn initialize(&mut self) -> DeviceResult<()> {
        self.port.write("*RST").await?;
        self.port.write("VOLT:RANG:AUTO ON").await
    }

    async fn configure(&mut self) -> DeviceResult<()> {
        self.port
            .write(match self.params.impedance {
                Impedance::HighZ => "OUTP:LOAD INF",
                Impedance::FiftyOhm => "OUTP:LOAD 50",
            })
            .await?;

        if self.params.burst_enabled {
            self.port.write("BURST:STATE ON").await?;
            self.port
                .write(&format!("BURST:NCYCLES {}", self.params.burst_signal_repetitions))
                .await?;
            self.port
                .write(&format!("BURST:INTERNAL:PERIOD {}", self.params.burst_delay))
                .await?;
        }

        self.port.write(self.params.trigger.command()).await?;

        let waveform = self.params.waveform;
        let resolved = resolve(SignalModel::FunctionGenerator, waveform, &self.selection)?;
        for active in resolved.active(&self.table)? {
            self.port
                .write(&format!("{} {}; *WAI", active.command.mnemonic, active.value))
                .await?;
        }
        for (parameter, value) in resolved.iter() {
            if !self.table.supports(waveform, parameter) {
                debug!(%waveform, %parameter, value, "not transmitted");
            }
        }

        if waveform == WaveformKind::Arbitrary {
            self.upload_arbitrary().await?;
        }
        Ok(())
    }

    async fn deinitialize(&mut self) -> DeviceResult<()> {
        self.port.write("*RST").await?;
        self.port.write("SYST:LOC").await
    }

    async fn poweron(&mut self) -> DeviceResult<()> {
        // The arbitrary function is selected by the upload.
        if self.params.waveform != WaveformKind::Arbitrary {
            let label = self.table.label(self.params.waveform)?;
            self.port.write(&format!("FUNC {label}")).await?;
        }
        info!(waveform = %self.params.waveform, "output on");
        self.port.write("OUTP ON").await
    }

    async fn poweroff(&mut self) -> DeviceResult<()> {
        self.port.write("OUTP OFF").await
    }

    async fn apply(&mut self, value: f64) -> DeviceResult<()> {
        let Some(parameter) = self.params.sweep_mode.parameter() else {
            return Ok(());
        };
        self.selection = self.selection.with_sweep_value(parameter, value);
        self.configure().await?;
        if self.params.trigger == TriggerSource::Bus {
            self.port.write("TRIG").await?;
        }
        Ok(())
    }

    async fn measure(&mut self) -> DeviceResult<()> {
        if let Some((mnemonic, _)) = self.params.sweep_mode.parameter().and_then(readback) {
            self.port.write(&format!("{mnemonic}?")).await?;
        }
        Ok(())
    }

    async fn call(&mut self) -> DeviceResult<Vec<f64>> {
        let Some(parameter) = self.params.sweep_mode.parameter() else {
            return Ok(Vec::new());
        };
        let reply = self.port.read().await?;
        let raw: f64 = parse_reading(parameter.label(), &reply)?;
        Ok(vec![report(parameter, raw, &self.selection)?])
    }
}
