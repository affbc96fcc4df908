//! Agilent N6705A DC power analyzer channel as a direct-parameter ARB source
//!
//! Unlike [`super::KeysightN6705Signal`], nothing is derived here: each axis
//! choice names an ARB parameter directly (`Start time in s`, `End level in V`,
//! ...) and its value is written as is. The only conversion is `Period in s`,
//! which shares the `FREQ` mnemonic and is sent as a frequency.
//!
//! `configure` skips parameters the waveform does not declare. `apply` does
//! not: sweeping a parameter the waveform lacks is an `Unsupported` error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{channel_from_device, check_sweep_mode, DeviceClass, SweepMode, Variable};
use crate::adapters::ScpiPort;
use crate::error::{parse_reading, DeviceError, DeviceResult};
use crate::waveform::resolver::frequency_and_period;
use crate::waveform::{AxisValue, CanonicalParameter, CommandTable, PeriodFrequency, WaveformKind};

use CanonicalParameter as P;

const SWEEPABLE: [CanonicalParameter; 13] = [
    P::Frequency,
    P::Period,
    P::Offset,
    P::Amplitude,
    P::StartTime,
    P::StartLevel,
    P::EndTime,
    P::EndLevel,
    P::RiseTime,
    P::FallTime,
    P::NumberOfSteps,
    P::PulseWidth,
    P::TimeConstant,
];

const PERIOD_FREQUENCY: [CanonicalParameter; 3] = [P::StartTime, P::Frequency, P::Period];
const AMPLITUDE_HILEVEL: [CanonicalParameter; 2] = [P::EndLevel, P::Amplitude];
const OFFSET_LOLEVEL: [CanonicalParameter; 2] = [P::StartLevel, P::Offset];
const DELAY_PHASE: [CanonicalParameter; 2] = [P::NumberOfSteps, P::TimeConstant];
const DUTY_CYCLE_PULSE_WIDTH: [CanonicalParameter; 2] = [P::EndTime, P::PulseWidth];

/// Host parameters of the N6705A signal class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgilentN6705ASignalParameters {
    /// Output channel, `CH1` to `CH4`.
    #[serde(rename = "Device")]
    pub device: String,
    /// Quantity swept by `apply`.
    #[serde(rename = "SweepMode")]
    pub sweep_mode: SweepMode,
    /// Signal shape.
    #[serde(rename = "Waveform")]
    pub waveform: WaveformKind,
    /// ARB parameter in the period/frequency slot.
    #[serde(rename = "PeriodFrequency")]
    pub period_frequency: CanonicalParameter,
    /// Value for `period_frequency`.
    #[serde(rename = "PeriodFrequencyValue")]
    pub period_frequency_value: f64,
    /// ARB parameter in the amplitude/high-level slot.
    #[serde(rename = "AmplitudeHiLevel")]
    pub amplitude_hilevel: CanonicalParameter,
    /// Value for `amplitude_hilevel`.
    #[serde(rename = "AmplitudeHiLevelValue")]
    pub amplitude_hilevel_value: f64,
    /// ARB parameter in the offset/low-level slot.
    #[serde(rename = "OffsetLoLevel")]
    pub offset_lolevel: CanonicalParameter,
    /// Value for `offset_lolevel`.
    #[serde(rename = "OffsetLoLevelValue")]
    pub offset_lolevel_value: f64,
    /// ARB parameter in the delay/phase slot.
    #[serde(rename = "DelayPhase")]
    pub delay_phase: CanonicalParameter,
    /// Value for `delay_phase`.
    #[serde(rename = "DelayPhaseValue")]
    pub delay_phase_value: f64,
    /// ARB parameter in the shape slot.
    #[serde(rename = "DutyCyclePulseWidth")]
    pub duty_cycle_pulse_width: CanonicalParameter,
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

impl Default for AgilentN6705ASignalParameters {
    fn default() -> Self {
        Self {
            device: "CH1".to_string(),
            sweep_mode: SweepMode::Parameter(P::Frequency),
            waveform: WaveformKind::Sine,
            period_frequency: P::StartTime,
            period_frequency_value: 2.0,
            amplitude_hilevel: P::EndLevel,
            amplitude_hilevel_value: 1.0,
            offset_lolevel: P::StartLevel,
            offset_lolevel_value: 0.0,
            delay_phase: P::NumberOfSteps,
            delay_phase_value: 10.0,
            duty_cycle_pulse_width: P::EndTime,
            duty_cycle_pulse_width_value: 5.0,
            rise_time: 1.0,
            fall_time: 1.0,
        }
    }
}

impl AgilentN6705ASignalParameters {
    /// Parameter/value pairs in transmission order.
    fn assignments(&self) -> [(CanonicalParameter, f64); 7] {
        [
            (self.period_frequency, self.period_frequency_value),
            (self.amplitude_hilevel, self.amplitude_hilevel_value),
            (self.offset_lolevel, self.offset_lolevel_value),
            (self.duty_cycle_pulse_width, self.duty_cycle_pulse_width_value),
            (self.delay_phase, self.delay_phase_value),
            (P::RiseTime, self.rise_time),
            (P::FallTime, self.fall_time),
        ]
    }

    fn validate(&self) -> DeviceResult<()> {
        let axes: [(&str, CanonicalParameter, &[CanonicalParameter]); 5] = [
            ("PeriodFrequency", self.period_frequency, &PERIOD_FREQUENCY),
            ("AmplitudeHiLevel", self.amplitude_hilevel, &AMPLITUDE_HILEVEL),
            ("OffsetLoLevel", self.offset_lolevel, &OFFSET_LOLEVEL),
            ("DelayPhase", self.delay_phase, &DELAY_PHASE),
            ("DutyCyclePulseWidth", self.duty_cycle_pulse_width, &DUTY_CYCLE_PULSE_WIDTH),
        ];
        for (key, choice, options) in axes {
            if !options.contains(&choice) {
                return Err(DeviceError::InvalidInput(format!(
                    "{key} cannot be '{choice}'"
                )));
            }
        }
        Ok(())
    }
}

/// Agilent N6705A channel as an ARB source.
pub struct AgilentN6705ASignal<Port> {
    port: Port,
    params: AgilentN6705ASignalParameters,
    channel: u8,
    table: CommandTable,
}

impl<Port: ScpiPort> AgilentN6705ASignal<Port> {
    /// Check axis choices, sweep mode and channel.
    pub fn new(port: Port, params: AgilentN6705ASignalParameters) -> DeviceResult<Self> {
        check_sweep_mode("Agilent N6705A", params.sweep_mode, &SWEEPABLE)?;
        params.validate()?;
        let channel = channel_from_device(&params.device)?;
        let table = CommandTable::agilent_n6705a();
        if !table.contains(params.waveform) {
            return Err(DeviceError::UnsupportedWaveform(params.waveform));
        }
        Ok(Self {
            port,
            params,
            channel,
            table,
        })
    }

    fn prefix(&self) -> DeviceResult<String> {
        Ok(format!("ARB:VOLTAGE:{}", self.table.label(self.params.waveform)?))
    }

    /// Write one parameter; `Unsupported` if the waveform does not declare it.
    async fn set_parameter(&mut self, parameter: CanonicalParameter, value: f64) -> DeviceResult<()> {
        let entry = *self.table.lookup(self.params.waveform, parameter)?;
        let value = if parameter == P::Period {
            frequency_and_period(AxisValue::new(PeriodFrequency::Period, value))?.0
        } else {
            value
        };
        let prefix = self.prefix()?;
        self.port
            .write(&format!(
                "{prefix}:{} {value}, (@{}); *WAI",
                entry.mnemonic, self.channel
            ))
            .await
    }
}

#[async_trait]
impl<Port: ScpiPort> DeviceClass for AgilentN6705ASignal<Port> {
    fn name(&self) -> String {
        format!("AgilentN6705A CH{}", self.channel)
    }

    fn variables(&self) -> Vec<Variable> {
        self.params
            .sweep_mode
            .parameter()
            .map(|p| {
                let unit = self
                    .table
                    .lookup(self.params.waveform, p)
                    .map(|e| e.unit)
                    .unwrap_or_default();
                Variable::new(p.name(), unit)
            })
            .into_iter()
            .collect()
    }

    async fn initialize(&mut self) -> DeviceResult<()> {
        self.port.write("*RST").await
    }

    async fn configure(&mut self) -> DeviceResult<()> {
        for (parameter, value) in self.params.assignments() {
            match self.set_parameter(parameter, value).await {
                Err(DeviceError::Unsupported { .. }) => {
                    debug!(waveform = %self.params.waveform, %parameter, "not transmitted");
                }
                other => other?,
            }
        }
        Ok(())
    }

    async fn poweron(&mut self) -> DeviceResult<()> {
        let ch = self.channel;
        let label = self.table.label(self.params.waveform)?;
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
        let ch = self.channel;
        self.port.write(&format!("ABORT:TRAN (@{ch}); *WAI")).await?;
        self.set_parameter(parameter, value).await?;
        self.port.write(&format!("INIT:TRAN (@{ch})")).await
    }

    async fn measure(&mut self) -> DeviceResult<()> {
        let Some(parameter) = self.params.sweep_mode.parameter() else {
            return Ok(());
        };
        let entry = self.table.lookup(self.params.waveform, parameter)?;
        let query = format!("{}:{}? (@{})", self.prefix()?, entry.mnemonic, self.channel);
        self.port.write(&query).await
    }

    async fn call(&mut self) -> DeviceResult<Vec<f64>> {
        let Some(parameter) = self.params.sweep_mode.parameter() else {
            return Ok(Vec::new());
        };
        let raw: f64 = parse_reading(parameter.label(), &self.port.read().await?)?;
        let value = if parameter == P::Period {
            frequency_and_period(AxisValue::new(PeriodFrequency::Frequency, raw))?.1
        } else {
            raw
        };
        Ok(vec![value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;

    #[tokio::test]
    async fn test_configure_sine_skips_undeclared() {
        let params = AgilentN6705ASignalParameters {
            device: "CH3".into(),
            period_frequency: P::Period,
            period_frequency_value: 0.5,
            amplitude_hilevel: P::Amplitude,
            amplitude_hilevel_value: 2.0,
            offset_lolevel: P::Offset,
            offset_lolevel_value: 1.0,
            ..Default::default()
        };
        let mock = MockAdapter::new();
        let log = mock.log();
        let mut source = AgilentN6705ASignal::new(mock, params).unwrap();
        source.configure().await.unwrap();
        assert_eq!(
            log.writes(),
            vec![
                "ARB:VOLTAGE:SIN:FREQ 2, (@3); *WAI",
                "ARB:VOLTAGE:SIN:AMPL 2, (@3); *WAI",
                "ARB:VOLTAGE:SIN:OFFSET 1, (@3); *WAI",
            ]
        );
    }

    #[tokio::test]
    async fn test_configure_staircase() {
        let params = AgilentN6705ASignalParameters {
            waveform: WaveformKind::Staircase,
            ..Default::default()
        };
        let mock = MockAdapter::new();
        let log = mock.log();
        let mut source = AgilentN6705ASignal::new(mock, params).unwrap();
        source.configure().await.unwrap();
        assert_eq!(
            log.writes(),
            vec![
                "ARB:VOLTAGE:STAIRCASE:START:TIME 2, (@1); *WAI",
                "ARB:VOLTAGE:STAIRCASE:END:LEVEL 1, (@1); *WAI",
                "ARB:VOLTAGE:STAIRCASE:START:LEVEL 0, (@1); *WAI",
                "ARB:VOLTAGE:STAIRCASE:END:TIME 5, (@1); *WAI",
                "ARB:VOLTAGE:STAIRCASE:NSTEPS 10, (@1); *WAI",
                "ARB:VOLTAGE:STAIRCASE:TIME 1, (@1); *WAI",
            ]
        );
    }

    #[tokio::test]
    async fn test_apply_unsupported_sweep_is_an_error() {
        let params = AgilentN6705ASignalParameters {
            sweep_mode: SweepMode::Parameter(P::TimeConstant),
            waveform: WaveformKind::Ramp,
            ..Default::default()
        };
        let mut source = AgilentN6705ASignal::new(MockAdapter::new(), params).unwrap();
        let err = source.apply(0.3).await.unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Unsupported {
                waveform: WaveformKind::Ramp,
                parameter: P::TimeConstant
            }
        ));
    }

    #[tokio::test]
    async fn test_period_sweep_round_trip() {
        let params = AgilentN6705ASignalParameters {
            sweep_mode: SweepMode::Parameter(P::Period),
            ..Default::default()
        };
        let mut mock = MockAdapter::new();
        mock.push_response("+4.000000E+00");
        let log = mock.log();
        let mut source = AgilentN6705ASignal::new(mock, params).unwrap();
        source.apply(0.25).await.unwrap();
        source.measure().await.unwrap();
        assert_eq!(
            log.writes(),
            vec![
                "ABORT:TRAN (@1); *WAI",
                "ARB:VOLTAGE:SIN:FREQ 4, (@1); *WAI",
                "INIT:TRAN (@1)",
                "ARB:VOLTAGE:SIN:FREQ? (@1)",
            ]
        );
        assert_eq!(source.call().await.unwrap(), vec![0.25]);
        assert_eq!(source.variables(), vec![Variable::new("Period", "s")]);

        assert!(matches!(
            source.apply(0.0).await,
            Err(DeviceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_axis_option_from_other_axis() {
        let params = AgilentN6705ASignalParameters {
            amplitude_hilevel: P::StartLevel,
            ..Default::default()
        };
        assert!(matches!(
            AgilentN6705ASignal::new(MockAdapter::new(), params),
            Err(DeviceError::InvalidInput(_))
        ));
    }
}
