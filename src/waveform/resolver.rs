//! Parameter Equivalence Resolver
//!
//! The host lets the user describe a waveform through redundant axes: period or
//! frequency, amplitude or high level, offset or low level, phase or delay, duty
//! cycle or pulse width. Exactly one side of each axis is supplied. [`resolve`]
//! derives the canonical set the instrument's command table expects, and
//! [`report`] turns a raw read-back into the quantity the user is sweeping.
//!
//! Everything here is pure arithmetic. Non-positive or non-finite periods and
//! frequencies are rejected with [`DeviceError::InvalidInput`] instead of
//! propagating `inf`/`NaN` to the instrument.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};
use crate::waveform::{CanonicalParameter, CommandEntry, CommandTable, WaveformKind};

/// Period/frequency axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodFrequency {
    /// Period given.
    #[serde(rename = "Period in s", alias = "Period")]
    Period,
    /// Frequency given.
    #[serde(rename = "Frequency in Hz", alias = "Frequency")]
    Frequency,
}

/// Amplitude/high-level axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmplitudeHiLevel {
    /// Amplitude given.
    #[serde(rename = "Amplitude in V", alias = "Amplitude")]
    Amplitude,
    /// High level given.
    #[serde(rename = "HiLevel in V", alias = "HiLevel")]
    HiLevel,
}

/// Offset/low-level axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetLoLevel {
    /// Offset given.
    #[serde(rename = "Offset in V", alias = "Offset")]
    Offset,
    /// Low level given.
    #[serde(rename = "LoLevel in V", alias = "LoLevel")]
    LoLevel,
}

/// Phase/delay axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayPhase {
    /// Phase given.
    #[serde(rename = "Phase in deg", alias = "Phase")]
    Phase,
    /// Delay given.
    #[serde(rename = "Delay in s", alias = "Delay")]
    Delay,
}

/// Duty-cycle/pulse-width axis. Staircase and exponential shapes reuse the
/// same slot for their step count and time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeAxis {
    /// Duty cycle given.
    #[serde(rename = "Duty cycle in %", alias = "DutyCycle")]
    DutyCycle,
    /// Pulse width given.
    #[serde(rename = "Pulse width in s", alias = "PulseWidth")]
    PulseWidth,
    /// Staircase step count given.
    #[serde(rename = "Number of steps", alias = "NumberSteps")]
    NumberOfSteps,
    /// Exponential time constant given.
    #[serde(rename = "Time constant", alias = "TimeConstant")]
    TimeConstant,
}

/// One side of a redundant axis together with its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisValue<C> {
    /// Which representative the user picked.
    pub choice: C,
    /// Its value.
    pub value: f64,
}

impl<C> AxisValue<C> {
    /// Pair `choice` with `value`.
    pub fn new(choice: C, value: f64) -> Self {
        Self { choice, value }
    }
}

/// The user's waveform description: one representative per redundant axis
/// plus the independent edge times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSelection {
    /// Period or frequency.
    pub period_frequency: AxisValue<PeriodFrequency>,
    /// Amplitude or high level.
    pub amplitude_hilevel: AxisValue<AmplitudeHiLevel>,
    /// Offset or low level.
    pub offset_lolevel: AxisValue<OffsetLoLevel>,
    /// Delay or phase.
    pub delay_phase: AxisValue<DelayPhase>,
    /// Duty cycle, pulse width, step count or time constant.
    pub shape: AxisValue<ShapeAxis>,
    /// Rising edge time in s.
    pub rise_time: f64,
    /// Falling edge time in s.
    pub fall_time: f64,
}

impl Default for SweepSelection {
    fn default() -> Self {
        Self {
            period_frequency: AxisValue::new(PeriodFrequency::Frequency, 1000.0),
            amplitude_hilevel: AxisValue::new(AmplitudeHiLevel::Amplitude, 1.0),
            offset_lolevel: AxisValue::new(OffsetLoLevel::Offset, 0.0),
            delay_phase: AxisValue::new(DelayPhase::Delay, 0.0),
            shape: AxisValue::new(ShapeAxis::DutyCycle, 50.0),
            rise_time: 0.0,
            fall_time: 0.0,
        }
    }
}

impl SweepSelection {
    /// Selection with `value` carried into the axis `parameter` belongs to.
    ///
    /// Only the value moves; the axis choice the user made is kept, so a sweep
    /// over `HiLevel` on an axis set to `Amplitude` drives the amplitude.
    /// Parameters that belong to no axis leave the selection unchanged.
    pub fn with_sweep_value(mut self, parameter: CanonicalParameter, value: f64) -> Self {
        use CanonicalParameter::*;
        match parameter {
            Period | Frequency => self.period_frequency.value = value,
            Amplitude | HiLevel => self.amplitude_hilevel.value = value,
            Offset | LoLevel => self.offset_lolevel.value = value,
            Phase | Delay => self.delay_phase.value = value,
            DutyCycle | PulseWidth | NumberOfSteps | TimeConstant => self.shape.value = value,
            RiseTime => self.rise_time = value,
            FallTime => self.fall_time = value,
            _ => {}
        }
        self
    }
}

/// How an instrument family interprets amplitude and levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalModel {
    /// Periodic function generator. Amplitude is peak-to-peak around the
    /// offset; ramps are described by symmetry.
    FunctionGenerator,
    /// Arbitrary transient sequencer. Amplitude is peak; non-sine shapes are
    /// described by absolute start/end levels and segment times.
    ArbitraryTransient,
}

/// Fully resolved, non-redundant waveform parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameters {
    kind: WaveformKind,
    values: BTreeMap<CanonicalParameter, f64>,
}

/// A resolved value paired with the command that transmits it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveParameter<'t> {
    /// Resolved quantity.
    pub parameter: CanonicalParameter,
    /// Table entry it is sent with.
    pub command: &'t CommandEntry,
    /// Value to send.
    pub value: f64,
}

impl ResolvedParameters {
    fn new(kind: WaveformKind) -> Self {
        Self {
            kind,
            values: BTreeMap::new(),
        }
    }

    fn set(&mut self, parameter: CanonicalParameter, value: f64) {
        self.values.insert(parameter, value);
    }

    /// Waveform these values were resolved for.
    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    /// Resolved value of `parameter`, if this kind has one.
    pub fn get(&self, parameter: CanonicalParameter) -> Option<f64> {
        self.values.get(&parameter).copied()
    }

    /// Frequency in Hz.
    pub fn frequency(&self) -> Option<f64> {
        self.get(CanonicalParameter::Frequency)
    }

    /// Period in s.
    pub fn period(&self) -> Option<f64> {
        self.get(CanonicalParameter::Period)
    }

    /// Amplitude in V.
    pub fn amplitude(&self) -> Option<f64> {
        self.get(CanonicalParameter::Amplitude)
    }

    /// Offset in V.
    pub fn offset(&self) -> Option<f64> {
        self.get(CanonicalParameter::Offset)
    }

    /// Duty cycle in percent.
    pub fn duty_cycle(&self) -> Option<f64> {
        self.get(CanonicalParameter::DutyCycle)
    }

    /// Pulse width in s.
    pub fn pulse_width(&self) -> Option<f64> {
        self.get(CanonicalParameter::PulseWidth)
    }

    /// Ramp symmetry in percent.
    pub fn symmetry(&self) -> Option<f64> {
        self.get(CanonicalParameter::Symmetry)
    }

    /// All resolved values, ordered by parameter.
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalParameter, f64)> + '_ {
        self.values.iter().map(|(p, v)| (*p, *v))
    }

    /// The values `table` declares for this kind, in declaration order.
    ///
    /// Resolved values the kind does not declare are left out rather than
    /// reported; declared parameters without a resolved value (such as
    /// arbitrary samples) are left to the caller.
    pub fn active<'t>(&self, table: &'t CommandTable) -> DeviceResult<Vec<ActiveParameter<'t>>> {
        Ok(table
            .parameters(self.kind)?
            .filter_map(|(parameter, command)| {
                self.get(parameter).map(|value| ActiveParameter {
                    parameter,
                    command,
                    value,
                })
            })
            .collect())
    }
}

fn require_positive(what: &str, value: f64) -> DeviceResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(DeviceError::InvalidInput(format!(
            "{what} must be a positive finite number, got {value}"
        )))
    }
}

fn require_finite(what: &str, value: f64) -> DeviceResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DeviceError::InvalidInput(format!(
            "{what} must be finite, got {value}"
        )))
    }
}

/// `(frequency, period)` from the period/frequency axis.
pub fn frequency_and_period(axis: AxisValue<PeriodFrequency>) -> DeviceResult<(f64, f64)> {
    match axis.choice {
        PeriodFrequency::Period => {
            let period = require_positive("period", axis.value)?;
            Ok((1.0 / period, period))
        }
        PeriodFrequency::Frequency => {
            let frequency = require_positive("frequency", axis.value)?;
            Ok((frequency, 1.0 / frequency))
        }
    }
}

/// Resolve `selection` into the canonical parameter set for `kind`.
pub fn resolve(
    model: SignalModel,
    kind: WaveformKind,
    selection: &SweepSelection,
) -> DeviceResult<ResolvedParameters> {
    match model {
        SignalModel::FunctionGenerator => resolve_function_generator(kind, selection),
        SignalModel::ArbitraryTransient => resolve_arbitrary_transient(kind, selection),
    }
}

/// Frequency, period, amplitude and offset shared by every periodic kind.
fn periodic_base(
    kind: WaveformKind,
    selection: &SweepSelection,
    peak_to_peak: bool,
) -> DeviceResult<ResolvedParameters> {
    let (frequency, period) = frequency_and_period(selection.period_frequency)?;
    let a = require_finite("amplitude/high level", selection.amplitude_hilevel.value)?;
    let o = require_finite("offset/low level", selection.offset_lolevel.value)?;

    // Distance from the offset to the high level.
    let half_span = if peak_to_peak { 2.0 } else { 1.0 };

    let (amplitude, offset) = match (selection.offset_lolevel.choice, selection.amplitude_hilevel.choice) {
        (OffsetLoLevel::Offset, AmplitudeHiLevel::Amplitude) => (a, o),
        (OffsetLoLevel::Offset, AmplitudeHiLevel::HiLevel) => ((a - o) * half_span, o),
        (OffsetLoLevel::LoLevel, AmplitudeHiLevel::Amplitude) => (a, o + a / half_span),
        (OffsetLoLevel::LoLevel, AmplitudeHiLevel::HiLevel) => {
            let amplitude = (a - o) * half_span / 2.0;
            (amplitude, o + amplitude / half_span)
        }
    };

    let mut resolved = ResolvedParameters::new(kind);
    resolved.set(CanonicalParameter::Frequency, frequency);
    resolved.set(CanonicalParameter::Period, period);
    resolved.set(CanonicalParameter::Amplitude, amplitude);
    resolved.set(CanonicalParameter::Offset, offset);
    Ok(resolved)
}

/// `(duty_cycle, pulse_width)` for the given period.
fn duty_cycle_and_pulse_width(
    kind: WaveformKind,
    shape: AxisValue<ShapeAxis>,
    period: f64,
) -> DeviceResult<(f64, f64)> {
    let value = require_finite("duty cycle/pulse width", shape.value)?;
    match shape.choice {
        ShapeAxis::PulseWidth => Ok((value * 100.0 / period, value)),
        ShapeAxis::DutyCycle => Ok((value, value / 100.0 * period)),
        other => Err(DeviceError::InvalidInput(format!(
            "{kind} needs a duty cycle or pulse width, got {other:?}"
        ))),
    }
}

fn resolve_function_generator(
    kind: WaveformKind,
    selection: &SweepSelection,
) -> DeviceResult<ResolvedParameters> {
    let mut resolved = match kind {
        WaveformKind::Sine
        | WaveformKind::Square
        | WaveformKind::Ramp
        | WaveformKind::Pulse
        | WaveformKind::Noise
        | WaveformKind::Dc
        | WaveformKind::Arbitrary => periodic_base(kind, selection, true)?,
        _ => return Err(DeviceError::UnsupportedWaveform(kind)),
    };
    let period = resolved.period().unwrap_or_default();

    match kind {
        WaveformKind::Square | WaveformKind::Pulse => {
            let (duty_cycle, pulse_width) = duty_cycle_and_pulse_width(kind, selection.shape, period)?;
            resolved.set(CanonicalParameter::DutyCycle, duty_cycle);
            resolved.set(CanonicalParameter::PulseWidth, pulse_width);
            if kind == WaveformKind::Pulse {
                // Edge time of both transitions.
                resolved.set(
                    CanonicalParameter::RiseTime,
                    require_finite("rise time", selection.rise_time)?,
                );
            }
        }
        WaveformKind::Ramp => {
            // Percentage of each cycle spent rising.
            let symmetry = selection.rise_time / period * 100.0;
            if !(0.0..=100.0).contains(&symmetry) {
                return Err(DeviceError::InvalidInput(format!(
                    "rise time {} s does not fit in a period of {} s",
                    selection.rise_time, period
                )));
            }
            resolved.set(CanonicalParameter::RiseTime, selection.rise_time);
            resolved.set(CanonicalParameter::Symmetry, symmetry);
        }
        _ => {}
    }

    Ok(resolved)
}

fn resolve_arbitrary_transient(
    kind: WaveformKind,
    selection: &SweepSelection,
) -> DeviceResult<ResolvedParameters> {
    use CanonicalParameter::*;

    if kind == WaveformKind::Sine {
        return periodic_base(kind, selection, false);
    }
    if !matches!(
        kind,
        WaveformKind::Step
            | WaveformKind::Ramp
            | WaveformKind::Staircase
            | WaveformKind::Pulse
            | WaveformKind::Trapezoid
            | WaveformKind::Exponential
    ) {
        return Err(DeviceError::UnsupportedWaveform(kind));
    }

    // Offset and low level mean the same thing here: the start level.
    let lo_level = require_finite("low level", selection.offset_lolevel.value)?;
    let hi_level = match selection.amplitude_hilevel.choice {
        AmplitudeHiLevel::Amplitude => selection.amplitude_hilevel.value + lo_level,
        AmplitudeHiLevel::HiLevel => selection.amplitude_hilevel.value,
    };
    let hi_level = require_finite("high level", hi_level)?;

    let mut resolved = ResolvedParameters::new(kind);
    if kind == WaveformKind::Step {
        // A step has no period; the delay/phase value is its start time.
        resolved.set(Delay, require_finite("delay", selection.delay_phase.value)?);
        resolved.set(LoLevel, lo_level);
        resolved.set(HiLevel, hi_level);
        return Ok(resolved);
    }

    let (_, period) = frequency_and_period(selection.period_frequency)?;
    let delay = match selection.delay_phase.choice {
        DelayPhase::Delay => require_finite("delay", selection.delay_phase.value)?,
        DelayPhase::Phase => period * require_finite("phase", selection.delay_phase.value)? / 360.0,
    };
    let rise_time = require_finite("rise time", selection.rise_time)?;
    let fall_time = require_finite("fall time", selection.fall_time)?;

    resolved.set(Delay, delay);
    resolved.set(LoLevel, lo_level);
    resolved.set(HiLevel, hi_level);
    resolved.set(Period, period);

    let end_time = match kind {
        WaveformKind::Ramp | WaveformKind::Staircase | WaveformKind::Exponential => {
            resolved.set(RiseTime, rise_time);
            match kind {
                WaveformKind::Staircase => resolved.set(NumberOfSteps, selection.shape.value),
                WaveformKind::Exponential => resolved.set(TimeConstant, selection.shape.value),
                _ => {}
            }
            period - rise_time - delay
        }
        _ => {
            let (_, pulse_width) = duty_cycle_and_pulse_width(kind, selection.shape, period)?;
            resolved.set(PulseWidth, pulse_width);
            if kind == WaveformKind::Trapezoid {
                resolved.set(RiseTime, rise_time);
                resolved.set(FallTime, fall_time);
                period - rise_time - pulse_width - fall_time
            } else {
                period - pulse_width - delay
            }
        }
    };

    if kind != WaveformKind::Exponential {
        if end_time < 0.0 {
            return Err(DeviceError::InvalidInput(format!(
                "{kind} segments exceed the period of {period} s"
            )));
        }
        resolved.set(EndTime, end_time);
    }

    Ok(resolved)
}

/// Canonical parameters whose resolved value can change when `sweep` moves.
pub fn affected_parameters(sweep: CanonicalParameter) -> &'static [CanonicalParameter] {
    use CanonicalParameter::*;
    match sweep {
        Period | Frequency => &[Frequency, Period, DutyCycle, PulseWidth, Symmetry, Delay, EndTime],
        Amplitude | HiLevel => &[Amplitude, HiLevel, Offset],
        Offset | LoLevel => &[Offset, LoLevel, Amplitude, HiLevel],
        Phase | Delay => &[Delay, EndTime],
        DutyCycle | PulseWidth => &[DutyCycle, PulseWidth, EndTime],
        RiseTime => &[RiseTime, Symmetry, EndTime],
        FallTime => &[FallTime, EndTime],
        NumberOfSteps => &[NumberOfSteps],
        TimeConstant => &[TimeConstant],
        _ => &[],
    }
}

/// Convert a raw read-back into the quantity the user is sweeping.
///
/// Period read-backs arrive as frequency and are inverted. High and low levels
/// are not reported by the instruments; the supplied axis value is returned
/// instead of a value derived from `raw`.
pub fn report(
    sweep: CanonicalParameter,
    raw: f64,
    selection: &SweepSelection,
) -> DeviceResult<f64> {
    match sweep {
        CanonicalParameter::Period => Ok(1.0 / require_positive("frequency read-back", raw)?),
        CanonicalParameter::HiLevel => Ok(selection.amplitude_hilevel.value),
        CanonicalParameter::LoLevel => Ok(selection.offset_lolevel.value),
        _ => Ok(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    fn selection(
        period_frequency: AxisValue<PeriodFrequency>,
        amplitude_hilevel: AxisValue<AmplitudeHiLevel>,
        offset_lolevel: AxisValue<OffsetLoLevel>,
    ) -> SweepSelection {
        SweepSelection {
            period_frequency,
            amplitude_hilevel,
            offset_lolevel,
            ..SweepSelection::default()
        }
    }

    fn fg(kind: WaveformKind, selection: &SweepSelection) -> DeviceResult<ResolvedParameters> {
        resolve(SignalModel::FunctionGenerator, kind, selection)
    }

    #[test]
    fn period_and_frequency_are_reciprocal() {
        for p in [1e-6, 0.001, 0.1, 1.0, 2.5, 1e3] {
            let mut sel = SweepSelection::default();
            sel.period_frequency = AxisValue::new(PeriodFrequency::Period, p);
            let resolved = fg(WaveformKind::Sine, &sel).unwrap();
            assert_close(resolved.frequency().unwrap(), 1.0 / p);

            sel.period_frequency = AxisValue::new(PeriodFrequency::Frequency, 1.0 / p);
            let resolved = fg(WaveformKind::Sine, &sel).unwrap();
            assert_close(resolved.period().unwrap(), p);
        }
    }

    #[test]
    fn non_positive_period_is_invalid_input() {
        for p in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut sel = SweepSelection::default();
            sel.period_frequency = AxisValue::new(PeriodFrequency::Period, p);
            for model in [SignalModel::FunctionGenerator, SignalModel::ArbitraryTransient] {
                let err = resolve(model, WaveformKind::Sine, &sel).unwrap_err();
                assert!(matches!(err, DeviceError::InvalidInput(_)), "{p}: {err}");
            }
        }
        let mut sel = SweepSelection::default();
        sel.period_frequency = AxisValue::new(PeriodFrequency::Frequency, 0.0);
        assert!(matches!(
            fg(WaveformKind::Square, &sel),
            Err(DeviceError::InvalidInput(_))
        ));
    }

    #[test]
    fn sine_from_period_offset_and_hilevel() {
        let sel = selection(
            AxisValue::new(PeriodFrequency::Period, 0.1),
            AxisValue::new(AmplitudeHiLevel::HiLevel, 0.5),
            AxisValue::new(OffsetLoLevel::Offset, 0.0),
        );
        let resolved = fg(WaveformKind::Sine, &sel).unwrap();
        assert_close(resolved.frequency().unwrap(), 10.0);
        assert_close(resolved.offset().unwrap(), 0.0);
        assert_close(resolved.amplitude().unwrap(), 1.0);
    }

    #[test]
    fn hilevel_is_recovered_from_offset_and_amplitude() {
        for (offset, hilevel) in [(0.0, 0.5), (-1.0, 2.0), (0.25, 0.3), (3.0, -1.0)] {
            let sel = selection(
                AxisValue::new(PeriodFrequency::Frequency, 1e3),
                AxisValue::new(AmplitudeHiLevel::HiLevel, hilevel),
                AxisValue::new(OffsetLoLevel::Offset, offset),
            );
            let resolved = fg(WaveformKind::Sine, &sel).unwrap();
            assert_close(
                resolved.offset().unwrap() + resolved.amplitude().unwrap() / 2.0,
                hilevel,
            );
        }
    }

    #[test]
    fn lolevel_combinations_peak_to_peak() {
        let sel = selection(
            AxisValue::new(PeriodFrequency::Frequency, 1e3),
            AxisValue::new(AmplitudeHiLevel::Amplitude, 2.0),
            AxisValue::new(OffsetLoLevel::LoLevel, -0.5),
        );
        let resolved = fg(WaveformKind::Sine, &sel).unwrap();
        assert_close(resolved.amplitude().unwrap(), 2.0);
        assert_close(resolved.offset().unwrap(), 0.5);

        let sel = selection(
            AxisValue::new(PeriodFrequency::Frequency, 1e3),
            AxisValue::new(AmplitudeHiLevel::HiLevel, 3.0),
            AxisValue::new(OffsetLoLevel::LoLevel, 1.0),
        );
        let resolved = fg(WaveformKind::Sine, &sel).unwrap();
        assert_close(resolved.amplitude().unwrap(), 2.0);
        assert_close(resolved.offset().unwrap(), 2.0);
    }

    #[test]
    fn lolevel_combinations_peak() {
        let model = SignalModel::ArbitraryTransient;
        let sel = selection(
            AxisValue::new(PeriodFrequency::Frequency, 10.0),
            AxisValue::new(AmplitudeHiLevel::HiLevel, 3.0),
            AxisValue::new(OffsetLoLevel::Offset, 1.0),
        );
        let resolved = resolve(model, WaveformKind::Sine, &sel).unwrap();
        assert_close(resolved.amplitude().unwrap(), 2.0);
        assert_close(resolved.offset().unwrap(), 1.0);

        let sel = selection(
            AxisValue::new(PeriodFrequency::Frequency, 10.0),
            AxisValue::new(AmplitudeHiLevel::Amplitude, 2.0),
            AxisValue::new(OffsetLoLevel::LoLevel, -1.0),
        );
        let resolved = resolve(model, WaveformKind::Sine, &sel).unwrap();
        assert_close(resolved.offset().unwrap(), 1.0);

        let sel = selection(
            AxisValue::new(PeriodFrequency::Frequency, 10.0),
            AxisValue::new(AmplitudeHiLevel::HiLevel, 3.0),
            AxisValue::new(OffsetLoLevel::LoLevel, 1.0),
        );
        let resolved = resolve(model, WaveformKind::Sine, &sel).unwrap();
        assert_close(resolved.amplitude().unwrap(), 1.0);
        assert_close(resolved.offset().unwrap(), 2.0);
    }

    #[test]
    fn square_duty_cycle_from_pulse_width() {
        let mut sel = SweepSelection::default();
        sel.period_frequency = AxisValue::new(PeriodFrequency::Period, 0.1);
        sel.shape = AxisValue::new(ShapeAxis::PulseWidth, 0.02);
        let resolved = fg(WaveformKind::Square, &sel).unwrap();
        assert_close(resolved.duty_cycle().unwrap(), 20.0);
    }

    #[test]
    fn pulse_width_from_duty_cycle_round_trips() {
        for (d, p) in [(20.0, 0.1), (50.0, 1.0), (1.0, 2e-3)] {
            let mut sel = SweepSelection::default();
            sel.period_frequency = AxisValue::new(PeriodFrequency::Period, p);
            sel.shape = AxisValue::new(ShapeAxis::DutyCycle, d);
            let resolved = fg(WaveformKind::Pulse, &sel).unwrap();
            let pw = resolved.pulse_width().unwrap();
            assert_close(pw, d / 100.0 * p);

            sel.shape = AxisValue::new(ShapeAxis::PulseWidth, pw);
            let inverse = fg(WaveformKind::Pulse, &sel).unwrap();
            assert_close(inverse.duty_cycle().unwrap(), d);
        }
    }

    #[test]
    fn square_rejects_step_count_on_shape_axis() {
        let mut sel = SweepSelection::default();
        sel.shape = AxisValue::new(ShapeAxis::NumberOfSteps, 4.0);
        assert!(matches!(
            fg(WaveformKind::Square, &sel),
            Err(DeviceError::InvalidInput(_))
        ));
    }

    #[test]
    fn ramp_symmetry_is_rise_fraction() {
        for (r, p) in [(0.0, 1.0), (0.25, 1.0), (0.05, 0.1), (1.0, 1.0)] {
            let mut sel = SweepSelection::default();
            sel.period_frequency = AxisValue::new(PeriodFrequency::Period, p);
            sel.rise_time = r;
            let resolved = fg(WaveformKind::Ramp, &sel).unwrap();
            let symmetry = resolved.symmetry().unwrap();
            assert_close(symmetry, r / p * 100.0);
            assert!((0.0..=100.0).contains(&symmetry));
        }

        let mut sel = SweepSelection::default();
        sel.period_frequency = AxisValue::new(PeriodFrequency::Period, 0.1);
        sel.rise_time = 0.2;
        assert!(matches!(
            fg(WaveformKind::Ramp, &sel),
            Err(DeviceError::InvalidInput(_))
        ));
    }

    #[test]
    fn function_generator_rejects_transient_shapes() {
        let sel = SweepSelection::default();
        assert!(matches!(
            fg(WaveformKind::Staircase, &sel),
            Err(DeviceError::UnsupportedWaveform(WaveformKind::Staircase))
        ));
        assert!(matches!(
            resolve(SignalModel::ArbitraryTransient, WaveformKind::Noise, &sel),
            Err(DeviceError::UnsupportedWaveform(WaveformKind::Noise))
        ));
    }

    #[test]
    fn transient_step_ignores_period() {
        let mut sel = SweepSelection::default();
        sel.delay_phase = AxisValue::new(DelayPhase::Phase, 0.25);
        sel.amplitude_hilevel = AxisValue::new(AmplitudeHiLevel::Amplitude, 2.0);
        sel.offset_lolevel = AxisValue::new(OffsetLoLevel::Offset, 0.5);
        for p in [0.0, -1.0, f64::NAN] {
            sel.period_frequency = AxisValue::new(PeriodFrequency::Period, p);
            let resolved =
                resolve(SignalModel::ArbitraryTransient, WaveformKind::Step, &sel).unwrap();
            assert_close(resolved.get(CanonicalParameter::Delay).unwrap(), 0.25);
            assert_close(resolved.get(CanonicalParameter::LoLevel).unwrap(), 0.5);
            assert_close(resolved.get(CanonicalParameter::HiLevel).unwrap(), 2.5);
            assert_eq!(resolved.get(CanonicalParameter::Period), None);
        }
    }

    #[test]
    fn transient_ramp_segments() {
        let mut sel = SweepSelection::default();
        sel.period_frequency = AxisValue::new(PeriodFrequency::Period, 2.0);
        sel.delay_phase = AxisValue::new(DelayPhase::Phase, 90.0);
        sel.amplitude_hilevel = AxisValue::new(AmplitudeHiLevel::Amplitude, 1.0);
        sel.offset_lolevel = AxisValue::new(OffsetLoLevel::LoLevel, 0.5);
        sel.rise_time = 1.0;
        let resolved = resolve(SignalModel::ArbitraryTransient, WaveformKind::Ramp, &sel).unwrap();
        assert_close(resolved.get(CanonicalParameter::Delay).unwrap(), 0.5);
        assert_close(resolved.get(CanonicalParameter::LoLevel).unwrap(), 0.5);
        assert_close(resolved.get(CanonicalParameter::HiLevel).unwrap(), 1.5);
        assert_close(resolved.get(CanonicalParameter::EndTime).unwrap(), 0.5);
    }

    #[test]
    fn transient_trapezoid_and_exponential() {
        let mut sel = SweepSelection::default();
        sel.period_frequency = AxisValue::new(PeriodFrequency::Period, 10.0);
        sel.shape = AxisValue::new(ShapeAxis::DutyCycle, 40.0);
        sel.rise_time = 1.0;
        sel.fall_time = 2.0;
        let resolved =
            resolve(SignalModel::ArbitraryTransient, WaveformKind::Trapezoid, &sel).unwrap();
        assert_close(resolved.pulse_width().unwrap(), 4.0);
        assert_close(resolved.get(CanonicalParameter::EndTime).unwrap(), 3.0);

        sel.shape = AxisValue::new(ShapeAxis::TimeConstant, 0.3);
        let resolved =
            resolve(SignalModel::ArbitraryTransient, WaveformKind::Exponential, &sel).unwrap();
        assert_close(resolved.get(CanonicalParameter::TimeConstant).unwrap(), 0.3);
        assert_eq!(resolved.get(CanonicalParameter::EndTime), None);
    }

    #[test]
    fn transient_segments_longer_than_period_are_rejected() {
        let mut sel = SweepSelection::default();
        sel.period_frequency = AxisValue::new(PeriodFrequency::Period, 1.0);
        sel.shape = AxisValue::new(ShapeAxis::PulseWidth, 0.8);
        sel.delay_phase = AxisValue::new(DelayPhase::Delay, 0.5);
        assert!(matches!(
            resolve(SignalModel::ArbitraryTransient, WaveformKind::Pulse, &sel),
            Err(DeviceError::InvalidInput(_))
        ));
    }

    #[test]
    fn active_skips_undeclared_parameters() {
        let table = CommandTable::agilent_33220a();
        let mut sel = SweepSelection::default();
        sel.shape = AxisValue::new(ShapeAxis::DutyCycle, 25.0);
        let resolved = fg(WaveformKind::Square, &sel).unwrap();
        // Pulse width and period are resolved but not declared for Square.
        assert!(resolved.pulse_width().is_some());
        let active: Vec<_> = resolved
            .active(&table)
            .unwrap()
            .into_iter()
            .map(|a| a.command.mnemonic)
            .collect();
        assert_eq!(active, vec!["FREQ", "VOLT", "VOLT:OFFS", "FUNC:SQUARE:DCYCLE"]);
    }

    #[test]
    fn report_inverts_period_and_echoes_levels() {
        let sel = selection(
            AxisValue::new(PeriodFrequency::Frequency, 1e3),
            AxisValue::new(AmplitudeHiLevel::Amplitude, 1.5),
            AxisValue::new(OffsetLoLevel::Offset, -0.2),
        );
        assert_close(report(CanonicalParameter::Period, 4.0, &sel).unwrap(), 0.25);
        assert_close(report(CanonicalParameter::HiLevel, 99.0, &sel).unwrap(), 1.5);
        assert_close(report(CanonicalParameter::LoLevel, 99.0, &sel).unwrap(), -0.2);
        assert_close(report(CanonicalParameter::Offset, 0.7, &sel).unwrap(), 0.7);
        assert!(matches!(
            report(CanonicalParameter::Period, 0.0, &sel),
            Err(DeviceError::InvalidInput(_))
        ));
    }

    #[test]
    fn rise_time_sweep_reaches_ramp_symmetry_only() {
        let table = CommandTable::agilent_33220a();
        let reaches = |kind| {
            affected_parameters(CanonicalParameter::RiseTime)
                .iter()
                .any(|p| table.supports(kind, *p))
        };
        assert!(reaches(WaveformKind::Ramp));
        assert!(reaches(WaveformKind::Pulse));
        assert!(!reaches(WaveformKind::Sine));
        assert!(affected_parameters(CanonicalParameter::Samples).is_empty());
    }

    #[test]
    fn sweep_value_replaces_axis_value_only() {
        let sel = selection(
            AxisValue::new(PeriodFrequency::Frequency, 1e3),
            AxisValue::new(AmplitudeHiLevel::Amplitude, 1.0),
            AxisValue::new(OffsetLoLevel::Offset, 0.0),
        );
        let swept = sel.with_sweep_value(CanonicalParameter::HiLevel, 2.0);
        assert_eq!(swept.amplitude_hilevel.choice, AmplitudeHiLevel::Amplitude);
        assert_eq!(swept.amplitude_hilevel.value, 2.0);

        let swept = sel.with_sweep_value(CanonicalParameter::Period, 0.5);
        assert_eq!(swept.period_frequency.choice, PeriodFrequency::Frequency);
        assert_eq!(swept.period_frequency.value, 0.5);

        let swept = sel.with_sweep_value(CanonicalParameter::RiseTime, 0.01);
        assert_eq!(swept.rise_time, 0.01);

        assert_eq!(sel.with_sweep_value(CanonicalParameter::Samples, 3.0), sel);
    }
}
