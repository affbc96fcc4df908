//! Waveform kinds and canonical waveform parameters.
//!
//! Host labels (`"Period in s"`, `"HiLevel in V"`, ...) are the strings the
//! host's parameter editor offers; they are what serde accepts when a parameter
//! dictionary is deserialized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// Shape of the generated signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WaveformKind {
    /// Sine wave.
    Sine,
    /// Square wave with adjustable duty cycle.
    Square,
    /// Triangle or sawtooth, shaped by symmetry or rise time.
    Ramp,
    /// Pulse train.
    Pulse,
    /// Gaussian noise.
    Noise,
    /// Constant level.
    #[serde(rename = "DC")]
    Dc,
    /// User-defined waveform in volatile memory.
    #[serde(rename = "Arb", alias = "Arbitrary")]
    Arbitrary,
    /// Single step from a start to an end level.
    Step,
    /// Stepped ramp.
    Staircase,
    /// Pulse with rise and fall edges.
    Trapezoid,
    /// Exponential rise towards an end level.
    Exponential,
}

impl WaveformKind {
    /// Every kind, in declaration order.
    pub const ALL: [WaveformKind; 11] = [
        WaveformKind::Sine,
        WaveformKind::Square,
        WaveformKind::Ramp,
        WaveformKind::Pulse,
        WaveformKind::Noise,
        WaveformKind::Dc,
        WaveformKind::Arbitrary,
        WaveformKind::Step,
        WaveformKind::Staircase,
        WaveformKind::Trapezoid,
        WaveformKind::Exponential,
    ];

    /// Name used by the host for this waveform.
    pub fn name(self) -> &'static str {
        match self {
            WaveformKind::Sine => "Sine",
            WaveformKind::Square => "Square",
            WaveformKind::Ramp => "Ramp",
            WaveformKind::Pulse => "Pulse",
            WaveformKind::Noise => "Noise",
            WaveformKind::Dc => "DC",
            WaveformKind::Arbitrary => "Arb",
            WaveformKind::Step => "Step",
            WaveformKind::Staircase => "Staircase",
            WaveformKind::Trapezoid => "Trapezoid",
            WaveformKind::Exponential => "Exponential",
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A physical waveform quantity, independent of any instrument's mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalParameter {
    /// Repetition rate in Hz.
    #[serde(rename = "Frequency in Hz", alias = "Frequency")]
    Frequency,
    /// Repetition time in s.
    #[serde(rename = "Period in s", alias = "Period")]
    Period,
    /// Peak-to-peak or peak amplitude in V.
    #[serde(rename = "Amplitude in V", alias = "Amplitude")]
    Amplitude,
    /// DC offset in V.
    #[serde(rename = "Offset in V", alias = "Offset")]
    Offset,
    /// High level in V.
    #[serde(rename = "HiLevel in V", alias = "HiLevel")]
    HiLevel,
    /// Low level in V.
    #[serde(rename = "LoLevel in V", alias = "LoLevel")]
    LoLevel,
    /// Phase in degrees.
    #[serde(rename = "Phase in deg", alias = "Phase")]
    Phase,
    /// Delay in s.
    #[serde(rename = "Delay in s", alias = "Delay")]
    Delay,
    /// Duty cycle in percent.
    #[serde(rename = "Duty cycle in %", alias = "DutyCycle")]
    DutyCycle,
    /// Pulse width in s.
    #[serde(rename = "Pulse width in s", alias = "PulseWidth")]
    PulseWidth,
    /// Rising edge time in s.
    #[serde(rename = "RiseTime")]
    RiseTime,
    /// Falling edge time in s.
    #[serde(rename = "FallTime")]
    FallTime,
    /// Ramp symmetry in percent.
    #[serde(rename = "Ramp symmetry", alias = "Symmetry")]
    Symmetry,
    /// Transient start time in s.
    #[serde(rename = "Start time in s", alias = "StartTime")]
    StartTime,
    /// Transient start level in V.
    #[serde(rename = "Start level in V", alias = "StartLevel")]
    StartLevel,
    /// Transient end time in s.
    #[serde(rename = "End time in s", alias = "EndTime")]
    EndTime,
    /// Transient end level in V.
    #[serde(rename = "End level in V", alias = "EndLevel")]
    EndLevel,
    /// Exponential time constant in s.
    #[serde(rename = "Time constant", alias = "TimeConstant")]
    TimeConstant,
    /// Steps of a staircase.
    #[serde(rename = "Number of steps", alias = "NumberSteps", alias = "NumberOfSteps")]
    NumberOfSteps,
    /// Points of an arbitrary waveform.
    #[serde(rename = "Waveform samples", alias = "Samples")]
    Samples,
}

impl CanonicalParameter {
    /// Every parameter, in declaration order.
    pub const ALL: [CanonicalParameter; 20] = [
        CanonicalParameter::Frequency,
        CanonicalParameter::Period,
        CanonicalParameter::Amplitude,
        CanonicalParameter::Offset,
        CanonicalParameter::HiLevel,
        CanonicalParameter::LoLevel,
        CanonicalParameter::Phase,
        CanonicalParameter::Delay,
        CanonicalParameter::DutyCycle,
        CanonicalParameter::PulseWidth,
        CanonicalParameter::RiseTime,
        CanonicalParameter::FallTime,
        CanonicalParameter::Symmetry,
        CanonicalParameter::StartTime,
        CanonicalParameter::StartLevel,
        CanonicalParameter::EndTime,
        CanonicalParameter::EndLevel,
        CanonicalParameter::TimeConstant,
        CanonicalParameter::NumberOfSteps,
        CanonicalParameter::Samples,
    ];

    /// Label shown by the host (and accepted on deserialization).
    pub fn label(self) -> &'static str {
        match self {
            CanonicalParameter::Frequency => "Frequency in Hz",
            CanonicalParameter::Period => "Period in s",
            CanonicalParameter::Amplitude => "Amplitude in V",
            CanonicalParameter::Offset => "Offset in V",
            CanonicalParameter::HiLevel => "HiLevel in V",
            CanonicalParameter::LoLevel => "LoLevel in V",
            CanonicalParameter::Phase => "Phase in deg",
            CanonicalParameter::Delay => "Delay in s",
            CanonicalParameter::DutyCycle => "Duty cycle in %",
            CanonicalParameter::PulseWidth => "Pulse width in s",
            CanonicalParameter::RiseTime => "RiseTime",
            CanonicalParameter::FallTime => "FallTime",
            CanonicalParameter::Symmetry => "Ramp symmetry",
            CanonicalParameter::StartTime => "Start time in s",
            CanonicalParameter::StartLevel => "Start level in V",
            CanonicalParameter::EndTime => "End time in s",
            CanonicalParameter::EndLevel => "End level in V",
            CanonicalParameter::TimeConstant => "Time constant",
            CanonicalParameter::NumberOfSteps => "Number of steps",
            CanonicalParameter::Samples => "Waveform samples",
        }
    }

    /// Short quantity name without the unit, used as a measured variable name.
    pub fn name(self) -> &'static str {
        match self {
            CanonicalParameter::Frequency => "Frequency",
            CanonicalParameter::Period => "Period",
            CanonicalParameter::Amplitude => "Amplitude",
            CanonicalParameter::Offset => "Offset",
            CanonicalParameter::HiLevel => "HiLevel",
            CanonicalParameter::LoLevel => "LoLevel",
            CanonicalParameter::Phase => "Phase",
            CanonicalParameter::Delay => "Delay",
            CanonicalParameter::DutyCycle => "Duty cycle",
            CanonicalParameter::PulseWidth => "Pulse width",
            CanonicalParameter::RiseTime => "RiseTime",
            CanonicalParameter::FallTime => "FallTime",
            CanonicalParameter::Symmetry => "Ramp symmetry",
            CanonicalParameter::StartTime => "Start time",
            CanonicalParameter::StartLevel => "Start level",
            CanonicalParameter::EndTime => "End time",
            CanonicalParameter::EndLevel => "End level",
            CanonicalParameter::TimeConstant => "Time constant",
            CanonicalParameter::NumberOfSteps => "Number of steps",
            CanonicalParameter::Samples => "Waveform samples",
        }
    }
}

impl fmt::Display for CanonicalParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CanonicalParameter {
    type Err = DeviceError;

    /// Accepts either the host label or the short name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CanonicalParameter::ALL
            .into_iter()
            .find(|p| p.label() == s || p.name() == s)
            .or(match s {
                "NumberSteps" | "NumberOfSteps" => Some(CanonicalParameter::NumberOfSteps),
                "DutyCycle" => Some(CanonicalParameter::DutyCycle),
                "PulseWidth" => Some(CanonicalParameter::PulseWidth),
                _ => None,
            })
            .ok_or_else(|| DeviceError::InvalidInput(format!("unknown waveform parameter '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for p in CanonicalParameter::ALL {
            assert_eq!(p.label().parse::<CanonicalParameter>().unwrap(), p);
            assert_eq!(p.name().parse::<CanonicalParameter>().unwrap(), p);
        }
        assert_eq!(
            "NumberSteps".parse::<CanonicalParameter>().unwrap(),
            CanonicalParameter::NumberOfSteps
        );
        assert!("Voltage".parse::<CanonicalParameter>().is_err());
    }

    #[test]
    fn serde_accepts_host_labels() {
        #[derive(Deserialize)]
        struct Labels {
            p: CanonicalParameter,
            w: WaveformKind,
        }
        let parsed: Labels = toml::from_str("p = \"Duty cycle in %\"\nw = \"Arb\"").unwrap();
        assert_eq!(parsed.p, CanonicalParameter::DutyCycle);
        assert_eq!(parsed.w, WaveformKind::Arbitrary);

        let parsed: Labels = toml::from_str("p = \"Period\"\nw = \"DC\"").unwrap();
        assert_eq!(parsed.p, CanonicalParameter::Period);
        assert_eq!(parsed.w, WaveformKind::Dc);
    }
}
