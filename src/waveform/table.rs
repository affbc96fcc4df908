//! Command Table Lookup
//!
//! A typed mapping `(WaveformKind, CanonicalParameter) -> CommandEntry` plus the
//! wire function label of each kind. Tables are built once, when a device class
//! is constructed, and are read-only afterwards.

use std::collections::BTreeMap;

use crate::error::{DeviceError, DeviceResult};
use crate::waveform::{CanonicalParameter, WaveformKind};

/// Wire mnemonic and unit of one canonical parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    /// Command fragment, e.g. `FREQ` or `START:TIME`.
    pub mnemonic: &'static str,
    /// Unit of the value.
    pub unit: &'static str,
}

#[derive(Debug, Clone)]
struct KindEntry {
    label: &'static str,
    // Declaration order is transmission order.
    parameters: Vec<(CanonicalParameter, CommandEntry)>,
}

/// Per-instrument command table.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    kinds: BTreeMap<WaveformKind, KindEntry>,
}

impl CommandTable {
    /// Empty table; populate with [`CommandTable::with_waveform`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a waveform kind, its function label and its parameters.
    pub fn with_waveform(
        mut self,
        kind: WaveformKind,
        label: &'static str,
        parameters: &[(CanonicalParameter, &'static str, &'static str)],
    ) -> Self {
        let parameters = parameters
            .iter()
            .map(|&(param, mnemonic, unit)| (param, CommandEntry { mnemonic, unit }))
            .collect();
        self.kinds.insert(kind, KindEntry { label, parameters });
        self
    }

    /// Function label sent to select the waveform (e.g. `SIN`).
    pub fn label(&self, kind: WaveformKind) -> DeviceResult<&'static str> {
        self.entry(kind).map(|e| e.label)
    }

    /// Mnemonic and unit for `parameter`, or `Unsupported` if `kind` does not
    /// declare it.
    pub fn lookup(
        &self,
        kind: WaveformKind,
        parameter: CanonicalParameter,
    ) -> DeviceResult<&CommandEntry> {
        self.entry(kind)?
            .parameters
            .iter()
            .find(|(p, _)| *p == parameter)
            .map(|(_, entry)| entry)
            .ok_or(DeviceError::Unsupported {
                waveform: kind,
                parameter,
            })
    }

    /// Whether `kind` declares `parameter`.
    pub fn supports(&self, kind: WaveformKind, parameter: CanonicalParameter) -> bool {
        self.lookup(kind, parameter).is_ok()
    }

    /// Whether the instrument offers `kind` at all.
    pub fn contains(&self, kind: WaveformKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Parameters declared for `kind`, in declaration order.
    pub fn parameters(
        &self,
        kind: WaveformKind,
    ) -> DeviceResult<impl Iterator<Item = (CanonicalParameter, &CommandEntry)> + '_> {
        Ok(self
            .entry(kind)?
            .parameters
            .iter()
            .map(|(param, entry)| (*param, entry)))
    }

    /// Offered waveform kinds.
    pub fn kinds(&self) -> impl Iterator<Item = WaveformKind> + '_ {
        self.kinds.keys().copied()
    }

    fn entry(&self, kind: WaveformKind) -> DeviceResult<&KindEntry> {
        self.kinds
            .get(&kind)
            .ok_or(DeviceError::UnsupportedWaveform(kind))
    }

    // ------------------------------------------------------------------
    // Instrument tables
    // ------------------------------------------------------------------

    /// Agilent 33220A function/arbitrary waveform generator.
    pub fn agilent_33220a() -> Self {
        use CanonicalParameter::*;
        const BASE: [(CanonicalParameter, &str, &str); 3] = [
            (Frequency, "FREQ", "Hz"),
            (Amplitude, "VOLT", "V"),
            (Offset, "VOLT:OFFS", "V"),
        ];
        let with_base = |extra: &[(CanonicalParameter, &'static str, &'static str)]| {
            BASE.iter().chain(extra).copied().collect::<Vec<_>>()
        };

        Self::new()
            .with_waveform(WaveformKind::Sine, "SIN", &BASE)
            .with_waveform(
                WaveformKind::Square,
                "SQU",
                &with_base(&[(DutyCycle, "FUNC:SQUARE:DCYCLE", "%")]),
            )
            .with_waveform(
                WaveformKind::Ramp,
                "RAMP",
                &with_base(&[(Symmetry, "FUNC:RAMP:SYMMETRY", "%")]),
            )
            .with_waveform(
                WaveformKind::Pulse,
                "PULS",
                &with_base(&[
                    (PulseWidth, "PULSE:WIDTH", "s"),
                    (RiseTime, "FUNC:PULSE:TRANS", "s"),
                ]),
            )
            .with_waveform(WaveformKind::Noise, "NOIS", &BASE)
            .with_waveform(WaveformKind::Dc, "DC", &BASE)
            .with_waveform(
                WaveformKind::Arbitrary,
                "USER",
                &with_base(&[(Samples, "DATA VOLATILE,", "samples")]),
            )
    }

    /// Keysight N6705 DC power analyzer used as an arbitrary transient source.
    /// Mnemonics are suffixes of `ARB:VOLTAGE:<label>:`.
    pub fn keysight_n6705() -> Self {
        use CanonicalParameter::*;
        Self::new()
            .with_waveform(
                WaveformKind::Sine,
                "SIN",
                &[
                    (Frequency, "FREQ", "Hz"),
                    (Amplitude, "AMPL", "V"),
                    (Offset, "OFFSET", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Step,
                "STEP",
                &[
                    (Delay, "START:TIME", "s"),
                    (LoLevel, "START:LEVEL", "V"),
                    (HiLevel, "END:LEVEL", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Ramp,
                "RAMP",
                &[
                    (Delay, "START:TIME", "s"),
                    (LoLevel, "START:LEVEL", "V"),
                    (RiseTime, "RTIME", "s"),
                    (EndTime, "END:TIME", "s"),
                    (HiLevel, "END:LEVEL", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Staircase,
                "STAIRCASE",
                &[
                    (Delay, "START:TIME", "s"),
                    (LoLevel, "START:LEVEL", "V"),
                    (RiseTime, "TIME", "s"),
                    (NumberOfSteps, "NSTEPS", "num"),
                    (EndTime, "END:TIME", "s"),
                    (HiLevel, "END:LEVEL", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Pulse,
                "PULSE",
                &[
                    (Delay, "START:TIME", "s"),
                    (LoLevel, "START:LEVEL", "V"),
                    (PulseWidth, "TOP:TIME", "s"),
                    (HiLevel, "TOP:LEVEL", "V"),
                    (EndTime, "END:TIME", "s"),
                ],
            )
            .with_waveform(
                WaveformKind::Trapezoid,
                "TRAPEZOID",
                &[
                    (Delay, "START:TIME", "s"),
                    (LoLevel, "START:LEVEL", "V"),
                    (RiseTime, "RTIME", "s"),
                    (PulseWidth, "TOP:TIME", "s"),
                    (HiLevel, "TOP:LEVEL", "V"),
                    (FallTime, "FTIME", "s"),
                    (EndTime, "END:TIME", "s"),
                ],
            )
            .with_waveform(
                WaveformKind::Exponential,
                "EXP",
                &[
                    (Delay, "START:TIME", "s"),
                    (LoLevel, "START:LEVEL", "V"),
                    (RiseTime, "TIME", "s"),
                    (TimeConstant, "TCONSTANT", "s"),
                    (HiLevel, "END:LEVEL", "V"),
                ],
            )
    }

    /// Agilent N6705A arbitrary source, addressed by direct start/end
    /// parameters. Period shares the `FREQ` mnemonic and is inverted on write.
    pub fn agilent_n6705a() -> Self {
        use CanonicalParameter::*;
        Self::new()
            .with_waveform(
                WaveformKind::Sine,
                "SIN",
                &[
                    (Frequency, "FREQ", "Hz"),
                    (Period, "FREQ", "s"),
                    (Offset, "OFFSET", "V"),
                    (Amplitude, "AMPL", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Step,
                "STEP",
                &[
                    (StartTime, "START:TIME", "s"),
                    (StartLevel, "START:LEVEL", "V"),
                    (EndLevel, "END:LEVEL", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Ramp,
                "RAMP",
                &[
                    (StartTime, "START:TIME", "s"),
                    (StartLevel, "START:LEVEL", "V"),
                    (RiseTime, "RTIME", "s"),
                    (EndTime, "END:TIME", "s"),
                    (EndLevel, "END:LEVEL", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Staircase,
                "STAIRCASE",
                &[
                    (StartTime, "START:TIME", "s"),
                    (StartLevel, "START:LEVEL", "V"),
                    (RiseTime, "TIME", "s"),
                    (NumberOfSteps, "NSTEPS", "num"),
                    (EndTime, "END:TIME", "s"),
                    (EndLevel, "END:LEVEL", "V"),
                ],
            )
            .with_waveform(
                WaveformKind::Exponential,
                "EXP",
                &[
                    (StartTime, "START:TIME", "s"),
                    (StartLevel, "START:LEVEL", "V"),
                    (RiseTime, "TIME", "s"),
                    (TimeConstant, "TCONSTANT", "s"),
                    (EndLevel, "END:LEVEL", "V"),
                ],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CanonicalParameter::*;

    #[test]
    fn lookup_returns_mnemonic_and_unit() {
        let table = CommandTable::agilent_33220a();
        let entry = table.lookup(WaveformKind::Square, DutyCycle).unwrap();
        assert_eq!(entry.mnemonic, "FUNC:SQUARE:DCYCLE");
        assert_eq!(entry.unit, "%");
        assert_eq!(table.label(WaveformKind::Pulse).unwrap(), "PULS");
    }

    #[test]
    fn undeclared_parameter_is_unsupported() {
        let table = CommandTable::agilent_33220a();
        let err = table.lookup(WaveformKind::Sine, DutyCycle).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Unsupported {
                waveform: WaveformKind::Sine,
                parameter: DutyCycle
            }
        ));
        assert!(!table.supports(WaveformKind::Noise, Symmetry));
    }

    #[test]
    fn undeclared_waveform_is_reported() {
        let table = CommandTable::agilent_33220a();
        assert!(matches!(
            table.label(WaveformKind::Staircase),
            Err(DeviceError::UnsupportedWaveform(WaveformKind::Staircase))
        ));
        assert!(!table.contains(WaveformKind::Exponential));
    }

    #[test]
    fn parameters_keep_declaration_order() {
        let table = CommandTable::keysight_n6705();
        let order: Vec<_> = table
            .parameters(WaveformKind::Trapezoid)
            .unwrap()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(
            order,
            vec![Delay, LoLevel, RiseTime, PulseWidth, HiLevel, FallTime, EndTime]
        );
    }

    #[test]
    fn n6705a_period_shares_frequency_mnemonic() {
        let table = CommandTable::agilent_n6705a();
        let freq = table.lookup(WaveformKind::Sine, Frequency).unwrap();
        let period = table.lookup(WaveformKind::Sine, Period).unwrap();
        assert_eq!(freq.mnemonic, period.mnemonic);
        assert_eq!(period.unit, "s");
        assert_eq!(table.kinds().count(), 5);
    }
}
