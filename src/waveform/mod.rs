//! Waveform vocabulary shared by the signal-generator device classes.
//!
//! - [`kind`]: waveform kinds and canonical parameters with their host labels.
//! - [`table`]: per-instrument command tables.
//! - [`resolver`]: derivation of the canonical parameter set from the user's
//!   redundant axis selection, and the reverse mapping of read-backs.

pub mod kind;
pub mod resolver;
pub mod table;

pub use kind::{CanonicalParameter, WaveformKind};
pub use resolver::{
    affected_parameters, report, resolve, ActiveParameter, AmplitudeHiLevel, AxisValue, DelayPhase, OffsetLoLevel,
    PeriodFrequency, ResolvedParameters, ShapeAxis, SignalModel, SweepSelection,
};
pub use table::{CommandEntry, CommandTable};
