//! Device classes for SCPI laboratory instruments.
//!
//! A host measurement program describes a signal with a handful of paired
//! settings (period or frequency, amplitude or high level, ...) and a sweep
//! parameter. This crate turns those settings into the instrument's own
//! commands:
//!
//! - [`waveform`]: the parameter equivalence resolver and the per-instrument
//!   command tables it is looked up in
//! - [`instrument`]: one [`instrument::DeviceClass`] per supported instrument
//!   and a factory building them from a station file
//! - [`adapters`]: the port seam plus mock, raw TCP and VISA transports
//! - [`config`], [`sequence`], [`telemetry`]: station files, the single-point
//!   lifecycle runner and tracing setup used by the `devclass` binary

pub mod adapters;
pub mod config;
pub mod error;
pub mod instrument;
pub mod sequence;
pub mod telemetry;
pub mod waveform;

pub use error::{DeviceError, DeviceResult};
pub use instrument::{DeviceClass, SweepMode, Variable};
