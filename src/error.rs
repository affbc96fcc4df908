//! Custom error types for the device classes.
//!
//! This module defines the primary error type, `DeviceError`, shared by the
//! waveform resolver, the command tables, the port adapters and every device
//! class. Using the `thiserror` crate, it provides a centralized and consistent
//! way to handle the failures that can occur while translating host settings
//! into instrument commands.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidInput`**: Numeric inputs the resolver refuses to convert, such as a
//!   non-positive period or a ramp symmetry outside 0–100 %. Fails fast.
//! - **`Unsupported` / `UnsupportedWaveform`**: A canonical parameter (or a whole
//!   waveform kind) the instrument's command table does not declare. Most device
//!   classes treat `Unsupported` as "do not transmit"; the strict ones surface it.
//! - **`TriggerTimeout`**: An external or bus trigger never asserted
//!   data-available. This is a stop condition for the caller, not a crash.
//! - **`OperationTimeout` / `Execution`**: The instrument did not complete an
//!   operation, or flagged an execution error in its event status register.
//! - **`MalformedResponse`**, **`Transport`**, **`Io`**, **`NotConnected`**:
//!   Communication failures on the port.
//! - **`Config`** / **`Configuration`**: Station configuration loading and
//!   validation.
//!
//! By using `#[from]`, `DeviceError` can be created from underlying error types,
//! simplifying error handling with the `?` operator.

use std::time::Duration;

use thiserror::Error;

use crate::waveform::{CanonicalParameter, WaveformKind};

/// Convenience alias for results using the crate error type.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Errors raised by device classes, ports and station loading.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A host value is out of range or inconsistent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The waveform does not accept this parameter.
    #[error("{parameter} is not supported for waveform {waveform}")]
    Unsupported {
        /// Selected waveform.
        waveform: WaveformKind,
        /// Parameter it lacks.
        parameter: CanonicalParameter,
    },

    /// The instrument cannot produce this waveform.
    #[error("Waveform {0} is not supported by this instrument")]
    UnsupportedWaveform(WaveformKind),

    /// No reading arrived before the trigger timeout. Stops the run.
    #[error("Trigger timeout: no data available after {waited:?}")]
    TriggerTimeout {
        /// Time spent polling.
        waited: Duration,
    },

    /// An instrument operation did not report completion in time.
    #[error("Operation '{operation}' did not complete within {waited:?}")]
    OperationTimeout {
        /// What was waited for.
        operation: String,
        /// Time spent polling.
        waited: Duration,
    },

    /// The instrument flagged an execution error.
    #[error("Instrument execution error: {0}")]
    Execution(String),

    /// A reply could not be parsed.
    #[error("Malformed response to {context}: '{response}'")]
    MalformedResponse {
        /// Query or quantity the reply belongs to.
        context: String,
        /// Reply as received.
        response: String,
    },

    /// The port has no open session.
    #[error("Port not connected")]
    NotConnected,

    /// The link to the instrument failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local I/O failed, e.g. reading an Arb file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The station file could not be read or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Settings were read but are not usable.
    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl DeviceError {
    /// Whether the error asks the caller to stop the run rather than treat it
    /// as a fault of the device class.
    pub fn is_stop_condition(&self) -> bool {
        matches!(self, DeviceError::TriggerTimeout { .. })
    }

    pub(crate) fn malformed(context: impl Into<String>, response: impl Into<String>) -> Self {
        DeviceError::MalformedResponse {
            context: context.into(),
            response: response.into(),
        }
    }
}

/// Parse a numeric instrument reply, trimming whitespace and terminators.
pub(crate) fn parse_reading<T: std::str::FromStr>(context: &str, response: &str) -> DeviceResult<T> {
    response
        .trim()
        .parse::<T>()
        .map_err(|_| DeviceError::malformed(context, response.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DeviceError::Unsupported {
            waveform: WaveformKind::Sine,
            parameter: CanonicalParameter::DutyCycle,
        };
        assert_eq!(
            err.to_string(),
            "Duty cycle in % is not supported for waveform Sine"
        );
    }

    #[test]
    fn test_trigger_timeout_is_stop_condition() {
        let err = DeviceError::TriggerTimeout {
            waited: Duration::from_secs(30),
        };
        assert!(err.is_stop_condition());
        assert!(!DeviceError::InvalidInput("period".into()).is_stop_condition());
    }

    #[test]
    fn test_parse_reading() {
        let value: f64 = parse_reading("FREQ?", " 1.000000000000E+03\n").unwrap();
        assert_eq!(value, 1000.0);

        let err = parse_reading::<f64>("FREQ?", "garbage").unwrap_err();
        assert!(matches!(err, DeviceError::MalformedResponse { .. }));
    }
}
