//! One pass through the device lifecycle
//!
//! The host owns sweep iteration; this module only replays the call order the
//! host uses for a single point, which is what the `devclass` binary needs for
//! dry runs and bench checks. A stop condition (see
//! [`DeviceError::is_stop_condition`]) ends the pass without a reading but
//! still powers the device off. Any other error is returned after the same
//! cleanup.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{DeviceError, DeviceResult};
use crate::instrument::{DeviceClass, Variable};

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Every step ran and `call` returned a reading.
    Success,
    /// A stop condition ended the pass early.
    Stopped,
}

/// Outcome of [`run_cycle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    /// Display name of the device.
    pub device: String,
    /// Variables the device reports, in `call` order.
    pub variables: Vec<Variable>,
    /// Value passed to `apply`, `None` when the point was measured as configured.
    pub set_value: Option<f64>,
    /// Result of `call`, empty when the pass stopped early.
    pub values: Vec<f64>,
    /// How the pass ended.
    pub exit_status: ExitStatus,
    /// Why the pass stopped, empty on success.
    pub reason: String,
}

impl CycleSummary {
    /// Reading of the variable called `name`.
    pub fn value(&self, name: &str) -> DeviceResult<f64> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .and_then(|i| self.values.get(i).copied())
            .ok_or_else(|| DeviceError::InvalidInput(format!("no reading for '{name}'")))
    }
}

/// initialize, configure, poweron, [apply], trigger, measure, read_result,
/// call, poweroff, deinitialize.
#[instrument(skip_all, fields(device = %device.name(), set_value = ?set_value))]
pub async fn run_cycle(
    device: &mut dyn DeviceClass,
    set_value: Option<f64>,
) -> DeviceResult<CycleSummary> {
    let mut summary = CycleSummary {
        device: device.name(),
        variables: device.variables(),
        set_value,
        values: Vec::new(),
        exit_status: ExitStatus::Success,
        reason: String::new(),
    };

    let result = measure_point(device, set_value).await;
    let cleanup = shutdown(device).await;

    match result {
        Ok(values) => summary.values = values,
        Err(err) if err.is_stop_condition() => {
            warn!(error = %err, "stopped");
            summary.exit_status = ExitStatus::Stopped;
            summary.reason = err.to_string();
        }
        Err(err) => return Err(err),
    }
    cleanup?;
    info!(status = ?summary.exit_status, "cycle finished");
    Ok(summary)
}

async fn measure_point(device: &mut dyn DeviceClass, set_value: Option<f64>) -> DeviceResult<Vec<f64>> {
    device.initialize().await?;
    device.configure().await?;
    device.poweron().await?;
    if let Some(value) = set_value {
        device.apply(value).await?;
    }
    device.trigger().await?;
    device.measure().await?;
    device.read_result().await?;
    device.call().await
}

async fn shutdown(device: &mut dyn DeviceClass) -> DeviceResult<()> {
    let poweroff = device.poweroff().await;
    if let Err(err) = &poweroff {
        warn!(error = %err, "poweroff failed");
    }
    device.deinitialize().await?;
    poweroff
}
