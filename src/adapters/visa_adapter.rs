//! VISA adapter for GPIB/USB/Ethernet instruments
//!
//! Wraps the visa-rs crate. VISA I/O is synchronous, so every call runs on
//! Tokio's blocking pool. Without the `instrument_visa` feature the adapter can
//! be constructed but `connect` fails.
//!
//! Supports resource strings like:
//! - "GPIB0::1::INSTR" (GPIB interface)
//! - "USB0::0x0957::0x0407::MY12345678::INSTR" (USB)
//! - "TCPIP0::192.168.1.100::INSTR" (Ethernet/LXI)

use async_trait::async_trait;

use super::{PortSettings, ScpiPort};
use crate::error::{DeviceError, DeviceResult};

#[cfg(feature = "instrument_visa")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "instrument_visa")]
use tracing::{debug, info};
#[cfg(feature = "instrument_visa")]
use visa_rs::prelude::*;

/// VISA session port.
pub struct VisaAdapter {
    settings: PortSettings,

    #[cfg(feature = "instrument_visa")]
    instrument: Option<Arc<Mutex<Instrument>>>,
}

impl VisaAdapter {
    /// Adapter for `settings.resource`, not yet opened.
    pub fn new(settings: PortSettings) -> Self {
        Self {
            settings,
            #[cfg(feature = "instrument_visa")]
            instrument: None,
        }
    }

    /// VISA resource string.
    pub fn resource(&self) -> &str {
        &self.settings.resource
    }

    /// Open the resource and apply the configured I/O timeout.
    #[cfg(feature = "instrument_visa")]
    pub async fn connect(&mut self) -> DeviceResult<()> {
        use std::ffi::CString;

        let resource = self.settings.resource.clone();
        let timeout_ms = io_timeout_ms(&self.settings)?;
        let instrument = tokio::task::spawn_blocking(move || {
            let rm = DefaultRM::new().map_err(visa_error)?;
            let c_string = CString::new(resource)
                .map_err(|e| DeviceError::Configuration(format!("invalid VISA resource: {e}")))?;
            let visa_string = visa_rs::VisaString::from(c_string);
            let instrument = rm
                .open(&visa_string, AccessMode::NO_LOCK, TIMEOUT_IMMEDIATE)
                .map_err(visa_error)?;
            let timeout = attribute::AttrTmoValue::new_checked(timeout_ms).ok_or_else(|| {
                DeviceError::Configuration(format!("VISA timeout {timeout_ms} ms out of range"))
            })?;
            instrument.set_attr(timeout).map_err(visa_error)?;
            Ok::<_, DeviceError>(instrument)
        })
        .await
        .map_err(|e| DeviceError::Transport(format!("VISA open task failed: {e}")))??;

        self.instrument = Some(Arc::new(Mutex::new(instrument)));
        info!(
            resource = %self.settings.resource,
            timeout_ms = self.settings.timeout_ms,
            "VISA resource opened"
        );
        Ok(())
    }

    /// Always fails: VISA support is not compiled in.
    #[cfg(not(feature = "instrument_visa"))]
    pub async fn connect(&mut self) -> DeviceResult<()> {
        Err(DeviceError::Configuration(format!(
            "cannot open {}: VISA support not enabled, rebuild with --features instrument_visa",
            self.settings.resource
        )))
    }

    /// Whether a session is open.
    pub fn is_connected(&self) -> bool {
        #[cfg(feature = "instrument_visa")]
        {
            self.instrument.is_some()
        }

        #[cfg(not(feature = "instrument_visa"))]
        {
            false
        }
    }

    #[cfg(feature = "instrument_visa")]
    fn session(&self) -> DeviceResult<Arc<Mutex<Instrument>>> {
        self.instrument.clone().ok_or(DeviceError::NotConnected)
    }
}

/// I/O timeout for the VISA session, which takes milliseconds as a `u32`.
pub fn io_timeout_ms(settings: &PortSettings) -> DeviceResult<u32> {
    u32::try_from(settings.timeout_ms).map_err(|_| {
        DeviceError::Configuration(format!(
            "VISA timeout {} ms does not fit a VISA attribute",
            settings.timeout_ms
        ))
    })
}

#[cfg(feature = "instrument_visa")]
fn visa_error(err: impl std::fmt::Display) -> DeviceError {
    DeviceError::Transport(format!("VISA: {err}"))
}

#[cfg(feature = "instrument_visa")]
#[async_trait]
impl ScpiPort for VisaAdapter {
    async fn write(&mut self, command: &str) -> DeviceResult<()> {
        use std::io::Write;

        let session = self.session()?;
        let line = format!("{command}{}", self.settings.write_terminator);
        tokio::task::spawn_blocking(move || {
            let mut instr = session.lock().map_err(visa_error)?;
            instr.write_all(line.as_bytes()).map_err(DeviceError::from)
        })
        .await
        .map_err(|e| DeviceError::Transport(format!("VISA write task failed: {e}")))??;
        debug!(resource = %self.settings.resource, command, "SCPI write");
        Ok(())
    }

    async fn read(&mut self) -> DeviceResult<String> {
        use std::io::Read;

        let session = self.session()?;
        let terminator = self.settings.read_terminator.clone();
        let reply = tokio::task::spawn_blocking(move || {
            let mut instr = session.lock().map_err(visa_error)?;
            let mut reply = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = instr.read(&mut buf)?;
                reply.extend_from_slice(&buf[..n]);
                if n == 0 || reply.ends_with(terminator.as_bytes()) {
                    break;
                }
            }
            Ok::<_, DeviceError>(String::from_utf8_lossy(&reply).trim_end().to_string())
        })
        .await
        .map_err(|e| DeviceError::Transport(format!("VISA read task failed: {e}")))??;
        debug!(resource = %self.settings.resource, reply = %reply, "SCPI read");
        Ok(reply)
    }

    /// Serial poll. Not every instrument on a GPIB bus understands `*STB?`.
    async fn read_status_byte(&mut self) -> DeviceResult<u8> {
        let session = self.session()?;
        let stb = tokio::task::spawn_blocking(move || {
            let instr = session.lock().map_err(visa_error)?;
            instr.read_stb().map_err(visa_error)
        })
        .await
        .map_err(|e| DeviceError::Transport(format!("VISA serial poll task failed: {e}")))??;
        let status = (stb & 0xFF) as u8;
        debug!(resource = %self.settings.resource, status, "serial poll");
        Ok(status)
    }

    fn describe(&self) -> String {
        format!("visa:{}", self.settings.resource)
    }
}

#[cfg(not(feature = "instrument_visa"))]
#[async_trait]
impl ScpiPort for VisaAdapter {
    async fn write(&mut self, _command: &str) -> DeviceResult<()> {
        Err(DeviceError::NotConnected)
    }

    async fn read(&mut self) -> DeviceResult<String> {
        Err(DeviceError::NotConnected)
    }

    async fn read_status_byte(&mut self) -> DeviceResult<u8> {
        Err(DeviceError::NotConnected)
    }

    fn describe(&self) -> String {
        format!("visa:{}", self.settings.resource)
    }
}
