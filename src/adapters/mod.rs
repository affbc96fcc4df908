//! Port adapters
//!
//! [`ScpiPort`] is the byte-stream seam every device class talks through. The
//! host owns the connection; a device class only writes command lines, reads
//! reply lines and polls the status byte.
//!
//! - [`MockAdapter`]: records writes and replays scripted replies. Used by the
//!   tests and by the CLI dry run.
//! - [`TcpAdapter`]: raw SCPI socket (port 5025 on most LXI instruments).
//! - [`VisaAdapter`]: GPIB/USB/TCPIP through a VISA library, behind the
//!   `instrument_visa` feature.

use async_trait::async_trait;

use crate::error::DeviceResult;

pub mod mock;
pub mod tcp_adapter;
pub mod visa_adapter;

pub use mock::MockAdapter;
pub use tcp_adapter::TcpAdapter;
pub use visa_adapter::VisaAdapter;

/// Line-oriented instrument port.
///
/// Terminators are the adapter's concern: `write` receives the bare command and
/// `read` returns the reply with its terminator stripped.
#[async_trait]
pub trait ScpiPort: Send {
    /// Send one command line.
    async fn write(&mut self, command: &str) -> DeviceResult<()>;

    /// Read one reply line.
    async fn read(&mut self) -> DeviceResult<String>;

    /// IEEE 488 status byte (serial poll).
    async fn read_status_byte(&mut self) -> DeviceResult<u8>;

    /// Write `command` and read its reply.
    async fn query(&mut self, command: &str) -> DeviceResult<String> {
        self.write(command).await?;
        self.read().await
    }

    /// Short description used in log messages.
    fn describe(&self) -> String {
        "port".to_string()
    }
}

#[async_trait]
impl ScpiPort for Box<dyn ScpiPort> {
    async fn write(&mut self, command: &str) -> DeviceResult<()> {
        (**self).write(command).await
    }

    async fn read(&mut self) -> DeviceResult<String> {
        (**self).read().await
    }

    async fn read_status_byte(&mut self) -> DeviceResult<u8> {
        (**self).read_status_byte().await
    }

    async fn query(&mut self, command: &str) -> DeviceResult<String> {
        (**self).query(command).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Port settings shared by the real adapters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PortSettings {
    /// `host:port` for TCP, a VISA resource string otherwise.
    pub resource: String,
    /// Connect, read and write timeout.
    pub timeout_ms: u64,
    /// Appended to every written command.
    pub write_terminator: String,
    /// Marks the end of a reply.
    pub read_terminator: String,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            resource: String::new(),
            timeout_ms: 5000,
            write_terminator: "\n".to_string(),
            read_terminator: "\n".to_string(),
        }
    }
}

impl PortSettings {
    /// `timeout_ms` as a `Duration`.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    /// Whether `resource` names a VISA resource rather than a socket address.
    pub fn is_visa_resource(&self) -> bool {
        self.resource.ends_with("::INSTR") || self.resource.ends_with("::SOCKET")
    }
}

/// Open the adapter `settings` describe.
pub async fn open(settings: &PortSettings) -> DeviceResult<Box<dyn ScpiPort>> {
    if settings.is_visa_resource() {
        let mut adapter = VisaAdapter::new(settings.clone());
        adapter.connect().await?;
        Ok(Box::new(adapter))
    } else {
        Ok(Box::new(TcpAdapter::connect(settings.clone()).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_boxed_port_forwards_calls() {
        let mut mock = MockAdapter::new();
        mock.push_response("42");
        mock.push_status_byte(0x20);
        let log = mock.log();

        let mut port: Box<dyn ScpiPort> = Box::new(mock);
        assert_eq!(port.query("VAL?").await.unwrap(), "42");
        assert_eq!(port.read_status_byte().await.unwrap(), 0x20);
        port.write("OUTP ON").await.unwrap();

        assert_eq!(log.writes(), vec!["VAL?", "OUTP ON"]);
    }

    #[test]
    fn test_resource_kind() {
        let mut settings = PortSettings {
            resource: "GPIB0::5::INSTR".into(),
            ..PortSettings::default()
        };
        assert!(settings.is_visa_resource());
        settings.resource = "192.168.1.20:5025".into();
        assert!(!settings.is_visa_resource());
        assert_eq!(settings.timeout(), std::time::Duration::from_secs(5));
    }
}
