//! Raw SCPI socket adapter.
//!
//! Sockets have no serial poll, so the status byte is read with `*STB?`.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{PortSettings, ScpiPort};
use crate::error::{parse_reading, DeviceError, DeviceResult};

/// Raw socket port.
pub struct TcpAdapter {
    settings: PortSettings,
    stream: BufReader<TcpStream>,
}

impl TcpAdapter {
    /// Connect to `settings.resource` (`host:port`).
    pub async fn connect(settings: PortSettings) -> DeviceResult<Self> {
        let stream = timeout(settings.timeout(), TcpStream::connect(&settings.resource))
            .await
            .map_err(|_| {
                DeviceError::Transport(format!("timed out connecting to {}", settings.resource))
            })??;
        stream.set_nodelay(true)?;
        info!(resource = %settings.resource, "TCP instrument connected");
        Ok(Self {
            settings,
            stream: BufReader::new(stream),
        })
    }
}

#[async_trait]
impl ScpiPort for TcpAdapter {
    async fn write(&mut self, command: &str) -> DeviceResult<()> {
        let line = format!("{command}{}", self.settings.write_terminator);
        timeout(
            self.settings.timeout(),
            self.stream.get_mut().write_all(line.as_bytes()),
        )
        .await
        .map_err(|_| DeviceError::Transport(format!("write timed out: {command}")))??;
        debug!(resource = %self.settings.resource, command, "SCPI write");
        Ok(())
    }

    async fn read(&mut self) -> DeviceResult<String> {
        let mut line = String::new();
        let n = timeout(self.settings.timeout(), self.stream.read_line(&mut line))
            .await
            .map_err(|_| DeviceError::Transport("read timed out".into()))??;
        if n == 0 {
            return Err(DeviceError::NotConnected);
        }
        let reply = line
            .trim_end_matches(|c| c == '\n' || c == '\r' || self.settings.read_terminator.contains(c))
            .to_string();
        debug!(resource = %self.settings.resource, reply = %reply, "SCPI read");
        Ok(reply)
    }

    async fn read_status_byte(&mut self) -> DeviceResult<u8> {
        let reply = self.query("*STB?").await?;
        parse_reading("*STB?", &reply)
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.settings.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_query_and_status_over_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64];
            let mut received = String::new();
            while !received.ends_with("*STB?\n") {
                let n = socket.read(&mut buf).await.unwrap();
                received.push_str(std::str::from_utf8(&buf[..n]).unwrap());
                if received == "FREQ?\n" {
                    socket.write_all(b"+1.0E+03\r\n").await.unwrap();
                }
            }
            socket.write_all(b"32\n").await.unwrap();
            received
        });

        let settings = PortSettings {
            resource: addr.to_string(),
            ..PortSettings::default()
        };
        let mut adapter = TcpAdapter::connect(settings).await.unwrap();
        assert_eq!(adapter.query("FREQ?").await.unwrap(), "+1.0E+03");
        assert_eq!(adapter.read_status_byte().await.unwrap(), 32);
        assert!(adapter.describe().starts_with("tcp:127.0.0.1"));

        assert_eq!(server.await.unwrap(), "FREQ?\n*STB?\n");
    }
}
