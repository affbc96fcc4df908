//! Mock port for testing and dry runs.
//!
//! Every write, read and status-byte poll is appended to a shared
//! [`TranscriptLog`], so a test can hand the adapter to a device class and
//! still inspect the exact command sequence afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::ScpiPort;
use crate::error::{DeviceError, DeviceResult};

/// One exchange on the mock port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum TranscriptEntry {
    /// Command line written to the port.
    Write(String),
    /// Reply line handed to the device.
    Read(String),
    /// Status byte returned by a poll.
    StatusByte(u8),
}

/// Shared, cloneable view of a mock port's transcript.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog(Arc<Mutex<Vec<TranscriptEntry>>>);

impl TranscriptLog {
    fn lock(&self) -> MutexGuard<'_, Vec<TranscriptEntry>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, entry: TranscriptEntry) {
        self.lock().push(entry);
    }

    /// Everything recorded so far, in order.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.lock().clone()
    }

    /// Only the written command lines, in order.
    pub fn writes(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Write(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget the recorded exchanges.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Scripted port.
///
/// Replies are chosen in this order: a reply registered for the last written
/// command with [`MockAdapter::on_query`], the next queued reply, the default
/// reply. A registered reply answers only the first read after its command.
/// A read with none of these available is a transport error.
#[derive(Debug, Default)]
pub struct MockAdapter {
    log: TranscriptLog,
    responses: VecDeque<String>,
    query_replies: HashMap<String, String>,
    default_response: Option<String>,
    status_bytes: VecDeque<u8>,
    default_status_byte: u8,
    last_write: Option<String>,
}

impl MockAdapter {
    /// Mock with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that answers every unscripted read with `reply`.
    pub fn with_default_response(mut self, reply: impl Into<String>) -> Self {
        self.default_response = Some(reply.into());
        self
    }

    /// Status byte returned once the scripted ones are used up.
    pub fn with_default_status_byte(mut self, status: u8) -> Self {
        self.default_status_byte = status;
        self
    }

    /// Queue a reply for the next read without a registered reply.
    pub fn push_response(&mut self, reply: impl Into<String>) {
        self.responses.push_back(reply.into());
    }

    /// Queue a status byte for the next poll.
    pub fn push_status_byte(&mut self, status: u8) {
        self.status_bytes.push_back(status);
    }

    /// Answer the read that follows each write of `command` with `reply`.
    pub fn on_query(&mut self, command: impl Into<String>, reply: impl Into<String>) {
        self.query_replies.insert(command.into(), reply.into());
    }

    /// Handle on the transcript that outlives the adapter.
    pub fn log(&self) -> TranscriptLog {
        self.log.clone()
    }
}

#[async_trait]
impl ScpiPort for MockAdapter {
    async fn write(&mut self, command: &str) -> DeviceResult<()> {
        debug!(command, "mock write");
        self.log.push(TranscriptEntry::Write(command.to_string()));
        self.last_write = Some(command.to_string());
        Ok(())
    }

    async fn read(&mut self) -> DeviceResult<String> {
        let reply = self
            .last_write
            .take()
            .and_then(|cmd| self.query_replies.get(&cmd).cloned())
            .or_else(|| self.responses.pop_front())
            .or_else(|| self.default_response.clone())
            .ok_or_else(|| DeviceError::Transport("mock port has no scripted reply".into()))?;
        debug!(reply = %reply, "mock read");
        self.log.push(TranscriptEntry::Read(reply.clone()));
        Ok(reply)
    }

    async fn read_status_byte(&mut self) -> DeviceResult<u8> {
        let status = self
            .status_bytes
            .pop_front()
            .unwrap_or(self.default_status_byte);
        self.log.push(TranscriptEntry::StatusByte(status));
        Ok(status)
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
