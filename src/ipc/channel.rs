//! Line-delimited JSON transport.
//!
//! The worker owns stdout exclusively: every byte written there is one JSON
//! message followed by a newline, flushed immediately so the host sees
//! progress in real time. Diagnostics go to stderr, never stdout.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::error::{Result, ScrivenError};
use crate::ipc::protocol::{KNOWN_REQUEST_TYPES, Request, Response};

/// Shared handle for writing messages. Cloneable so the heartbeat thread
/// can emit progress while the control thread owns the pipeline; the mutex
/// keeps each line atomic.
#[derive(Clone)]
pub struct MessageWriter {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl MessageWriter {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        MessageWriter {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write one message as a JSON line and flush.
    pub fn send(&self, response: &Response) -> Result<()> {
        let line = response.to_json()?;
        let mut writer = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Parse one input line into a request.
///
/// Distinguishes the three protocol-level failures, each carrying as much
/// correlation info as the line allows:
/// - not JSON at all: error with no `id`;
/// - JSON with an unknown `type`: error naming the type, `id` echoed;
/// - known `type` but bad payload: error with the parse message, `id` echoed.
pub fn parse_request(line: &str) -> std::result::Result<Request, (Option<Value>, ScrivenError)> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return Err((
                None,
                ScrivenError::InvalidJson {
                    message: e.to_string(),
                },
            ));
        }
    };

    let id = value.get("id").filter(|v| !v.is_null()).cloned();

    match serde_json::from_value::<Request>(value.clone()) {
        Ok(request) => Ok(request),
        Err(e) => {
            let message_type = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if KNOWN_REQUEST_TYPES.contains(&message_type.as_str()) {
                Err((
                    id,
                    ScrivenError::InvalidJson {
                        message: e.to_string(),
                    },
                ))
            } else {
                Err((id, ScrivenError::UnknownMessageType { message_type }))
            }
        }
    }
}
