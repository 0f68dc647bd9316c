//! JSON message protocol spoken over stdin/stdout with the host process.
//!
//! Requests and responses are single JSON objects, one per line, tagged by
//! a `type` field. The `id` field is an opaque value (the host sends
//! numbers or strings); it is echoed back verbatim and never interpreted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;
use crate::transcript::Segment;

fn default_model_size() -> String {
    defaults::DEFAULT_MODEL.to_string()
}

fn default_language() -> String {
    defaults::DEFAULT_LANGUAGE.to_string()
}

fn default_enable_diarization() -> bool {
    true
}

/// Commands accepted on stdin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    LoadModel {
        #[serde(default)]
        id: Option<Value>,
        #[serde(default = "default_model_size")]
        model_size: String,
        #[serde(default = "default_language")]
        language: String,
    },
    #[serde(rename_all = "camelCase")]
    LoadDiarizationModel {
        #[serde(default)]
        id: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Transcribe {
        #[serde(default)]
        id: Option<Value>,
        file_path: String,
        #[serde(default = "default_language")]
        language: String,
        #[serde(default = "default_enable_diarization")]
        enable_diarization: bool,
        #[serde(default)]
        num_speakers: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    Ping {
        #[serde(default)]
        id: Option<Value>,
    },
}

impl Request {
    /// The request `id`, if one was supplied.
    pub fn id(&self) -> Option<&Value> {
        match self {
            Request::LoadModel { id, .. }
            | Request::LoadDiarizationModel { id }
            | Request::Transcribe { id, .. }
            | Request::Ping { id } => id.as_ref(),
        }
    }

    /// Deserialize a request from one JSON line.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Pipeline stage names as they appear in `progress` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Loading,
    Downloading,
    Transcribing,
    Aligning,
    Processing,
    Diarizing,
    Assigning,
    Formatting,
    Complete,
}

impl Stage {
    /// Wire name, also used as the default progress message.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Loading => "loading",
            Stage::Downloading => "downloading",
            Stage::Transcribing => "transcribing",
            Stage::Aligning => "aligning",
            Stage::Processing => "processing",
            Stage::Diarizing => "diarizing",
            Stage::Assigning => "assigning",
            Stage::Formatting => "formatting",
            Stage::Complete => "complete",
        }
    }
}

/// Messages emitted on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// Emitted once at startup, before any command is read.
    #[serde(rename_all = "camelCase")]
    Ready {
        device: String,
        compute_type: String,
        version: String,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        /// -1 denotes indeterminate progress (unknown-size download).
        percent: f64,
        stage: Stage,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    ModelLoaded {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        device: String,
        model_size: String,
    },
    #[serde(rename_all = "camelCase")]
    DiarizationModelLoaded {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        device: String,
    },
    #[serde(rename_all = "camelCase")]
    TranscriptionResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        segments: Vec<Segment>,
        language: String,
        duration: f64,
        speakers: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Value>,
        error: String,
    },
}

impl Response {
    /// Serialize the response to one JSON line (without the newline).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Whether this message ends the request it belongs to. At most one
    /// terminal response is emitted per request id, always last.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Response::Ready { .. } | Response::Progress { .. })
    }
}

/// The `type` tags [`Request`] knows how to parse, used to distinguish
/// "unknown message type" from "known type, bad payload".
pub const KNOWN_REQUEST_TYPES: &[&str] = &["loadModel", "loadDiarizationModel", "transcribe", "ping"];
