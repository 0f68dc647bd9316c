//! Error types for scriven.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrivenError {
    // Protocol errors — these become `error` responses on the wire
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Unknown message type: {message_type}")]
    UnknownMessageType { message_type: String },

    #[error("Model not loaded. Call loadModel first.")]
    ModelNotLoaded,

    // Audio errors
    #[error("Audio file not found: {path}")]
    AudioFileNotFound { path: String },

    #[error("Failed to decode audio: {message}")]
    AudioDecode { message: String },

    // Pipeline stage errors
    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    #[error("Word alignment failed: {message}")]
    Alignment { message: String },

    #[error("Diarization failed: {message}")]
    Diarization { message: String },

    // Model management errors
    #[error("Model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Model load failed: {message}")]
    ModelLoad { message: String },

    #[error("Model download failed: {message}")]
    Download { message: String },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    // Passthrough errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScrivenError>;
