//! scriven - speaker-attributed transcription worker
//!
//! A long-running process that turns audio files into speaker-attributed,
//! time-aligned transcripts, driven by line-delimited JSON messages on
//! stdin/stdout.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod device;
pub mod diarize;
pub mod error;
pub mod ipc;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod stt;
pub mod transcript;
pub mod worker;

// Core seams (recognize → align → diarize)
pub use diarize::DiarizationEngine;
pub use stt::align::WordAligner;
pub use stt::recognizer::Recognizer;

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineOutput};

// Error handling
pub use error::{Result, ScrivenError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.0+abc1234"` when git hash is available, `"0.3.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
