//! Default configuration constants for scriven.
//!
//! This module provides shared constants used across the pipeline stages
//! to ensure consistency and eliminate duplication.

/// Audio sample rate in Hz that every stage expects.
///
/// 16kHz is the standard for speech recognition models; all input audio is
/// resampled to this rate on load.
pub const SAMPLE_RATE: u32 = 16000;

/// Default Whisper model name.
///
/// "base" (multilingual) supports auto-detection of any language.
/// Use "base.en" explicitly for English-only optimized transcription.
pub const DEFAULT_MODEL: &str = "base";

/// Default language code for transcription.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

// Progress checkpoints, as overall percentages of one transcription request.
// Heartbeat stages occupy an open range and approach (never reach) its end;
// the other checkpoints are emitted once when the stage begins.

/// Progress after the audio file has been loaded and resampled.
pub const AUDIO_LOADED_PERCENT: f64 = 5.0;

/// Recognition heartbeat range.
pub const RECOGNITION_PERCENT_START: f64 = 10.0;
pub const RECOGNITION_PERCENT_END: f64 = 38.0;

/// Alignment heartbeat range.
pub const ALIGNMENT_PERCENT_START: f64 = 40.0;
pub const ALIGNMENT_PERCENT_END: f64 = 54.0;

/// Progress when alignment output is being merged back into segments.
pub const PROCESSING_PERCENT: f64 = 55.0;

/// Progress when the diarizer starts reading the audio.
pub const DIARIZING_PERCENT: f64 = 56.0;

/// Diarization sub-progress (0..=100 from the engine) is remapped into
/// this overall range.
pub const DIARIZATION_PERCENT_START: f64 = 58.0;
pub const DIARIZATION_PERCENT_END: f64 = 88.0;

/// Progress when speaker labels are assigned to words and segments.
pub const ASSIGNING_PERCENT: f64 = 90.0;

/// Progress when paragraph formatting runs.
pub const FORMATTING_PERCENT: f64 = 96.0;

/// Progress of the final event before the result message.
pub const COMPLETE_PERCENT: f64 = 100.0;

/// Seconds between heartbeat progress events.
pub const HEARTBEAT_TICK_SECS: u64 = 3;

/// Fraction of a heartbeat range the asymptotic curve may fill. Keeps the
/// reported percent strictly below the stage ceiling however long the
/// stage runs.
pub const HEARTBEAT_CEILING: f64 = 0.95;

/// Expected recognition wall time in seconds, used to shape the heartbeat
/// curve. Not a timeout.
pub const RECOGNITION_EXPECTED_SECS_CPU: f64 = 60.0;
pub const RECOGNITION_EXPECTED_SECS_GPU: f64 = 20.0;

/// Expected alignment wall time in seconds.
pub const ALIGNMENT_EXPECTED_SECS_CPU: f64 = 90.0;
pub const ALIGNMENT_EXPECTED_SECS_GPU: f64 = 30.0;

/// Silence gap (seconds) between words that starts a new paragraph.
pub const PARAGRAPH_PAUSE_THRESHOLD: f64 = 0.7;

/// Sentences required before a pause is allowed to break a paragraph.
pub const MIN_SENTENCES_PER_PARAGRAPH: usize = 3;

/// Agglomerative clustering distance threshold for automatic speaker-count
/// detection.
pub const CLUSTERING_THRESHOLD: f32 = 0.5;

/// Minimum duration (seconds) of a speech region; shorter regions are dropped.
pub const MIN_DURATION_ON: f64 = 0.3;

/// Minimum silence (seconds) between speech regions; shorter gaps are merged.
pub const MIN_DURATION_OFF: f64 = 0.5;

/// RMS energy threshold separating speech frames from silence in the
/// diarizer's segmenter.
pub const SEGMENTER_ENERGY_THRESHOLD: f32 = 0.01;

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}
