//! The transcription pipeline: recognition → alignment → diarization →
//! speaker assignment → paragraph formatting.

pub mod assign;
pub mod format;
pub mod orchestrator;
pub mod stage;

pub use orchestrator::{Pipeline, PipelineConfig, PipelineOutput};
pub use stage::{PercentRange, StageOutcome};
