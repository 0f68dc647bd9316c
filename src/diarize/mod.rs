//! Speaker diarization: who spoke when.
//!
//! The engine contract takes a mono 16kHz waveform plus an optional
//! speaker-count hint and returns speaker turns sorted by start time. The
//! built-in [`ClusterDiarizer`](engine::ClusterDiarizer) composes a speech
//! segmenter, a per-segment speaker embedder, and agglomerative clustering;
//! each of those is a seam, so a model-backed segmenter or embedder plugs
//! in without touching the pipeline.

pub mod clustering;
pub mod embedder;
pub mod engine;
pub mod segmenter;

use crate::error::{Result, ScrivenError};
use crate::transcript::SpeakerTurn;

/// Per-request diarization options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiarizeOptions {
    /// Expected speaker count. A hint > 0 selects fixed-count clustering;
    /// absent or 0 means auto-detect by threshold.
    pub num_speakers: Option<usize>,
}

/// What the diarizer produces.
#[derive(Debug, Clone, PartialEq)]
pub struct DiarizationOutput {
    /// Sorted by start time; labels are "SPEAKER_00", "SPEAKER_01", ...
    /// numbered by first appearance.
    pub turns: Vec<SpeakerTurn>,
    /// Count of distinct labels in `turns`.
    pub num_speakers: usize,
}

/// Trait for speaker diarization engines.
///
/// `progress` is invoked with monotonically non-decreasing percentages in
/// [0, 100] as processing advances through the waveform. The callback is
/// infallible by construction; callers that forward progress over fallible
/// channels must swallow those failures inside the closure so a reporting
/// problem can never abort diarization.
pub trait DiarizationEngine: Send + Sync {
    fn diarize(
        &self,
        audio: &[f32],
        sample_rate: u32,
        options: &DiarizeOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<DiarizationOutput>;
}

impl<T: DiarizationEngine + ?Sized> DiarizationEngine for std::sync::Arc<T> {
    fn diarize(
        &self,
        audio: &[f32],
        sample_rate: u32,
        options: &DiarizeOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<DiarizationOutput> {
        (**self).diarize(audio, sample_rate, options, progress)
    }
}

/// Mock diarization engine for testing.
#[derive(Debug, Clone)]
pub struct MockDiarizationEngine {
    turns: Vec<SpeakerTurn>,
    progress_ticks: Vec<f64>,
    should_fail: bool,
}

impl Default for MockDiarizationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDiarizationEngine {
    pub fn new() -> Self {
        Self {
            turns: vec![SpeakerTurn::new(0.0, 1.0, "SPEAKER_00")],
            progress_ticks: vec![50.0, 100.0],
            should_fail: false,
        }
    }

    /// Configure the turns the mock returns.
    pub fn with_turns(mut self, turns: Vec<SpeakerTurn>) -> Self {
        self.turns = turns;
        self
    }

    /// Configure the sub-progress percentages reported during diarize.
    pub fn with_progress_ticks(mut self, ticks: Vec<f64>) -> Self {
        self.progress_ticks = ticks;
        self
    }

    /// Configure the mock to fail on diarize.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl DiarizationEngine for MockDiarizationEngine {
    fn diarize(
        &self,
        _audio: &[f32],
        _sample_rate: u32,
        _options: &DiarizeOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<DiarizationOutput> {
        if self.should_fail {
            return Err(ScrivenError::Diarization {
                message: "mock diarization failure".to_string(),
            });
        }
        for tick in &self.progress_ticks {
            progress(*tick);
        }
        let num_speakers = {
            let mut labels: Vec<&str> = self.turns.iter().map(|t| t.speaker.as_str()).collect();
            labels.sort_unstable();
            labels.dedup();
            labels.len()
        };
        Ok(DiarizationOutput {
            turns: self.turns.clone(),
            num_speakers,
        })
    }
}
