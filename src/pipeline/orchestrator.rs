//! Drives one transcription request through the stage sequence:
//! recognition → alignment → diarization → speaker assignment → formatting.
//!
//! Stage failures follow a fixed policy: recognition failure aborts the
//! request (there is no transcript without it), alignment failure degrades
//! to segment-level timestamps and continues, diarization failure aborts.
//! Either way the worker and its loaded models stay valid for the next
//! request.

use std::sync::Arc;
use std::time::Duration;

use crate::audio::AudioBuffer;
use crate::defaults;
use crate::device::Device;
use crate::diarize::{DiarizationEngine, DiarizeOptions};
use crate::error::{Result, ScrivenError};
use crate::ipc::protocol::Stage;
use crate::pipeline::assign::{assign_speakers, collect_speakers};
use crate::pipeline::format::{FormatConfig, format_with_paragraphs};
use crate::pipeline::stage::{PercentRange, StageOutcome};
use crate::progress::{HeartbeatConfig, HeartbeatGuard, ProgressReporter};
use crate::stt::align::WordAligner;
use crate::stt::recognizer::{RecognitionOutput, Recognizer};
use crate::transcript::Segment;

/// Per-request knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// `None` requests automatic language detection.
    pub language: Option<String>,
    pub enable_diarization: bool,
    /// Speaker-count hint forwarded to the diarizer.
    pub num_speakers: Option<usize>,
    pub format: FormatConfig,
    /// Heartbeat tick interval for the long blocking stages.
    pub tick_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            language: None,
            enable_diarization: true,
            num_speakers: None,
            format: FormatConfig::default(),
            tick_interval: Duration::from_secs(defaults::HEARTBEAT_TICK_SECS),
        }
    }
}

/// The finished transcript, ready to serialize into a result message.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub segments: Vec<Segment>,
    pub language: String,
    /// End of the last segment, in seconds.
    pub duration: f64,
    /// Sorted distinct speaker labels; empty when diarization was off.
    pub speakers: Vec<String>,
}

/// One pipeline run borrows the loaded engines; the worker owns them across
/// requests and rebuilds this wrapper per request from cheap `Arc` clones.
pub struct Pipeline {
    recognizer: Arc<dyn Recognizer>,
    aligner: Arc<dyn WordAligner>,
    diarizer: Option<Arc<dyn DiarizationEngine>>,
    device: Device,
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        aligner: Arc<dyn WordAligner>,
        diarizer: Option<Arc<dyn DiarizationEngine>>,
        device: Device,
    ) -> Self {
        Pipeline {
            recognizer,
            aligner,
            diarizer,
            device,
        }
    }

    /// Run the full pipeline over already-loaded audio, streaming progress
    /// through `reporter`.
    pub fn run(
        &self,
        audio: &AudioBuffer,
        config: &PipelineConfig,
        reporter: &ProgressReporter,
    ) -> Result<PipelineOutput> {
        let recognition = match self.recognize_stage(audio, config, reporter) {
            StageOutcome::Ok(r) => r,
            StageOutcome::Recoverable(e) | StageOutcome::Fatal(e) => return Err(e),
        };

        let mut segments = match self.align_stage(&recognition.segments, audio, config, reporter) {
            StageOutcome::Ok(s) => s,
            StageOutcome::Recoverable(e) => {
                eprintln!(
                    "scriven: word alignment failed, continuing with segment-level timestamps: {e}"
                );
                recognition.segments
            }
            StageOutcome::Fatal(e) => return Err(e),
        };

        reporter.report(
            defaults::PROCESSING_PERCENT,
            Stage::Processing,
            Some("Processing segments..."),
        )?;

        let speakers = if config.enable_diarization {
            match self.diarize_stage(audio, config, reporter) {
                StageOutcome::Ok(turns) => {
                    reporter.report(
                        defaults::ASSIGNING_PERCENT,
                        Stage::Assigning,
                        Some("Assigning speakers to words..."),
                    )?;
                    assign_speakers(&mut segments, &turns);
                    collect_speakers(&segments)
                }
                StageOutcome::Recoverable(e) | StageOutcome::Fatal(e) => return Err(e),
            }
        } else {
            Vec::new()
        };

        reporter.report(
            defaults::FORMATTING_PERCENT,
            Stage::Formatting,
            Some("Formatting results..."),
        )?;
        for segment in &mut segments {
            let trimmed = segment.text.trim().to_string();
            segment.text = if segment.words.is_empty() {
                trimmed
            } else {
                format_with_paragraphs(&trimmed, &segment.words, &config.format)
            };
        }

        let duration = segments.iter().map(|s| s.end).fold(0.0, f64::max);

        reporter.report(
            defaults::COMPLETE_PERCENT,
            Stage::Complete,
            Some("Transcription complete"),
        )?;

        Ok(PipelineOutput {
            segments,
            language: recognition.language,
            duration,
            speakers,
        })
    }

    fn recognize_stage(
        &self,
        audio: &AudioBuffer,
        config: &PipelineConfig,
        reporter: &ProgressReporter,
    ) -> StageOutcome<RecognitionOutput> {
        let heartbeat = HeartbeatGuard::start(
            reporter.clone(),
            HeartbeatConfig::new(
                defaults::RECOGNITION_PERCENT_START,
                defaults::RECOGNITION_PERCENT_END,
                Stage::Transcribing,
                "Running speech recognition...",
                Duration::from_secs_f64(self.device.recognition_expected_secs()),
            )
            .with_tick_interval(config.tick_interval),
        );

        let result = self
            .recognizer
            .recognize(&audio.samples, config.language.as_deref());
        drop(heartbeat);

        match result {
            Ok(output) => StageOutcome::Ok(output),
            Err(e) => StageOutcome::Fatal(e),
        }
    }

    fn align_stage(
        &self,
        segments: &[Segment],
        audio: &AudioBuffer,
        config: &PipelineConfig,
        reporter: &ProgressReporter,
    ) -> StageOutcome<Vec<Segment>> {
        let heartbeat = HeartbeatGuard::start(
            reporter.clone(),
            HeartbeatConfig::new(
                defaults::ALIGNMENT_PERCENT_START,
                defaults::ALIGNMENT_PERCENT_END,
                Stage::Aligning,
                "Aligning words for precise timestamps...",
                Duration::from_secs_f64(self.device.alignment_expected_secs()),
            )
            .with_tick_interval(config.tick_interval),
        );

        let result = self.aligner.align(segments, &audio.samples);
        drop(heartbeat);

        match result {
            Ok(aligned) => StageOutcome::Ok(aligned),
            Err(e) => StageOutcome::Recoverable(e),
        }
    }

    fn diarize_stage(
        &self,
        audio: &AudioBuffer,
        config: &PipelineConfig,
        reporter: &ProgressReporter,
    ) -> StageOutcome<Vec<crate::transcript::SpeakerTurn>> {
        let Some(diarizer) = &self.diarizer else {
            return StageOutcome::Fatal(ScrivenError::Diarization {
                message: "Diarization model not loaded".to_string(),
            });
        };

        if let Err(e) = reporter.report(
            defaults::DIARIZING_PERCENT,
            Stage::Diarizing,
            Some("Running speaker diarization..."),
        ) {
            return StageOutcome::Fatal(e);
        }

        // The engine reports its own 0–100%; remap into this stage's slice
        // of the overall scale. Reporting failures must not abort the run,
        // so they are swallowed inside the closure.
        let range = PercentRange::new(
            defaults::DIARIZATION_PERCENT_START,
            defaults::DIARIZATION_PERCENT_END,
        );
        let mut on_progress = |sub_percent: f64| {
            reporter.report_lossy(
                range.remap(sub_percent),
                Stage::Diarizing,
                Some("Identifying speakers..."),
            );
        };

        let options = DiarizeOptions {
            num_speakers: config.num_speakers,
        };
        match diarizer.diarize(&audio.samples, audio.sample_rate, &options, &mut on_progress) {
            Ok(output) => StageOutcome::Ok(output.turns),
            Err(e) => StageOutcome::Fatal(e),
        }
    }
}
