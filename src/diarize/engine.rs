//! The built-in diarization engine: segment → embed → cluster.

use crate::defaults;
use crate::diarize::clustering::{ClusterSpec, cluster};
use crate::diarize::embedder::{AcousticStatsEmbedder, SpeakerEmbedder};
use crate::diarize::segmenter::{EnergySegmenter, SpeechSegmenter};
use crate::diarize::{DiarizationEngine, DiarizationOutput, DiarizeOptions};
use crate::error::Result;
use crate::transcript::SpeakerTurn;

/// Tuning for [`ClusterDiarizer`].
#[derive(Debug, Clone, Copy)]
pub struct ClusterDiarizerConfig {
    /// Merge distance used in auto speaker-count mode. Lower → more
    /// distinct speakers.
    pub clustering_threshold: f32,
    /// Speech regions shorter than this are discarded (seconds).
    pub min_duration_on: f64,
    /// Silence gaps shorter than this are bridged (seconds).
    pub min_duration_off: f64,
    /// RMS speech threshold for the segmenter.
    pub energy_threshold: f32,
}

impl Default for ClusterDiarizerConfig {
    fn default() -> Self {
        Self {
            clustering_threshold: defaults::CLUSTERING_THRESHOLD,
            min_duration_on: defaults::MIN_DURATION_ON,
            min_duration_off: defaults::MIN_DURATION_OFF,
            energy_threshold: defaults::SEGMENTER_ENERGY_THRESHOLD,
        }
    }
}

/// Clustering diarizer over pluggable segmentation and embedding.
pub struct ClusterDiarizer {
    config: ClusterDiarizerConfig,
    segmenter: Box<dyn SpeechSegmenter>,
    embedder: Box<dyn SpeakerEmbedder>,
}

impl ClusterDiarizer {
    pub fn new(config: ClusterDiarizerConfig) -> Self {
        let segmenter = EnergySegmenter {
            energy_threshold: config.energy_threshold,
            min_duration_on: config.min_duration_on,
            min_duration_off: config.min_duration_off,
            ..EnergySegmenter::default()
        };
        Self {
            config,
            segmenter: Box::new(segmenter),
            embedder: Box::new(AcousticStatsEmbedder::default()),
        }
    }

    /// Replace the segmenter (tests, model-backed implementations).
    pub fn with_segmenter(mut self, segmenter: Box<dyn SpeechSegmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Replace the embedder.
    pub fn with_embedder(mut self, embedder: Box<dyn SpeakerEmbedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn speaker_label(index: usize) -> String {
        format!("SPEAKER_{:02}", index)
    }
}

impl DiarizationEngine for ClusterDiarizer {
    fn diarize(
        &self,
        audio: &[f32],
        sample_rate: u32,
        options: &DiarizeOptions,
        progress: &mut dyn FnMut(f64),
    ) -> Result<DiarizationOutput> {
        progress(0.0);

        let regions = self.segmenter.segment(audio, sample_rate);
        if regions.is_empty() {
            progress(100.0);
            return Ok(DiarizationOutput {
                turns: Vec::new(),
                num_speakers: 0,
            });
        }

        // Embedding dominates the cost; report progress as the fraction of
        // speech samples consumed. Reserve the last 10% for clustering.
        let total_speech: f64 = regions.iter().map(|r| r.duration()).sum();
        let mut consumed = 0.0;

        let mut embeddings = Vec::with_capacity(regions.len());
        for region in &regions {
            let lo = (region.start * sample_rate as f64) as usize;
            let hi = ((region.end * sample_rate as f64) as usize).min(audio.len());
            embeddings.push(self.embedder.embed(&audio[lo..hi], sample_rate)?);

            consumed += region.duration();
            progress(90.0 * consumed / total_speech);
        }

        let spec = match options.num_speakers {
            Some(k) if k > 0 => ClusterSpec::Fixed(k),
            _ => ClusterSpec::Auto {
                threshold: self.config.clustering_threshold,
            },
        };
        let labels = cluster(&embeddings, spec);

        // Regions come out of the segmenter in time order and labels are
        // numbered by first occurrence, so the turn list is already sorted
        // and SPEAKER_00 is the first voice heard.
        let turns: Vec<SpeakerTurn> = regions
            .iter()
            .zip(&labels)
            .map(|(region, &label)| {
                SpeakerTurn::new(region.start, region.end, Self::speaker_label(label))
            })
            .collect();
        let num_speakers = labels.iter().max().map(|m| m + 1).unwrap_or(0);

        progress(100.0);
        Ok(DiarizationOutput {
            turns,
            num_speakers,
        })
    }
}
