//! Per-region speaker embeddings.
//!
//! The embedder maps a stretch of speech to a fixed-length vector such
//! that same-speaker stretches land close together under cosine distance.
//! [`AcousticStatsEmbedder`] is the built-in implementation: frame-level
//! energy, zero-crossing and pitch-proxy statistics pooled over the region.
//! A neural embedding model slots in behind the same trait.

use crate::error::{Result, ScrivenError};

/// Trait for speaker-embedding extraction.
pub trait SpeakerEmbedder: Send + Sync {
    /// Embed one speech region (16kHz mono samples).
    fn embed(&self, audio: &[f32], sample_rate: u32) -> Result<Vec<f32>>;

    /// Length of the vectors [`embed`](Self::embed) returns.
    fn dimension(&self) -> usize;
}

/// Embedder built from frame-level acoustic statistics.
#[derive(Debug, Clone)]
pub struct AcousticStatsEmbedder {
    /// Analysis frame length in milliseconds.
    pub frame_ms: u32,
}

impl Default for AcousticStatsEmbedder {
    fn default() -> Self {
        Self { frame_ms: 30 }
    }
}

// mean + stddev of each of: rms, zero-crossing rate, autocorrelation pitch
// proxy, spectral tilt proxy
const DIMENSION: usize = 8;

impl SpeakerEmbedder for AcousticStatsEmbedder {
    fn embed(&self, audio: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        if audio.is_empty() || sample_rate == 0 {
            return Err(ScrivenError::Diarization {
                message: "cannot embed an empty speech region".to_string(),
            });
        }

        let frame_len = (sample_rate as usize * self.frame_ms as usize / 1000).max(2);

        let mut features: [Vec<f32>; 4] = Default::default();
        for frame in audio.chunks(frame_len) {
            if frame.len() < 2 {
                continue;
            }
            features[0].push(rms(frame));
            features[1].push(zero_crossing_rate(frame));
            features[2].push(pitch_proxy(frame, sample_rate));
            features[3].push(spectral_tilt(frame));
        }

        let mut embedding = Vec::with_capacity(DIMENSION);
        for values in &features {
            let (mean, std) = mean_std(values);
            embedding.push(mean);
            embedding.push(std);
        }

        normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

fn rms(frame: &[f32]) -> f32 {
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

fn zero_crossing_rate(frame: &[f32]) -> f32 {
    let crossings = frame
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / (frame.len() - 1) as f32
}

/// Normalized autocorrelation peak location over a plausible pitch range
/// (60..400 Hz). Crude but speaker-discriminative.
fn pitch_proxy(frame: &[f32], sample_rate: u32) -> f32 {
    let min_lag = (sample_rate / 400).max(1) as usize;
    let max_lag = ((sample_rate / 60) as usize).min(frame.len().saturating_sub(1));
    if min_lag >= max_lag {
        return 0.0;
    }

    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy <= f32::EPSILON {
        return 0.0;
    }

    let mut best_lag = min_lag;
    let mut best_corr = f32::MIN;
    for lag in min_lag..=max_lag {
        let corr: f32 = frame[lag..]
            .iter()
            .zip(frame.iter())
            .map(|(a, b)| a * b)
            .sum();
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    // Express as normalized frequency so the feature is rate-independent
    sample_rate as f32 / best_lag as f32 / 400.0
}

/// Ratio of first-difference energy to signal energy: high for bright
/// (high-frequency heavy) voices, low for darker ones.
fn spectral_tilt(frame: &[f32]) -> f32 {
    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy <= f32::EPSILON {
        return 0.0;
    }
    let diff_energy: f32 = frame.windows(2).map(|p| (p[1] - p[0]).powi(2)).sum();
    (diff_energy / energy).sqrt()
}

fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    (mean, variance.sqrt())
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Mock embedder for testing: returns preset vectors in call order,
/// cycling when exhausted.
pub struct MockEmbedder {
    vectors: Vec<Vec<f32>>,
    next: std::sync::atomic::AtomicUsize,
}

impl MockEmbedder {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        assert!(!vectors.is_empty());
        Self {
            vectors,
            next: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl SpeakerEmbedder for MockEmbedder {
    fn embed(&self, _audio: &[f32], _sample_rate: u32) -> Result<Vec<f32>> {
        let i = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(self.vectors[i % self.vectors.len()].clone())
    }

    fn dimension(&self) -> usize {
        self.vectors[0].len()
    }
}
