//! Speech-region detection for the diarizer.
//!
//! Splits the waveform into contiguous speech regions using per-frame RMS
//! energy, then applies the classic smoothing pair: gaps shorter than
//! `min_duration_off` are bridged, regions shorter than `min_duration_on`
//! are dropped.

use crate::defaults;

/// A contiguous stretch of speech, in seconds from the start of the audio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechRegion {
    pub start: f64,
    pub end: f64,
}

impl SpeechRegion {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Trait for speech/non-speech segmentation.
pub trait SpeechSegmenter: Send + Sync {
    fn segment(&self, audio: &[f32], sample_rate: u32) -> Vec<SpeechRegion>;
}

/// RMS-energy segmenter.
#[derive(Debug, Clone)]
pub struct EnergySegmenter {
    /// RMS level above which a frame counts as speech.
    pub energy_threshold: f32,
    /// Regions shorter than this are discarded (seconds).
    pub min_duration_on: f64,
    /// Gaps shorter than this are merged (seconds).
    pub min_duration_off: f64,
    /// Analysis frame length in milliseconds.
    pub frame_ms: u32,
}

impl Default for EnergySegmenter {
    fn default() -> Self {
        Self {
            energy_threshold: defaults::SEGMENTER_ENERGY_THRESHOLD,
            min_duration_on: defaults::MIN_DURATION_ON,
            min_duration_off: defaults::MIN_DURATION_OFF,
            frame_ms: 30,
        }
    }
}

impl EnergySegmenter {
    fn frame_len(&self, sample_rate: u32) -> usize {
        (sample_rate as usize * self.frame_ms as usize / 1000).max(1)
    }
}

impl SpeechSegmenter for EnergySegmenter {
    fn segment(&self, audio: &[f32], sample_rate: u32) -> Vec<SpeechRegion> {
        if audio.is_empty() || sample_rate == 0 {
            return Vec::new();
        }

        let frame_len = self.frame_len(sample_rate);
        let frame_secs = frame_len as f64 / sample_rate as f64;

        // Raw regions of consecutive speech frames
        let mut regions: Vec<SpeechRegion> = Vec::new();
        let mut current: Option<SpeechRegion> = None;

        for (i, frame) in audio.chunks(frame_len).enumerate() {
            let start = i as f64 * frame_secs;
            let end = start + frame.len() as f64 / sample_rate as f64;
            let is_speech = rms(frame) >= self.energy_threshold;

            match (&mut current, is_speech) {
                (Some(region), true) => region.end = end,
                (Some(region), false) => {
                    regions.push(*region);
                    current = None;
                }
                (None, true) => current = Some(SpeechRegion { start, end }),
                (None, false) => {}
            }
        }
        if let Some(region) = current {
            regions.push(region);
        }

        // Bridge short gaps first, then drop short regions: a run of short
        // bursts separated by short gaps survives as one region.
        let mut merged: Vec<SpeechRegion> = Vec::new();
        for region in regions {
            match merged.last_mut() {
                Some(last) if region.start - last.end < self.min_duration_off => {
                    last.end = region.end;
                }
                _ => merged.push(region),
            }
        }

        merged
            .into_iter()
            .filter(|r| r.duration() >= self.min_duration_on)
            .collect()
    }
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = frame.iter().map(|s| s * s).sum();
    (sum_squares / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn speech(secs: f64) -> Vec<f32> {
        vec![0.2; (RATE as f64 * secs) as usize]
    }

    fn silence(secs: f64) -> Vec<f32> {
        vec![0.0; (RATE as f64 * secs) as usize]
    }

    fn audio(parts: &[Vec<f32>]) -> Vec<f32> {
        parts.iter().flatten().copied().collect()
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0, 0.0]), 0.0);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_pure_silence_yields_no_regions() {
        let segmenter = EnergySegmenter::default();
        assert!(segmenter.segment(&silence(2.0), RATE).is_empty());
        assert!(segmenter.segment(&[], RATE).is_empty());
    }

    #[test]
    fn test_single_speech_region() {
        let segmenter = EnergySegmenter::default();
        let regions = segmenter.segment(
            &audio(&[silence(1.0), speech(1.0), silence(1.0)]),
            RATE,
        );
        assert_eq!(regions.len(), 1);
        assert!((regions[0].start - 1.0).abs() < 0.05);
        assert!((regions[0].end - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_short_gap_is_bridged() {
        let segmenter = EnergySegmenter::default();
        // 0.3s gap < min_duration_off 0.5s
        let regions = segmenter.segment(
            &audio(&[speech(1.0), silence(0.3), speech(1.0)]),
            RATE,
        );
        assert_eq!(regions.len(), 1);
        assert!(regions[0].duration() > 2.0);
    }

    #[test]
    fn test_long_gap_separates_regions() {
        let segmenter = EnergySegmenter::default();
        let regions = segmenter.segment(
            &audio(&[speech(1.0), silence(1.0), speech(1.0)]),
            RATE,
        );
        assert_eq!(regions.len(), 2);
        assert!(regions[0].end <= regions[1].start);
    }

    #[test]
    fn test_short_burst_is_dropped() {
        let segmenter = EnergySegmenter::default();
        // 0.1s burst < min_duration_on 0.3s, isolated by long silence
        let regions = segmenter.segment(
            &audio(&[silence(1.0), speech(0.1), silence(1.0)]),
            RATE,
        );
        assert!(regions.is_empty());
    }

    #[test]
    fn test_regions_are_ordered_and_disjoint() {
        let segmenter = EnergySegmenter::default();
        let regions = segmenter.segment(
            &audio(&[
                speech(0.5),
                silence(0.8),
                speech(0.5),
                silence(0.8),
                speech(0.5),
            ]),
            RATE,
        );
        assert_eq!(regions.len(), 3);
        for pair in regions.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }
}
