//! Audio file loading and conversion.
//!
//! Everything downstream expects mono f32 at 16kHz, so the loader downmixes
//! and resamples whatever the file contains.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, ScrivenError};
use std::io::Read;
use std::path::Path;

/// A decoded waveform ready for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Mono samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Always [`SAMPLE_RATE`] after loading.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load a WAV file and convert it to 16kHz mono f32.
pub fn load_audio_file(path: &Path) -> Result<AudioBuffer> {
    if !path.is_file() {
        return Err(ScrivenError::AudioFileNotFound {
            path: path.display().to_string(),
        });
    }

    let file = std::fs::File::open(path)?;
    load_audio(Box::new(std::io::BufReader::new(file)))
}

/// Load WAV data from any reader.
pub fn load_audio(reader: Box<dyn Read + Send>) -> Result<AudioBuffer> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| ScrivenError::AudioDecode {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    let source_rate = spec.sample_rate;
    let channels = spec.channels.max(1) as usize;

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScrivenError::AudioDecode {
                message: format!("Failed to read WAV samples: {}", e),
            })?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ScrivenError::AudioDecode {
                    message: format!("Failed to read WAV samples: {}", e),
                })?
        }
    };

    // Downmix interleaved frames to mono by averaging channels.
    let mono: Vec<f32> = if channels == 1 {
        raw
    } else {
        raw.chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    let samples = if source_rate != SAMPLE_RATE {
        resample(&mono, source_rate, SAMPLE_RATE)
    } else {
        mono
    };

    Ok(AudioBuffer {
        samples,
        sample_rate: SAMPLE_RATE,
    })
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav_i16(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    fn make_wav_f32(sample_rate: u32, channels: u16, samples: &[f32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_load_16khz_mono_i16_scales_to_unit_range() {
        let data = make_wav_i16(16000, 1, &[0, 16384, -16384, 32767]);
        let buf = load_audio(Box::new(Cursor::new(data))).unwrap();

        assert_eq!(buf.sample_rate, 16000);
        assert_eq!(buf.samples.len(), 4);
        assert!((buf.samples[0]).abs() < 1e-6);
        assert!((buf.samples[1] - 0.5).abs() < 1e-4);
        assert!((buf.samples[2] + 0.5).abs() < 1e-4);
        assert!(buf.samples[3] <= 1.0);
    }

    #[test]
    fn test_load_f32_passthrough() {
        let input = vec![0.0f32, 0.25, -0.5, 1.0];
        let data = make_wav_f32(16000, 1, &input);
        let buf = load_audio(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(buf.samples, input);
    }

    #[test]
    fn test_stereo_downmixes_by_averaging() {
        let data = make_wav_f32(16000, 2, &[0.2, 0.4, -0.6, 0.6]);
        let buf = load_audio(Box::new(Cursor::new(data))).unwrap();

        assert_eq!(buf.samples.len(), 2);
        assert!((buf.samples[0] - 0.3).abs() < 1e-6);
        assert!(buf.samples[1].abs() < 1e-6);
    }

    #[test]
    fn test_48khz_resamples_to_16khz() {
        let input = vec![0.1f32; 48000];
        let data = make_wav_f32(48000, 1, &input);
        let buf = load_audio(Box::new(Cursor::new(data))).unwrap();

        assert_eq!(buf.sample_rate, 16000);
        assert!(buf.samples.len() >= 15900 && buf.samples.len() <= 16100);
        assert!(buf.samples.iter().all(|&s| (s - 0.1).abs() < 1e-4));
    }

    #[test]
    fn test_duration_secs() {
        let buf = AudioBuffer {
            samples: vec![0.0; 24000],
            sample_rate: 16000,
        };
        assert!((buf.duration_secs() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_not_found_error() {
        let result = load_audio_file(Path::new("/nonexistent/audio.wav"));
        match result {
            Err(ScrivenError::AudioFileNotFound { path }) => {
                assert_eq!(path, "/nonexistent/audio.wav");
            }
            other => panic!("expected AudioFileNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_from_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        std::fs::write(&path, make_wav_i16(16000, 1, &[100, 200, 300])).unwrap();

        let buf = load_audio_file(&path).unwrap();
        assert_eq!(buf.samples.len(), 3);
    }

    #[test]
    fn test_garbage_bytes_are_a_decode_error() {
        let garbage: Vec<u8> = (0..500).map(|i| ((i * 17 + 42) % 256) as u8).collect();
        let result = load_audio(Box::new(Cursor::new(garbage)));
        match result {
            Err(ScrivenError::AudioDecode { message }) => {
                assert!(message.contains("Failed to parse WAV"));
            }
            other => panic!("expected AudioDecode, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_resample_identity_and_edges() {
        let samples = vec![0.1f32, 0.2, 0.3];
        assert_eq!(resample(&samples, 16000, 16000), samples);
        assert!(resample(&[], 48000, 16000).is_empty());
        assert_eq!(resample(&[0.5], 48000, 16000), vec![0.5]);
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let resampled = resample(&[0.0, 1.0, 2.0], 8000, 16000);
        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0.0);
        assert!(resampled[1] > 0.0 && resampled[1] < 1.0);
        assert_eq!(resampled[2], 1.0);
    }
}
