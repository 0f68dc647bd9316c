//! Whisper-backed recognition and word alignment.
//!
//! One loaded model serves both stages: recognition is a plain segment
//! pass, alignment re-runs inference with token timestamps and a one-token
//! segment limit so every output span is a single word, then folds those
//! words back into the recognizer's segments.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be
//! installed:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use std::path::PathBuf;

use crate::defaults;
use crate::error::{Result, ScrivenError};
use crate::stt::align::WordAligner;
use crate::stt::recognizer::{RecognitionOutput, Recognizer};
use crate::transcript::{Segment, Word};

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperEngineConfig {
    /// Path to the ggml model file
    pub model_path: PathBuf,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl Default for WhisperEngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            threads: None,
        }
    }
}

/// Whisper implementation of [`Recognizer`] and [`WordAligner`].
///
/// The WhisperContext is wrapped in a Mutex: the control thread is the only
/// caller, but the type must be Sync to sit behind `Arc<dyn Recognizer>`.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: Mutex<WhisperContext>,
    config: WhisperEngineConfig,
    model_size: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("model_size", &self.model_size)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper engine placeholder (without whisper feature).
///
/// This is a stub implementation that returns errors when used.
/// Enable the `whisper` feature to use real recognition.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine {
    config: WhisperEngineConfig,
    model_size: String,
}

/// "ggml-base.en" → "base.en"
fn model_size_from_path(path: &std::path::Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem.strip_prefix("ggml-").unwrap_or(stem))
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Load the model.
    ///
    /// # Errors
    /// Returns `ScrivenError::ModelNotFound` if the model file doesn't exist
    /// and `ScrivenError::ModelLoad` if whisper.cpp rejects it.
    pub fn new(config: WhisperEngineConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once).
        // Anything printed to stdout would corrupt the message stream.
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(ScrivenError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_size = model_size_from_path(&config.model_path);

        let mut context_params = WhisperContextParameters::default();
        // Fused attention kernels avoid the standalone softmax CUDA kernel,
        // which crashes on Blackwell GPUs (sm_120) with ggml <= 1.7.6
        context_params.flash_attn(true);
        let context = WhisperContext::new_with_params(
            config
                .model_path
                .to_str()
                .ok_or_else(|| ScrivenError::ModelLoad {
                    message: "Invalid UTF-8 in model path".to_string(),
                })?,
            context_params,
        )
        .map_err(|e| ScrivenError::ModelLoad {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_size,
        })
    }

    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }

    fn base_params<'a>(&self, language: Option<&'a str>) -> FullParams<'a, 'a> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // None requests whisper's language auto-detection
        params.set_language(language);

        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        // Nothing may reach stdout except protocol messages
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Create the stub engine. Only validates that the model file exists.
    pub fn new(config: WhisperEngineConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(ScrivenError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_size = model_size_from_path(&config.model_path);
        Ok(Self { config, model_size })
    }

    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
fn feature_disabled_error() -> ScrivenError {
    ScrivenError::Recognition {
        message: concat!(
            "Whisper feature not enabled. This binary was built without speech recognition.\n",
            "To fix: cargo build --release (whisper is enabled by default)\n",
            "If build fails with cmake errors, install: sudo apt install cmake"
        )
        .to_string(),
    }
}

#[cfg(feature = "whisper")]
impl Recognizer for WhisperEngine {
    fn recognize(&self, audio: &[f32], language: Option<&str>) -> Result<RecognitionOutput> {
        let context = self
            .context
            .lock()
            .map_err(|e| ScrivenError::Recognition {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| ScrivenError::Recognition {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        let requested = language.filter(|l| *l != defaults::AUTO_LANGUAGE);
        let params = self.base_params(requested);

        state
            .full(params, audio)
            .map_err(|e| ScrivenError::Recognition {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let lang_id = state.full_lang_id_from_state();
        let detected = whisper_rs::get_lang_str(lang_id).unwrap_or("").to_string();
        let language = requested.map(str::to_string).unwrap_or(detected);

        let mut segments = Vec::new();
        for segment in state.as_iter() {
            let text = segment.to_string().trim().to_string();
            if text.is_empty() {
                continue;
            }
            // Timestamps are centiseconds
            segments.push(Segment::new(
                segment.start_timestamp() as f64 / 100.0,
                segment.end_timestamp() as f64 / 100.0,
                text,
            ));
        }

        Ok(RecognitionOutput { segments, language })
    }

    fn model_size(&self) -> &str {
        &self.model_size
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(feature = "whisper")]
impl WordAligner for WhisperEngine {
    fn align(&self, segments: &[Segment], audio: &[f32]) -> Result<Vec<Segment>> {
        let context = self
            .context
            .lock()
            .map_err(|e| ScrivenError::Alignment {
                message: format!("Failed to acquire context lock: {}", e),
            })?;

        let mut state = context
            .create_state()
            .map_err(|e| ScrivenError::Alignment {
                message: format!("Failed to create Whisper state: {}", e),
            })?;

        // One word per output span: token timestamps with a 1-char segment
        // budget and word-boundary splitting.
        let mut params = self.base_params(None);
        params.set_token_timestamps(true);
        params.set_split_on_word(true);
        params.set_max_len(1);

        state
            .full(params, audio)
            .map_err(|e| ScrivenError::Alignment {
                message: format!("Whisper alignment pass failed: {}", e),
            })?;

        let mut words = Vec::new();
        for span in state.as_iter() {
            let text = span.to_string().trim().to_string();
            if text.is_empty() {
                continue;
            }
            words.push(Word::new(
                text,
                span.start_timestamp() as f64 / 100.0,
                span.end_timestamp() as f64 / 100.0,
            ));
        }

        Ok(fold_words_into_segments(segments, words))
    }
}

/// Assign each timed word to the segment whose span contains its midpoint,
/// falling back to the nearest segment. Segment text and order are kept
/// from the recognition pass.
fn fold_words_into_segments(segments: &[Segment], words: Vec<Word>) -> Vec<Segment> {
    let mut aligned: Vec<Segment> = segments
        .iter()
        .map(|s| {
            let mut s = s.clone();
            s.words.clear();
            s
        })
        .collect();

    if aligned.is_empty() {
        return aligned;
    }

    for word in words {
        let midpoint = (word.start + word.end) / 2.0;
        let index = aligned
            .iter()
            .position(|s| midpoint >= s.start && midpoint < s.end)
            .unwrap_or_else(|| {
                // Past the last segment end (or in a gap): pick the segment
                // with the closest boundary.
                let mut best = 0;
                let mut best_distance = f64::MAX;
                for (i, s) in aligned.iter().enumerate() {
                    let distance = if midpoint < s.start {
                        s.start - midpoint
                    } else {
                        midpoint - s.end
                    };
                    if distance < best_distance {
                        best_distance = distance;
                        best = i;
                    }
                }
                best
            });
        aligned[index].words.push(word);
    }

    aligned
}

#[cfg(not(feature = "whisper"))]
impl Recognizer for WhisperEngine {
    fn recognize(&self, _audio: &[f32], _language: Option<&str>) -> Result<RecognitionOutput> {
        Err(feature_disabled_error())
    }

    fn model_size(&self) -> &str {
        &self.model_size
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(not(feature = "whisper"))]
impl WordAligner for WhisperEngine {
    fn align(&self, _segments: &[Segment], _audio: &[f32]) -> Result<Vec<Segment>> {
        Err(ScrivenError::Alignment {
            message: "Whisper feature not enabled; word alignment unavailable".to_string(),
        })
    }
}
