use std::sync::Arc;

use crate::error::{Result, ScrivenError};
use crate::transcript::Segment;

/// What the recognition stage produces: chronological, non-overlapping
/// segments plus the language that was detected (or confirmed).
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionOutput {
    pub segments: Vec<Segment>,
    pub language: String,
}

/// Trait for speech recognition.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Recognizer: Send + Sync {
    /// Recognize speech in 16kHz mono f32 samples.
    ///
    /// `language` is a BCP-47-ish code ("en", "de"); `None` requests
    /// automatic detection.
    fn recognize(&self, audio: &[f32], language: Option<&str>) -> Result<RecognitionOutput>;

    /// Name of the loaded model ("base", "small.en", ...).
    fn model_size(&self) -> &str;

    /// Check if the recognizer is ready.
    fn is_ready(&self) -> bool;
}

/// Implement Recognizer for Arc<T> to allow sharing across requests.
impl<T: Recognizer + ?Sized> Recognizer for Arc<T> {
    fn recognize(&self, audio: &[f32], language: Option<&str>) -> Result<RecognitionOutput> {
        (**self).recognize(audio, language)
    }

    fn model_size(&self) -> &str {
        (**self).model_size()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock recognizer for testing.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    model_size: String,
    segments: Vec<Segment>,
    language: String,
    should_fail: bool,
}

impl MockRecognizer {
    /// Create a new mock recognizer with default settings.
    pub fn new(model_size: &str) -> Self {
        Self {
            model_size: model_size.to_string(),
            segments: vec![Segment::new(0.0, 1.0, "mock recognition")],
            language: "en".to_string(),
            should_fail: false,
        }
    }

    /// Configure the mock to return specific segments.
    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    /// Configure the detected language.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Configure the mock to fail on recognize.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Recognizer for MockRecognizer {
    fn recognize(&self, _audio: &[f32], language: Option<&str>) -> Result<RecognitionOutput> {
        if self.should_fail {
            return Err(ScrivenError::Recognition {
                message: "mock recognition failure".to_string(),
            });
        }
        Ok(RecognitionOutput {
            segments: self.segments.clone(),
            language: language.unwrap_or(&self.language).to_string(),
        })
    }

    fn model_size(&self) -> &str {
        &self.model_size
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
