use std::sync::Arc;

use crate::error::{Result, ScrivenError};
use crate::transcript::Segment;

/// Trait for word-level timestamp alignment.
///
/// Takes the recognizer's segments and returns them with per-word timing
/// filled in. Implementations must preserve segment order and text.
pub trait WordAligner: Send + Sync {
    fn align(&self, segments: &[Segment], audio: &[f32]) -> Result<Vec<Segment>>;
}

impl<T: WordAligner + ?Sized> WordAligner for Arc<T> {
    fn align(&self, segments: &[Segment], audio: &[f32]) -> Result<Vec<Segment>> {
        (**self).align(segments, audio)
    }
}

/// Mock aligner for testing. By default it splits each segment's text on
/// whitespace and spreads the words evenly across the segment's time span.
#[derive(Debug, Clone, Default)]
pub struct MockAligner {
    should_fail: bool,
}

impl MockAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on align.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl WordAligner for MockAligner {
    fn align(&self, segments: &[Segment], _audio: &[f32]) -> Result<Vec<Segment>> {
        if self.should_fail {
            return Err(ScrivenError::Alignment {
                message: "mock alignment failure".to_string(),
            });
        }

        Ok(segments
            .iter()
            .map(|segment| {
                let mut aligned = segment.clone();
                let tokens: Vec<&str> = segment.text.split_whitespace().collect();
                if tokens.is_empty() {
                    return aligned;
                }
                let step = (segment.end - segment.start) / tokens.len() as f64;
                aligned.words = tokens
                    .iter()
                    .enumerate()
                    .map(|(i, token)| {
                        crate::transcript::Word::new(
                            *token,
                            segment.start + step * i as f64,
                            segment.start + step * (i + 1) as f64,
                        )
                    })
                    .collect();
                aligned
            })
            .collect())
    }
}
