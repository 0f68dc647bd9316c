//! Pause-based paragraph segmentation.
//!
//! Word-level timestamps reveal the natural pauses in speech; when a pause
//! exceeds the threshold and enough sentences have accumulated, a paragraph
//! break is inserted. Without word timing the text passes through unchanged.

use crate::transcript::Word;

/// Knobs for [`format_with_paragraphs`].
#[derive(Debug, Clone, Copy)]
pub struct FormatConfig {
    /// Gap (seconds) between a word's end and the next word's start that
    /// qualifies as a paragraph-break candidate.
    pub pause_threshold: f64,
    /// Sentences that must be complete before a pause may break.
    pub min_sentences_per_paragraph: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig {
            pause_threshold: crate::defaults::PARAGRAPH_PAUSE_THRESHOLD,
            min_sentences_per_paragraph: crate::defaults::MIN_SENTENCES_PER_PARAGRAPH,
        }
    }
}

/// Insert paragraph breaks into `text` at qualifying pauses.
///
/// Returns `text` verbatim when there are fewer than two words or when no
/// break qualifies, preserving the original spacing. A second application
/// never splits further because the reflowed text is only returned when
/// breaks exist and word timing is consumed, not re-derived.
pub fn format_with_paragraphs(text: &str, words: &[Word], config: &FormatConfig) -> String {
    if words.len() < 2 {
        return text.to_string();
    }

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current_words: Vec<&str> = Vec::new();
    let mut sentence_count = 0usize;

    for (i, word) in words.iter().enumerate() {
        current_words.push(word.word.as_str());

        if ends_sentence(&word.word) {
            sentence_count += 1;
        }

        if let Some(next) = words.get(i + 1) {
            let gap = next.start - word.end;
            if gap > config.pause_threshold
                && sentence_count >= config.min_sentences_per_paragraph
            {
                paragraphs.push(join_words(&current_words));
                current_words.clear();
                sentence_count = 0;
            }
        }
    }

    if !current_words.is_empty() {
        paragraphs.push(join_words(&current_words));
    }

    // A single paragraph means nothing was split: keep the original text
    // so its formatting survives.
    if paragraphs.len() <= 1 {
        return text.to_string();
    }

    paragraphs.join("\n\n\n")
}

fn ends_sentence(word: &str) -> bool {
    matches!(word.trim_end().chars().last(), Some('.' | '!' | '?'))
}

fn join_words(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
