//! Speaker-to-word assignment: merges the diarizer's speaker timeline into
//! the recognizer's word timeline.
//!
//! Each word takes the speaker whose turn overlaps it the most; a segment
//! takes the majority speaker among its words. Intervals that no turn
//! touches stay unlabeled. Segment order is never changed.

use std::collections::{BTreeSet, HashMap};

use crate::transcript::{Segment, SpeakerTurn};

/// Label words and segments in place from the diarizer's speaker turns.
pub fn assign_speakers(segments: &mut [Segment], turns: &[SpeakerTurn]) {
    for segment in segments.iter_mut() {
        for word in &mut segment.words {
            word.speaker = dominant_speaker(turns, word.start, word.end);
        }

        segment.speaker = if segment.words.is_empty() {
            // No word timing (alignment degraded): label the segment from
            // its own time span.
            dominant_speaker(turns, segment.start, segment.end)
        } else {
            majority_speaker(segment)
        };
    }
}

/// Collect the distinct speaker labels present in the result, sorted.
pub fn collect_speakers(segments: &[Segment]) -> Vec<String> {
    let mut labels: BTreeSet<&str> = BTreeSet::new();
    for segment in segments {
        if let Some(speaker) = &segment.speaker {
            labels.insert(speaker);
        }
        for word in &segment.words {
            if let Some(speaker) = &word.speaker {
                labels.insert(speaker);
            }
        }
    }
    labels.into_iter().map(String::from).collect()
}

/// The speaker whose turns overlap [start, end) the most, if any overlap.
fn dominant_speaker(turns: &[SpeakerTurn], start: f64, end: f64) -> Option<String> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for turn in turns {
        let overlap = turn.overlap(start, end);
        if overlap > 0.0 {
            *totals.entry(turn.speaker.as_str()).or_insert(0.0) += overlap;
        }
    }
    totals
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(speaker, _)| speaker.to_string())
}

/// Majority speaker among a segment's labeled words; ties go to the
/// speaker that appears first in word order.
fn majority_speaker(segment: &Segment) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for word in &segment.words {
        let Some(speaker) = &word.speaker else {
            continue;
        };
        match counts.iter_mut().find(|(s, _)| s == speaker) {
            Some((_, count)) => *count += 1,
            None => counts.push((speaker.as_str(), 1)),
        }
    }
    // max_by_key returns the LAST max; iterate in reverse so the earliest
    // first-appearing speaker wins ties.
    counts
        .iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(speaker, _)| speaker.to_string())
}
