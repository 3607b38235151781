//! Emotion tagging, analysis, timelines, and the 50 Hz volume envelope
//! that together drive a sentence's lipsync co-processing.

mod analyzer;
mod envelope;
mod processor;
mod timeline;

pub use analyzer::{build_analyzer, EmotionAnalyzer, KeywordAnalyzer, TagAnalyzer, TagAnalyzerMode};
pub use envelope::{compute_volume_envelope, decode_to_mono_f32};
pub use processor::EmotionLipsyncProcessor;
pub use timeline::{
    build_strategy, DurationBasedStrategy, IntensityBasedStrategy, PositionBasedStrategy, TimelineStrategy,
};

use serde::{Deserialize, Serialize};

/// A `[word]`-bracketed tag extracted from model output, with the character
/// offset in the *original* text where it appeared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTag {
    pub emotion: String,
    pub position: usize,
}

/// The result of running an [`EmotionAnalyzer`] over a tag list or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionData {
    pub emotions: Vec<String>,
    pub primary: String,
    pub confidence: f32,
}

impl EmotionData {
    pub fn neutral() -> Self {
        Self {
            emotions: Vec::new(),
            primary: "neutral".to_string(),
            confidence: 0.0,
        }
    }
}

/// One slice of an emotion timeline. Timelines returned by a
/// [`TimelineStrategy`] MUST be sorted by `start`, non-overlapping, and
/// tile `[0, total_duration]` without gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub emotion: String,
    pub start: f32,
    pub duration: f32,
    pub intensity: f32,
}

/// Scan `text` for `[word]` tokens where `word` is in `valid_emotions`,
/// removing matched tokens (and collapsing the resulting double space) and
/// returning the tags found, ordered by position in the *original* text.
///
/// Unknown bracketed words are left untouched in the returned text; a
/// `tracing::warn!` is emitted so operators can spot a persona prompt that
/// drifted from the configured emotion vocabulary.
pub fn extract_emotion_tags(text: &str, valid_emotions: &[String]) -> (String, Vec<EmotionTag>) {
    let mut tags = Vec::new();
    let mut cleaned = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' {
            if let Some(close) = chars[i + 1..].iter().position(|&c| c == ']') {
                let close = i + 1 + close;
                let word: String = chars[i + 1..close].iter().collect();
                if valid_emotions.iter().any(|e| e == &word) {
                    tags.push(EmotionTag { emotion: word, position: i });
                    i = close + 1;
                    continue;
                }
                tracing::warn!(word = %word, "bracketed token is not a recognized emotion, leaving in text");
            }
        }
        cleaned.push(chars[i]);
        i += 1;
    }
    (collapse_spaces(&cleaned), tags)
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}
