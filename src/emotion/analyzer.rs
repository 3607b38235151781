//! Pluggable emotion analyzers.
//!
//! Mirrors this codebase's capability-interface pattern: a trait per
//! behavior plus one concrete type per implementation, selected by name at
//! registry build time rather than by class hierarchy.

use std::collections::HashMap;

use crate::emotion::{EmotionData, EmotionTag};
use crate::error::{OrchestratorError, Result};

/// Strategy interface for picking a primary emotion + confidence from a
/// sentence's tags and/or cleaned text.
pub trait EmotionAnalyzer: Send + Sync + std::fmt::Debug {
    fn analyze(&self, tags: &[EmotionTag], text: &str) -> EmotionData;
}

/// Construct a built-in analyzer by configuration name. Unknown names fail with `config_invalid`, matching
/// the registry's validation contract rather than panicking.
pub fn build_analyzer(name: &str, mode: &str) -> Result<Box<dyn EmotionAnalyzer>> {
    match name {
        "tag" => Ok(Box::new(TagAnalyzer::new(TagAnalyzerMode::parse(mode)?))),
        "keyword" => Ok(Box::new(KeywordAnalyzer::default())),
        other => Err(OrchestratorError::ConfigInvalid(format!(
            "unknown emotion analyzer {other:?}, expected \"tag\" or \"keyword\""
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAnalyzerMode {
    First,
    Frequency,
    Majority,
}

impl TagAnalyzerMode {
    fn parse(mode: &str) -> Result<Self> {
        match mode {
            "first" => Ok(Self::First),
            "frequency" => Ok(Self::Frequency),
            "majority" => Ok(Self::Majority),
            other => Err(OrchestratorError::ConfigInvalid(format!(
                "unknown tag analyzer mode {other:?}, expected first|frequency|majority"
            ))),
        }
    }
}

/// Picks a primary emotion from the extracted tag list.
#[derive(Debug)]
pub struct TagAnalyzer {
    mode: TagAnalyzerMode,
}

impl TagAnalyzer {
    pub fn new(mode: TagAnalyzerMode) -> Self {
        Self { mode }
    }
}

impl EmotionAnalyzer for TagAnalyzer {
    fn analyze(&self, tags: &[EmotionTag], _text: &str) -> EmotionData {
        if tags.is_empty() {
            return EmotionData::neutral();
        }
        let emotions: Vec<String> = tags.iter().map(|t| t.emotion.clone()).collect();

        match self.mode {
            TagAnalyzerMode::First => EmotionData {
                emotions,
                primary: tags[0].emotion.clone(),
                confidence: 1.0,
            },
            TagAnalyzerMode::Frequency | TagAnalyzerMode::Majority => {
                // Count occurrences, breaking ties by first position seen —
                // iterate tags in original order so `entry` insertion order
                // doubles as the tie-break without extra bookkeeping.
                let mut counts: Vec<(String, usize)> = Vec::new();
                for tag in tags {
                    match counts.iter_mut().find(|(e, _)| *e == tag.emotion) {
                        Some((_, c)) => *c += 1,
                        None => counts.push((tag.emotion.clone(), 1)),
                    }
                }
                let total = tags.len() as f32;
                let max_count = counts.iter().map(|(_, c)| *c).max().expect("tags is non-empty");
                let (primary, count) = counts
                    .into_iter()
                    .find(|(_, c)| *c == max_count)
                    .expect("max_count came from this list");
                EmotionData {
                    emotions,
                    primary,
                    confidence: count as f32 / total,
                }
            }
        }
    }
}

/// Scans cleaned text for a fixed per-emotion keyword lexicon.
#[derive(Debug)]
pub struct KeywordAnalyzer {
    lexicon: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for KeywordAnalyzer {
    fn default() -> Self {
        let mut lexicon: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        lexicon.insert("happy", &["happy", "glad", "great", "awesome", "wonderful"]);
        lexicon.insert("sad", &["sad", "sorry", "unfortunately", "regret"]);
        lexicon.insert("angry", &["angry", "frustrated", "annoyed"]);
        lexicon.insert("surprised", &["wow", "surprised", "unexpected"]);
        lexicon.insert("thinking", &["hmm", "let me think", "considering"]);
        Self { lexicon }
    }
}

impl EmotionAnalyzer for KeywordAnalyzer {
    fn analyze(&self, _tags: &[EmotionTag], text: &str) -> EmotionData {
        let lower = text.to_lowercase();
        for (emotion, keywords) in &self.lexicon {
            if keywords.iter().any(|kw| lower.contains(kw)) {
                return EmotionData {
                    emotions: vec![emotion.to_string()],
                    primary: emotion.to_string(),
                    confidence: 1.0,
                };
            }
        }
        EmotionData::neutral()
    }
}
