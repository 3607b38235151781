//! Pluggable emotion timeline strategies.
//!
//! Every strategy MUST return segments sorted by `start`, non-overlapping,
//! and tiling `[0, total_duration]` without gaps. An empty tag list
//! produces a single `neutral` segment spanning the whole duration.

use std::collections::HashMap;

use crate::emotion::{EmotionTag, TimelineSegment};
use crate::error::{OrchestratorError, Result};

pub trait TimelineStrategy: Send + Sync + std::fmt::Debug {
    fn build(&self, tags: &[EmotionTag], total_duration: f32) -> Vec<TimelineSegment>;
}

pub fn build_strategy(
    name: &str,
    min_duration: f32,
    weights: HashMap<String, f32>,
    transition: f32,
) -> Result<Box<dyn TimelineStrategy>> {
    match name {
        "position" => Ok(Box::new(PositionBasedStrategy { transition })),
        "duration" => Ok(Box::new(DurationBasedStrategy {
            min_duration,
            weights,
            as_intensity: false,
        })),
        "intensity" => Ok(Box::new(IntensityBasedStrategy(DurationBasedStrategy {
            min_duration,
            weights,
            as_intensity: true,
        }))),
        other => Err(OrchestratorError::ConfigInvalid(format!(
            "unknown emotion timeline strategy {other:?}, expected position|duration|intensity"
        ))),
    }
}

fn neutral_fill(total_duration: f32) -> Vec<TimelineSegment> {
    vec![TimelineSegment {
        emotion: "neutral".to_string(),
        start: 0.0,
        duration: total_duration,
        intensity: 0.0,
    }]
}

/// Splits `[0, D]` into one equal slot per tag, in tag order, optionally
/// overlapping adjacent boundaries by `transition / 2`.
#[derive(Debug)]
pub struct PositionBasedStrategy {
    transition: f32,
}

impl TimelineStrategy for PositionBasedStrategy {
    fn build(&self, tags: &[EmotionTag], total_duration: f32) -> Vec<TimelineSegment> {
        if tags.is_empty() {
            return neutral_fill(total_duration);
        }
        let n = tags.len();
        let slot = total_duration / n as f32;
        let half_t = (self.transition / 2.0).max(0.0);
        (0..n)
            .map(|i| {
                let start = (i as f32 * slot - if i > 0 { half_t } else { 0.0 }).max(0.0);
                let raw_end = (i + 1) as f32 * slot;
                let end = if i + 1 < n {
                    (raw_end + half_t).min(total_duration)
                } else {
                    total_duration
                };
                TimelineSegment {
                    emotion: tags[i].emotion.clone(),
                    start,
                    duration: (end - start).max(0.0),
                    intensity: 1.0,
                }
            })
            .collect()
    }
}

/// Allocates `D` proportionally to each distinct emotion's tag-count weight
/// or configured per-emotion weight, depending on mode.
#[derive(Debug)]
pub struct DurationBasedStrategy {
    min_duration: f32,
    weights: HashMap<String, f32>,
    as_intensity: bool,
}

impl DurationBasedStrategy {
    fn weighted_emotions(&self, tags: &[EmotionTag]) -> Vec<(String, f32)> {
        // Preserve first-occurrence order for sort stability.
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for tag in tags {
            if !counts.contains_key(&tag.emotion) {
                order.push(tag.emotion.clone());
            }
            *counts.entry(tag.emotion.clone()).or_insert(0) += 1;
        }
        order
            .into_iter()
            .map(|emotion| {
                let count = counts[&emotion] as f32;
                let weight = *self.weights.get(&emotion).unwrap_or(&1.0);
                (emotion, count * weight)
            })
            .collect()
    }

    fn build_segments(&self, tags: &[EmotionTag], total_duration: f32) -> Vec<TimelineSegment> {
        if tags.is_empty() {
            return neutral_fill(total_duration);
        }
        let weighted = self.weighted_emotions(tags);
        let total_weight: f32 = weighted.iter().map(|(_, w)| w).sum();

        // First pass: proportional share with the configured floor.
        let mut durations: Vec<f32> = weighted
            .iter()
            .map(|(_, w)| {
                let share = if total_weight > 0.0 {
                    total_duration * (w / total_weight)
                } else {
                    total_duration / weighted.len() as f32
                };
                share.max(self.min_duration.min(total_duration))
            })
            .collect();

        // Rescale so the segments sum exactly to total_duration.
        let sum: f32 = durations.iter().sum();
        if sum > 0.0 {
            let scale = total_duration / sum;
            for d in durations.iter_mut() {
                *d *= scale;
            }
        }

        let max_weight = weighted.iter().map(|(_, w)| *w).fold(0.0f32, f32::max);
        let mut start = 0.0f32;
        let n = weighted.len();
        weighted
            .into_iter()
            .zip(durations)
            .enumerate()
            .map(|(i, ((emotion, weight), duration))| {
                let duration = if i + 1 == n {
                    (total_duration - start).max(0.0)
                } else {
                    duration
                };
                let seg = TimelineSegment {
                    emotion,
                    start,
                    duration,
                    intensity: if self.as_intensity && max_weight > 0.0 {
                        weight / max_weight
                    } else {
                        1.0
                    },
                };
                start += duration;
                seg
            })
            .collect()
    }
}

impl TimelineStrategy for DurationBasedStrategy {
    fn build(&self, tags: &[EmotionTag], total_duration: f32) -> Vec<TimelineSegment> {
        self.build_segments(tags, total_duration)
    }
}

/// Identical layout to [`DurationBasedStrategy`], with `intensity` set to
/// the normalized weight rather than a constant.
#[derive(Debug)]
pub struct IntensityBasedStrategy(DurationBasedStrategy);

impl TimelineStrategy for IntensityBasedStrategy {
    fn build(&self, tags: &[EmotionTag], total_duration: f32) -> Vec<TimelineSegment> {
        self.0.build_segments(tags, total_duration)
    }
}
