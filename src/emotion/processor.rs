//! Emotion + Lipsync Processor: turns a sentence's synthesized
//! audio and its extracted emotion tags into the bundled
//! [`AudioWithExpression`](crate::events::AudioWithExpression) payload.

use crate::config::EmotionConfig;
use crate::emotion::{build_analyzer, build_strategy, EmotionAnalyzer, EmotionTag, TimelineStrategy};
use crate::error::Result;
use crate::events::AudioWithExpression;

use super::envelope::{compute_volume_envelope, decode_to_mono_f32};

#[derive(Debug)]
pub struct EmotionLipsyncProcessor {
    analyzer: Box<dyn EmotionAnalyzer>,
    strategy: Box<dyn TimelineStrategy>,
}

impl EmotionLipsyncProcessor {
    pub fn from_config(config: &EmotionConfig) -> Result<Self> {
        let analyzer = build_analyzer(&config.analyzer, &config.analyzer_mode)?;
        let strategy = build_strategy(
            &config.strategy,
            config.strategy_min_duration,
            config.strategy_weights.clone(),
            config.strategy_transition,
        )?;
        Ok(Self { analyzer, strategy })
    }

    /// Decode `audio_bytes`, compute its volume envelope, pick the primary
    /// emotion, and build a timeline — the full pipeline for one
    /// sentence's synthesized audio. `seq` is not stamped here: that is the
    /// Output Pipeline's responsibility.
    pub fn process(
        &self,
        text: &str,
        tags: &[EmotionTag],
        audio_bytes: &[u8],
        format: &str,
    ) -> Result<AudioWithExpression> {
        let (samples, sample_rate) = decode_to_mono_f32(audio_bytes, format)?;
        let total_duration = if sample_rate > 0 {
            samples.len() as f32 / sample_rate as f32
        } else {
            0.0
        };
        let volumes = compute_volume_envelope(&samples, sample_rate);
        let emotion_data = self.analyzer.analyze(tags, text);
        tracing::debug!(
            primary = %emotion_data.primary,
            confidence = emotion_data.confidence,
            "sentence emotion analyzed"
        );
        let timeline = self.strategy.build(tags, total_duration);

        Ok(AudioWithExpression {
            audio_bytes_base64: base64_encode(audio_bytes),
            format: format.to_string(),
            volumes,
            timeline,
            total_duration,
            text: text.to_string(),
        })
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
