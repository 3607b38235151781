//! Input Pipeline, Agent Stream, and Output Pipeline: ASR-to-text, LLM
//! streaming cut into sentences, and TTS+lipsync synthesis in seq order.

mod agent;
mod input;
mod output;
mod sentence;

pub use agent::{run_agent_stream, AgentEvent, AgentEventStream};
pub use input::{
    run_input_pipeline, AsrStep, EmotionTagStep, InputPipelineOutcome, InputStep, NormalizeStep,
};
pub use output::{run_output_pipeline, OutputEventStream};
pub use sentence::SentenceAccumulator;

use std::collections::HashMap;

use crate::emotion::EmotionTag;
use crate::error::OrchestratorError;

/// What a session handed the Input Pipeline: either already-transcribed
/// text or raw PCM awaiting ASR.
#[derive(Debug, Clone)]
pub enum RawInput {
    Audio(Vec<f32>),
    Text(String),
}

/// Transient, one per input. Invariant: once `text`
/// is set, no step may set `raw_input` again — enforced by consuming
/// `raw_input` in the ASR step rather than merely reading it.
#[derive(Debug, Default)]
pub struct PipelineContext {
    pub raw_input: Option<RawInput>,
    pub text: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub skip_remaining: bool,
    pub error: Option<OrchestratorError>,
    pub emotion_tags: Vec<EmotionTag>,
}

impl PipelineContext {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            raw_input: Some(RawInput::Text(text.into())),
            ..Self::default()
        }
    }

    pub fn from_audio(samples: Vec<f32>) -> Self {
        Self {
            raw_input: Some(RawInput::Audio(samples)),
            ..Self::default()
        }
    }
}
