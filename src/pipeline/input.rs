//! Input Pipeline: ASR → normalize → emotion-tag extraction.

use async_trait::async_trait;

use crate::emotion::extract_emotion_tags;
use crate::error::{OrchestratorError, Result};
use crate::providers::AsrProvider;

use super::{PipelineContext, RawInput};

/// One chain step. A step halts the chain by setting `ctx.error`;
/// `ctx.skip_remaining` halts it without treating the input as an error
/// (e.g. silence).
#[async_trait]
pub trait InputStep: Send + Sync {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<()>;
}

/// Step 1: transcribe audio input, or pass text through untouched.
pub struct AsrStep {
    pub asr: std::sync::Arc<dyn AsrProvider>,
}

#[async_trait]
impl InputStep for AsrStep {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<()> {
        match ctx.raw_input.take() {
            Some(RawInput::Text(text)) => {
                ctx.text = Some(text);
            }
            Some(RawInput::Audio(samples)) => {
                let text = self.asr.transcribe(&samples).await?;
                if text.is_empty() {
                    ctx.skip_remaining = true;
                } else {
                    ctx.text = Some(text);
                }
            }
            None => {
                // `raw_input` already consumed by an earlier ASR step; the
                // pipeline invariant means this step is then a no-op.
            }
        }
        Ok(())
    }
}

/// Step 2: collapse whitespace, strip control characters, trim.
/// Bracketed emotion tags are untouched here — they are handled by
/// [`EmotionTagStep`].
pub struct NormalizeStep;

#[async_trait]
impl InputStep for NormalizeStep {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<()> {
        if ctx.skip_remaining || ctx.error.is_some() {
            return Ok(());
        }
        if let Some(text) = ctx.text.take() {
            ctx.text = Some(normalize(&text));
        }
        Ok(())
    }
}

fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_control() && c != '\n' {
            continue;
        }
        let is_space = c.is_whitespace();
        if is_space {
            if !last_was_space {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
        last_was_space = is_space;
    }
    out.trim().to_string()
}

/// Step 3: scan `[word]` tokens against the configured emotion
/// vocabulary, recording each as an [`EmotionTag`](crate::emotion::EmotionTag)
/// and stripping matched tokens from the text.
pub struct EmotionTagStep {
    pub valid_emotions: Vec<String>,
}

#[async_trait]
impl InputStep for EmotionTagStep {
    async fn process(&self, ctx: &mut PipelineContext) -> Result<()> {
        if ctx.skip_remaining || ctx.error.is_some() {
            return Ok(());
        }
        if let Some(text) = ctx.text.take() {
            let (clean, tags) = extract_emotion_tags(&text, &self.valid_emotions);
            ctx.text = Some(clean);
            ctx.emotion_tags = tags.clone();
            ctx.metadata.insert(
                "emotion_tags".to_string(),
                serde_json::to_value(&tags).unwrap_or(serde_json::Value::Null),
            );
        }
        Ok(())
    }
}

/// Outcome of running the full chain: whether the turn should proceed to
/// the Agent Stream, or be short-circuited (silence or an error).
pub enum InputPipelineOutcome {
    Proceed,
    Skip,
    Failed(OrchestratorError),
}

/// Run `steps` in order over `ctx`, stopping at the first step that sets
/// `skip_remaining` or `error`.
pub async fn run_input_pipeline(
    ctx: &mut PipelineContext,
    steps: &[Box<dyn InputStep>],
) -> InputPipelineOutcome {
    for step in steps {
        if ctx.skip_remaining || ctx.error.is_some() {
            break;
        }
        if let Err(e) = step.process(ctx).await {
            ctx.error = Some(e);
            break;
        }
    }
    if let Some(e) = ctx.error.take() {
        InputPipelineOutcome::Failed(e)
    } else if ctx.skip_remaining {
        InputPipelineOutcome::Skip
    } else {
        InputPipelineOutcome::Proceed
    }
}
