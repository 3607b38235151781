//! Agent Stream: drive the LLM fragment stream, cut it into
//! sentences as soon as a boundary appears, and surface cancellation so a
//! barge-in can stop generation mid-reply.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::providers::{ChatMessage, LlmProvider};

use super::sentence::SentenceAccumulator;

/// One unit of agent output: a completed sentence, or the
/// end of the reply (after which the final partial sentence, if any, has
/// already been emitted).
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Sentence(String),
    Done,
}

pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent>> + Send>>;

/// Start the agent stream for one turn. The returned stream yields
/// [`AgentEvent::Sentence`] as soon as each sentence completes and a final
/// [`AgentEvent::Done`], or stops early (with no further items) once
/// `cancel` is triggered — the underlying `LlmFragmentStream` is dropped at
/// that point, satisfying the barge-in contract.
pub async fn run_agent_stream(
    llm: &dyn LlmProvider,
    system_prompt: &str,
    history: &[ChatMessage],
    user_text: &str,
    cancel: CancellationToken,
) -> Result<AgentEventStream> {
    let fragments = llm.chat_stream(system_prompt, history, user_text).await?;

    let stream = async_stream::stream! {
        tokio::pin!(fragments);
        let mut acc = SentenceAccumulator::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return;
                }
                next = fragments.next() => {
                    match next {
                        Some(Ok(accumulated)) => {
                            for sentence in acc.push(&accumulated) {
                                yield Ok(AgentEvent::Sentence(sentence));
                            }
                        }
                        Some(Err(e)) => {
                            yield Err(e);
                            return;
                        }
                        None => {
                            if let Some(tail) = acc.finish() {
                                yield Ok(AgentEvent::Sentence(tail));
                            }
                            yield Ok(AgentEvent::Done);
                            return;
                        }
                    }
                }
            }
        }
    };

    Ok(Box::pin(stream))
}
