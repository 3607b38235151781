//! Output Pipeline: emit a `sentence` event per completed
//! sentence immediately, then synthesize + bundle lipsync concurrently and
//! release `audio_with_expression` events strictly in `seq` order.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::emotion::{extract_emotion_tags, EmotionLipsyncProcessor, EmotionTag};
use crate::error::Result;
use crate::events::{ControlSignal, OutputEvent};
use crate::providers::TtsProvider;

use super::agent::{AgentEvent, AgentEventStream};

pub type OutputEventStream = Pin<Box<dyn Stream<Item = OutputEvent> + Send>>;

/// Drive `agent_events` to completion, stamping and emitting events per the
/// ordering guarantee: `sentence` events emit as soon as each sentence
/// is cut; `audio_with_expression` events are buffered by `seq` and
/// released only once every lower `seq` has already been released.
///
/// Each sentence's own `[word]` emotion tags are extracted and stripped
/// here, relative to that sentence's text, before the clean text is
/// emitted or handed to TTS — distinct from (and run after) whatever
/// tags the Input Pipeline found in the user's message.
pub fn run_output_pipeline(
    mut agent_events: AgentEventStream,
    tts: Arc<dyn TtsProvider>,
    processor: Arc<EmotionLipsyncProcessor>,
    valid_emotions: Vec<String>,
    cancel: CancellationToken,
) -> OutputEventStream {
    let stream = async_stream::stream! {
        let mut jobs: JoinSet<(u64, Result<crate::events::AudioWithExpression>)> = JoinSet::new();
        let mut pending: BTreeMap<u64, Result<crate::events::AudioWithExpression>> = BTreeMap::new();
        let mut next_release: u64 = 0;
        let mut next_seq: u64 = 0;
        let mut done = false;

        loop {
            if cancel.is_cancelled() {
                jobs.shutdown().await;
                yield OutputEvent::Control {
                    signal: ControlSignal::Interrupted,
                    seq: None,
                };
                return;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    jobs.shutdown().await;
                    yield OutputEvent::Control {
                        signal: ControlSignal::Interrupted,
                        seq: None,
                    };
                    return;
                }
                next = agent_events.next(), if !done => {
                    match next {
                        Some(Ok(AgentEvent::Sentence(raw_text))) => {
                            let seq = next_seq;
                            next_seq += 1;
                            let (text, tags) = extract_emotion_tags(&raw_text, &valid_emotions);
                            yield OutputEvent::Sentence { text: text.clone(), seq };

                            let tts = tts.clone();
                            let processor = processor.clone();
                            jobs.spawn(async move {
                                let result = synth_and_process(&*tts, &*processor, &text, &tags).await;
                                (seq, result)
                            });
                        }
                        Some(Ok(AgentEvent::Done)) => {
                            done = true;
                        }
                        Some(Err(e)) => {
                            yield OutputEvent::Error {
                                kind: e.code(),
                                message: e.message(),
                                seq: None,
                            };
                            done = true;
                        }
                        None => {
                            done = true;
                        }
                    }
                }
                Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                    if let Ok((seq, result)) = joined {
                        pending.insert(seq, result);
                    }
                }
            }

            while let Some(result) = pending.remove(&next_release) {
                match result {
                    Ok(payload) => {
                        yield OutputEvent::AudioWithExpression { payload, seq: next_release };
                    }
                    Err(e) => {
                        yield OutputEvent::Error {
                            kind: e.code(),
                            message: e.message(),
                            seq: Some(next_release),
                        };
                    }
                }
                next_release += 1;
            }

            if done && jobs.is_empty() && pending.is_empty() {
                yield OutputEvent::Control {
                    signal: ControlSignal::ConversationEnd,
                    seq: None,
                };
                return;
            }
        }
    };

    Box::pin(stream)
}

async fn synth_and_process(
    tts: &dyn TtsProvider,
    processor: &EmotionLipsyncProcessor,
    text: &str,
    tags: &[EmotionTag],
) -> Result<crate::events::AudioWithExpression> {
    let (audio_bytes, format) = tts.synthesize(text).await?;
    processor.process(text, tags, &audio_bytes, &format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmotionConfig;
    use async_trait::async_trait;
    use futures_util::stream;

    struct StubTts;

    #[async_trait]
    impl TtsProvider for StubTts {
        async fn synthesize(&self, _text: &str) -> Result<(Vec<u8>, String)> {
            Ok((synthetic_wav(), "wav".to_string()))
        }
    }

    struct FailingTts;

    #[async_trait]
    impl TtsProvider for FailingTts {
        async fn synthesize(&self, _text: &str) -> Result<(Vec<u8>, String)> {
            Err(crate::error::OrchestratorError::TtsUnavailable("down".into()))
        }
    }

    fn synthetic_wav() -> Vec<u8> {
        let sample_rate = 16_000u32;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..1600 {
                let v = ((i as f32 / sample_rate as f32 * 440.0 * std::f32::consts::TAU).sin() * 4000.0) as i16;
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn agent_stream_of(events: Vec<AgentEvent>) -> AgentEventStream {
        Box::pin(stream::iter(events.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn emits_sentence_then_audio_then_conversation_end() {
        let events = agent_stream_of(vec![
            AgentEvent::Sentence("Hi!".into()),
            AgentEvent::Sentence("Bye.".into()),
            AgentEvent::Done,
        ]);
        let processor = Arc::new(EmotionLipsyncProcessor::from_config(&EmotionConfig::default()).unwrap());
        let out = run_output_pipeline(events, Arc::new(StubTts), processor, vec![], CancellationToken::new());
        let results: Vec<OutputEvent> = out.collect().await;

        assert!(matches!(results[0], OutputEvent::Sentence { seq: 0, .. }));
        assert!(matches!(results[1], OutputEvent::Sentence { seq: 1, .. }));
        assert!(matches!(results.last().unwrap(), OutputEvent::Control { signal: ControlSignal::ConversationEnd, .. }));

        let audio_seqs: Vec<u64> = results
            .iter()
            .filter_map(|e| match e {
                OutputEvent::AudioWithExpression { seq, .. } => Some(*seq),
                _ => None,
            })
            .collect();
        assert_eq!(audio_seqs, vec![0, 1]);
    }

    #[tokio::test]
    async fn tts_failure_emits_sentence_then_error_and_continues() {
        let events = agent_stream_of(vec![AgentEvent::Sentence("Hi!".into()), AgentEvent::Done]);
        let processor = Arc::new(EmotionLipsyncProcessor::from_config(&EmotionConfig::default()).unwrap());
        let out = run_output_pipeline(events, Arc::new(FailingTts), processor, vec![], CancellationToken::new());
        let results: Vec<OutputEvent> = out.collect().await;

        assert!(matches!(results[0], OutputEvent::Sentence { seq: 0, .. }));
        assert!(matches!(
            results[1],
            OutputEvent::Error {
                kind: "tts_unavailable",
                seq: Some(0),
                ..
            }
        ));
        assert!(matches!(results.last().unwrap(), OutputEvent::Control { signal: ControlSignal::ConversationEnd, .. }));
    }

    #[tokio::test]
    async fn cancellation_before_any_sentence_emits_interrupted_only() {
        let events = agent_stream_of(vec![AgentEvent::Sentence("Hi!".into())]);
        let processor = Arc::new(EmotionLipsyncProcessor::from_config(&EmotionConfig::default()).unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = run_output_pipeline(events, Arc::new(StubTts), processor, vec![], cancel);
        let results: Vec<OutputEvent> = out.collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], OutputEvent::Control { signal: ControlSignal::Interrupted, .. }));
    }

    #[tokio::test]
    async fn sentence_event_has_bracketed_tags_stripped_before_tts() {
        let events = agent_stream_of(vec![AgentEvent::Sentence("Sure [happy]!".into()), AgentEvent::Done]);
        let processor = Arc::new(EmotionLipsyncProcessor::from_config(&EmotionConfig::default()).unwrap());
        let out = run_output_pipeline(
            events,
            Arc::new(StubTts),
            processor,
            vec!["happy".to_string()],
            CancellationToken::new(),
        );
        let results: Vec<OutputEvent> = out.collect().await;

        let sentence = results
            .iter()
            .find_map(|e| match e {
                OutputEvent::Sentence { text, .. } => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(sentence, "Sure!");

        let audio = results
            .iter()
            .find_map(|e| match e {
                OutputEvent::AudioWithExpression { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(audio.timeline[0].emotion, "happy");
    }
}
