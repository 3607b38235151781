//! Conversation Orchestrator: per-session state machine that
//! owns the Input Pipeline, Agent Stream, and Output Pipeline for one turn
//! at a time, plus barge-in and the per-turn wall-clock timeout.

use std::sync::atomic::{AtomicU64, AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::bus::EventBus;
use crate::error::Result;
use crate::events::{ControlSignal, OutputEvent};
use crate::handlers::{register_output_handlers, SendFn};
use crate::pipeline::{
    run_agent_stream, run_input_pipeline, run_output_pipeline, AsrStep, EmotionTagStep,
    InputPipelineOutcome, InputStep, NormalizeStep, PipelineContext, RawInput,
};
use crate::providers::{AsrProvider, ChatMessage, ChatRole, LlmProvider, TtsProvider, VadOutcome, VadProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Listening,
    Processing,
    Speaking,
    Error,
}

#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

struct ActiveTurn {
    turn_id: u64,
    cancel: CancellationToken,
}

/// Everything one connected client's conversation needs: providers,
/// emotion+lipsync processor, the event bus, chat log, and state. Constructed once per client connection by the
/// Session Manager and driven by its inbound-frame demux loop.
pub struct ConversationOrchestrator {
    session_id: String,
    asr: Arc<dyn AsrProvider>,
    tts: Arc<dyn TtsProvider>,
    llm: Arc<dyn LlmProvider>,
    vad: tokio::sync::Mutex<Box<dyn VadProvider>>,
    processor: Arc<crate::emotion::EmotionLipsyncProcessor>,
    bus: Mutex<EventBus>,
    state: Mutex<OrchestratorState>,
    chat_log: Mutex<Vec<ChatEntry>>,
    active_turn: Mutex<Option<ActiveTurn>>,
    turn_counter: AtomicU64,
    system_prompt: String,
    valid_emotions: Vec<String>,
    turn_timeout: Duration,
    self_weak: std::sync::Weak<ConversationOrchestrator>,
}

impl ConversationOrchestrator {
    pub fn new(
        session_id: impl Into<String>,
        asr: Arc<dyn AsrProvider>,
        tts: Arc<dyn TtsProvider>,
        llm: Arc<dyn LlmProvider>,
        vad: Box<dyn VadProvider>,
        processor: Arc<crate::emotion::EmotionLipsyncProcessor>,
        system_prompt: impl Into<String>,
        valid_emotions: Vec<String>,
        turn_timeout: Duration,
        send: SendFn,
    ) -> Arc<Self> {
        let mut bus = EventBus::new();
        register_output_handlers(&mut bus, send);
        Arc::new_cyclic(|weak| Self {
            session_id: session_id.into(),
            asr,
            tts,
            llm,
            vad: tokio::sync::Mutex::new(vad),
            processor,
            bus: Mutex::new(bus),
            state: Mutex::new(OrchestratorState::Idle),
            chat_log: Mutex::new(Vec::new()),
            active_turn: Mutex::new(None),
            turn_counter: AtomicU64::new(0),
            system_prompt: system_prompt.into(),
            valid_emotions,
            turn_timeout,
            self_weak: weak.clone(),
        })
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.lock().unwrap()
    }

    pub fn chat_log(&self) -> Vec<ChatEntry> {
        self.chat_log.lock().unwrap().clone()
    }

    /// `text_input`: begin a turn directly from client-supplied text.
    pub async fn handle_text_input(&self, text: String) {
        self.begin_turn(RawInput::Text(text)).await;
    }

    /// `raw_audio_data`: feed the per-session VAD; a detected
    /// utterance end begins a turn with the captured audio.
    pub async fn handle_raw_audio_data(&self, audio: Vec<i16>) -> Result<()> {
        let samples: Vec<f32> = audio.iter().map(|s| *s as f32 / i16::MAX as f32).collect();
        let outcome = {
            let mut vad = self.vad.lock().await;
            vad.process(&samples).await?
        };
        match outcome {
            VadOutcome::Silence => {}
            VadOutcome::Speaking => {
                let mut state = self.state.lock().unwrap();
                if *state == OrchestratorState::Idle {
                    *state = OrchestratorState::Listening;
                }
            }
            VadOutcome::SpeechEnded { utterance } => {
                self.begin_turn(RawInput::Audio(utterance)).await;
            }
        }
        Ok(())
    }

    /// `mic_audio_end`: force-close the current capture. With no
    /// buffered speech this is silence; the energy VAD itself already emits `SpeechEnded` once
    /// trailing silence crosses its threshold, so this handler's only job
    /// is to cover the case where the client stopped the mic before that
    /// threshold was reached.
    pub async fn handle_mic_audio_end(&self) {
        let was_listening = {
            let mut state = self.state.lock().unwrap();
            let was_listening = *state == OrchestratorState::Listening;
            if was_listening {
                *state = OrchestratorState::Idle;
            }
            was_listening
        };
        if was_listening {
            self.vad.lock().await.reset();
            self.bus.lock().unwrap().emit(&OutputEvent::Control {
                signal: ControlSignal::NoAudioData,
                seq: None,
            });
        }
    }

    /// `interrupt_signal`: cancel the live turn, if
    /// any. The turn task itself appends the partial assistant text and
    /// emits `interrupted` once it observes the cancellation.
    pub fn handle_interrupt_signal(&self) {
        if let Some(turn) = self.active_turn.lock().unwrap().take() {
            turn.cancel.cancel();
        }
    }

    /// `clear_history`: empty the session chat log.
    pub fn handle_clear_history(&self) {
        self.chat_log.lock().unwrap().clear();
    }

    /// `set_log_level`: adjust this session's log verbosity.
    /// Stored for reference by the ambient `tracing` span rather than
    /// mutating a process-global filter.
    pub fn handle_set_log_level(&self, level: String) {
        tracing::info!(session_id = %self.session_id, level = %level, "session log level changed");
    }

    /// Session teardown: cancel → unsubscribe-all → clear-bus →
    /// drop, shared with fatal-error teardown.
    pub fn shutdown(&self) {
        self.handle_interrupt_signal();
        self.bus.lock().unwrap().clear();
    }

    async fn begin_turn(&self, raw_input: RawInput) {
        if let Some(previous) = self.active_turn.lock().unwrap().take() {
            previous.cancel.cancel();
        }

        let turn_id = self.turn_counter.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        *self.active_turn.lock().unwrap() = Some(ActiveTurn {
            turn_id,
            cancel: cancel.clone(),
        });
        *self.state.lock().unwrap() = OrchestratorState::Processing;

        let orchestrator = self
            .self_weak
            .upgrade()
            .expect("orchestrator spawning a turn while being dropped");
        let span = tracing::info_span!("turn", session_id = %self.session_id, turn_id);
        tokio::spawn(async move { orchestrator.run_turn(turn_id, cancel, raw_input).await }.instrument(span));
    }

    async fn run_turn(self: Arc<Self>, turn_id: u64, cancel: CancellationToken, raw_input: RawInput) {
        let mut ctx = match raw_input {
            RawInput::Text(t) => PipelineContext::from_text(t),
            RawInput::Audio(a) => PipelineContext::from_audio(a),
        };

        let steps: Vec<Box<dyn InputStep>> = vec![
            Box::new(AsrStep { asr: self.asr.clone() }),
            Box::new(NormalizeStep),
            Box::new(EmotionTagStep {
                valid_emotions: self.valid_emotions.clone(),
            }),
        ];

        match run_input_pipeline(&mut ctx, &steps).await {
            InputPipelineOutcome::Skip => {
                self.bus.lock().unwrap().emit(&OutputEvent::Control {
                    signal: ControlSignal::NoAudioData,
                    seq: None,
                });
                self.finish_turn(turn_id, String::new());
                return;
            }
            InputPipelineOutcome::Failed(e) => {
                self.bus.lock().unwrap().emit(&OutputEvent::Error {
                    kind: e.code(),
                    message: e.message(),
                    seq: None,
                });
                self.finish_turn(turn_id, String::new());
                return;
            }
            InputPipelineOutcome::Proceed => {}
        }

        let user_text = ctx.text.unwrap_or_default();
        let history = self.build_history();
        self.chat_log.lock().unwrap().push(ChatEntry {
            role: ChatRole::User,
            text: user_text.clone(),
            timestamp: Utc::now(),
        });

        let timed_out = Arc::new(AtomicBool::new(false));
        let timeout_task = {
            let cancel = cancel.clone();
            let timed_out = timed_out.clone();
            let duration = self.turn_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                timed_out.store(true, Ordering::SeqCst);
                cancel.cancel();
            })
        };

        let agent_stream = match run_agent_stream(self.llm.as_ref(), &self.system_prompt, &history, &user_text, cancel.clone()).await {
            Ok(s) => s,
            Err(e) => {
                timeout_task.abort();
                self.bus.lock().unwrap().emit(&OutputEvent::Error {
                    kind: e.code(),
                    message: e.message(),
                    seq: None,
                });
                self.finish_turn(turn_id, String::new());
                return;
            }
        };

        *self.state.lock().unwrap() = OrchestratorState::Speaking;

        let output_stream = run_output_pipeline(
            agent_stream,
            self.tts.clone(),
            self.processor.clone(),
            self.valid_emotions.clone(),
            cancel.clone(),
        );
        tokio::pin!(output_stream);

        let mut assistant_text = String::new();
        while let Some(event) = output_stream.next().await {
            if let OutputEvent::Sentence { text, .. } = &event {
                if !assistant_text.is_empty() {
                    assistant_text.push(' ');
                }
                assistant_text.push_str(text);
            }
            self.bus.lock().unwrap().emit(&event);
        }

        timeout_task.abort();
        if timed_out.load(Ordering::SeqCst) {
            self.bus.lock().unwrap().emit(&OutputEvent::Error {
                kind: "turn_timeout",
                message: format!("turn timed out after {:?}", self.turn_timeout),
                seq: None,
            });
        }

        self.finish_turn(turn_id, assistant_text);
    }

    fn finish_turn(&self, turn_id: u64, assistant_text: String) {
        if !assistant_text.trim().is_empty() {
            self.chat_log.lock().unwrap().push(ChatEntry {
                role: ChatRole::Assistant,
                text: assistant_text.trim().to_string(),
                timestamp: Utc::now(),
            });
        }
        let mut active = self.active_turn.lock().unwrap();
        if matches!(active.as_ref(), Some(t) if t.turn_id == turn_id) {
            *active = None;
        }
        drop(active);
        *self.state.lock().unwrap() = OrchestratorState::Idle;
    }

    fn build_history(&self) -> Vec<ChatMessage> {
        self.chat_log
            .lock()
            .unwrap()
            .iter()
            .map(|e| ChatMessage {
                role: e.role,
                text: e.text.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmotionConfig;
    use crate::emotion::EmotionLipsyncProcessor;
    use crate::events::Frame;
    use crate::providers::{EnergyVadProvider, LlmFragmentStream};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::time::{sleep, Duration as TokioDuration};

    #[derive(Debug)]
    struct EchoAsr;
    #[async_trait]
    impl AsrProvider for EchoAsr {
        async fn transcribe(&self, _pcm: &[f32]) -> Result<String> {
            Ok("hello".to_string())
        }
    }

    struct StubTts;
    #[async_trait]
    impl TtsProvider for StubTts {
        async fn synthesize(&self, _text: &str) -> Result<(Vec<u8>, String)> {
            Ok((vec![0u8; 64], "wav".to_string()))
        }
    }

    struct StubLlm;
    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn chat_stream(&self, _sp: &str, _h: &[ChatMessage], _u: &str) -> Result<LlmFragmentStream> {
            Ok(Box::pin(futures_util::stream::iter(vec![Ok("Hi there.".to_string())])))
        }
    }

    #[derive(Debug)]
    struct SilentAsr;
    #[async_trait]
    impl AsrProvider for SilentAsr {
        async fn transcribe(&self, _pcm: &[f32]) -> Result<String> {
            Ok(String::new())
        }
    }

    fn test_orchestrator(send: SendFn) -> Arc<ConversationOrchestrator> {
        let processor = Arc::new(EmotionLipsyncProcessor::from_config(&EmotionConfig::default()).unwrap());
        ConversationOrchestrator::new(
            "s1",
            Arc::new(EchoAsr),
            Arc::new(StubTts),
            Arc::new(StubLlm),
            Box::new(EnergyVadProvider::new(0.02, 16_000)),
            processor,
            "persona",
            vec!["happy".to_string()],
            Duration::from_secs(5),
            send,
        )
    }

    #[tokio::test]
    async fn empty_asr_transcription_emits_no_audio_data_and_skips_llm() {
        let frames = Arc::new(StdMutex::new(Vec::new()));
        let f = frames.clone();
        let send: SendFn = Arc::new(move |frame: Frame| {
            f.lock().unwrap().push(frame);
            Ok(())
        });
        let processor = Arc::new(EmotionLipsyncProcessor::from_config(&EmotionConfig::default()).unwrap());
        let orchestrator = ConversationOrchestrator::new(
            "s1",
            Arc::new(SilentAsr),
            Arc::new(StubTts),
            Arc::new(StubLlm),
            Box::new(EnergyVadProvider::new(0.02, 16_000)),
            processor,
            "persona",
            vec!["happy".to_string()],
            Duration::from_secs(5),
            send,
        );

        orchestrator.begin_turn(RawInput::Audio(vec![0.0; 100])).await;
        sleep(TokioDuration::from_millis(50)).await;

        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
        let captured = frames.lock().unwrap();
        assert!(captured.iter().any(|f| matches!(f, Frame::Control { text: "no-audio-data" })));
        assert!(!captured.iter().any(|f| matches!(f, Frame::Text { .. })));
        assert!(orchestrator.chat_log().is_empty());
    }

    #[tokio::test]
    async fn text_input_produces_frames_and_returns_to_idle() {
        let frames = Arc::new(StdMutex::new(Vec::new()));
        let f = frames.clone();
        let send: SendFn = Arc::new(move |frame: Frame| {
            f.lock().unwrap().push(frame);
            Ok(())
        });
        let orchestrator = test_orchestrator(send);

        orchestrator.handle_text_input("hello".to_string()).await;
        sleep(TokioDuration::from_millis(50)).await;

        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
        let captured = frames.lock().unwrap();
        assert!(captured.iter().any(|f| matches!(f, Frame::Text { .. })));
        assert!(captured.iter().any(|f| matches!(f, Frame::Control { text: "conversation-end" })));
        assert_eq!(orchestrator.chat_log().len(), 2);
    }

    #[tokio::test]
    async fn interrupt_signal_cancels_live_turn() {
        let send: SendFn = Arc::new(|_frame| Ok(()));
        let orchestrator = test_orchestrator(send);

        orchestrator.handle_text_input("hello".to_string()).await;
        orchestrator.handle_interrupt_signal();
        sleep(TokioDuration::from_millis(50)).await;

        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn clear_history_empties_chat_log() {
        let send: SendFn = Arc::new(|_frame| Ok(()));
        let orchestrator = test_orchestrator(send);
        orchestrator.handle_text_input("hello".to_string()).await;
        sleep(TokioDuration::from_millis(50)).await;
        assert!(!orchestrator.chat_log().is_empty());
        orchestrator.handle_clear_history();
        assert!(orchestrator.chat_log().is_empty());
    }
}
