//! Session Manager: owns the process-wide map from session id
//! to [`ConversationOrchestrator`], builds providers for each new session
//! from the shared [`ProviderRegistry`], and demultiplexes inbound frames.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::emotion::EmotionLipsyncProcessor;
use crate::error::{OrchestratorError, Result};
use crate::events::{Frame, InboundFrame};
use crate::handlers::SendFn;
use crate::orchestrator::ConversationOrchestrator;
use crate::registry::ProviderRegistry;

/// Process-wide session table. One instance per running server; sessions
/// share nothing but the read-only [`ProviderRegistry`].
pub struct SessionManager {
    registry: Arc<ProviderRegistry>,
    config: OrchestratorConfig,
    sessions: Mutex<HashMap<String, Arc<ConversationOrchestrator>>>,
}

impl SessionManager {
    pub fn new(registry: Arc<ProviderRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            registry,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a session id, build this session's providers, construct its
    /// Orchestrator, and send `connection-established`.
    pub fn connect(&self, send: SendFn) -> Result<String> {
        let sid = Uuid::new_v4().to_string();

        let empty = crate::config::RawProviderConfig::new();
        let provider_config = |kind: &str, type_name: &str| -> crate::config::RawProviderConfig {
            self.config
                .providers
                .kinds
                .get(kind)
                .and_then(|m| m.get(type_name))
                .cloned()
                .unwrap_or_else(|| empty.clone())
        };

        let asr = self.registry.build_asr(
            &self.config.services.asr,
            &provider_config("asr", &self.config.services.asr),
        )?;
        let tts = self.registry.build_tts(
            &self.config.services.tts,
            &provider_config("tts", &self.config.services.tts),
        )?;
        let llm = self.registry.build_llm(
            &self.config.services.agent,
            &provider_config("llm", &self.config.services.agent),
        )?;
        let vad = self.registry.build_vad(
            &self.config.services.vad,
            &provider_config("vad", &self.config.services.vad),
        )?;
        let processor = Arc::new(EmotionLipsyncProcessor::from_config(&self.config.emotion)?);

        let orchestrator = ConversationOrchestrator::new(
            sid.clone(),
            asr,
            tts,
            llm,
            vad,
            processor,
            self.config.persona.system_prompt.clone(),
            self.config.emotion.valid_emotions.clone(),
            Duration::from_secs(self.config.turn.timeout_seconds),
            send.clone(),
        );

        self.sessions.lock().unwrap().insert(sid.clone(), orchestrator);

        send(Frame::ConnectionEstablished {
            sid: sid.clone(),
            message: "connected".to_string(),
        })
        .map_err(|e| OrchestratorError::ConfigInvalid(format!("failed to send connection-established: {e}")))?;

        Ok(sid)
    }

    /// `SessionManager::remove`: cancel → unsubscribe-all →
    /// clear-bus → drop, the same ordering used for fatal-error teardown.
    pub fn remove(&self, sid: &str) {
        if let Some(orchestrator) = self.sessions.lock().unwrap().remove(sid) {
            orchestrator.shutdown();
        }
    }

    /// Demultiplex one inbound frame by its `type` discriminator into the
    /// owning session's Orchestrator methods.
    pub async fn dispatch(&self, sid: &str, frame: InboundFrame) -> Result<()> {
        let orchestrator = self
            .sessions
            .lock()
            .unwrap()
            .get(sid)
            .cloned()
            .ok_or_else(|| OrchestratorError::ConfigInvalid(format!("unknown session {sid:?}")))?;

        match frame {
            InboundFrame::TextInput { text, .. } => {
                orchestrator.handle_text_input(text).await;
            }
            InboundFrame::RawAudioData { audio } => {
                orchestrator.handle_raw_audio_data(audio).await?;
            }
            InboundFrame::MicAudioEnd {} => {
                orchestrator.handle_mic_audio_end().await;
            }
            InboundFrame::InterruptSignal { .. } => {
                orchestrator.handle_interrupt_signal();
            }
            InboundFrame::ClearHistory {} => {
                orchestrator.handle_clear_history();
            }
            InboundFrame::SetLogLevel { level } => {
                orchestrator.handle_set_log_level(level);
            }
        }
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}
