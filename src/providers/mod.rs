//! Provider capability interfaces and the built-in HTTP-backed
//! reference adapters.
//!
//! Each capability is one `#[async_trait]`, mirroring this codebase's
//! `ProviderAdapter`/`ChannelAdapter` pattern: a single method per
//! capability rather than a class hierarchy, so the orchestrator never
//! matches on a concrete provider type.

mod asr_http;
mod llm_http;
mod tts_http;
mod vad_energy;

pub use asr_http::HttpAsrProvider;
pub use llm_http::HttpLlmProvider;
pub use tts_http::HttpTtsProvider;
pub use vad_energy::{EnergyVadProvider, VadOutcome};

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::Result;

/// A provider's capability kind, used by the registry to key bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Asr,
    Tts,
    Llm,
    Vad,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asr => "asr",
            Self::Tts => "tts",
            Self::Llm => "llm",
            Self::Vad => "vad",
        }
    }
}

/// Speech recognition.
#[async_trait]
pub trait AsrProvider: Send + Sync + std::fmt::Debug {
    /// Transcribe 16 kHz mono f32 PCM. Returns `""` if the provider
    /// determines the input is silence.
    async fn transcribe(&self, pcm_samples_16k_mono: &[f32]) -> Result<String>;
}

/// Speech synthesis. MUST NOT be called with empty `text`.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<(Vec<u8>, String)>;
}

/// A boxed stream of LLM text fragments. Each item is a
/// monotonic prefix of the final reply; the stream is finite and closable
/// via drop, satisfying the barge-in cancellation contract.
pub type LlmFragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One turn of chat history handed to the LLM.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// Large-language-model chat.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat_stream(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<LlmFragmentStream>;
}

/// Voice activity detection. Stateful: one instance per session.
#[async_trait]
pub trait VadProvider: Send + Sync {
    /// Feed one chunk of 16 kHz mono PCM, returning the stateful outcome.
    /// After `SpeechEnded` the provider yields the concatenated utterance.
    async fn process(&mut self, pcm_chunk: &[f32]) -> Result<VadOutcome>;

    /// Reset internal buffers, e.g. after `mic_audio_end` or `no-audio-data`.
    fn reset(&mut self);
}
