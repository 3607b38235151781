//! Error types for the conversation orchestration core.
//!
//! [`OrchestratorError`] is the single error type returned by provider
//! traits, the registry, and orchestrator entry points. Each variant carries
//! a stable SCREAMING_SNAKE_CASE code via [`OrchestratorError::code`] that is
//! safe to send to a client alongside [`OrchestratorError::message`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Error kinds reachable from provider adapters, the registry, and the
/// orchestrator. Every kind here is one a client may eventually see in an
/// `error` frame's `kind` field.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("config references missing environment variable: {0}")]
    ConfigMissingEnv(String),

    #[error("asr provider unavailable: {0}")]
    AsrUnavailable(String),

    #[error("llm provider unavailable: {0}")]
    LlmUnavailable(String),

    #[error("tts provider unavailable: {0}")]
    TtsUnavailable(String),

    #[error("audio decode failed: {0}")]
    DecodeFailed(String),

    #[error("turn timed out after {0:?}")]
    TurnTimeout(std::time::Duration),

    /// Not a true failure — raised so barge-in can flow through the same
    /// error-event plumbing as a real error, per the `interrupted` kind.
    #[error("turn interrupted")]
    Interrupted,

    #[error("event handler {handler} failed: {source}")]
    HandlerFailed {
        handler: String,
        source: anyhow::Error,
    },
}

impl OrchestratorError {
    /// Stable machine-readable code, suitable for the `error` frame's `kind`
    /// field and for log/metric aggregation.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "config_invalid",
            Self::ConfigMissingEnv(_) => "config_missing_env",
            Self::AsrUnavailable(_) => "asr_unavailable",
            Self::LlmUnavailable(_) => "llm_unavailable",
            Self::TtsUnavailable(_) => "tts_unavailable",
            Self::DecodeFailed(_) => "decode_failed",
            Self::TurnTimeout(_) => "turn_timeout",
            Self::Interrupted => "interrupted",
            Self::HandlerFailed { .. } => "handler_failed",
        }
    }

    /// Human-readable text safe to forward verbatim in an `error` frame.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// True for the one kind that is informational rather than a failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_code() {
        let e = OrchestratorError::ConfigInvalid("unknown type".into());
        assert_eq!(e.code(), "config_invalid");
    }

    #[test]
    fn config_missing_env_code() {
        let e = OrchestratorError::ConfigMissingEnv("API_KEY".into());
        assert_eq!(e.code(), "config_missing_env");
        assert!(e.message().contains("API_KEY"));
    }

    #[test]
    fn asr_unavailable_code() {
        assert_eq!(
            OrchestratorError::AsrUnavailable("timeout".into()).code(),
            "asr_unavailable"
        );
    }

    #[test]
    fn llm_unavailable_code() {
        assert_eq!(
            OrchestratorError::LlmUnavailable("refused".into()).code(),
            "llm_unavailable"
        );
    }

    #[test]
    fn tts_unavailable_code() {
        assert_eq!(
            OrchestratorError::TtsUnavailable("500".into()).code(),
            "tts_unavailable"
        );
    }

    #[test]
    fn decode_failed_code() {
        assert_eq!(
            OrchestratorError::DecodeFailed("bad mp3".into()).code(),
            "decode_failed"
        );
    }

    #[test]
    fn turn_timeout_code() {
        let e = OrchestratorError::TurnTimeout(std::time::Duration::from_secs(120));
        assert_eq!(e.code(), "turn_timeout");
    }

    #[test]
    fn interrupted_is_informational() {
        let e = OrchestratorError::Interrupted;
        assert_eq!(e.code(), "interrupted");
        assert!(e.is_informational());
    }

    #[test]
    fn handler_failed_code() {
        let e = OrchestratorError::HandlerFailed {
            handler: "transcript".into(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(e.code(), "handler_failed");
        assert!(e.message().contains("transcript"));
    }
}
