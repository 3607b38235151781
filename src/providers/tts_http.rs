//! Reference HTTP TTS adapter.
//!
//! Wraps a synthesis endpoint that accepts `{text}` and returns raw audio
//! bytes with a `Content-Type` this adapter maps to one of the format tags
//! the Emotion + Lipsync Processor knows how to decode.

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::providers::TtsProvider;

pub struct HttpTtsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    voice: String,
}

impl HttpTtsProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, voice: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            voice: voice.into(),
        }
    }
}

fn format_tag_for(content_type: &str) -> &'static str {
    if content_type.contains("wav") {
        "wav"
    } else if content_type.contains("ogg") {
        "ogg"
    } else if content_type.contains("webm") {
        "webm"
    } else if content_type.contains("flac") {
        "flac"
    } else if content_type.contains("aac") {
        "aac"
    } else if content_type.contains("mp4") {
        "mp4"
    } else {
        "mp3"
    }
}

#[async_trait]
impl TtsProvider for HttpTtsProvider {
    async fn synthesize(&self, text: &str) -> Result<(Vec<u8>, String)> {
        if text.is_empty() {
            return Err(OrchestratorError::TtsUnavailable(
                "synthesize called with empty text".into(),
            ));
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({"text": text, "voice": self.voice}));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::TtsUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::TtsUnavailable(format!(
                "non-success status {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let format = format_tag_for(&content_type).to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OrchestratorError::TtsUnavailable(format!("body read failed: {e}")))?;

        Ok((bytes.to_vec(), format))
    }
}
