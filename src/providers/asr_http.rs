//! Reference HTTP ASR adapter.
//!
//! Posts 16 kHz mono PCM as a WAV body to a transcription endpoint. A
//! provider-signaled empty transcript (silence) is returned as `""` rather
//! than an error, per the ASR contract.

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::providers::AsrProvider;

#[derive(Debug)]
pub struct HttpAsrProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAsrProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn encode_wav(pcm_samples_16k_mono: &[f32]) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| OrchestratorError::AsrUnavailable(format!("wav encode failed: {e}")))?;
            for &s in pcm_samples_16k_mono {
                let clamped = s.clamp(-1.0, 1.0);
                writer
                    .write_sample((clamped * i16::MAX as f32).round() as i16)
                    .map_err(|e| OrchestratorError::AsrUnavailable(format!("wav encode failed: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| OrchestratorError::AsrUnavailable(format!("wav encode failed: {e}")))?;
        }
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl AsrProvider for HttpAsrProvider {
    async fn transcribe(&self, pcm_samples_16k_mono: &[f32]) -> Result<String> {
        if pcm_samples_16k_mono.is_empty() {
            return Ok(String::new());
        }

        let wav = Self::encode_wav(pcm_samples_16k_mono)?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "audio/wav")
            .body(wav);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::AsrUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::AsrUnavailable(format!(
                "non-success status {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OrchestratorError::AsrUnavailable(format!("bad json response: {e}")))?;

        Ok(payload["text"].as_str().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn transcribe_empty_input_returns_empty_string_without_request() {
        let provider = HttpAsrProvider::new("http://localhost:1", None);
        let text = provider.transcribe(&[]).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn transcribe_returns_text_field_from_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/asr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hello world"})))
            .mount(&server)
            .await;

        let provider = HttpAsrProvider::new(format!("{}/asr", server.uri()), None);
        let text = provider.transcribe(&[0.1, 0.2, -0.1]).await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn transcribe_non_success_status_is_asr_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/asr"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = HttpAsrProvider::new(format!("{}/asr", server.uri()), None);
        let err = provider.transcribe(&[0.1, 0.2]).await.unwrap_err();
        assert_eq!(err.code(), "asr_unavailable");
    }
}
