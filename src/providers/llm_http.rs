//! Reference OpenAI-compatible HTTP LLM adapter.
//!
//! Streams Server-Sent-Events from a chat-completions-shaped endpoint and
//! normalizes them into the [`LlmFragmentStream`] contract: a finite
//! sequence of monotonic-prefix text fragments, closable by dropping the
//! stream.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::error::{OrchestratorError, Result};
use crate::providers::{ChatMessage, ChatRole, LlmFragmentStream, LlmProvider};

pub struct HttpLlmProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpLlmProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    fn build_messages(system_prompt: &str, history: &[ChatMessage], user_text: &str) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({"role": "system", "content": system_prompt})];
        for m in history {
            let role = match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            messages.push(serde_json::json!({"role": role, "content": m.text}));
        }
        messages.push(serde_json::json!({"role": "user", "content": user_text}));
        serde_json::Value::Array(messages)
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn chat_stream(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<LlmFragmentStream> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "messages": Self::build_messages(system_prompt, history, user_text),
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OrchestratorError::LlmUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::LlmUnavailable(format!(
                "non-success status {}",
                response.status()
            )));
        }

        let byte_stream = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut byte_stream = Box::pin(byte_stream);
            let mut residual = String::new();
            let mut accumulated = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield Err(OrchestratorError::LlmUnavailable(format!("stream read error: {e}")));
                        return;
                    }
                };
                residual.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(newline) = residual.find('\n') {
                    let line = residual[..newline].trim_end_matches('\r').to_string();
                    residual.drain(..=newline);

                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    if data == "[DONE]" {
                        return;
                    }
                    let parsed: serde_json::Value = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    let Some(delta) = parsed["choices"][0]["delta"]["content"].as_str() else { continue };
                    accumulated.push_str(delta);
                    yield Ok(accumulated.clone());
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
