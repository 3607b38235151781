//! In-process configuration surface for the conversation orchestration core.
//!
//! This module deliberately does not read files: an operator's transport
//! layer is expected to parse YAML/JSON off disk and hand this crate an
//! already-structured [`OrchestratorConfig`]. What this module *does* own is
//! the shape of that structure, its defaults, and `${VAR}`-style environment
//! interpolation of string values before they reach a provider constructor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Top-level configuration, mirroring the YAML surface an operator supplies
/// once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Which registered provider name backs each capability.
    pub services: ServicesConfig,
    /// Provider-specific option blocks, keyed by kind then provider name.
    pub providers: ProvidersConfig,
    /// Persona / system-prompt configuration.
    pub persona: PersonaConfig,
    /// Emotion analysis and timeline configuration.
    pub emotion: EmotionConfig,
    /// Turn-level behavior (timeouts, etc).
    pub turn: TurnConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub asr: String,
    pub tts: String,
    pub agent: String,
    pub vad: String,
}

/// `providers.<kind>.<name> = { ...options }`. Kept as a generic nested map
/// rather than a typed struct per provider: the registry validates option
/// keys against the schema declared at registration time, so this
/// module does not need to know about any particular provider's options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    #[serde(flatten)]
    pub kinds: HashMap<String, HashMap<String, RawProviderConfig>>,
}

/// A single provider's option block, still in string/number/bool form —
/// `${VAR}` interpolation and schema validation happen when the registry
/// builds the provider, not at parse time.
pub type RawProviderConfig = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionConfig {
    pub analyzer: String,
    pub analyzer_mode: String,
    pub strategy: String,
    pub valid_emotions: Vec<String>,
    pub strategy_min_duration: f32,
    pub strategy_weights: HashMap<String, f32>,
    pub strategy_transition: f32,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            analyzer: "tag".to_string(),
            analyzer_mode: "first".to_string(),
            strategy: "position".to_string(),
            valid_emotions: vec![
                "neutral".into(),
                "happy".into(),
                "sad".into(),
                "angry".into(),
                "surprised".into(),
                "thinking".into(),
            ],
            strategy_min_duration: 0.0,
            strategy_weights: HashMap::new(),
            strategy_transition: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    pub timeout_seconds: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self { timeout_seconds: 120 }
    }
}

/// Expand every `${VAR}` occurrence in `value` using the process
/// environment. Fails with [`OrchestratorError::ConfigMissingEnv`] naming the
/// first unresolved variable: missing references fail registry `build()`
/// rather than silently passing `${VAR}` through to a provider.
pub fn expand_env(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            let close = value[i + 2..]
                .find('}')
                .map(|off| i + 2 + off)
                .ok_or_else(|| {
                    OrchestratorError::ConfigInvalid(format!(
                        "unterminated ${{...}} reference in {value:?}"
                    ))
                })?;
            let var = &value[i + 2..close];
            let resolved = std::env::var(var)
                .map_err(|_| OrchestratorError::ConfigMissingEnv(var.to_string()))?;
            out.push_str(&resolved);
            i = close + 1;
        } else {
            // Advance by one UTF-8 scalar, not one byte, to stay on a
            // char boundary for the next `value[i..]` slice operation.
            let ch_len = value[i..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
            out.push_str(&value[i..i + ch_len]);
            i += ch_len;
        }
    }
    Ok(out)
}

/// Recursively expand every string leaf of a [`serde_json::Value`] via
/// [`expand_env`]. Used by the registry when validating a raw provider
/// config block before handing it to a provider constructor.
pub fn expand_env_value(value: &serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::String(s) => Ok(serde_json::Value::String(expand_env(s)?)),
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(expand_env_value(item)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), expand_env_value(v)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}
