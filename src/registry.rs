//! Provider Registry: maps `(kind, type)` to a config schema and
//! a constructor, and builds live provider instances from validated,
//! `${VAR}`-expanded configuration.
//!
//! Generalizes the typed single-value `SecretRef::resolve` pattern this
//! codebase already uses for provider credentials into a schema-driven,
//! name-keyed binding table covering all four capability kinds.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{expand_env_value, RawProviderConfig};
use crate::error::{OrchestratorError, Result};
use crate::providers::{AsrProvider, LlmProvider, TtsProvider, VadProvider};

/// The set of option keys a provider binding recognizes, and whether each
/// is required. Declared at `register()` time; `build()` rejects
/// any config key not present here.
#[derive(Debug, Clone, Default)]
pub struct ConfigSchema {
    pub required: Vec<&'static str>,
    pub optional: Vec<&'static str>,
}

impl ConfigSchema {
    pub fn new(required: Vec<&'static str>, optional: Vec<&'static str>) -> Self {
        Self { required, optional }
    }

    fn validate(&self, config: &RawProviderConfig, type_name: &str) -> Result<()> {
        for key in &self.required {
            if !config.contains_key(*key) {
                return Err(OrchestratorError::ConfigInvalid(format!(
                    "provider {type_name:?} missing required key {key:?}"
                )));
            }
        }
        let known: Vec<&str> = self.required.iter().chain(&self.optional).copied().collect();
        for key in config.keys() {
            if !known.contains(&key.as_str()) {
                return Err(OrchestratorError::ConfigInvalid(format!(
                    "provider {type_name:?} has unknown config key {key:?}"
                )));
            }
        }
        Ok(())
    }
}

type AsrConstructor = Arc<dyn Fn(&RawProviderConfig) -> Result<Arc<dyn AsrProvider>> + Send + Sync>;
type TtsConstructor = Arc<dyn Fn(&RawProviderConfig) -> Result<Arc<dyn TtsProvider>> + Send + Sync>;
type LlmConstructor = Arc<dyn Fn(&RawProviderConfig) -> Result<Arc<dyn LlmProvider>> + Send + Sync>;
type VadConstructor = Arc<dyn Fn(&RawProviderConfig) -> Result<Box<dyn VadProvider>> + Send + Sync>;

struct Binding<C> {
    schema: ConfigSchema,
    constructor: C,
}

/// Process-wide, sealed after startup. The only object in this crate that is
/// not session-scoped.
#[derive(Default)]
pub struct ProviderRegistry {
    asr: HashMap<String, Binding<AsrConstructor>>,
    tts: HashMap<String, Binding<TtsConstructor>>,
    llm: HashMap<String, Binding<LlmConstructor>>,
    vad: HashMap<String, Binding<VadConstructor>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_asr(
        &mut self,
        type_name: impl Into<String>,
        schema: ConfigSchema,
        constructor: impl Fn(&RawProviderConfig) -> Result<Arc<dyn AsrProvider>> + Send + Sync + 'static,
    ) {
        let type_name = type_name.into();
        if self.asr.contains_key(&type_name) {
            tracing::warn!(kind = "asr", r#type = %type_name, "replacing existing provider binding");
        }
        self.asr.insert(
            type_name,
            Binding {
                schema,
                constructor: Arc::new(constructor),
            },
        );
    }

    pub fn register_tts(
        &mut self,
        type_name: impl Into<String>,
        schema: ConfigSchema,
        constructor: impl Fn(&RawProviderConfig) -> Result<Arc<dyn TtsProvider>> + Send + Sync + 'static,
    ) {
        let type_name = type_name.into();
        if self.tts.contains_key(&type_name) {
            tracing::warn!(kind = "tts", r#type = %type_name, "replacing existing provider binding");
        }
        self.tts.insert(
            type_name,
            Binding {
                schema,
                constructor: Arc::new(constructor),
            },
        );
    }

    pub fn register_llm(
        &mut self,
        type_name: impl Into<String>,
        schema: ConfigSchema,
        constructor: impl Fn(&RawProviderConfig) -> Result<Arc<dyn LlmProvider>> + Send + Sync + 'static,
    ) {
        let type_name = type_name.into();
        if self.llm.contains_key(&type_name) {
            tracing::warn!(kind = "llm", r#type = %type_name, "replacing existing provider binding");
        }
        self.llm.insert(
            type_name,
            Binding {
                schema,
                constructor: Arc::new(constructor),
            },
        );
    }

    pub fn register_vad(
        &mut self,
        type_name: impl Into<String>,
        schema: ConfigSchema,
        constructor: impl Fn(&RawProviderConfig) -> Result<Box<dyn VadProvider>> + Send + Sync + 'static,
    ) {
        let type_name = type_name.into();
        if self.vad.contains_key(&type_name) {
            tracing::warn!(kind = "vad", r#type = %type_name, "replacing existing provider binding");
        }
        self.vad.insert(
            type_name,
            Binding {
                schema,
                constructor: Arc::new(constructor),
            },
        );
    }

    pub fn build_asr(&self, type_name: &str, config: &RawProviderConfig) -> Result<Arc<dyn AsrProvider>> {
        let binding = self
            .asr
            .get(type_name)
            .ok_or_else(|| OrchestratorError::ConfigInvalid(format!("unknown asr provider {type_name:?}")))?;
        binding.schema.validate(config, type_name)?;
        let expanded = expand_config(config)?;
        (binding.constructor)(&expanded)
    }

    pub fn build_tts(&self, type_name: &str, config: &RawProviderConfig) -> Result<Arc<dyn TtsProvider>> {
        let binding = self
            .tts
            .get(type_name)
            .ok_or_else(|| OrchestratorError::ConfigInvalid(format!("unknown tts provider {type_name:?}")))?;
        binding.schema.validate(config, type_name)?;
        let expanded = expand_config(config)?;
        (binding.constructor)(&expanded)
    }

    pub fn build_llm(&self, type_name: &str, config: &RawProviderConfig) -> Result<Arc<dyn LlmProvider>> {
        let binding = self
            .llm
            .get(type_name)
            .ok_or_else(|| OrchestratorError::ConfigInvalid(format!("unknown llm provider {type_name:?}")))?;
        binding.schema.validate(config, type_name)?;
        let expanded = expand_config(config)?;
        (binding.constructor)(&expanded)
    }

    pub fn build_vad(&self, type_name: &str, config: &RawProviderConfig) -> Result<Box<dyn VadProvider>> {
        let binding = self
            .vad
            .get(type_name)
            .ok_or_else(|| OrchestratorError::ConfigInvalid(format!("unknown vad provider {type_name:?}")))?;
        binding.schema.validate(config, type_name)?;
        let expanded = expand_config(config)?;
        (binding.constructor)(&expanded)
    }

    pub fn list_asr(&self) -> Vec<&str> {
        self.asr.keys().map(String::as_str).collect()
    }

    pub fn list_tts(&self) -> Vec<&str> {
        self.tts.keys().map(String::as_str).collect()
    }

    pub fn list_llm(&self) -> Vec<&str> {
        self.llm.keys().map(String::as_str).collect()
    }

    pub fn list_vad(&self) -> Vec<&str> {
        self.vad.keys().map(String::as_str).collect()
    }
}

fn expand_config(config: &RawProviderConfig) -> Result<RawProviderConfig> {
    let mut out = RawProviderConfig::with_capacity(config.len());
    for (k, v) in config {
        out.insert(k.clone(), expand_env_value(v)?);
    }
    Ok(out)
}
