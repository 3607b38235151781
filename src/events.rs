//! Typed event and wire-frame model for one turn's output.
//!
//! `OutputEvent` is the internal tagged union the Output Pipeline emits onto
//! the Event Bus; `Frame` is the JSON-serializable shape an Output
//! Handler turns it into for the client transport. The two are kept
//! distinct so that handlers, not the pipeline, own the wire shape.

use serde::{Deserialize, Serialize};

use crate::emotion::TimelineSegment;

/// Discrete signals carried by `control` events and frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlSignal {
    StartMic,
    StopMic,
    Interrupt,
    Interrupted,
    NoAudioData,
    MicAudioEnd,
    ConversationStart,
    ConversationEnd,
}

impl ControlSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartMic => "start-mic",
            Self::StopMic => "stop-mic",
            Self::Interrupt => "interrupt",
            Self::Interrupted => "interrupted",
            Self::NoAudioData => "no-audio-data",
            Self::MicAudioEnd => "mic-audio-end",
            Self::ConversationStart => "conversation-start",
            Self::ConversationEnd => "conversation-end",
        }
    }
}

/// The bundled audio+expression payload for one sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioWithExpression {
    pub audio_bytes_base64: String,
    pub format: String,
    pub volumes: Vec<f32>,
    pub timeline: Vec<TimelineSegment>,
    pub total_duration: f32,
    pub text: String,
}

/// Internal tagged union produced by the Output Pipeline and consumed by
/// the Event Bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    Sentence {
        text: String,
        seq: u64,
    },
    AudioWithExpression {
        #[serde(flatten)]
        payload: AudioWithExpression,
        seq: u64,
    },
    Transcript {
        text: String,
        is_final: bool,
    },
    Control {
        signal: ControlSignal,
        seq: Option<u64>,
    },
    Error {
        kind: &'static str,
        message: String,
        seq: Option<u64>,
    },
}

impl OutputEvent {
    /// The discriminator used for Event Bus subscription — distinct
    /// from the wire `type` field so handlers can match without touching
    /// the serialized representation.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Sentence { .. } => EventType::Sentence,
            Self::AudioWithExpression { .. } => EventType::AudioWithExpression,
            Self::Transcript { .. } => EventType::Transcript,
            Self::Control { .. } => EventType::Control,
            Self::Error { .. } => EventType::Error,
        }
    }

    /// The turn-scoped `seq` this event carries, if any.
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::Sentence { seq, .. } => Some(*seq),
            Self::AudioWithExpression { seq, .. } => Some(*seq),
            Self::Control { seq, .. } => *seq,
            Self::Error { seq, .. } => *seq,
            Self::Transcript { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Sentence,
    AudioWithExpression,
    Transcript,
    Control,
    Error,
}

/// Outbound wire frame, the JSON object an Output Handler emits onto
/// the client channel. Kept as an explicit discriminated union — mirroring
/// this codebase's versioned command/event envelope convention — rather
/// than a duck-typed map, so handler bugs surface as type errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "connection-established")]
    ConnectionEstablished { sid: String, message: String },
    #[serde(rename = "text")]
    Text { text: String, seq: u64 },
    #[serde(rename = "audio_with_expression")]
    AudioWithExpression {
        audio_data: String,
        format: String,
        volumes: Vec<f32>,
        expressions: ExpressionPayload,
        text: String,
        seq: u64,
    },
    #[serde(rename = "transcript")]
    Transcript { text: String, is_final: bool },
    #[serde(rename = "control")]
    Control { text: &'static str },
    #[serde(rename = "error")]
    Error {
        message: String,
        kind: Option<&'static str>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionPayload {
    pub segments: Vec<ExpressionSegment>,
    pub total_duration: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionSegment {
    pub emotion: String,
    pub time: f32,
    pub duration: f32,
    pub intensity: Option<f32>,
}

/// Inbound wire frames, demultiplexed by the Session Manager.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
    #[serde(rename = "text_input")]
    TextInput {
        text: String,
        #[serde(default)]
        from_name: Option<String>,
    },
    #[serde(rename = "raw_audio_data")]
    RawAudioData { audio: Vec<i16> },
    #[serde(rename = "mic_audio_end")]
    MicAudioEnd {},
    #[serde(rename = "interrupt_signal")]
    InterruptSignal {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(rename = "clear_history")]
    ClearHistory {},
    #[serde(rename = "set_log_level")]
    SetLogLevel { level: String },
}
