//! Streaming conversation orchestration core.
//!
//! Brokers between a browser-style client (speech in / speech + animation
//! out) and a swappable set of external AI providers (ASR, LLM, TTS, VAD).
//! The crate's center of gravity is the per-session [`orchestrator`]: it
//! composes a request pipeline, multiplexes a provider's token stream into
//! ordered, typed output events, fans those events to subscribers with
//! priority and failure isolation, and supports mid-stream barge-in.
//!
//! # Architecture
//!
//! - **Provider Registry** ([`registry`]): maps `(kind, type)` to a config
//!   schema and constructor; builds live ASR/TTS/LLM/VAD instances.
//! - **Provider capabilities** ([`providers`]): the four capability traits
//!   plus reference HTTP/energy-based adapters.
//! - **Pipeline** ([`pipeline`]): Input Pipeline (ASR → normalize → emotion
//!   tags), Agent Stream (LLM fragments → sentences), Output Pipeline
//!   (sentence → TTS → lipsync, seq-ordered).
//! - **Emotion + lipsync** ([`emotion`]): tag extraction, analyzers, timeline
//!   strategies, and the 50 Hz volume envelope.
//! - **Event Bus** ([`bus`]) and **Output Handlers** ([`handlers`]): typed
//!   pub/sub with priority and failure isolation, translating events into
//!   wire frames.
//! - **Conversation Orchestrator** ([`orchestrator`]) and **Session
//!   Manager** ([`session`]): per-client state machine and lifecycle.

pub mod bus;
pub mod config;
pub mod emotion;
pub mod error;
pub mod events;
pub mod handlers;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod registry;
pub mod session;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use events::{Frame, InboundFrame, OutputEvent};
pub use orchestrator::ConversationOrchestrator;
pub use registry::ProviderRegistry;
pub use session::SessionManager;
