//! Output Handlers: translate each `OutputEvent` variant into
//! its wire `Frame` and hand it to a caller-supplied `send` callback.

use std::sync::Arc;

use crate::bus::{EventBus, Handler, Priority, Subscription};
use crate::events::{ExpressionPayload, ExpressionSegment, Frame, OutputEvent};

/// Callback a Session Manager supplies to push a frame to its client
/// transport. A send failure (closed socket) is reported back to the
/// Event Bus, which logs it without stopping sibling handlers.
pub type SendFn = Arc<dyn Fn(Frame) -> anyhow::Result<()> + Send + Sync>;

/// Register the five built-in handlers on `bus` at their fixed priorities,
/// returning their subscriptions so a session can unsubscribe them all
/// during teardown.
pub fn register_output_handlers(bus: &mut EventBus, send: SendFn) -> Vec<Subscription> {
    let mut subs = Vec::with_capacity(5);

    subs.push(bus.subscribe(
        crate::events::EventType::Sentence,
        "sentence-to-text-frame",
        Priority::High,
        sentence_handler(send.clone()),
    ));
    subs.push(bus.subscribe(
        crate::events::EventType::AudioWithExpression,
        "audio-with-expression-frame",
        Priority::Normal,
        audio_with_expression_handler(send.clone()),
    ));
    subs.push(bus.subscribe(
        crate::events::EventType::Transcript,
        "transcript-frame",
        Priority::High,
        transcript_handler(send.clone()),
    ));
    subs.push(bus.subscribe(
        crate::events::EventType::Control,
        "control-frame",
        Priority::Normal,
        control_handler(send.clone()),
    ));
    subs.push(bus.subscribe(
        crate::events::EventType::Error,
        "error-frame",
        Priority::High,
        error_handler(send),
    ));

    subs
}

fn sentence_handler(send: SendFn) -> Handler {
    Arc::new(move |event| {
        let OutputEvent::Sentence { text, seq } = event else {
            return Ok(());
        };
        send(Frame::Text {
            text: text.clone(),
            seq: *seq,
        })
    })
}

fn audio_with_expression_handler(send: SendFn) -> Handler {
    Arc::new(move |event| {
        let OutputEvent::AudioWithExpression { payload, seq } = event else {
            return Ok(());
        };
        let segments = payload
            .timeline
            .iter()
            .map(|s| ExpressionSegment {
                emotion: s.emotion.clone(),
                time: s.start,
                duration: s.duration,
                intensity: Some(s.intensity),
            })
            .collect();
        send(Frame::AudioWithExpression {
            audio_data: payload.audio_bytes_base64.clone(),
            format: payload.format.clone(),
            volumes: payload.volumes.clone(),
            expressions: ExpressionPayload {
                segments,
                total_duration: payload.total_duration,
            },
            text: payload.text.clone(),
            seq: *seq,
        })
    })
}

fn transcript_handler(send: SendFn) -> Handler {
    Arc::new(move |event| {
        let OutputEvent::Transcript { text, is_final } = event else {
            return Ok(());
        };
        send(Frame::Transcript {
            text: text.clone(),
            is_final: *is_final,
        })
    })
}

fn control_handler(send: SendFn) -> Handler {
    Arc::new(move |event| {
        let OutputEvent::Control { signal, .. } = event else {
            return Ok(());
        };
        send(Frame::Control { text: signal.as_str() })
    })
}

fn error_handler(send: SendFn) -> Handler {
    Arc::new(move |event| {
        let OutputEvent::Error { kind, message, .. } = event else {
            return Ok(());
        };
        send(Frame::Error {
            message: message.clone(),
            kind: Some(*kind),
        })
    })
}
