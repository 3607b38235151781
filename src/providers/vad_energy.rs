//! Reference energy-based VAD adapter.
//!
//! Not a real Silero/ONNX model — a stateful RMS-threshold gate with
//! pre-roll buffering, matching the shape this codebase's own
//! energy-based VAD took before a learned model was plugged in.

use async_trait::async_trait;

use crate::error::Result;
use crate::providers::VadProvider;

const DEFAULT_SILENCE_THRESHOLD_MS: u64 = 500;
const PRE_ROLL_CHUNKS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum VadOutcome {
    Silence,
    Speaking,
    SpeechEnded { utterance: Vec<f32> },
}

fn rms(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt()
}

pub struct EnergyVadProvider {
    threshold: f32,
    sample_rate: u32,
    silence_threshold_ms: u64,
    state: State,
    pre_roll: std::collections::VecDeque<Vec<f32>>,
    buffer: Vec<f32>,
    silence_accum_samples: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Speaking,
}

impl EnergyVadProvider {
    pub fn new(threshold: f32, sample_rate: u32) -> Self {
        Self {
            threshold,
            sample_rate,
            silence_threshold_ms: DEFAULT_SILENCE_THRESHOLD_MS,
            state: State::Idle,
            pre_roll: std::collections::VecDeque::with_capacity(PRE_ROLL_CHUNKS),
            buffer: Vec::new(),
            silence_accum_samples: 0,
        }
    }

    pub fn with_silence_threshold_ms(mut self, ms: u64) -> Self {
        self.silence_threshold_ms = ms;
        self
    }

    fn silence_threshold_samples(&self) -> u64 {
        (self.sample_rate as u64 * self.silence_threshold_ms) / 1000
    }
}

#[async_trait]
impl VadProvider for EnergyVadProvider {
    async fn process(&mut self, pcm_chunk: &[f32]) -> Result<VadOutcome> {
        let level = rms(pcm_chunk);
        let is_speech = level >= self.threshold;

        match self.state {
            State::Idle => {
                if self.pre_roll.len() >= PRE_ROLL_CHUNKS {
                    self.pre_roll.pop_front();
                }
                self.pre_roll.push_back(pcm_chunk.to_vec());

                if is_speech {
                    self.state = State::Speaking;
                    self.buffer.clear();
                    for chunk in &self.pre_roll {
                        self.buffer.extend_from_slice(chunk);
                    }
                    self.silence_accum_samples = 0;
                    Ok(VadOutcome::Speaking)
                } else {
                    Ok(VadOutcome::Silence)
                }
            }
            State::Speaking => {
                self.buffer.extend_from_slice(pcm_chunk);
                if is_speech {
                    self.silence_accum_samples = 0;
                    Ok(VadOutcome::Speaking)
                } else {
                    self.silence_accum_samples += pcm_chunk.len() as u64;
                    if self.silence_accum_samples >= self.silence_threshold_samples() {
                        let utterance = std::mem::take(&mut self.buffer);
                        self.reset();
                        Ok(VadOutcome::SpeechEnded { utterance })
                    } else {
                        Ok(VadOutcome::Speaking)
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.buffer.clear();
        self.pre_roll.clear();
        self.silence_accum_samples = 0;
    }
}
