//! Audio decode and 50 Hz RMS volume envelope.

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{OrchestratorError, Result};

/// Gain applied to windowed RMS before clamping to `[0, 1]`.
const VOLUME_GAIN: f32 = 10.0;

/// Sample rate of the produced envelope, fixed by the data model.
const ENVELOPE_HZ: usize = 50;

/// Decode TTS-produced audio bytes into mono `f32` samples in `[-1, 1]`
/// plus the source sample rate, whatever codec symphonia can probe from
/// `format_hint`.
pub fn decode_to_mono_f32(bytes: &[u8], format_hint: &str) -> Result<(Vec<f32>, u32)> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    hint.with_extension(format_hint);

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| OrchestratorError::DecodeFailed(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| OrchestratorError::DecodeFailed("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| OrchestratorError::DecodeFailed("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| OrchestratorError::DecodeFailed(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(OrchestratorError::DecodeFailed(format!("audio read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(OrchestratorError::DecodeFailed(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.frames();

        let needs_new = match sample_buf.as_ref() {
            Some(b) => b.capacity() < frames * channels,
            None => true,
        };
        if needs_new {
            sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
        } else if let Some(b) = sample_buf.as_mut() {
            b.clear();
        }
        if let Some(b) = sample_buf.as_mut() {
            b.copy_interleaved_ref(decoded);
        }

        let data = sample_buf.as_ref().map(|b| b.samples()).unwrap_or(&[]);
        if channels <= 1 {
            out.extend_from_slice(data);
        } else {
            for frame in data.chunks_exact(channels) {
                out.push(frame.iter().sum::<f32>() / channels as f32);
            }
        }
    }

    Ok((out, sample_rate))
}

fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = window.iter().map(|s| s * s).sum();
    (sum_sq / window.len() as f32).sqrt()
}

/// Compute the 50 Hz volume envelope from mono samples at `sample_rate`.
/// Always yields at least one sample, even for audio shorter than one
/// 20 ms window.
pub fn compute_volume_envelope(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    if samples.is_empty() {
        return vec![0.0];
    }
    let window_len = (sample_rate as usize / ENVELOPE_HZ).max(1);
    let mut out: Vec<f32> = samples
        .chunks(window_len)
        .map(|w| (VOLUME_GAIN * rms(w)).min(1.0))
        .collect();
    if out.is_empty() {
        out.push(0.0);
    }
    out
}
