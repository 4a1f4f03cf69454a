//! Stub implementations of the four external backend traits, enough to
//! drive a session end to end without a real codec, GPU renderer, or audio
//! device — something a demo binary can run anywhere.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use riftcast_core::{DecodedFrame, PixelFormat};
use riftcast_transport::{AudioSink, Decoder, DecoderError, Encoder, Renderer};
use tracing::{debug, info};

/// Synthesizes a keyframe-tagged payload at a fixed cadence instead of
/// driving a real video encoder; implements `Encoder`.
pub struct SyntheticEncoder {
    frame_interval: Duration,
    last_emit: Option<Instant>,
    frame_counter: u64,
    fps: u32,
}

impl SyntheticEncoder {
    pub fn new(fps: u32) -> Self {
        let fps = fps.max(1);
        Self { frame_interval: Duration::from_secs_f64(1.0 / fps as f64), last_emit: None, frame_counter: 0, fps }
    }
}

impl Encoder for SyntheticEncoder {
    fn encode(&mut self) -> Option<(Bytes, bool)> {
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.frame_interval {
                return None;
            }
        }
        self.last_emit = Some(now);
        let is_keyframe = self.frame_counter % (self.fps as u64 * 2) == 0;
        self.frame_counter += 1;
        let payload = vec![0xABu8; if is_keyframe { 4_096 } else { 512 }];
        Some((Bytes::from(payload), is_keyframe))
    }

    fn reconfigure(&mut self, bitrate_kbps: u32, fps: u32) {
        info!(bitrate_kbps, fps, "synthetic encoder reconfigured");
        self.fps = fps.max(1);
        self.frame_interval = Duration::from_secs_f64(1.0 / self.fps as f64);
    }

    fn force_idr(&mut self) {
        self.frame_counter = 0;
    }

    fn flush(&mut self) {}
}

/// Wraps whatever bytes it is given in a `DecodedFrame` unchanged, standing
/// in for a real H.264/H.265/AV1 decoder; implements `Decoder`.
pub struct PassthroughDecoder;

impl Default for PassthroughDecoder {
    fn default() -> Self {
        Self
    }
}

impl PassthroughDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for PassthroughDecoder {
    fn decode(&mut self, payload: &[u8], timestamp_us: u64, is_keyframe: bool) -> Result<DecodedFrame, DecoderError> {
        if payload.is_empty() && !is_keyframe {
            return Err(DecoderError::Rejected("empty non-keyframe payload".into()));
        }
        Ok(DecodedFrame { data: Bytes::copy_from_slice(payload), width: 0, height: 0, timestamp_us, format: PixelFormat::Nv12 })
    }

    fn flush(&mut self) {}
}

/// Counts frames instead of drawing them, for a headless demo; implements `Renderer`.
pub struct NullRenderer {
    pending: Mutex<Option<DecodedFrame>>,
}

impl Default for NullRenderer {
    fn default() -> Self {
        Self { pending: Mutex::new(None) }
    }
}

impl NullRenderer {
    pub fn new() -> Self {
        Self { pending: Mutex::new(None) }
    }
}

impl Renderer for NullRenderer {
    fn enqueue_frame(&self, frame: DecodedFrame) {
        *self.pending.lock().expect("renderer pending mutex poisoned") = Some(frame);
    }

    fn present(&mut self) {
        if let Some(frame) = self.pending.lock().expect("renderer pending mutex poisoned").take() {
            debug!(timestamp_us = frame.timestamp_us, bytes = frame.data.len(), "presented frame");
        }
    }
}

/// Discards PCM instead of playing it, for a headless demo; implements `AudioSink`.
pub struct NullAudioSink;

impl Default for NullAudioSink {
    fn default() -> Self {
        Self
    }
}

impl NullAudioSink {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSink for NullAudioSink {
    fn enqueue_pcm(&self, _pcm: Bytes, _timestamp_us: u64) {}
    fn conceal_loss(&mut self) {}
}
