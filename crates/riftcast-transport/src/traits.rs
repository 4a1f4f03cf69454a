//! External backend interfaces: decode, encode, render, and play audio.
//! Plain `Send` trait objects rather than `async_trait`, to fit the
//! thread-based pipeline.

use bytes::Bytes;
use riftcast_core::DecodedFrame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("decoder rejected payload: {0}")]
    Rejected(String),
}

/// Only the Decode stage calls `decode`; implementations need not be
/// thread-safe beyond that single-caller guarantee.
pub trait Decoder: Send {
    fn decode(&mut self, payload: &[u8], timestamp_us: u64, is_keyframe: bool) -> Result<DecodedFrame, DecoderError>;
    fn flush(&mut self);
}

/// Drives the sender side: produces coded frames for the fragmenter to put
/// on the wire, and accepts rate-controller reconfiguration.
pub trait Encoder: Send {
    fn encode(&mut self) -> Option<(Bytes, bool)>;
    fn reconfigure(&mut self, bitrate_kbps: u32, fps: u32);
    fn force_idr(&mut self);
    fn flush(&mut self);
}

/// Latest-wins, single slot: `enqueue_frame` may be called from the Decode
/// stage while `present` runs on the Render stage.
pub trait Renderer: Send {
    fn enqueue_frame(&self, frame: DecodedFrame);
    fn present(&mut self);
}

pub trait AudioSink: Send {
    fn enqueue_pcm(&self, pcm: Bytes, timestamp_us: u64);
    fn conceal_loss(&mut self);
}
