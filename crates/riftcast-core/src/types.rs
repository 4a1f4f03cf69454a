use serde::{Deserialize, Serialize};

// MARK: - VideoCodec

/// Codec enumerated `{H264, H265, AV1}` carried as a one-byte tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
    Av1,
}

impl VideoCodec {
    /// Wire tag byte. Stable — used by `riftcast-wire` and by `classify`.
    pub const fn tag(self) -> u8 {
        match self {
            VideoCodec::H264 => 0x01,
            VideoCodec::H265 => 0x02,
            VideoCodec::Av1 => 0x03,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(VideoCodec::H264),
            0x02 => Some(VideoCodec::H265),
            0x03 => Some(VideoCodec::Av1),
            _ => None,
        }
    }
}

// MARK: - FrameType

/// The single `frame_type` bit of the video header: whether the frame stands
/// alone (I) or references a predecessor (P).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    I,
    P,
}

impl FrameType {
    pub const fn bit(self) -> u8 {
        match self {
            FrameType::I => 0,
            FrameType::P => 1,
        }
    }

    pub const fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            FrameType::I
        } else {
            FrameType::P
        }
    }
}

// MARK: - GamingMode

/// Preset tuple `(target_jitter_depth_ms, target_fps)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamingMode {
    Competitive,
    Balanced,
    Cinematic,
}

impl GamingMode {
    /// `(target_depth_ms, target_fps)` defaults for this mode. Advisory —
    /// the rate controller may override `fps` within configured bounds.
    pub const fn defaults(self) -> (u32, u32) {
        match self {
            GamingMode::Competitive => (1, 240),
            GamingMode::Balanced => (4, 120),
            GamingMode::Cinematic => (8, 60),
        }
    }
}

// MARK: - PixelFormat / DecodedFrame / EncodedFrame

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Nv12,
    Rgba,
    Bgra,
}

/// Output of the external decoder, ready for the renderer.
pub struct DecodedFrame {
    pub data: bytes::Bytes,
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    pub format: PixelFormat,
}

/// A coded video frame, possibly still split across fragments, handed to the
/// fragmenter/sender or produced complete by the jitter buffer.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data: bytes::Bytes,
    pub timestamp_us: u64,
    pub frame_number: u16,
    pub is_keyframe: bool,
    pub frame_type: FrameType,
    pub codec: VideoCodec,
    /// Set when the jitter buffer emitted this frame incomplete at its wait
    /// deadline. The consumer decides whether to attempt decode or drop.
    pub partial: bool,
}

// MARK: - SessionState

/// Top-level session lifecycle state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionLifecycle {
    Idle,
    Connecting,
    Streaming,
    Reconnecting { attempt: u32 },
    Stopped,
    Error { reason: String },
}

impl ConnectionLifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}
