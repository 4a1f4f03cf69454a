use thiserror::Error;

/// Configuration errors. Refused at `start`; never surfaced
/// mid-session.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("invalid bitrate bounds [{min}, {max}] kbps")]
    InvalidBitrateBounds { min: u32, max: u32 },

    #[error("DTLS enabled but no peer certificate fingerprint was supplied")]
    MissingFingerprint,

    #[error("unsupported codec for this platform: {0:?}")]
    UnsupportedCodec(crate::types::VideoCodec),
}

/// Failures of the external Decoder/Encoder/Renderer/Audio backends.
/// Not a wire/reassembly error; this is what the pipeline coordinator
/// surfaces to its disconnect callback.
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("decoder failed: {0}")]
    Decoder(String),

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("renderer failed: {0}")]
    Renderer(String),

    #[error("audio backend failed: {0}")]
    Audio(String),
}
