use thiserror::Error;

/// Malformed or unrecognized wire data. Logged at debug; the offending
/// packet is dropped and the session continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("packet too short: need at least {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },

    #[error("unsupported version {0}")]
    BadVersion(u8),

    #[error("fragment_index {fragment_index} >= fragment_total {fragment_total}")]
    BadFragment { fragment_index: u16, fragment_total: u16 },

    #[error("unknown packet type tag 0x{0:02x}")]
    UnknownType(u8),

    #[error("payload_length {declared} does not match remaining bytes {actual}")]
    LengthMismatch { declared: u32, actual: usize },
}
