use thiserror::Error;

/// Errors from the clipboard sync protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("clipboard chunk {sequence} was not acked after 5 attempts")]
    Timeout { sequence: u16 },
    #[error("a clipboard chunk is already in flight")]
    AlreadyInFlight,
    #[error("payload of {len} bytes exceeds the 65536-byte clipboard cap")]
    PayloadTooLarge { len: usize },
}
