use thiserror::Error;

/// Crypto and handshake errors. Fatal to the current DTLS session; the
/// coordinator re-enters `Reconnecting` and redrives P2P.
#[derive(Error, Debug)]
pub enum DtlsError {
    #[error("DTLS handshake did not complete within the 5s deadline")]
    HandshakeTimeout,

    #[error("DTLS handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("peer certificate fingerprint mismatch: expected {expected}, got {got}")]
    FingerprintMismatch { expected: String, got: String },

    #[error("peer presented no certificate during handshake")]
    NoPeerCertificate,

    #[error("record decryption failed: {0}")]
    DecryptFailed(String),

    #[error("failed to build DTLS context: {0}")]
    ContextSetup(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
