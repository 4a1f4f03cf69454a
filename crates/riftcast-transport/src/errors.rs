use thiserror::Error;

/// Transport errors: socket/DTLS-adjacent failures that are not
/// themselves wire or crypto errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to bind UDP socket: {0}")]
    BindFailed(std::io::Error),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("no peer configured for this session")]
    NoPeer,

    #[error("packet starvation: no video received in over 2s")]
    Starvation,

    #[error("session was already stopped")]
    AlreadyStopped,
}

/// Aggregates every error kind a session can surface via `#[from]`.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Wire(#[from] riftcast_wire::WireError),

    #[error(transparent)]
    Dtls(#[from] riftcast_dtls::DtlsError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Reassembly(#[from] riftcast_jitter::PushError),

    #[error(transparent)]
    External(#[from] riftcast_core::errors::ExternalError),

    #[error(transparent)]
    Configuration(#[from] riftcast_core::errors::ConfigError),
}
