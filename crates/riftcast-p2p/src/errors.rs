use thiserror::Error;

/// Errors from the P2P bootstrap path.
#[derive(Error, Debug)]
pub enum P2pError {
    #[error("no local IPv4 candidates were found")]
    NoHostCandidates,
    #[error("failed to bind UDP socket for candidate: {0}")]
    BindFailed(std::io::Error),
    #[error("STUN server {0} did not answer within the retry budget")]
    StunTimeout(String),
    #[error("malformed STUN response: {0}")]
    MalformedStunResponse(String),
}
