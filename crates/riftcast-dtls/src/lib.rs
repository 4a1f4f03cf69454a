//! riftcast-dtls — a single-peer DTLS 1.2 session over a connected UDP
//! socket. One cipher suite, one ephemeral P-256 cert per session, no CA
//! verification (peer identity is a fingerprint exchanged via signaling,
//! out of scope here).

mod cert;
mod channel;
mod errors;

pub use cert::{fingerprint_of, SelfSignedIdentity};
pub use channel::{DtlsChannel, Role};
pub use errors::DtlsError;
