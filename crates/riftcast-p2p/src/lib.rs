//! riftcast-p2p — local candidate enumeration and STUN-based
//! server-reflexive discovery. Pairing and connectivity checks belong to
//! the external signaler; this crate only gathers candidates and hands the
//! selected peer address off to the transport.

mod bootstrap;
mod candidate;
mod errors;
mod stun;

pub use bootstrap::query_stun_server;
pub use candidate::{gather_host_candidates, Candidate, CandidateKind, SERVER_REFLEXIVE_PRIORITY};
pub use errors::P2pError;
pub use stun::{parse_binding_response, BindingRequest, MAGIC_COOKIE};
