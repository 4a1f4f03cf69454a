//! riftcast-wire — bit-exact serialize/deserialize for every packet header
//! on the wire, plus the `classify` dispatch helper.
//!
//! All multi-byte fields are big-endian. Every header type exposes a
//! `serialize(payload) -> Bytes` / `deserialize(bytes) -> Result<(Header,
//! Bytes), WireError>` pair.

mod classify;
mod errors;
mod header;
mod packet_type;

pub use classify::classify;
pub use errors::WireError;
pub use header::*;
pub use packet_type::PacketType;
