//! riftcast-cache — the sender-side packet cache ring and the XOR
//! pair-wise FEC encoder. Both are small, tightly coupled, sender-
//! only components that never run on the receiver.

mod fec;
mod ring;

pub use fec::FecEncoder;
pub use ring::PacketCache;
