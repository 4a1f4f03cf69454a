//! riftcast-transport — the receive/decode/render/audio pipeline
//! coordinator, the control channel, and the glue code that
//! ties the lower-level wire/dtls/jitter/nack/qos/clipboard crates into one
//! `Session` per peer.

mod control;
mod coordinator;
mod errors;
mod host;
mod input_codec;
mod stats;
mod sync_primitives;
mod traits;

pub use control::{ControlChannel, ControlCommand, ControlResponse};
pub use coordinator::Session;
pub use errors::{SessionError, TransportError};
pub use host::HostSession;
pub use input_codec::{decode_input_event, encode_input_event};
pub use stats::SessionStats;
pub use traits::{AudioSink, Decoder, DecoderError, Encoder, Renderer};
