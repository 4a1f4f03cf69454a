//! riftcast-qos — QoS reporter (receiver) and rate controller
//! (host), tied together only by the `QosFeedbackPacket` wire type they
//! share.

mod rate;
mod stats;

pub use rate::{RateController, RateDecision};
pub use stats::{QosReporter, DEFAULT_INTERVAL};
