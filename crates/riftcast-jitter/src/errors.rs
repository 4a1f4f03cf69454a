use thiserror::Error;

/// Reassembly errors. Logged at trace; local to the offending
/// frame — the session continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("frame_number {frame_number} is older than the last popped frame")]
    StaleFrame { frame_number: u16 },

    #[error("fragment {fragment_index} of frame {frame_number} re-delivered with a different payload")]
    FragmentMismatch { frame_number: u16, fragment_index: u8 },
}
