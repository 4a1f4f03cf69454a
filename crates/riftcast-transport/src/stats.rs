use riftcast_core::ConnectionLifecycle;
use serde::{Deserialize, Serialize};

/// Snapshot returned by the `get_stats` control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub state: String,
    pub bitrate_kbps: u32,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub avg_jitter_us: f64,
}

pub(crate) fn state_label(state: &ConnectionLifecycle) -> String {
    match state {
        ConnectionLifecycle::Idle => "idle".to_string(),
        ConnectionLifecycle::Connecting => "connecting".to_string(),
        ConnectionLifecycle::Streaming => "streaming".to_string(),
        ConnectionLifecycle::Reconnecting { attempt } => format!("reconnecting({attempt})"),
        ConnectionLifecycle::Stopped => "stopped".to_string(),
        ConnectionLifecycle::Error { reason } => format!("error({reason})"),
    }
}
