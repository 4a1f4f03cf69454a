//! Control channel: newline-delimited JSON commands and responses,
//! carried over a `std::sync::mpsc` pair as a stand-in for a local pipe,
//! on its own thread so it can never block the four pipeline worker
//! threads.

use std::sync::mpsc;
use std::thread;

use riftcast_core::{GamingMode, SessionConfig};
use serde::{Deserialize, Serialize};

use crate::stats::SessionStats;

/// The commands a caller can issue against a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    PrepareSession { config: SessionConfig },
    StartSession,
    StopSession,
    GetStats,
    ForceIdr,
    Reconfigure { bitrate_kbps: u32, fps: u32 },
    SetGamingMode { mode: GamingMode },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlResponse {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        stats: Option<SessionStats>,
    },
    Error {
        message: String,
    },
}

impl ControlResponse {
    pub fn ok() -> Self {
        ControlResponse::Ok { stats: None }
    }

    pub fn ok_with_stats(stats: SessionStats) -> Self {
        ControlResponse::Ok { stats: Some(stats) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ControlResponse::Error { message: message.into() }
    }
}

/// Runs `handle` on a dedicated thread, reading one command line at a time
/// and writing back one response line at a time. `handle` may block (e.g.
/// waiting on the coordinator's own lock) without affecting the pipeline
/// worker threads, since only this thread is blocked.
pub struct ControlChannel {
    command_tx: mpsc::Sender<String>,
    response_rx: mpsc::Receiver<String>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ControlChannel {
    pub fn spawn<F>(mut handle: F) -> Self
    where
    F: FnMut(ControlCommand) -> ControlResponse + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<String>();
        let (response_tx, response_rx) = mpsc::channel::<String>();

        let worker = thread::Builder::new()
        .name("riftcast-control".into())
        .spawn(move || {
                for line in command_rx {
                    let response = match serde_json::from_str::<ControlCommand>(line.trim_end()) {
                        Ok(cmd) => handle(cmd),
                        Err(e) => ControlResponse::error(format!("malformed command: {e}")),
                    };
                    let mut encoded = serde_json::to_string(&response)
                    .unwrap_or_else(|_| r#"{"status":"error","message":"response serialization failed"}"#.to_string());
                    encoded.push('\n');
                    if response_tx.send(encoded).is_err() {
                        break;
                    }
                }
        })
        .expect("failed to spawn control channel thread");

        Self { command_tx, response_rx, worker: Some(worker) }
    }

    /// Submit one newline-delimited JSON command line (a trailing newline is
    /// optional; it is trimmed either way).
    pub fn send_command_line(&self, line: &str) -> Result<(), mpsc::SendError<String>> {
        self.command_tx.send(line.to_string())
    }

    pub fn send_command(&self, command: &ControlCommand) -> Result<(), mpsc::SendError<String>> {
        let line = serde_json::to_string(command).expect("ControlCommand always serializes");
        self.send_command_line(&line)
    }

    /// Block for the next newline-terminated JSON response line.
    pub fn recv_response_line(&self) -> Option<String> {
        self.response_rx.recv().ok()
    }

    pub fn recv_response(&self) -> Option<ControlResponse> {
        let line = self.recv_response_line()?;
        serde_json::from_str(line.trim_end()).ok()
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        // Dropping command_tx closes the worker's receive loop; join so the
        // thread doesn't outlive the channel.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn round_trips_a_command_and_response() {
        let channel = ControlChannel::spawn(|cmd| match cmd {
                ControlCommand::GetStats => ControlResponse::ok_with_stats(SessionStats {
                        state: "streaming".to_string(),
                        bitrate_kbps: 8000,
                        packets_received: 42,
                        packets_lost: 0,
                        avg_jitter_us: 1.5,
                }),
                _ => ControlResponse::ok(),
        });

        channel.send_command(&ControlCommand::GetStats).unwrap();
        let response = channel.recv_response().unwrap();
        match response {
            ControlResponse::Ok { stats: Some(stats) } => assert_eq!(stats.bitrate_kbps, 8000),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn malformed_command_line_yields_an_error_response_not_a_panic() {
        let channel = ControlChannel::spawn(|_| ControlResponse::ok());
        channel.send_command_line("not json\n").unwrap();
        let response = channel.recv_response().unwrap();
        assert!(matches!(response, ControlResponse::Error { .. }));
    }

    #[test]
    fn commands_are_forwarded_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let channel = ControlChannel::spawn(move |cmd| {
                seen_clone.lock().unwrap().push(format!("{cmd:?}"));
                ControlResponse::ok()
        });

        channel.send_command(&ControlCommand::StartSession).unwrap();
        channel.send_command(&ControlCommand::ForceIdr).unwrap();
        let _ = channel.recv_response();
        let _ = channel.recv_response();

        let log = seen.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].contains("StartSession"));
        assert!(log[1].contains("ForceIdr"));
    }
}
