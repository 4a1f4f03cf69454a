//! clipboard protocol state machine: one in-flight chunk at a time,
//! retransmitted with exponential backoff until acked or abandoned.

use std::time::{Duration, Instant};

use bytes::Bytes;
use riftcast_wire::{ClipboardDirection, ClipboardFormat, ClipboardPacketHeader};

use crate::errors::ClipboardError;

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_BACKOFF: Duration = Duration::from_millis(3_200);

struct InFlight {
    sequence: u16,
    format: ClipboardFormat,
    payload: Bytes,
    attempts: u32,
    last_sent: Instant,
}

impl InFlight {
    fn backoff(&self) -> Duration {
        let doublings = self.attempts.saturating_sub(1).min(4);
        let millis = INITIAL_BACKOFF.as_millis() as u64 * (1u64 << doublings);
        Duration::from_millis(millis).min(MAX_BACKOFF)
    }
}

/// Sends clipboard chunks one at a time, retrying unacked chunks with
/// exponential backoff and abandoning after `MAX_ATTEMPTS`.
pub struct ClipboardSync {
    direction: ClipboardDirection,
    next_sequence: u16,
    in_flight: Option<InFlight>,
}

impl ClipboardSync {
    pub fn new(direction: ClipboardDirection) -> Self {
        Self { direction, next_sequence: 0, in_flight: None }
    }

    /// Begin sending a new chunk. Fails if one is already in flight — the
    /// caller must wait for an ack, a timeout, or call `cancel` first.
    pub fn send(&mut self, payload: Bytes, format: ClipboardFormat, now: Instant) -> Result<ClipboardPacketHeader, ClipboardError> {
        if payload.len() > ClipboardPacketHeader::MAX_PAYLOAD {
            return Err(ClipboardError::PayloadTooLarge { len: payload.len() });
        }
        if self.in_flight.is_some() {
            return Err(ClipboardError::AlreadyInFlight);
        }

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let header = ClipboardPacketHeader {
            direction: self.direction,
            sequence,
            format,
            length: payload.len() as u32,
        };
        self.in_flight = Some(InFlight { sequence, format, payload, attempts: 1, last_sent: now });
        Ok(header)
    }

    /// Handle an incoming `CLIP_ACK`. A sequence that doesn't match the
    /// in-flight chunk is a stale, duplicate, or reordered ack and is
    /// silently ignored.
    pub fn on_ack(&mut self, sequence: u16) {
        if self.in_flight.as_ref().is_some_and(|f| f.sequence == sequence) {
            self.in_flight = None;
        }
    }

    /// Cancel whatever is in flight, e.g. because the local clipboard
    /// changed again before the previous chunk was acked.
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Called periodically; retransmits the in-flight chunk once its
    /// backoff has elapsed, or gives up after `MAX_ATTEMPTS`.
    pub fn tick(&mut self, now: Instant) -> Result<Option<(ClipboardPacketHeader, Bytes)>, ClipboardError> {
        let Some(flight) = self.in_flight.as_mut() else {
            return Ok(None);
        };

        if now.saturating_duration_since(flight.last_sent) < flight.backoff() {
            return Ok(None);
        }

        if flight.attempts >= MAX_ATTEMPTS {
            let sequence = flight.sequence;
            self.in_flight = None;
            return Err(ClipboardError::Timeout { sequence });
        }

        flight.attempts += 1;
        flight.last_sent = now;
        let header = ClipboardPacketHeader {
            direction: self.direction,
            sequence: flight.sequence,
            format: flight.format,
            length: flight.payload.len() as u32,
        };
        Ok(Some((header, flight.payload.clone())))
    }
}
