//! riftcast-nack — receiver-side gap tracking and NACK scheduling.
//!
//! Maintains a per-session receive cursor and a set of pending gaps. A
//! background ticker (driven externally, ~5 ms per tick) asks [`NackEmitter`]
//! which gaps are due for a (re)request; the caller folds the result into
//! the next outgoing QoS feedback packet rather than sending a
//! dedicated packet per gap.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use riftcast_core::seq16_lt;

const MAX_ATTEMPTS: u8 = 3;
/// Grace period after the final attempt before a gap is abandoned outright.
const ABANDON_GRACE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
struct PendingGap {
    first_seen: Instant,
    attempts: u8,
    last_requested: Option<Instant>,
}

/// Tracks gaps in the received `sequence_number` stream and schedules NACK
/// requests with back-off.
pub struct NackEmitter {
    expected: Option<u16>,
    pending: HashMap<u16, PendingGap>,
    /// Count of gaps abandoned after exhausting their attempts — folds into
    /// the QoS reporter's `packets_lost` tally.
    dropped_count: u64,
}

impl Default for NackEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl NackEmitter {
    pub fn new() -> Self {
        Self { expected: None, pending: HashMap::new(), dropped_count: 0 }
    }

    /// step 1: advance the cursor, or open gaps for everything skipped.
    pub fn on_packet_received(&mut self, seq: u16, now: Instant) {
        let Some(expected) = self.expected else {
            self.expected = Some(seq.wrapping_add(1));
            return;
        };

        if seq == expected {
            self.expected = Some(expected.wrapping_add(1));
            return;
        }

        if seq16_lt(expected, seq) {
            // seq is ahead of the cursor: everything in between is missing.
            let mut s = expected;
            while s != seq {
                self.pending.entry(s).or_insert(PendingGap {
                        first_seen: now,
                        attempts: 0,
                        last_requested: None,
                });
                s = s.wrapping_add(1);
            }
            self.expected = Some(seq.wrapping_add(1));
        } else {
            // seq is behind the cursor: either a duplicate, or the late
            // arrival of a previously pending gap.
            if self.pending.remove(&seq).is_some() {
                tracing::trace!(seq, "late arrival filled a pending NACK gap");
            }
        }
    }

    /// Explicitly resolve a gap — e.g. the jitter buffer popped or declared
    /// lost the frame it belonged to.
    pub fn resolve(&mut self, seq: u16) {
        self.pending.remove(&seq);
    }

    /// Called on the ~5 ms ticker. Returns sequence numbers due for a
    /// (re)request this tick, and abandons any gap that has exhausted
    /// its attempts and aged past the grace period.
    pub fn tick(&mut self, now: Instant, rtt_estimate: Duration, jitter: Duration) -> Vec<u16> {
        let deadline = rtt_estimate + jitter + Duration::from_millis(2);
        let mut due = Vec::new();
        let mut abandoned = Vec::new();

        for (&seq, gap) in self.pending.iter_mut() {
            let age = now.saturating_duration_since(gap.first_seen);
            if gap.attempts >= MAX_ATTEMPTS {
                let since_last = gap
                .last_requested
                .map(|t| now.saturating_duration_since(t))
                .unwrap_or(Duration::ZERO);
                if since_last >= ABANDON_GRACE {
                    abandoned.push(seq);
                }
                continue;
            }
            if age >= deadline {
                gap.attempts += 1;
                gap.last_requested = Some(now);
                due.push(seq);
            }
        }

        for seq in abandoned {
            self.pending.remove(&seq);
            self.dropped_count += 1;
        }

        due.sort_by_key(|s| *s as i64);
        due
    }

    /// Snapshot of currently pending gap count — cheap diagnostic, not used
    /// for NACK scheduling itself.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Count of gaps abandoned after exhausting all attempts, since the
    /// emitter was created (or last reset).
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_cursor_on_expected_sequence() {
        let mut nack = NackEmitter::new();
        let now = Instant::now();
        nack.on_packet_received(10, now);
        nack.on_packet_received(11, now);
        assert_eq!(nack.pending_count(), 0);
    }

    #[test]
    fn schedules_nack_for_single_missing_sequence() {
        let mut nack = NackEmitter::new();
        let now = Instant::now();
        nack.on_packet_received(10, now);
        nack.on_packet_received(11, now);
        nack.on_packet_received(13, now);
        nack.on_packet_received(14, now);
        assert_eq!(nack.pending_count(), 1);

        let rtt = Duration::from_millis(20);
        let jitter = Duration::from_millis(5);
        let deadline = now + rtt + jitter + Duration::from_millis(3);

        let due = nack.tick(deadline, rtt, jitter);
        assert_eq!(due, vec![12]);

        // Not requested again within the same window.
        let due_again = nack.tick(deadline, rtt, jitter);
        assert!(due_again.is_empty());
    }

    #[test]
    fn gap_resolved_on_late_arrival() {
        let mut nack = NackEmitter::new();
        let now = Instant::now();
        nack.on_packet_received(1, now);
        nack.on_packet_received(3, now);
        assert_eq!(nack.pending_count(), 1);
        nack.on_packet_received(2, now);
        assert_eq!(nack.pending_count(), 0);
    }

    #[test]
    fn gap_is_abandoned_after_three_attempts_and_grace_period() {
        let mut nack = NackEmitter::new();
        let start = Instant::now();
        nack.on_packet_received(10, start);
        nack.on_packet_received(12, start); // gap at 11

        let rtt = Duration::from_millis(10);
        let jitter = Duration::from_millis(0);
        let step = rtt + Duration::from_millis(2) + Duration::from_millis(1);

        let mut now = start;
        let mut total_requests = 0;
        for _ in 0..MAX_ATTEMPTS {
            now += step;
            let due = nack.tick(now, rtt, jitter);
            assert_eq!(due, vec![11]);
            total_requests += 1;
        }
        assert_eq!(total_requests, 3);
        assert_eq!(nack.pending_count(), 1); // still pending, awaiting grace period

        now += ABANDON_GRACE + Duration::from_millis(1);
        let due = nack.tick(now, rtt, jitter);
        assert!(due.is_empty());
        assert_eq!(nack.pending_count(), 0);
        assert_eq!(nack.dropped_count(), 1);
    }

    #[test]
    fn resolve_removes_pending_gap_externally() {
        let mut nack = NackEmitter::new();
        let now = Instant::now();
        nack.on_packet_received(1, now);
        nack.on_packet_received(3, now);
        nack.resolve(2);
        assert_eq!(nack.pending_count(), 0);
    }

    #[test]
    fn handles_rollover_gap() {
        let mut nack = NackEmitter::new();
        let now = Instant::now();
        nack.on_packet_received(0xFFFE, now);
        nack.on_packet_received(0x0001, now);
        assert_eq!(nack.pending_count(), 2); // 0xFFFF and 0x0000 missing
    }
}
