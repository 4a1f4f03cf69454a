//! QoS reporter (receiver side). Accumulates per-interval receive
//! statistics and emits a [`QosFeedbackPacket`] on a fixed cadence,
//! regardless of whether the interval actually carried any traffic.

use std::time::{Duration, Instant};

use riftcast_wire::QosFeedbackPacket;

/// Default reporting cadence (200 ms).
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// How many NACK sequences ride inline in the feedback packet before the
/// rest get appended ("first two inline, remainder appended"); the
/// wire format itself has no hard cap, so this only bounds how many pending
/// sequences the reporter is willing to forward per tick.
const MAX_NACK_SEQS: usize = 32;

/// Least-squares slope of `(index, transit_us)` samples collected over one
/// interval — the "delay gradient" asks for, in signed microseconds of
/// drift per packet.
fn delay_gradient_us(samples: &[i64]) -> i32 {
    let n = samples.len() as f64;
    if n < 2.0 {
        return 0;
    }
    let sum_x: f64 = (0..samples.len()).map(|i| i as f64).sum();
    let sum_y: f64 = samples.iter().map(|&y| y as f64).sum();
    let sum_xy: f64 = samples.iter().enumerate().map(|(i, &y)| i as f64 * y as f64).sum();
    let sum_xx: f64 = (0..samples.len()).map(|i| (i * i) as f64).sum();
    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return 0;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    slope.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Accumulates receive-side statistics for one reporting interval and
/// produces a `QosFeedbackPacket` each time [`QosReporter::tick`] is called.
pub struct QosReporter {
    /// `(arrival_instant, timestamp_us)` of the very first packet ever
    /// observed — fixes the wall-clock ↔ media-clock correspondence used to
    /// compute transit time, mirroring `JitterBuffer`'s reference offset.
    reference: Option<(Instant, u32)>,
    packets_received: u32,
    bytes_received: u64,
    last_seq_received: u16,
    /// RFC-3550-style smoothed jitter estimate: `J += (|D| - J) / 16`.
    jitter_us: f64,
    prev_transit_us: Option<i64>,
    /// Transit-time samples collected this interval, for the delay
    /// gradient slope.
    transit_samples: Vec<i64>,
}

impl Default for QosReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl QosReporter {
    pub fn new() -> Self {
        Self {
            reference: None,
            packets_received: 0,
            bytes_received: 0,
            last_seq_received: 0,
            jitter_us: 0.0,
            prev_transit_us: None,
            transit_samples: Vec::new(),
        }
    }

    /// Record one received video/FEC packet. `timestamp_us` is the media
    /// timestamp carried in its header.
    pub fn on_packet_received(&mut self, sequence_number: u16, timestamp_us: u32, payload_len: usize, now: Instant) {
        if self.reference.is_none() {
            self.reference = Some((now, timestamp_us));
        }
        let (ref_instant, ref_ts) = self.reference.expect("just set");
        let arrival_us = ref_ts as i64 + now.saturating_duration_since(ref_instant).as_micros() as i64;
        let transit_us = arrival_us - timestamp_us as i64;

        if let Some(prev) = self.prev_transit_us {
            let d = (transit_us - prev).unsigned_abs() as f64;
            self.jitter_us += (d - self.jitter_us) / 16.0;
        }
        self.prev_transit_us = Some(transit_us);
        self.transit_samples.push(transit_us);

        self.packets_received += 1;
        self.bytes_received += payload_len as u64;
        self.last_seq_received = sequence_number;
    }

    /// Build the feedback packet for the interval that just elapsed and
    /// reset per-interval counters. `packets_lost` is supplied by the
    /// caller (the NACK emitter's final-drop count); `pending_nacks`
    /// are the gap sequences still outstanding.
    pub fn tick(&mut self, interval: Duration, packets_lost: u32, pending_nacks: &[u16]) -> QosFeedbackPacket {
        let interval_secs = interval.as_secs_f64().max(f64::EPSILON);
        let estimated_bw_kbps = ((self.bytes_received as f64 * 8.0 / 1000.0) / interval_secs).round() as u32;

        let total = self.packets_received + packets_lost;
        let packet_loss_x100 = if total > 0 {
            ((packets_lost as u64 * 10_000) / total as u64) as u16
        } else {
            0
        };

        let packet = QosFeedbackPacket {
            flags: 0,
            last_seq_received: self.last_seq_received,
            estimated_bw_kbps,
            packet_loss_x100,
            avg_jitter_us: self.jitter_us.round().clamp(0.0, u16::MAX as f64) as u16,
            delay_gradient_us: delay_gradient_us(&self.transit_samples),
            nack_seqs: pending_nacks.iter().copied().take(MAX_NACK_SEQS).collect(),
        };

        self.packets_received = 0;
        self.bytes_received = 0;
        self.transit_samples.clear();
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_interval_still_emits_a_report_with_zero_counts() {
        let mut reporter = QosReporter::new();
        let packet = reporter.tick(DEFAULT_INTERVAL, 0, &[]);
        assert_eq!(packet.estimated_bw_kbps, 0);
        assert_eq!(packet.packet_loss_x100, 0);
        assert_eq!(packet.last_seq_received, 0);
    }

    #[test]
    fn bandwidth_estimate_matches_bytes_times_eight_over_interval() {
        let mut reporter = QosReporter::new();
        let t0 = Instant::now();
        // 12_500 bytes/interval at 200ms => 100_000 bits / 0.2s = 500 kbps.
        reporter.on_packet_received(1, 1_000_000, 12_500, t0);
        let packet = reporter.tick(Duration::from_millis(200), 0, &[]);
        assert_eq!(packet.estimated_bw_kbps, 500);
    }

    #[test]
    fn packet_loss_x100_reflects_lost_over_received_plus_lost() {
        let mut reporter = QosReporter::new();
        let t0 = Instant::now();
        for seq in 0..9u16 {
            reporter.on_packet_received(seq, 1_000_000 + seq as u32 * 16_000, 100, t0);
        }
        // 9 received, 1 lost => 10% loss => packet_loss_x100 == 1000.
        let packet = reporter.tick(DEFAULT_INTERVAL, 1, &[]);
        assert_eq!(packet.packet_loss_x100, 1000);
    }

    #[test]
    fn nack_seqs_are_forwarded_verbatim_up_to_the_cap() {
        let mut reporter = QosReporter::new();
        let packet = reporter.tick(DEFAULT_INTERVAL, 0, &[5, 9, 20]);
        assert_eq!(packet.nack_seqs, vec![5, 9, 20]);
    }

    #[test]
    fn jitter_tracks_stable_arrival_as_zero() {
        let mut reporter = QosReporter::new();
        let t0 = Instant::now();
        // Perfectly paced arrivals: transit time never changes, jitter stays 0.
        for i in 0..20u32 {
            let ts = 1_000_000 + i * 16_000;
            reporter.on_packet_received(i as u16, ts, 100, t0 + Duration::from_micros((i * 16_000) as u64));
        }
        let packet = reporter.tick(DEFAULT_INTERVAL, 0, &[]);
        assert_eq!(packet.avg_jitter_us, 0);
    }

    #[test]
    fn cursor_carries_over_across_an_empty_interval() {
        let mut reporter = QosReporter::new();
        let t0 = Instant::now();
        reporter.on_packet_received(42, 1_000_000, 100, t0);
        let _ = reporter.tick(DEFAULT_INTERVAL, 0, &[]);
        // Next interval is empty; last_seq_received should carry the cursor.
        let packet = reporter.tick(DEFAULT_INTERVAL, 0, &[]);
        assert_eq!(packet.last_seq_received, 42);
        assert_eq!(packet.estimated_bw_kbps, 0);
    }
}
