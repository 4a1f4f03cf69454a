//! Rate controller (host side). Consumes each `QosFeedbackPacket` and
//! adjusts the encoder's target bitrate, forcing an IDR when loss is severe
//! and replaying NACKed packets still held in the sender's packet cache.

use bytes::Bytes;
use riftcast_cache::PacketCache;
use riftcast_wire::QosFeedbackPacket;

/// >3% loss, x100-scaled.
const LOSS_DECREASE_THRESHOLD_X100: u16 = 300;
/// >10% loss, x100-scaled — also forces an IDR.
const LOSS_IDR_THRESHOLD_X100: u16 = 1_000;
const GRADIENT_DECREASE_THRESHOLD_US: i32 = 20_000;
/// <0.5% loss, x100-scaled.
const LOSS_INCREASE_THRESHOLD_X100: u16 = 50;
const GRADIENT_INCREASE_THRESHOLD_US: i32 = 5_000;
const GOOD_INTERVALS_FOR_INCREASE: u32 = 3;
const LOW_BANDWIDTH_RATIO: f64 = 0.7;
const LOW_BANDWIDTH_INTERVALS: u32 = 2;
const LOW_BANDWIDTH_CLAMP_RATIO: f64 = 0.9;
const DECREASE_FACTOR: f64 = 0.85;

/// The outcome of processing one feedback packet: the encoder's new target
/// bitrate, whether to force an IDR, and which NACKed packets were found in
/// the cache and should be resent immediately.
pub struct RateDecision {
    pub bitrate_kbps: u32,
    pub force_idr: bool,
    pub replay: Vec<(u16, Bytes)>,
}

/// Maintains the encoder's current bitrate within `[min, max]` bounds and
/// reacts to incoming QoS feedback.
pub struct RateController {
    min_bitrate_kbps: u32,
    max_bitrate_kbps: u32,
    current_bitrate_kbps: u32,
    consecutive_good_intervals: u32,
    consecutive_low_bandwidth_intervals: u32,
}

impl RateController {
    pub fn new(initial_bitrate_kbps: u32, min_bitrate_kbps: u32, max_bitrate_kbps: u32) -> Self {
        Self {
            min_bitrate_kbps,
            max_bitrate_kbps,
            current_bitrate_kbps: initial_bitrate_kbps.clamp(min_bitrate_kbps, max_bitrate_kbps),
            consecutive_good_intervals: 0,
            consecutive_low_bandwidth_intervals: 0,
        }
    }

    pub fn current_bitrate_kbps(&self) -> u32 {
        self.current_bitrate_kbps
    }

    fn clamp(&self, bitrate: f64) -> u32 {
        (bitrate.round() as i64).clamp(self.min_bitrate_kbps as i64, self.max_bitrate_kbps as i64) as u32
    }

    /// Process one incoming `QOS_FEEDBACK` packet, adjust the bitrate per
    /// reaction rules, and replay any NACKed sequences still present
    /// in `cache`.
    pub fn on_feedback(&mut self, feedback: &QosFeedbackPacket, cache: &PacketCache) -> RateDecision {
        let severe = feedback.packet_loss_x100 > LOSS_DECREASE_THRESHOLD_X100
        || feedback.delay_gradient_us > GRADIENT_DECREASE_THRESHOLD_US;
        let good = feedback.packet_loss_x100 < LOSS_INCREASE_THRESHOLD_X100
        && feedback.delay_gradient_us < GRADIENT_INCREASE_THRESHOLD_US;

        let mut force_idr = false;

        if severe {
            self.current_bitrate_kbps = self.clamp(self.current_bitrate_kbps as f64 * DECREASE_FACTOR);
            self.consecutive_good_intervals = 0;
            if feedback.packet_loss_x100 > LOSS_IDR_THRESHOLD_X100 {
                force_idr = true;
            }
        } else if good {
            self.consecutive_good_intervals += 1;
            if self.consecutive_good_intervals >= GOOD_INTERVALS_FOR_INCREASE {
                let step = (self.min_bitrate_kbps as f64) / 8.0;
                self.current_bitrate_kbps = self.clamp(self.current_bitrate_kbps as f64 + step);
                self.consecutive_good_intervals = 0;
            }
        } else {
            self.consecutive_good_intervals = 0;
        }

        let bw = feedback.estimated_bw_kbps as f64;
        if bw > 0.0 && bw < LOW_BANDWIDTH_RATIO * self.current_bitrate_kbps as f64 {
            self.consecutive_low_bandwidth_intervals += 1;
            if self.consecutive_low_bandwidth_intervals >= LOW_BANDWIDTH_INTERVALS {
                self.current_bitrate_kbps = self.clamp(bw * LOW_BANDWIDTH_CLAMP_RATIO);
                self.consecutive_low_bandwidth_intervals = 0;
            }
        } else {
            self.consecutive_low_bandwidth_intervals = 0;
        }

        let replay = feedback
        .nack_seqs
        .iter()
        .filter_map(|&seq| cache.get(seq).map(|bytes| (seq, bytes)))
        .collect();

        RateDecision { bitrate_kbps: self.current_bitrate_kbps, force_idr, replay }
    }
}
