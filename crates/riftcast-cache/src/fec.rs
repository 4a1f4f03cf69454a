//! FEC encoder — XOR pair-wise Forward Error Correction.
//!
//! Given a group of N data packets and a redundancy ratio, produces R
//! repair packets where repair packet `i = data[2i] XOR data[2i+1]`,
//! zero-padded to the longer operand. Recovers at most one loss per pair:
//! opportunistic protection, not a NACK substitute.

use std::sync::atomic::{AtomicU8, Ordering};

use bytes::Bytes;

/// Redundancy count for a group, after clamping ratio to `[0.0, 1.0]` and
/// capping at `floor(group_size / 2)`.
pub fn redundancy_count(group_size: usize, redundancy_ratio: f32) -> usize {
    let ratio = redundancy_ratio.clamp(0.0, 1.0);
    let max_r = group_size / 2;
    let requested = (group_size as f32 * ratio).round() as usize;
    requested.min(max_r)
}

fn xor_padded(a: &[u8], b: &[u8]) -> Bytes {
    let len = a.len().max(b.len());
    let mut out = vec![0u8; len];
    for (i, slot) in out.iter_mut().enumerate() {
        let av = a.get(i).copied().unwrap_or(0);
        let bv = b.get(i).copied().unwrap_or(0);
        *slot = av ^ bv;
    }
    Bytes::from(out)
}

/// Output of one FEC encoding pass: a group id (carried in the repair
/// packets' header, reusing the `codec` byte position) and the repair
/// payloads, in pair order.
pub struct FecGroup {
    pub group_id: u8,
    pub repair_payloads: Vec<Bytes>,
}

/// Stateful only in the monotonically increasing group id; the XOR
/// math itself is pure.
pub struct FecEncoder {
    next_group_id: AtomicU8,
}

impl Default for FecEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FecEncoder {
    pub fn new() -> Self {
        Self { next_group_id: AtomicU8::new(0) }
    }

    /// Encode one group. `payloads` is clamped to `[2, 48]` packets (extras
    /// beyond 48 are not covered by this group); groups of fewer than 2
    /// packets produce no repair packets (nothing to pair).
    pub fn encode_group(&self, payloads: &[Bytes], redundancy_ratio: f32) -> FecGroup {
        let group_id = self.next_group_id.fetch_add(1, Ordering::Relaxed);
        let capped = payloads.len().min(48);
        let payloads = &payloads[..capped];
        if payloads.len() < 2 {
            return FecGroup { group_id, repair_payloads: Vec::new() };
        }
        let r = redundancy_count(payloads.len(), redundancy_ratio);
        let repair_payloads = (0..r)
        .map(|i| xor_padded(&payloads[2 * i], &payloads[2 * i + 1]))
        .collect();
        FecGroup { group_id, repair_payloads }
    }

    /// Recover a lost data packet given its pair partner and the repair
    /// payload that covered them. `None` if both operands were already
    /// present (nothing to recover) is the caller's responsibility to
    /// avoid calling in that case; this just does the XOR.
    pub fn recover(partner: &[u8], repair: &[u8]) -> Bytes {
        xor_padded(partner, repair)
    }
}
