//! Packet cache (sender ring). A 512-slot ring indexed by
//! `sequence mod 512`, one writer (the send path), many readers (NACK
//! replay). Single mutex, never held across a socket send.

use std::sync::Mutex;

use bytes::Bytes;

const RING_SIZE: usize = 512;

#[derive(Clone)]
struct Slot {
    sequence: u16,
    bytes: Bytes,
}

/// Fixed-size ring of recently sent video/FEC packets, keyed by sequence,
/// for NACK replay.
pub struct PacketCache {
    slots: Mutex<Vec<Option<Slot>>>,
}

impl Default for PacketCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketCache {
    pub fn new() -> Self {
        Self { slots: Mutex::new(vec![None; RING_SIZE]) }
    }

    fn index(sequence: u16) -> usize {
        sequence as usize % RING_SIZE
    }

    /// Store a packet, overwriting whatever was in that slot unconditionally.
    pub fn store(&self, sequence: u16, bytes: Bytes) {
        let idx = Self::index(sequence);
        let mut slots = self.slots.lock().expect("packet cache mutex poisoned");
        slots[idx] = Some(Slot { sequence, bytes });
    }

    /// Look up a previously stored packet. Returns `None` if the slot was
    /// never written, or has since been overwritten by a different
    /// sequence number (stale slots naturally disappear after 512 new
    /// sends).
    pub fn get(&self, sequence: u16) -> Option<Bytes> {
        let idx = Self::index(sequence);
        let slots = self.slots.lock().expect("packet cache mutex poisoned");
        match &slots[idx] {
            Some(slot) if slot.sequence == sequence => Some(slot.bytes.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn stores_and_replays_byte_exact() {
        let cache = PacketCache::new();
        cache.store(42, Bytes::from_static(b"hello world"));
        assert_eq!(cache.get(42).unwrap(), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn miss_on_never_written_slot() {
        let cache = PacketCache::new();
        assert!(cache.get(7).is_none());
    }

    #[test]
    fn miss_after_slot_overwritten_by_different_sequence() {
        let cache = PacketCache::new();
        cache.store(1, Bytes::from_static(b"first"));
        // sequence 1 + RING_SIZE maps to the same slot.
        cache.store(1 + RING_SIZE as u16, Bytes::from_static(b"second"));
        assert!(cache.get(1).is_none());
        assert_eq!(cache.get(1 + RING_SIZE as u16).unwrap(), Bytes::from_static(b"second"));
    }

    #[test]
    fn replay_fidelity_survives_any_number_of_sends_below_512() {
        let mut rng = rand::thread_rng();
        let cache = PacketCache::new();
        let seq: u16 = rng.gen();
        let payload: Vec<u8> = (0..rng.gen_range(0..200)).map(|_| rng.gen()).collect();
        cache.store(seq, Bytes::from(payload.clone()));

        let sends_after: u16 = rng.gen_range(0..RING_SIZE as u16);
        for i in 1..=sends_after {
            // Avoid landing on the same slot for this round of sends.
            let other = seq.wrapping_add(RING_SIZE as u16).wrapping_add(i);
            cache.store(other, Bytes::from_static(b"x"));
        }

        assert_eq!(cache.get(seq).unwrap(), Bytes::from(payload));
    }
}
