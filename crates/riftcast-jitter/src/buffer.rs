//! jitter buffer — reassembles fragmented frames, reorders by
//! timestamp, enforces target depth, drops stale frames, and surfaces
//! complete (or deadline-expired) frames in display order.
//!
//! Not internally locked: the caller (riftcast-transport) wraps one
//! instance in a `Mutex` rather than this type locking itself, matching
//! `riftcast_nack::NackEmitter`'s convention.

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use riftcast_core::{seq16_lt, EncodedFrame, FrameType, VideoCodec};
use riftcast_wire::VideoPacketHeader;

use crate::errors::PushError;

struct PendingFrame {
    fragments: Vec<Option<Bytes>>,
    received: usize,
    fragment_total: u8,
    timestamp_us: u32,
    codec: VideoCodec,
    frame_type: FrameType,
    keyframe: bool,
    arrival_time: Instant,
}

impl PendingFrame {
    fn new(header: &VideoPacketHeader, now: Instant) -> Self {
        Self {
            fragments: vec![None; header.fragment_total as usize],
            received: 0,
            fragment_total: header.fragment_total,
            timestamp_us: header.timestamp_us,
            codec: header.codec,
            frame_type: header.frame_type,
            keyframe: header.keyframe,
            arrival_time: now,
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.fragment_total as usize
    }

    /// The frame may be emitted incomplete once this elapses, even if
    /// never complete.
    fn deadline(&self, target_depth: Duration) -> Instant {
        self.arrival_time + target_depth
    }

    /// Concatenation of whatever fragments are present, in ascending
    /// `fragment_index` order, skipping gaps.
    fn assemble(&self) -> Bytes {
        let total: usize = self.fragments.iter().flatten().map(|f| f.len()).sum();
        let mut buf = BytesMut::with_capacity(total);
        for frag in self.fragments.iter().flatten() {
            buf.extend_from_slice(frag);
        }
        buf.freeze()
    }
}

/// Reassembles fragmented video frames into complete, display-ordered
/// frames.
pub struct JitterBuffer {
    target_depth_ms: u32,
    frames: std::collections::HashMap<u16, PendingFrame>,
    /// The most recently *emitted* frame_number — used by the contiguity
    /// check (non-keyframes require their immediate predecessor to have
    /// been emitted).
    last_popped_frame_number: Option<u16>,
    /// Staleness watermark: any incoming or pending frame_number that
    /// compares older than `horizon` is discarded. Moves forward on every
    /// pop (`last_popped + 1`) and jumps forward on keyframe arrival.
    horizon: Option<u16>,
    /// `(arrival_instant, first_timestamp_us)` fixing the wall-clock ↔
    /// media-clock correspondence, established by the very first pushed
    /// packet.
    reference: Option<(Instant, u32)>,
}

impl JitterBuffer {
    pub fn new(target_depth_ms: u32) -> Self {
        Self {
            target_depth_ms,
            frames: std::collections::HashMap::new(),
            last_popped_frame_number: None,
            horizon: None,
            reference: None,
        }
    }

    pub fn set_target_depth_ms(&mut self, target_depth_ms: u32) {
        self.target_depth_ms = target_depth_ms;
    }

    pub fn target_depth_ms(&self) -> u32 {
        self.target_depth_ms
    }

    /// Number of frame_numbers currently tracked (complete or partial).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn is_stale(&self, frame_number: u16) -> bool {
        match self.horizon {
            Some(h) => seq16_lt(frame_number, h),
            None => false,
        }
    }

    /// Push one received video (or FEC-recovered) packet fragment.
    pub fn push(&mut self, header: &VideoPacketHeader, payload: Bytes, now: Instant) -> Result<(), PushError> {
        if self.reference.is_none() {
            self.reference = Some((now, header.timestamp_us));
        }

        // A keyframe with frame_number > horizon abandons everything
        // strictly before it and advances the staleness watermark to the
        // keyframe itself (which remains acceptable).
        if header.keyframe && header.frame_type == FrameType::I {
            let advances = match self.horizon {
                Some(h) => seq16_lt(h, header.frame_number),
                None => true,
            };
            if advances {
                self.horizon = Some(header.frame_number);
                self.frames.retain(|&fnum, _| !seq16_lt(fnum, header.frame_number));
            }
        }

        // Reject anything at or before the staleness watermark.
        if self.is_stale(header.frame_number) {
            self.frames.remove(&header.frame_number);
            return Err(PushError::StaleFrame { frame_number: header.frame_number });
        }

        let entry = self
        .frames
        .entry(header.frame_number)
        .or_insert_with(|| PendingFrame::new(header, now));

        let idx = header.fragment_index as usize;
        match &entry.fragments[idx] {
            Some(existing) if existing == &payload => {
                // Duplicate re-delivery of an already-filled fragment: no-op.
            }
            Some(_) => {
                let frame_number = header.frame_number;
                let fragment_index = header.fragment_index;
                self.frames.remove(&frame_number);
                return Err(PushError::FragmentMismatch { frame_number, fragment_index });
            }
            None => {
                entry.fragments[idx] = Some(payload);
                entry.received += 1;
            }
        }

        Ok(())
    }

    fn media_now(&self, now: Instant) -> i64 {
        let (ref_instant, ref_ts) = self.reference.expect("reference set by first push");
        ref_ts as i64 + now.saturating_duration_since(ref_instant).as_micros() as i64
    }

    /// A frame is only poppable once its own timestamp plus the target
    /// depth has elapsed on the media clock.
    fn pacing_ready(&self, frame: &PendingFrame, now: Instant) -> bool {
        let target_us = self.target_depth_ms as i64 * 1_000;
        self.media_now(now) >= frame.timestamp_us as i64 + target_us
    }

    fn wait_deadline_ready(&self, frame: &PendingFrame, now: Instant) -> bool {
        now >= frame.deadline(Duration::from_millis(self.target_depth_ms as u64))
    }

    /// Pop the next frame in display order, if one is ready. Returns `None`
    /// if the oldest tracked frame isn't ready yet (ordering is preserved —
    /// a later, ready frame is never emitted ahead of an earlier one still
    /// waiting).
    pub fn pop(&mut self, now: Instant) -> Option<EncodedFrame> {
        if self.reference.is_none() {
            return None;
        }

        loop {
            let next_candidate = self.next_frame_number_order().into_iter().next()?;
            let ready = {
                let frame = self.frames.get(&next_candidate)?;
                let complete = frame.is_complete();
                let deadline_hit = self.wait_deadline_ready(frame, now);
                (complete || deadline_hit) && self.pacing_ready(frame, now)
            };

            if !ready {
                return None;
            }

            let frame = self.frames.get(&next_candidate).expect("just checked present");
            let contiguous = frame.keyframe
            || match self.last_popped_frame_number {
                Some(lp) => next_candidate == lp.wrapping_add(1),
                None => true,
            };

            if !contiguous {
                // Drop this frame silently and re-scan; a later frame
                // may now be the contiguous/ready candidate.
                self.frames.remove(&next_candidate);
                self.horizon = Some(match self.horizon {
                        Some(h) if seq16_lt(h, next_candidate.wrapping_add(1)) => next_candidate.wrapping_add(1),
                        Some(h) => h,
                        None => next_candidate.wrapping_add(1),
                });
                continue;
            }

            let partial = !frame.is_complete();
            let pending = self.frames.remove(&next_candidate).expect("just checked present");
            self.last_popped_frame_number = Some(next_candidate);
            self.horizon = Some(match self.horizon {
                    Some(h) if seq16_lt(h, next_candidate.wrapping_add(1)) => next_candidate.wrapping_add(1),
                    Some(h) => h,
                    None => next_candidate.wrapping_add(1),
            });

            let data = pending.assemble();
            return Some(EncodedFrame {
                    data,
                    timestamp_us: pending.timestamp_us as u64,
                    frame_number: next_candidate,
                    is_keyframe: pending.keyframe,
                    frame_type: pending.frame_type,
                    codec: pending.codec,
                    partial,
            });
        }
    }

    /// All currently-tracked frame_numbers, ordered oldest-first relative
    /// to `last_popped_frame_number` (mod-2¹⁶ distance).
    fn next_frame_number_order(&self) -> Vec<u16> {
        let base = self.last_popped_frame_number.unwrap_or_else(|| {
                // No frame popped yet: order relative to the smallest distance
                // from any arbitrary tracked key minus one, so the very first
                // inserted frame sorts first.
                self.frames.keys().copied().min().map(|k| k.wrapping_sub(1)).unwrap_or(0)
        });
        let mut keys: Vec<u16> = self.frames.keys().copied().collect();
        keys.sort_by_key(|&k| riftcast_core::seq16_diff(k, base));
        keys
    }
}
