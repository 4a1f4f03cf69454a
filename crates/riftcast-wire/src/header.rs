//! Fixed-layout wire headers. Every header type exposes a
//! `serialize`/`deserialize` pair. All multi-byte fields are big-endian.

use bytes::{BufMut, Bytes, BytesMut};
use riftcast_core::{FrameType, VideoCodec};

use crate::errors::WireError;

const WIRE_VERSION: u8 = 1;

fn check_len(buf: &[u8], need: usize) -> Result<(), WireError> {
    if buf.len() < need {
        Err(WireError::TooShort { need, got: buf.len() })
    } else {
        Ok(())
    }
}

// ── Video packet header (16 bytes) ─────────────────────────────────────

/// `version(2b) frame_type(1b) keyframe(1b) reserved(4b); codec; sequence_number(16b);
/// timestamp_us(32b, lower bits); frame_number(16b); fragment_index; fragment_total;
/// payload_length(32b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPacketHeader {
    pub version: u8,
    pub frame_type: FrameType,
    pub keyframe: bool,
    pub codec: VideoCodec,
    pub sequence_number: u16,
    pub timestamp_us: u32,
    pub frame_number: u16,
    pub fragment_index: u8,
    pub fragment_total: u8,
    pub payload_length: u32,
}

impl VideoPacketHeader {
    pub const LEN: usize = 16;

    pub fn serialize(&self, payload: &[u8]) -> Result<Bytes, WireError> {
        if self.fragment_index >= self.fragment_total {
            return Err(WireError::BadFragment {
                    fragment_index: self.fragment_index as u16,
                    fragment_total: self.fragment_total as u16,
            });
        }
        let mut buf = BytesMut::with_capacity(Self::LEN + payload.len());
        let byte0 = ((self.version & 0x03) << 6)
        | ((self.frame_type.bit() & 0x01) << 5)
        | (((self.keyframe as u8) & 0x01) << 4);
        buf.put_u8(byte0);
        buf.put_u8(self.codec.tag());
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp_us);
        buf.put_u16(self.frame_number);
        buf.put_u8(self.fragment_index);
        buf.put_u8(self.fragment_total);
        buf.put_u32(self.payload_length);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, Bytes), WireError> {
        check_len(buf, Self::LEN)?;
        let byte0 = buf[0];
        let version = (byte0 >> 6) & 0x03;
        if version != WIRE_VERSION {
            return Err(WireError::BadVersion(version));
        }
        let frame_type = FrameType::from_bit((byte0 >> 5) & 0x01);
        let keyframe = (byte0 >> 4) & 0x01 != 0;
        let codec = VideoCodec::from_tag(buf[1]).ok_or(WireError::UnknownType(buf[1]))?;
        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp_us = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let frame_number = u16::from_be_bytes([buf[8], buf[9]]);
        let fragment_index = buf[10];
        let fragment_total = buf[11];
        let payload_length = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);

        if fragment_index as u16 >= fragment_total as u16 {
            return Err(WireError::BadFragment {
                    fragment_index: fragment_index as u16,
                    fragment_total: fragment_total as u16,
            });
        }
        let payload = &buf[Self::LEN..];
        if payload.len() != payload_length as usize {
            return Err(WireError::LengthMismatch { declared: payload_length, actual: payload.len() });
        }
        Ok((
                Self {
                    version,
                    frame_type,
                    keyframe,
                    codec,
                    sequence_number,
                    timestamp_us,
                    frame_number,
                    fragment_index,
                    fragment_total,
                    payload_length,
                },
                Bytes::copy_from_slice(payload)))
    }
}

// ── Audio packet header (8 bytes) ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioPacketHeader {
    pub version: u8,
    pub channel_id: u8,
    pub sequence_number: u16,
    pub timestamp_us: u32,
}

impl AudioPacketHeader {
    pub const LEN: usize = 8;

    pub fn serialize(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN + payload.len());
        let byte0 = ((self.version & 0x03) << 6) | (crate::packet_type::PacketType::Audio.type6() & 0x3f);
        buf.put_u8(byte0);
        buf.put_u8(self.channel_id);
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp_us);
        buf.put_slice(payload);
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, Bytes), WireError> {
        check_len(buf, Self::LEN)?;
        let byte0 = buf[0];
        let version = (byte0 >> 6) & 0x03;
        if version != WIRE_VERSION {
            return Err(WireError::BadVersion(version));
        }
        let channel_id = buf[1];
        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp_us = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let payload = Bytes::copy_from_slice(&buf[Self::LEN..]);
        Ok((Self { version, channel_id, sequence_number, timestamp_us }, payload))
    }
}

// ── Input packet header (4 bytes) ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    MouseMove,
    MouseButton,
    Key,
    Scroll,
}

impl InputType {
    pub const fn tag(self) -> u8 {
        match self {
            InputType::MouseMove => 0,
            InputType::MouseButton => 1,
            InputType::Key => 2,
            InputType::Scroll => 3,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(InputType::MouseMove),
            1 => Some(InputType::MouseButton),
            2 => Some(InputType::Key),
            3 => Some(InputType::Scroll),
            _ => None,
        }
    }

    /// Fixed payload length for this event kind (5/2/4/4 bytes).
    pub const fn payload_len(self) -> usize {
        match self {
            InputType::MouseMove => 5,
            InputType::MouseButton => 2,
            InputType::Key => 4,
            InputType::Scroll => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPacketHeader {
    pub version: u8,
    pub input_type: InputType,
    pub payload_length: u16,
}

impl InputPacketHeader {
    pub const LEN: usize = 4;

    pub fn serialize(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN + payload.len());
        let byte0 = ((self.version & 0x03) << 6) | (crate::packet_type::PacketType::Input.type6() & 0x3f);
        buf.put_u8(byte0);
        buf.put_u8(self.input_type.tag());
        buf.put_u16(self.payload_length);
        buf.put_slice(payload);
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, Bytes), WireError> {
        check_len(buf, Self::LEN)?;
        let byte0 = buf[0];
        let version = (byte0 >> 6) & 0x03;
        if version != WIRE_VERSION {
            return Err(WireError::BadVersion(version));
        }
        let input_type = InputType::from_tag(buf[1]).ok_or(WireError::UnknownType(buf[1]))?;
        let payload_length = u16::from_be_bytes([buf[2], buf[3]]);
        let payload = &buf[Self::LEN..];
        if payload.len() != payload_length as usize {
            return Err(WireError::LengthMismatch { declared: payload_length as u32, actual: payload.len() });
        }
        Ok((Self { version, input_type, payload_length }, Bytes::copy_from_slice(payload)))
    }
}

// ── Controller packet ─────────────────────────────────────────────────
//
// The distilled spec's headline byte count ("13 bytes") undercounts its own
// field list (type + controller_id + sequence + buttons + two 8-bit
// triggers + four signed 16-bit thumbstick axes sums to 16). DESIGN.md
// records this as a resolved open question: the field list is authoritative,
// the total is 16 bytes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPacket {
    pub controller_id: u8,
    pub sequence: u16,
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl ControllerPacket {
    pub const LEN: usize = 16;
    pub const TYPE_TAG: u8 = 0x10;

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        buf.put_u8(Self::TYPE_TAG);
        buf.put_u8(self.controller_id);
        buf.put_u16(self.sequence);
        buf.put_u16(self.buttons);
        buf.put_u8(self.left_trigger);
        buf.put_u8(self.right_trigger);
        buf.put_i16(self.thumb_lx);
        buf.put_i16(self.thumb_ly);
        buf.put_i16(self.thumb_rx);
        buf.put_i16(self.thumb_ry);
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        check_len(buf, Self::LEN)?;
        if buf[0] != Self::TYPE_TAG {
            return Err(WireError::UnknownType(buf[0]));
        }
        Ok(Self {
                controller_id: buf[1],
                sequence: u16::from_be_bytes([buf[2], buf[3]]),
                buttons: u16::from_be_bytes([buf[4], buf[5]]),
                left_trigger: buf[6],
                right_trigger: buf[7],
                thumb_lx: i16::from_be_bytes([buf[8], buf[9]]),
                thumb_ly: i16::from_be_bytes([buf[10], buf[11]]),
                thumb_rx: i16::from_be_bytes([buf[12], buf[13]]),
                thumb_ry: i16::from_be_bytes([buf[14], buf[15]]),
        })
    }
}

// ── QoS feedback packet (22-byte base) ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosFeedbackPacket {
    pub flags: u8,
    pub last_seq_received: u16,
    pub estimated_bw_kbps: u32,
    pub packet_loss_x100: u16,
    pub avg_jitter_us: u16,
    pub delay_gradient_us: i32,
    /// Inline `nack_seq_0`/`nack_seq_1` plus any overflow, in order.
    pub nack_seqs: Vec<u16>,
}

impl QosFeedbackPacket {
    pub const BASE_LEN: usize = 22;
    pub const TYPE_TAG: u8 = 0x13;

    pub fn serialize(&self) -> Bytes {
        let extra = self.nack_seqs.len().saturating_sub(2);
        let mut buf = BytesMut::with_capacity(Self::BASE_LEN + extra * 2);
        buf.put_u8(Self::TYPE_TAG);
        buf.put_u8(self.flags);
        buf.put_u16(self.last_seq_received);
        buf.put_u32(self.estimated_bw_kbps);
        buf.put_u16(self.packet_loss_x100);
        buf.put_u16(self.avg_jitter_us);
        buf.put_i32(self.delay_gradient_us);
        buf.put_u16(self.nack_seqs.len() as u16);
        buf.put_u16(self.nack_seqs.first().copied().unwrap_or(0));
        buf.put_u16(self.nack_seqs.get(1).copied().unwrap_or(0));
        for seq in self.nack_seqs.iter().skip(2) {
            buf.put_u16(*seq);
        }
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        check_len(buf, Self::BASE_LEN)?;
        if buf[0] != Self::TYPE_TAG {
            return Err(WireError::UnknownType(buf[0]));
        }
        let flags = buf[1];
        let last_seq_received = u16::from_be_bytes([buf[2], buf[3]]);
        let estimated_bw_kbps = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let packet_loss_x100 = u16::from_be_bytes([buf[8], buf[9]]);
        let avg_jitter_us = u16::from_be_bytes([buf[10], buf[11]]);
        let delay_gradient_us = i32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let nack_count = u16::from_be_bytes([buf[16], buf[17]]) as usize;
        let nack_seq_0 = u16::from_be_bytes([buf[18], buf[19]]);
        let nack_seq_1 = u16::from_be_bytes([buf[20], buf[21]]);

        let extra = nack_count.saturating_sub(2);
        check_len(buf, Self::BASE_LEN + extra * 2)?;
        let mut nack_seqs = Vec::with_capacity(nack_count);
        if nack_count > 0 {
            nack_seqs.push(nack_seq_0);
        }
        if nack_count > 1 {
            nack_seqs.push(nack_seq_1);
        }
        for i in 0..extra {
            let off = Self::BASE_LEN + i * 2;
            nack_seqs.push(u16::from_be_bytes([buf[off], buf[off + 1]]));
        }

        Ok(Self {
                flags,
                last_seq_received,
                estimated_bw_kbps,
                packet_loss_x100,
                avg_jitter_us,
                delay_gradient_us,
                nack_seqs,
        })
    }
}

// ── Clipboard / ClipAck packets ──────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardDirection {
    ViewerToHost,
    HostToViewer,
}

impl ClipboardDirection {
    pub const fn tag(self) -> u8 {
        match self {
            ClipboardDirection::ViewerToHost => 0,
            ClipboardDirection::HostToViewer => 1,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ClipboardDirection::ViewerToHost),
            1 => Some(ClipboardDirection::HostToViewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardFormat {
    TextUtf8,
}

impl ClipboardFormat {
    pub const fn tag(self) -> u8 {
        0
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ClipboardFormat::TextUtf8),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardPacketHeader {
    pub direction: ClipboardDirection,
    pub sequence: u16,
    pub format: ClipboardFormat,
    pub length: u32,
}

impl ClipboardPacketHeader {
    pub const LEN: usize = 9;
    pub const TYPE_TAG: u8 = 0x11;
    /// Clipboard payloads are capped at 65536 UTF-8 bytes.
    pub const MAX_PAYLOAD: usize = 65_536;

    pub fn serialize(&self, payload: &[u8]) -> Result<Bytes, WireError> {
        if payload.len() > Self::MAX_PAYLOAD {
            return Err(WireError::LengthMismatch { declared: Self::MAX_PAYLOAD as u32, actual: payload.len() });
        }
        let mut buf = BytesMut::with_capacity(Self::LEN + payload.len());
        buf.put_u8(Self::TYPE_TAG);
        buf.put_u8(self.direction.tag());
        buf.put_u16(self.sequence);
        buf.put_u8(self.format.tag());
        buf.put_u32(self.length);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, Bytes), WireError> {
        check_len(buf, Self::LEN)?;
        if buf[0] != Self::TYPE_TAG {
            return Err(WireError::UnknownType(buf[0]));
        }
        let direction = ClipboardDirection::from_tag(buf[1]).ok_or(WireError::UnknownType(buf[1]))?;
        let sequence = u16::from_be_bytes([buf[2], buf[3]]);
        let format = ClipboardFormat::from_tag(buf[4]).ok_or(WireError::UnknownType(buf[4]))?;
        let length = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);
        let payload = &buf[Self::LEN..];
        if payload.len() != length as usize || payload.len() > Self::MAX_PAYLOAD {
            return Err(WireError::LengthMismatch { declared: length, actual: payload.len() });
        }
        Ok((Self { direction, sequence, format, length }, Bytes::copy_from_slice(payload)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipAckPacket {
    pub direction: ClipboardDirection,
    pub sequence: u16,
}

impl ClipAckPacket {
    pub const LEN: usize = 4;
    pub const TYPE_TAG: u8 = 0x12;

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN);
        buf.put_u8(Self::TYPE_TAG);
        buf.put_u8(self.direction.tag());
        buf.put_u16(self.sequence);
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        check_len(buf, Self::LEN)?;
        if buf[0] != Self::TYPE_TAG {
            return Err(WireError::UnknownType(buf[0]));
        }
        let direction = ClipboardDirection::from_tag(buf[1]).ok_or(WireError::UnknownType(buf[1]))?;
        let sequence = u16::from_be_bytes([buf[2], buf[3]]);
        Ok(Self { direction, sequence })
    }
}

// ── FEC packet ─────────────────────────────────────────────────────────
//
// Reuses the 16-byte video header shape; the `codec` byte position instead
// carries a monotonically increasing group id.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FecPacketHeader {
    pub version: u8,
    pub group_id: u8,
    pub sequence_number: u16,
    pub timestamp_us: u32,
    pub frame_number: u16,
    pub fragment_index: u8,
    pub fragment_total: u8,
    pub payload_length: u32,
}

impl FecPacketHeader {
    pub const LEN: usize = 16;

    pub fn serialize(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::LEN + payload.len());
        let byte0 = ((self.version & 0x03) << 6) | 0x04; // frame_type/keyframe bits unused, low nibble tags FEC
        buf.put_u8(byte0);
        buf.put_u8(self.group_id);
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp_us);
        buf.put_u16(self.frame_number);
        buf.put_u8(self.fragment_index);
        buf.put_u8(self.fragment_total);
        buf.put_u32(self.payload_length);
        buf.put_slice(payload);
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<(Self, Bytes), WireError> {
        check_len(buf, Self::LEN)?;
        let byte0 = buf[0];
        let version = (byte0 >> 6) & 0x03;
        if version != WIRE_VERSION {
            return Err(WireError::BadVersion(version));
        }
        let group_id = buf[1];
        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp_us = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let frame_number = u16::from_be_bytes([buf[8], buf[9]]);
        let fragment_index = buf[10];
        let fragment_total = buf[11];
        let payload_length = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let payload = &buf[Self::LEN..];
        if payload.len() != payload_length as usize {
            return Err(WireError::LengthMismatch { declared: payload_length, actual: payload.len() });
        }
        Ok((
                Self {
                    version,
                    group_id,
                    sequence_number,
                    timestamp_us,
                    frame_number,
                    fragment_index,
                    fragment_total,
                    payload_length,
                },
                Bytes::copy_from_slice(payload)))
    }
}

/// FEC packets are recognized by the 0x04 tag in the low nibble of byte0
/// (distinct from video's frame_type/keyframe bit positions since version
/// occupies the top 2 bits and FEC never sets the frame_type/keyframe bits).
pub fn is_fec_first_byte(byte0: u8) -> bool {
    byte0 & 0x0f == 0x04
}

// ── Standalone NACK packet ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NackPacket {
    pub seqs: Vec<u16>,
}

impl NackPacket {
    pub const TYPE_TAG: u8 = 0x15;

    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(3 + self.seqs.len() * 2);
        buf.put_u8(Self::TYPE_TAG);
        buf.put_u16(self.seqs.len() as u16);
        for seq in &self.seqs {
            buf.put_u16(*seq);
        }
        buf.freeze()
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        check_len(buf, 3)?;
        if buf[0] != Self::TYPE_TAG {
            return Err(WireError::UnknownType(buf[0]));
        }
        let count = u16::from_be_bytes([buf[1], buf[2]]) as usize;
        check_len(buf, 3 + count * 2)?;
        let mut seqs = Vec::with_capacity(count);
        for i in 0..count {
            let off = 3 + i * 2;
            seqs.push(u16::from_be_bytes([buf[off], buf[off + 1]]));
        }
        Ok(Self { seqs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use riftcast_core::FrameType;

    fn rand_codec(rng: &mut impl Rng) -> VideoCodec {
        [VideoCodec::H264, VideoCodec::H265, VideoCodec::Av1][rng.gen_range(0..3)]
    }

    #[test]
    fn video_header_roundtrip_sanity_len() {
        assert_eq!(VideoPacketHeader::LEN, 16);
    }

    #[test]
    fn audio_header_roundtrip_sanity_len() {
        assert_eq!(AudioPacketHeader::LEN, 8);
    }

    #[test]
    fn input_header_roundtrip_sanity_len() {
        assert_eq!(InputPacketHeader::LEN, 4);
    }

    #[test]
    fn qos_header_roundtrip_sanity_len() {
        assert_eq!(QosFeedbackPacket::BASE_LEN, 22);
    }

    #[test]
    fn video_header_roundtrips_over_random_fields() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let fragment_total = rng.gen_range(1..=16u8);
            let fragment_index = rng.gen_range(0..fragment_total);
            let payload_len = rng.gen_range(0..64usize);
            let payload: Vec<u8> = (0..payload_len).map(|_| rng.gen()).collect();
            let header = VideoPacketHeader {
                version: 1,
                frame_type: if rng.gen_bool(0.5) { FrameType::I } else { FrameType::P },
                keyframe: rng.gen_bool(0.2),
                codec: rand_codec(&mut rng),
                sequence_number: rng.gen(),
                timestamp_us: rng.gen(),
                frame_number: rng.gen(),
                fragment_index,
                fragment_total,
                payload_length: payload_len as u32,
            };
            let wire = header.serialize(&payload).unwrap();
            let (parsed, parsed_payload) = VideoPacketHeader::deserialize(&wire).unwrap();
            assert_eq!(parsed, header);
            assert_eq!(parsed_payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn video_header_rejects_bad_fragment_indices() {
        let header = VideoPacketHeader {
            version: 1,
            frame_type: FrameType::I,
            keyframe: true,
            codec: VideoCodec::H264,
            sequence_number: 0,
            timestamp_us: 0,
            frame_number: 0,
            fragment_index: 3,
            fragment_total: 3,
            payload_length: 0,
        };
        assert!(matches!(header.serialize(&[]), Err(WireError::BadFragment { .. })));
    }

    #[test]
    fn audio_header_roundtrips_over_random_fields() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let payload_len = rng.gen_range(0..200usize);
            let payload: Vec<u8> = (0..payload_len).map(|_| rng.gen()).collect();
            let header = AudioPacketHeader {
                version: 1,
                channel_id: rng.gen(),
                sequence_number: rng.gen(),
                timestamp_us: rng.gen(),
            };
            let wire = header.serialize(&payload);
            let (parsed, parsed_payload) = AudioPacketHeader::deserialize(&wire).unwrap();
            assert_eq!(parsed, header);
            assert_eq!(parsed_payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn input_header_roundtrips_over_random_fields() {
        let mut rng = rand::thread_rng();
        for input_type in [InputType::MouseMove, InputType::MouseButton, InputType::Key, InputType::Scroll] {
            let payload: Vec<u8> = (0..input_type.payload_len()).map(|_| rng.gen()).collect();
            let header = InputPacketHeader {
                version: 1,
                input_type,
                payload_length: payload.len() as u16,
            };
            let wire = header.serialize(&payload);
            let (parsed, parsed_payload) = InputPacketHeader::deserialize(&wire).unwrap();
            assert_eq!(parsed, header);
            assert_eq!(parsed_payload.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn controller_packet_roundtrips() {
        let pkt = ControllerPacket {
            controller_id: 2,
            sequence: 500,
            buttons: 0xBEEF,
            left_trigger: 128,
            right_trigger: 255,
            thumb_lx: -12000,
            thumb_ly: 30000,
            thumb_rx: 0,
            thumb_ry: -1,
        };
        let wire = pkt.serialize();
        assert_eq!(wire.len(), ControllerPacket::LEN);
        assert_eq!(ControllerPacket::deserialize(&wire).unwrap(), pkt);
    }

    #[test]
    fn qos_feedback_roundtrips_with_overflow_nacks() {
        let pkt = QosFeedbackPacket {
            flags: 0x01,
            last_seq_received: 42,
            estimated_bw_kbps: 12_345,
            packet_loss_x100: 250,
            avg_jitter_us: 900,
            delay_gradient_us: -5_000,
            nack_seqs: vec![10, 11, 12, 13, 14],
        };
        let wire = pkt.serialize();
        let parsed = QosFeedbackPacket::deserialize(&wire).unwrap();
        assert_eq!(parsed, pkt);
    }

    #[test]
    fn qos_feedback_roundtrips_with_fewer_than_two_nacks() {
        let pkt = QosFeedbackPacket {
            flags: 0,
            last_seq_received: 1,
            estimated_bw_kbps: 1,
            packet_loss_x100: 0,
            avg_jitter_us: 0,
            delay_gradient_us: 0,
            nack_seqs: vec![],
        };
        let wire = pkt.serialize();
        assert_eq!(wire.len(), QosFeedbackPacket::BASE_LEN);
        let parsed = QosFeedbackPacket::deserialize(&wire).unwrap();
        assert_eq!(parsed, pkt);
    }

    #[test]
    fn clipboard_packet_roundtrips_and_rejects_oversized_payload() {
        let header = ClipboardPacketHeader {
            direction: ClipboardDirection::ViewerToHost,
            sequence: 3,
            format: ClipboardFormat::TextUtf8,
            length: 5,
        };
        let wire = header.serialize(b"hello").unwrap();
        let (parsed, payload) = ClipboardPacketHeader::deserialize(&wire).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&payload[..], b"hello");

        let oversized = vec![0u8; ClipboardPacketHeader::MAX_PAYLOAD + 1];
        assert!(header.serialize(&oversized).is_err());
    }

    #[test]
    fn clip_ack_roundtrips() {
        let ack = ClipAckPacket { direction: ClipboardDirection::HostToViewer, sequence: 99 };
        let wire = ack.serialize();
        assert_eq!(wire.len(), ClipAckPacket::LEN);
        assert_eq!(ClipAckPacket::deserialize(&wire).unwrap(), ack);
    }

    #[test]
    fn fec_header_roundtrips() {
        let header = FecPacketHeader {
            version: 1,
            group_id: 7,
            sequence_number: 55,
            timestamp_us: 123_456,
            frame_number: 9,
            fragment_index: 0,
            fragment_total: 1,
            payload_length: 3,
        };
        let wire = header.serialize(b"xyz");
        assert!(is_fec_first_byte(wire[0]));
        let (parsed, payload) = FecPacketHeader::deserialize(&wire).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&payload[..], b"xyz");
    }

    #[test]
    fn nack_packet_roundtrips() {
        let pkt = NackPacket { seqs: vec![1, 2, 3, 65535] };
        let wire = pkt.serialize();
        assert_eq!(NackPacket::deserialize(&wire).unwrap(), pkt);
    }

    #[test]
    fn rejects_too_short_buffers() {
        assert!(matches!(VideoPacketHeader::deserialize(&[0u8; 4]), Err(WireError::TooShort { .. })));
        assert!(matches!(AudioPacketHeader::deserialize(&[0u8; 2]), Err(WireError::TooShort { .. })));
        assert!(matches!(InputPacketHeader::deserialize(&[0u8; 1]), Err(WireError::TooShort { .. })));
    }
}
