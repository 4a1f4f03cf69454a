//! `classify` — a receive-loop dispatch helper.
//!
//! `0x10` is genuinely ambiguous: it is both Controller's verbatim tag and a
//! legal Video byte 0 (version=0, frame_type=P, keyframe=0, reserved=0). A
//! codec-byte check breaks the tie before the verbatim-tag table is even
//! consulted; everywhere else, Video carries no type6 of its own and is
//! recognized only by elimination. This heuristic is for receive-loop triage
//! only — it is never relied on by header parsing, which validates its own
//! tag/version fields independently.

use riftcast_core::VideoCodec;

use crate::header::is_fec_first_byte;
use crate::packet_type::PacketType;

/// Classify a datagram by its leading bytes. Returns `None` for anything
/// too short or unrecognized (the receive loop drops it as a Wire error).
pub fn classify(bytes: &[u8]) -> Option<PacketType> {
    let byte0 = *bytes.first()?;

    if byte0 == PacketType::Controller.verbatim_tag() {
        if bytes.len() > 1 && VideoCodec::from_tag(bytes[1]).is_some() {
            return Some(PacketType::Video);
        }
        return Some(PacketType::Controller);
    }

    if let Some(pt) = PacketType::from_verbatim_tag(byte0) {
        return Some(pt);
    }

    if is_fec_first_byte(byte0) {
        return Some(PacketType::Fec);
    }

    let type6 = byte0 & 0x3f;
    if let Some(pt) = PacketType::from_type6(type6) {
        return Some(pt);
    }

    // Video carries no type6 of its own: presume VIDEO iff the codec byte
    // looks like a real codec tag.
    if bytes.len() > 1 && VideoCodec::from_tag(bytes[1]).is_some() {
        return Some(PacketType::Video);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ClipAckPacket, ClipboardDirection, NackPacket, QosFeedbackPacket};

    #[test]
    fn classifies_qos_feedback_by_verbatim_tag() {
        let pkt = QosFeedbackPacket {
            flags: 0,
            last_seq_received: 1,
            estimated_bw_kbps: 1000,
            packet_loss_x100: 0,
            avg_jitter_us: 0,
            delay_gradient_us: 0,
            nack_seqs: vec![],
        };
        assert_eq!(classify(&pkt.serialize()), Some(PacketType::QosFeedback));
    }

    #[test]
    fn classifies_nack_and_clip_ack() {
        let nack = NackPacket { seqs: vec![1, 2] };
        assert_eq!(classify(&nack.serialize()), Some(PacketType::Nack));

        let ack = ClipAckPacket { direction: ClipboardDirection::HostToViewer, sequence: 7 };
        assert_eq!(classify(&ack.serialize()), Some(PacketType::ClipAck));
    }

    #[test]
    fn classifies_video_by_codec_fallback() {
        let buf = [0x41u8, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0];
        assert_eq!(classify(&buf), Some(PacketType::Video));
    }

    #[test]
    fn classifies_audio_and_input_by_type6() {
        let audio = [0x42u8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(classify(&audio), Some(PacketType::Audio));

        let input = [0x43u8, 0, 0, 0];
        assert_eq!(classify(&input), Some(PacketType::Input));
    }

    #[test]
    fn resolves_0x10_ambiguity_towards_video_when_codec_byte_is_valid() {
        // byte0 = 0x10 is both Controller's verbatim tag and a legal Video
        // byte0 (version=0, frame_type=P, reserved=0). A valid codec byte
        // at offset 1 breaks the tie towards Video.
        let buf = [0x10u8, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0];
        assert_eq!(classify(&buf), Some(PacketType::Video));
    }

    #[test]
    fn resolves_0x10_ambiguity_towards_controller_when_second_byte_is_not_a_codec() {
        let buf = [0x10u8, 0xff];
        assert_eq!(classify(&buf), Some(PacketType::Controller));
    }

    #[test]
    fn unrecognized_byte_yields_none() {
        let buf = [0x09u8, 0xff];
        assert_eq!(classify(&buf), None);
    }
}
