/// Top-level packet type tag.
///
/// For `Video`/`Audio`/`Input` the tag lives in the upper bits of the first
/// header byte; for everything else the first byte of the packet *is* the
/// tag, verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Video,
    Audio,
    Input,
    Controller,
    Clipboard,
    ClipAck,
    QosFeedback,
    Fec,
    Nack,
}

impl PacketType {
    /// Verbatim first-byte tag used by the non-shifted packet kinds.
    ///
    /// `Fec` is deliberately absent here: gives it the 16-byte video
    /// header *shape* (version/frame_type/keyframe/reserved bits in byte 0),
    /// not a verbatim tag — see `riftcast_wire::header::is_fec_first_byte`.
    pub const fn verbatim_tag(self) -> u8 {
        match self {
            PacketType::Controller => 0x10,
            PacketType::Clipboard => 0x11,
            PacketType::ClipAck => 0x12,
            PacketType::QosFeedback => 0x13,
            PacketType::Nack => 0x15,
            PacketType::Fec | PacketType::Video | PacketType::Audio | PacketType::Input => 0,
        }
    }

    /// Low-6-bit `type6` field carried in Audio/Input's `ver_type` byte (the
    /// upper 2 bits of that byte carry `version`). Video carries no type6 —
    /// its first byte is `version|frame_type|keyframe|reserved` instead, so
    /// Video is recognized only by elimination (see `classify`).
    pub const fn type6(self) -> u8 {
        match self {
            PacketType::Audio => 0x02,
            PacketType::Input => 0x03,
            _ => 0,
        }
    }

    pub const fn from_type6(tag: u8) -> Option<Self> {
        match tag {
            0x02 => Some(PacketType::Audio),
            0x03 => Some(PacketType::Input),
            _ => None,
        }
    }

    pub const fn from_verbatim_tag(tag: u8) -> Option<Self> {
        match tag {
            0x10 => Some(PacketType::Controller),
            0x11 => Some(PacketType::Clipboard),
            0x12 => Some(PacketType::ClipAck),
            0x13 => Some(PacketType::QosFeedback),
            0x15 => Some(PacketType::Nack),
            _ => None,
        }
    }
}
