//! Byte-exact binary packet format shared by JOIN and VOICE datagrams.
//!
//! ```text
//! offset size  field
//!  0     4     magic           = 0x52565643 ("RVVC")
//!  4     1     version         = 1
//!  5     1     type            1=JOIN, 2=VOICE
//!  6     1     flags           bit0 RADIO, bits1..4 CHANNEL, bit5 PTT
//!  7     1     reserved0       = 0
//!  8     2     speaker_id      JOIN: 0;  VOICE: 1..N
//! 10     2     seq             JOIN: 0;  VOICE: wrapping uint16
//! 12     2     payload_len     length of bytes following the header
//! ```

use byteorder::{BigEndian, ByteOrder};

pub const MAGIC: u32 = 0x5256_5643;
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 14;
pub const JOIN_PAYLOAD_LEN: usize = 12;

pub const FLAG_RADIO: u8 = 0x01;
const FLAG_CH_SHIFT: u8 = 1;
const FLAG_CH_MASK: u8 = 0x0F << FLAG_CH_SHIFT;
pub const FLAG_PTT: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Join,
    Voice,
}

impl PacketType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(PacketType::Join),
            2 => Some(PacketType::Voice),
            _ => None,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            PacketType::Join => 1,
            PacketType::Voice => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub ptype: PacketType,
    pub flags: u8,
    pub speaker_id: u16,
    pub seq: u16,
    pub payload_len: u16,
}

/// Builds the routing flags byte from `(radio, channel, ptt)`.
pub fn flags_make(is_radio: bool, channel: u8, ptt: bool) -> u8 {
    let mut f = 0u8;
    if is_radio {
        f |= FLAG_RADIO;
    }
    f |= (channel & 0x0F) << FLAG_CH_SHIFT;
    if ptt {
        f |= FLAG_PTT;
    }
    f
}

pub fn flags_is_radio(f: u8) -> bool {
    f & FLAG_RADIO != 0
}

pub fn flags_channel(f: u8) -> u8 {
    (f & FLAG_CH_MASK) >> FLAG_CH_SHIFT
}

pub fn flags_ptt(f: u8) -> bool {
    f & FLAG_PTT != 0
}

fn write_header(out: &mut Vec<u8>, ptype: PacketType, flags: u8, speaker_id: u16, seq: u16, payload_len: u16) {
    let mut hdr = [0u8; HEADER_LEN];
    BigEndian::write_u32(&mut hdr[0..4], MAGIC);
    hdr[4] = VERSION;
    hdr[5] = ptype.to_byte();
    hdr[6] = flags;
    hdr[7] = 0;
    BigEndian::write_u16(&mut hdr[8..10], speaker_id);
    BigEndian::write_u16(&mut hdr[10..12], seq);
    BigEndian::write_u16(&mut hdr[12..14], payload_len);
    out.extend_from_slice(&hdr);
}

/// Builds a JOIN datagram: `session_id:u64 | player_id:u16 | reserved:u16=0`.
pub fn build_join_packet(session_id: u64, player_id: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + JOIN_PAYLOAD_LEN);
    write_header(&mut out, PacketType::Join, 0, 0, 0, JOIN_PAYLOAD_LEN as u16);

    let mut payload = [0u8; JOIN_PAYLOAD_LEN];
    BigEndian::write_u64(&mut payload[0..8], session_id);
    BigEndian::write_u16(&mut payload[8..10], player_id);
    // payload[10..12] reserved = 0
    out.extend_from_slice(&payload);
    out
}

/// Builds a VOICE datagram wrapping an opaque Opus packet. `payload` must be
/// non-empty; the spec rejects zero-length VOICE payloads on parse.
pub fn build_voice_packet(speaker_id: u16, seq: u16, flags: u8, payload: &[u8]) -> Option<Vec<u8>> {
    if payload.is_empty() || payload.len() > u16::MAX as usize {
        return None;
    }
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    write_header(&mut out, PacketType::Voice, flags, speaker_id, seq, payload.len() as u16);
    out.extend_from_slice(payload);
    Some(out)
}

/// Parses and validates the fixed header. Rejects wrong magic/version, and
/// any buffer shorter than `header + payload_len`.
pub fn parse_header(buf: &[u8]) -> Option<Header> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let magic = BigEndian::read_u32(&buf[0..4]);
    if magic != MAGIC {
        return None;
    }
    let version = buf[4];
    if version != VERSION {
        return None;
    }
    let ptype = PacketType::from_byte(buf[5])?;
    let flags = buf[6];
    let speaker_id = BigEndian::read_u16(&buf[8..10]);
    let seq = BigEndian::read_u16(&buf[10..12]);
    let payload_len = BigEndian::read_u16(&buf[12..14]);

    if buf.len() < HEADER_LEN + payload_len as usize {
        return None;
    }

    Some(Header {
        ptype,
        flags,
        speaker_id,
        seq,
        payload_len,
    })
}

/// Parses a JOIN packet, returning `(session_id, player_id)`.
pub fn parse_join_payload(buf: &[u8]) -> Option<(u64, u16)> {
    let hdr = parse_header(buf)?;
    if hdr.ptype != PacketType::Join {
        return None;
    }
    if hdr.payload_len as usize != JOIN_PAYLOAD_LEN {
        return None;
    }
    let payload = &buf[HEADER_LEN..HEADER_LEN + JOIN_PAYLOAD_LEN];
    let session_id = BigEndian::read_u64(&payload[0..8]);
    let player_id = BigEndian::read_u16(&payload[8..10]);
    Some((session_id, player_id))
}

/// Parses a VOICE packet, returning `(speaker_id, seq, flags, payload)`.
/// Rejects a zero-length payload — required for VOICE, optional for JOIN.
pub fn parse_voice_packet(buf: &[u8]) -> Option<(u16, u16, u8, &[u8])> {
    let hdr = parse_header(buf)?;
    if hdr.ptype != PacketType::Voice {
        return None;
    }
    if hdr.payload_len == 0 {
        return None;
    }
    let payload = &buf[HEADER_LEN..HEADER_LEN + hdr.payload_len as usize];
    Some((hdr.speaker_id, hdr.seq, hdr.flags, payload))
}
