//! # Interact-Entity Wire Format
//!
//! The engine inspects exactly one serverbound message: the client telling the
//! server it used (right-clicked) or attacked an entity. Everything else on the
//! connection is opaque to us.
//!
//! ## Frame Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ VarInt packet_id   (0x0A for protocol 338/340)               │
//! ├──────────────────────────────────────────────────────────────┤
//! │ VarInt entity_id                                             │
//! │ VarInt action      (0 interact, 1 attack, 2 interact-at)     │
//! │ f32 BE x, y, z     (interact-at only)                        │
//! │ VarInt hand        (interact and interact-at only)           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The packet id moves between protocol versions, so the decoder is built for
//! one version and refuses versions it has no table entry for.

use crate::ids::FragmentId;
use crate::math::Vec3;
use thiserror::Error;

/// Maximum encoded size of a VarInt.
const VARINT_MAX_BYTES: usize = 5;

/// Errors raised while building a decoder or decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No packet table for this protocol version.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u32),

    /// Frame ended before a field was complete.
    #[error("unexpected end of frame at byte {offset}")]
    UnexpectedEof {
        /// Offset where the read started.
        offset: usize,
    },

    /// VarInt longer than five bytes.
    #[error("varint at byte {offset} exceeds 5 bytes")]
    VarIntTooLong {
        /// Offset where the VarInt started.
        offset: usize,
    },

    /// Unknown use-entity action discriminant.
    #[error("unknown interact action {0}")]
    UnknownAction(i32),

    /// Unknown hand discriminant.
    #[error("unknown hand {0}")]
    UnknownHand(i32),

    /// Bytes left over after the last field.
    #[error("{0} trailing bytes after interact packet")]
    TrailingBytes(usize),
}

/// Result type for protocol operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Protocol version negotiated by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolVersion(pub u32);

impl ProtocolVersion {
    /// 1.12.1
    pub const V1_12_1: Self = Self(338);
    /// 1.12.2
    pub const V1_12_2: Self = Self(340);

    /// Serverbound "use entity" packet id in this version.
    #[must_use]
    pub const fn use_entity_packet_id(self) -> Option<i32> {
        match self.0 {
            338 | 340 => Some(0x0A),
            _ => None,
        }
    }
}

/// What the client did to the entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractAction {
    /// Right click.
    Interact,
    /// Left click.
    Attack,
    /// Right click at a precise point on the entity.
    InteractAt,
}

impl InteractAction {
    /// Wire discriminant.
    #[must_use]
    pub const fn to_wire(self) -> i32 {
        match self {
            Self::Interact => 0,
            Self::Attack => 1,
            Self::InteractAt => 2,
        }
    }

    /// Parses a wire discriminant.
    pub const fn from_wire(value: i32) -> DecodeResult<Self> {
        match value {
            0 => Ok(Self::Interact),
            1 => Ok(Self::Attack),
            2 => Ok(Self::InteractAt),
            other => Err(DecodeError::UnknownAction(other)),
        }
    }
}

/// Hand used for an interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    /// Main hand.
    Main,
    /// Off hand.
    Off,
}

impl Hand {
    const fn to_wire(self) -> i32 {
        match self {
            Self::Main => 0,
            Self::Off => 1,
        }
    }

    const fn from_wire(value: i32) -> DecodeResult<Self> {
        match value {
            0 => Ok(Self::Main),
            1 => Ok(Self::Off),
            other => Err(DecodeError::UnknownHand(other)),
        }
    }
}

/// A decoded interact-entity message.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InteractPacket {
    /// Targeted entity.
    pub entity_id: FragmentId,
    /// Action kind.
    pub action: InteractAction,
    /// Hit point on the entity, present for [`InteractAction::InteractAt`].
    pub target: Option<Vec3>,
    /// Hand, absent for [`InteractAction::Attack`].
    pub hand: Option<Hand>,
}

impl InteractPacket {
    /// Plain right click with the main hand.
    #[must_use]
    pub const fn interact(entity_id: FragmentId) -> Self {
        Self {
            entity_id,
            action: InteractAction::Interact,
            target: None,
            hand: Some(Hand::Main),
        }
    }

    /// Left click.
    #[must_use]
    pub const fn attack(entity_id: FragmentId) -> Self {
        Self {
            entity_id,
            action: InteractAction::Attack,
            target: None,
            hand: None,
        }
    }

    /// Right click at `target` with `hand`.
    #[must_use]
    pub const fn interact_at(entity_id: FragmentId, target: Vec3, hand: Hand) -> Self {
        Self {
            entity_id,
            action: InteractAction::InteractAt,
            target: Some(target),
            hand: Some(hand),
        }
    }

    /// Encodes this packet as a full frame (packet id included).
    ///
    /// Hosts and simulations use this to feed the interceptor.
    pub fn encode(&self, version: ProtocolVersion) -> DecodeResult<Vec<u8>> {
        let packet_id = version
            .use_entity_packet_id()
            .ok_or(DecodeError::UnsupportedVersion(version.0))?;

        let mut writer = FrameWriter::new();
        writer.write_varint(packet_id);
        writer.write_varint(self.entity_id.0);
        writer.write_varint(self.action.to_wire());
        if self.action == InteractAction::InteractAt {
            let target = self.target.unwrap_or(Vec3::ZERO);
            writer.write_f32(target.x);
            writer.write_f32(target.y);
            writer.write_f32(target.z);
        }
        if self.action != InteractAction::Attack {
            writer.write_varint(self.hand.unwrap_or(Hand::Main).to_wire());
        }
        Ok(writer.into_bytes())
    }
}

/// Decoder for the interact-entity message of one protocol version.
#[derive(Clone, Copy, Debug)]
pub struct InteractDecoder {
    version: ProtocolVersion,
    packet_id: i32,
}

impl InteractDecoder {
    /// Builds a decoder for `version`.
    pub fn for_version(version: ProtocolVersion) -> DecodeResult<Self> {
        let packet_id = version
            .use_entity_packet_id()
            .ok_or(DecodeError::UnsupportedVersion(version.0))?;
        Ok(Self { version, packet_id })
    }

    /// Version this decoder was built for.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Packet id of the interact message in this version.
    #[must_use]
    pub const fn packet_id(&self) -> i32 {
        self.packet_id
    }

    /// Decodes a frame.
    ///
    /// Returns `Ok(None)` for every frame that is not an interact message;
    /// those are not parsed beyond their packet id.
    pub fn decode(&self, frame: &[u8]) -> DecodeResult<Option<InteractPacket>> {
        let mut reader = FrameReader::new(frame);
        if reader.read_varint()? != self.packet_id {
            return Ok(None);
        }

        let entity_id = FragmentId(reader.read_varint()?);
        let action = InteractAction::from_wire(reader.read_varint()?)?;

        let target = if action == InteractAction::InteractAt {
            Some(Vec3::new(
                reader.read_f32()?,
                reader.read_f32()?,
                reader.read_f32()?,
            ))
        } else {
            None
        };

        let hand = if action == InteractAction::Attack {
            None
        } else {
            Some(Hand::from_wire(reader.read_varint()?)?)
        };

        if reader.remaining() > 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }

        Ok(Some(InteractPacket {
            entity_id,
            action,
            target,
            hand,
        }))
    }
}

/// Cursor over an inbound frame.
struct FrameReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    fn read_u8(&mut self) -> DecodeResult<u8> {
        let value = *self
            .buffer
            .get(self.position)
            .ok_or(DecodeError::UnexpectedEof {
                offset: self.position,
            })?;
        self.position += 1;
        Ok(value)
    }

    fn read_varint(&mut self) -> DecodeResult<i32> {
        let start = self.position;
        let mut value: u32 = 0;
        for index in 0..VARINT_MAX_BYTES {
            let byte = self
                .read_u8()
                .map_err(|_| DecodeError::UnexpectedEof { offset: start })?;
            value |= u32::from(byte & 0x7F) << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(DecodeError::VarIntTooLong { offset: start })
    }

    fn read_f32(&mut self) -> DecodeResult<f32> {
        let start = self.position;
        let bytes = self
            .buffer
            .get(start..start + 4)
            .ok_or(DecodeError::UnexpectedEof { offset: start })?;
        self.position += 4;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Growable frame buffer used by [`InteractPacket::encode`].
struct FrameWriter {
    buffer: Vec<u8>,
}

impl FrameWriter {
    fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(32),
        }
    }

    fn write_varint(&mut self, value: i32) {
        let mut remaining = value as u32;
        loop {
            let byte = (remaining & 0x7F) as u8;
            remaining >>= 7;
            if remaining == 0 {
                self.buffer.push(byte);
                return;
            }
            self.buffer.push(byte | 0x80);
        }
    }

    fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> InteractDecoder {
        InteractDecoder::for_version(ProtocolVersion::V1_12_2).unwrap()
    }

    #[test]
    fn test_unsupported_version() {
        let err = InteractDecoder::for_version(ProtocolVersion(47)).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedVersion(47));
        assert!(InteractPacket::attack(FragmentId(1))
            .encode(ProtocolVersion(47))
            .is_err());
    }

    #[test]
    fn test_decode_interact_at() {
        let packet =
            InteractPacket::interact_at(FragmentId(1_000_042), Vec3::new(0.5, 1.25, -0.5), Hand::Off);
        let frame = packet.encode(ProtocolVersion::V1_12_2).unwrap();

        let decoded = decoder().decode(&frame).unwrap().unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_attack_has_no_hand() {
        let frame = InteractPacket::attack(FragmentId(300))
            .encode(ProtocolVersion::V1_12_1)
            .unwrap();
        // 0x0A, 300 as varint (0xAC 0x02), action 1
        assert_eq!(frame, vec![0x0A, 0xAC, 0x02, 0x01]);

        let decoded = decoder().decode(&frame).unwrap().unwrap();
        assert_eq!(decoded.action, InteractAction::Attack);
        assert_eq!(decoded.hand, None);
        assert_eq!(decoded.target, None);
    }

    #[test]
    fn test_negative_entity_id() {
        let frame = InteractPacket::interact(FragmentId(-1))
            .encode(ProtocolVersion::V1_12_2)
            .unwrap();
        assert_eq!(frame.len(), 1 + 5 + 1 + 1);
        let decoded = decoder().decode(&frame).unwrap().unwrap();
        assert_eq!(decoded.entity_id, FragmentId(-1));
    }

    #[test]
    fn test_other_packets_are_not_parsed() {
        // Chat message id followed by garbage: must not be an error.
        let frame = [0x02, 0xFF, 0xFF, 0xFF];
        assert_eq!(decoder().decode(&frame).unwrap(), None);
    }

    #[test]
    fn test_malformed_frames() {
        let decoder = decoder();
        assert_eq!(
            decoder.decode(&[]).unwrap_err(),
            DecodeError::UnexpectedEof { offset: 0 }
        );
        assert_eq!(
            decoder.decode(&[0x0A, 0x05]).unwrap_err(),
            DecodeError::UnexpectedEof { offset: 2 }
        );
        assert_eq!(
            decoder.decode(&[0x0A, 0x05, 0x07]).unwrap_err(),
            DecodeError::UnknownAction(7)
        );
        assert_eq!(
            decoder.decode(&[0x0A, 0x05, 0x00, 0x03]).unwrap_err(),
            DecodeError::UnknownHand(3)
        );
        assert_eq!(
            decoder.decode(&[0x0A, 0x05, 0x01, 0x00]).unwrap_err(),
            DecodeError::TrailingBytes(1)
        );
        assert_eq!(
            decoder
                .decode(&[0x0A, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01])
                .unwrap_err(),
            DecodeError::VarIntTooLong { offset: 1 }
        );
    }
}
