//! Wire-format definitions for RDT packets.
//!
//! Every datagram exchanged between peers is a [`Packet`]. This module is
//! responsible for:
//! - Defining the on-wire binary layout (type, sequence number, checksum,
//!   length, payload).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`].
//!
//! No I/O happens here, and [`Packet::decode`] does **not** verify the
//! checksum: callers run [`crate::checksum::verify`] over the raw bytes.
//!
//! # Wire format
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |   Sequence    |           Checksum            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Payload Length         |          Payload ...          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The length is big-endian. The checksum is stored in the same
//! little-endian word order the checksum is summed in, which is what makes a
//! clean packet verify to zero.

use std::fmt;

use thiserror::Error;

use crate::checksum;
use crate::config::HEADER_LEN;

// Byte offsets of each field within the serialised header.
const OFF_TYPE: usize = 0;
const OFF_SEQ: usize = 1;
const OFF_CHECKSUM: usize = 2;
const OFF_LENGTH: usize = 4;

/// Packet type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Ack = 11,
    Data = 12,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            11 => Ok(Self::Ack),
            12 => Ok(Self::Data),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("ACK"),
            Self::Data => f.write_str("DATA"),
        }
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("datagram of {0} bytes is too short to contain a header")]
    BufferTooShort(usize),
    #[error("unknown packet type tag {0}")]
    UnknownType(u8),
}

/// A decoded RDT packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    /// Sequence number, modulo 256.
    pub seq: u8,
    /// Checksum field as found on the wire (zero before encoding).
    pub checksum: u16,
    /// Length field. Equals `payload.len()` for DATA; an ACK echoes the
    /// length of the DATA it acknowledges and carries no payload.
    pub length: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A DATA packet carrying `payload`.
    pub fn data(seq: u8, payload: &[u8]) -> Self {
        Self {
            kind: PacketType::Data,
            seq,
            checksum: 0,
            length: payload.len() as u16,
            payload: payload.to_vec(),
        }
    }

    /// An ACK for `seq` echoing `length`.
    pub fn ack(seq: u8, length: u16) -> Self {
        Self {
            kind: PacketType::Ack,
            seq,
            checksum: 0,
            length,
            payload: Vec::new(),
        }
    }

    /// Serialise into a newly allocated byte vector with the checksum filled in.
    ///
    /// Any value already stored in `checksum` is ignored.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];

        buf[OFF_TYPE] = self.kind as u8;
        buf[OFF_SEQ] = self.seq;
        // Checksum field stays zero while computing the checksum.
        buf[OFF_LENGTH..OFF_LENGTH + 2].copy_from_slice(&self.length.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        let csum = checksum::compute(&buf);
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_le_bytes());

        buf
    }

    /// Structurally unpack `buf`.
    ///
    /// Everything after the header is taken as payload. Returns [`Err`] if
    /// `buf` is shorter than [`HEADER_LEN`] or the type tag is unknown.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }

        let kind = PacketType::try_from(buf[OFF_TYPE])?;
        let checksum = u16::from_le_bytes([buf[OFF_CHECKSUM], buf[OFF_CHECKSUM + 1]]);
        let length = u16::from_be_bytes([buf[OFF_LENGTH], buf[OFF_LENGTH + 1]]);

        Ok(Self {
            kind,
            seq: buf[OFF_SEQ],
            checksum,
            length,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}
