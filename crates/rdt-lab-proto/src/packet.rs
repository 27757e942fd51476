//! Wire-format definitions for data packets and acknowledgments.
//!
//! All multi-byte integers are big-endian. A data packet is:
//!
//! ```text
//! [4 bytes sequence][32 bytes MD5 digest of payload, ASCII hex][payload...]
//! ```
//!
//! An acknowledgment is exactly the 4-byte sequence field, no checksum and
//! no payload. There is no length field; the payload length is implied by
//! the total datagram length.
//!
//! No I/O happens here. Checksum *verification* is deliberately separate
//! from decoding ([`Packet::is_intact`]): a packet parses successfully even
//! when its payload was damaged in transit, and the receiver decides what
//! to do with it.

use bytes::{BufMut, Bytes, BytesMut};
use md5::{Digest, Md5};
use thiserror::Error;

/// Byte length of the sequence field.
pub const SEQ_LEN: usize = 4;
/// Byte length of the hex-encoded 128-bit digest.
pub const CHECKSUM_LEN: usize = 32;
/// Byte length of the fixed data-packet header on the wire.
pub const HEADER_LEN: usize = SEQ_LEN + CHECKSUM_LEN;

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram too short for a data header ({0} bytes, need {HEADER_LEN})")]
    TruncatedPacket(usize),
    #[error("ack must be exactly {SEQ_LEN} bytes, got {0}")]
    BadAckLength(usize),
    #[error("checksum field is not ASCII hex")]
    BadChecksumField,
    #[error("sequence field {0} is not an alternating bit")]
    BadSequence(u32),
}

/// A parsed data packet: alternating sequence bit, stored digest, payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Alternating sequence bit, 0 or 1.
    pub seq: u32,
    /// Hex-encoded payload digest exactly as it appeared on the wire.
    pub checksum: [u8; CHECKSUM_LEN],
    pub payload: Bytes,
}

impl Packet {
    /// Parse a data packet from a raw datagram.
    ///
    /// Fails if the buffer is shorter than [`HEADER_LEN`], the checksum
    /// field is not ASCII hex, or the sequence field is neither 0 nor 1.
    /// The digest is *not* recomputed here.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::TruncatedPacket(buf.len()));
        }
        let seq = u32::from_be_bytes(buf[..SEQ_LEN].try_into().unwrap());
        if seq > 1 {
            return Err(DecodeError::BadSequence(seq));
        }
        let checksum: [u8; CHECKSUM_LEN] = buf[SEQ_LEN..HEADER_LEN].try_into().unwrap();
        if !checksum.iter().all(u8::is_ascii_hexdigit) {
            return Err(DecodeError::BadChecksumField);
        }
        Ok(Packet {
            seq,
            checksum,
            payload: Bytes::copy_from_slice(&buf[HEADER_LEN..]),
        })
    }

    /// Recompute the payload digest and compare against the stored field.
    pub fn is_intact(&self) -> bool {
        payload_digest(&self.payload) == self.checksum
    }
}

/// Serialise a data packet ready for transmission.
pub fn encode(seq: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32(seq);
    buf.put_slice(&payload_digest(payload));
    buf.put_slice(payload);
    buf.freeze()
}

/// Serialise an acknowledgment carrying `seq`.
pub fn encode_ack(seq: u32) -> Bytes {
    Bytes::copy_from_slice(&seq.to_be_bytes())
}

/// Parse an acknowledgment. Fails unless the buffer is exactly 4 bytes
/// holding an alternating bit.
pub fn decode_ack(buf: &[u8]) -> Result<u32, DecodeError> {
    let raw: [u8; SEQ_LEN] = buf
        .try_into()
        .map_err(|_| DecodeError::BadAckLength(buf.len()))?;
    let seq = u32::from_be_bytes(raw);
    if seq > 1 {
        return Err(DecodeError::BadSequence(seq));
    }
    Ok(seq)
}

/// MD5 digest of `payload`, hex-encoded to 32 ASCII bytes.
fn payload_digest(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Md5::new();
    Digest::update(&mut hasher, payload);
    let digest: [u8; 16] = Digest::finalize(hasher).into();
    let hex = format!("{:032x}", u128::from_be_bytes(digest));
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(hex.as_bytes());
    out
}
