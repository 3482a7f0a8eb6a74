//! Binary snapshot format.
//!
//! Layout (little endian):
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 4    | magic `FSC\0`    |
//! | 4      | 2    | format version   |
//! | 6      | 8    | payload length   |
//! | 14     | 8    | payload checksum |
//! | 22     | n    | postcard payload |
//!
//! The checksum is FNV-1a 64 by default, or the first eight bytes of a
//! BLAKE3 digest with the `crypto-hash` feature. Only format conversion
//! happens here; file I/O stays in the app.

use super::Snapshot;
use crate::error::{FscError, Result};
use crate::primitives::{SNAPSHOT_FORMAT_VERSION, SNAPSHOT_MAGIC};

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 22;

/// Parsed snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u16,
    pub payload_len: u64,
    pub checksum: u64,
}

impl SnapshotHeader {
    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&SNAPSHOT_MAGIC);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..14].copy_from_slice(&self.payload_len.to_le_bytes());
        out[14..22].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    /// Parse and check the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = bytes
            .get(..HEADER_LEN)
            .ok_or_else(|| FscError::Format("truncated header".to_string()))?;
        if header[0..4] != SNAPSHOT_MAGIC {
            return Err(FscError::Format("not an FSC snapshot".to_string()));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != SNAPSHOT_FORMAT_VERSION {
            return Err(FscError::Format(format!(
                "unsupported snapshot version {}",
                version
            )));
        }
        Ok(Self {
            version,
            payload_len: read_u64(&header[6..14])?,
            checksum: read_u64(&header[14..22])?,
        })
    }
}

fn read_u64(bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| FscError::Format("malformed header field".to_string()))?;
    Ok(u64::from_le_bytes(array))
}

/// Checksum of a payload: 64-bit FNV-1a.
///
/// Detects torn or corrupted files without pulling in a hashing crate by
/// default. Enable `crypto-hash` for a BLAKE3-derived checksum.
#[cfg(not(feature = "crypto-hash"))]
pub fn checksum(payload: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    payload
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

/// Checksum of a payload.
#[cfg(feature = "crypto-hash")]
pub fn checksum(payload: &[u8]) -> u64 {
    let digest = blake3::hash(payload);
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(first)
}

/// Encode a snapshot with header.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(snapshot)
        .map_err(|e| FscError::Format(format!("encode failed: {}", e)))?;
    let header = SnapshotHeader {
        version: SNAPSHOT_FORMAT_VERSION,
        payload_len: payload.len() as u64,
        checksum: checksum(&payload),
    };

    let mut out = Vec::with_capacity(HEADER_LEN.saturating_add(payload.len()));
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a snapshot, verifying header, length and checksum.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    let header = SnapshotHeader::parse(bytes)?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != header.payload_len {
        return Err(FscError::Format(format!(
            "payload length {} does not match header {}",
            payload.len(),
            header.payload_len
        )));
    }
    if checksum(payload) != header.checksum {
        return Err(FscError::Format("checksum mismatch".to_string()));
    }
    postcard::from_bytes(payload).map_err(|e| FscError::Format(format!("decode failed: {}", e)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::session::Session;

    #[test]
    fn empty_session_round_trips() {
        let snapshot = Session::new("Brake-by-wire").export_snapshot();
        let bytes = encode_snapshot(&snapshot).unwrap();
        assert_eq!(&bytes[0..4], b"FSC\0");
        assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let snapshot = Session::new("Brake-by-wire").export_snapshot();
        let mut bytes = encode_snapshot(&snapshot).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert_eq!(
            decode_snapshot(&bytes),
            Err(FscError::Format("checksum mismatch".to_string()))
        );
    }

    #[test]
    fn wrong_magic_and_truncation_are_rejected() {
        assert!(decode_snapshot(b"FSC").is_err());
        let mut bytes = encode_snapshot(&Session::new("x").export_snapshot()).unwrap();
        bytes[0] = b'X';
        assert_eq!(
            decode_snapshot(&bytes),
            Err(FscError::Format("not an FSC snapshot".to_string()))
        );
    }

    #[cfg(not(feature = "crypto-hash"))]
    #[test]
    fn fnv_reference_values() {
        assert_eq!(checksum(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(checksum(b"a"), 0xaf63_dc4c_8601_ec8c);
    }
}
