//! # Record Framing
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────────┐
//! │ len: u32 LE  │ crc32: u32 LE│ payload (bincode)       │
//! └──────────────┴──────────────┴─────────────────────────┘
//! ```
//!
//! A frame that runs past the end of the file, or whose checksum fails while
//! it is the final frame, is a torn write. A checksum failure followed by
//! more data is corruption.

use super::errors::LogError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Bytes before the payload.
pub const FRAME_HEADER_LEN: usize = 8;

/// Largest payload a frame may declare.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Serialize `value` into one checksummed frame.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, LogError> {
    let payload = bincode::serialize(value).map_err(|e| LogError::Codec(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| LogError::Codec(format!("record of {} bytes too large", payload.len())))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Frames decoded from a byte buffer.
#[derive(Debug)]
pub struct FrameScan<T> {
    /// Decoded values in file order.
    pub values: Vec<T>,
    /// Length of the intact prefix.
    pub valid_len: u64,
    /// Whether bytes after `valid_len` were discarded as a torn write.
    pub torn_tail: bool,
}

/// Decode every complete frame in `bytes`.
pub fn scan_frames<T: DeserializeOwned>(bytes: &[u8]) -> Result<FrameScan<T>, LogError> {
    let mut values = Vec::new();
    let mut cursor = 0usize;

    while cursor < bytes.len() {
        let remaining = bytes.len() - cursor;
        if remaining < FRAME_HEADER_LEN {
            return Ok(torn(values, cursor));
        }

        let len = read_u32(bytes, cursor) as usize;
        let crc = read_u32(bytes, cursor + 4);
        if len > MAX_FRAME_LEN {
            return Err(LogError::Corrupted {
                offset: cursor as u64,
                reason: format!("declared length {len} exceeds limit"),
            });
        }
        if remaining - FRAME_HEADER_LEN < len {
            return Ok(torn(values, cursor));
        }

        let start = cursor + FRAME_HEADER_LEN;
        let end = start + len;
        let payload = &bytes[start..end];
        if crc32fast::hash(payload) != crc {
            if end == bytes.len() {
                return Ok(torn(values, cursor));
            }
            return Err(LogError::Corrupted {
                offset: cursor as u64,
                reason: "checksum mismatch".into(),
            });
        }

        let value = bincode::deserialize(payload).map_err(|e| LogError::Corrupted {
            offset: cursor as u64,
            reason: e.to_string(),
        })?;
        values.push(value);
        cursor = end;
    }

    Ok(FrameScan {
        values,
        valid_len: cursor as u64,
        torn_tail: false,
    })
}

fn torn<T>(values: Vec<T>, cursor: usize) -> FrameScan<T> {
    FrameScan {
        values,
        valid_len: cursor as u64,
        torn_tail: true,
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}
