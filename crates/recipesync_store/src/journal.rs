//! Journal frames and their on-disk encoding.
//!
//! Every committed transaction becomes one frame:
//!
//! ```text
//! | magic "RSJ1" (4) | payload_len u32 LE (4) | payload (CBOR) | crc32 LE (4) |
//! ```
//!
//! The CRC covers the magic, the length and the payload. A frame that is cut
//! short or fails its checksum ends replay: everything before it is kept and
//! the tail is reported so the store can rewrite the journal.

use crate::error::{StoreError, StoreResult};
use crate::types::{Record, RecordId, Table};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a journal frame.
pub const FRAME_MAGIC: [u8; 4] = *b"RSJ1";

const HEADER_SIZE: usize = 8;
const CRC_SIZE: usize = 4;

/// A single mutation inside a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalOp {
    /// Insert or overwrite a record (soft deletes are puts with `deleted`).
    Put(Record),
    /// Physically remove a purged tombstone.
    Remove {
        /// Table of the record.
        table: Table,
        /// Record to remove.
        id: RecordId,
    },
    /// Advance the sync cursor.
    Cursor(i64),
}

/// A journal frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalFrame {
    /// First frame of a fresh journal.
    Header {
        /// Schema version the journal was written with.
        schema_version: u32,
    },
    /// One committed transaction.
    Batch {
        /// Mutations, in application order.
        ops: Vec<JournalOp>,
    },
    /// Full state written by a checkpoint; replaces everything before it.
    Snapshot {
        /// Schema version the snapshot was written with.
        schema_version: u32,
        /// Sync cursor at checkpoint time.
        cursor: Option<i64>,
        /// Next creation sequence number.
        next_seq: u64,
        /// Every retained record, tombstones included.
        records: Vec<Record>,
    },
}

impl JournalFrame {
    /// Encodes the frame with magic, length and checksum.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(self, &mut payload)
            .map_err(|e| StoreError::codec(format!("failed to encode frame: {e}")))?;

        let len = u32::try_from(payload.len())
            .map_err(|_| StoreError::codec("frame payload exceeds 4 GiB"))?;

        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        out.extend_from_slice(&FRAME_MAGIC);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&payload);
        let crc = compute_crc32(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(out)
    }
}

/// Result of scanning a journal buffer.
#[derive(Debug, Default)]
pub struct JournalScan {
    /// Frames decoded before the first bad one.
    pub frames: Vec<JournalFrame>,
    /// Offset and reason of the first undecodable frame, if any.
    pub torn_tail: Option<(u64, String)>,
}

/// Decodes every intact frame in `data`.
///
/// Replay stops at the first frame that is truncated, has a bad magic,
/// fails its checksum, or cannot be decoded.
pub fn scan(data: &[u8]) -> JournalScan {
    let mut scan = JournalScan::default();
    let mut pos = 0usize;

    while pos < data.len() {
        match decode_frame(&data[pos..]) {
            Ok((frame, consumed)) => {
                scan.frames.push(frame);
                pos += consumed;
            }
            Err(reason) => {
                scan.torn_tail = Some((pos as u64, reason));
                break;
            }
        }
    }

    scan
}

fn decode_frame(buf: &[u8]) -> Result<(JournalFrame, usize), String> {
    if buf.len() < HEADER_SIZE {
        return Err(format!("truncated header ({} bytes)", buf.len()));
    }
    if buf[..4] != FRAME_MAGIC {
        return Err("invalid magic".into());
    }

    let payload_len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
    let total_len = HEADER_SIZE + payload_len + CRC_SIZE;
    if buf.len() < total_len {
        return Err(format!(
            "truncated frame: need {total_len} bytes, have {}",
            buf.len()
        ));
    }

    let body_end = HEADER_SIZE + payload_len;
    let stored_crc = u32::from_le_bytes([
        buf[body_end],
        buf[body_end + 1],
        buf[body_end + 2],
        buf[body_end + 3],
    ]);
    let computed_crc = compute_crc32(&buf[..body_end]);
    if stored_crc != computed_crc {
        return Err(format!(
            "checksum mismatch: expected {stored_crc:08x}, got {computed_crc:08x}"
        ));
    }

    let frame: JournalFrame = ciborium::from_reader(&buf[HEADER_SIZE..body_end])
        .map_err(|e| format!("undecodable payload: {e}"))?;

    Ok((frame, total_len))
}

/// Computes CRC32 checksum for data (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{fields, SyncStatus};

    fn sample_record() -> Record {
        Record {
            id: RecordId::new(),
            table: Table::Recipes,
            fields: fields([("title", "Pasta"), ("remote_id", "42")]),
            status: SyncStatus::Synced,
            deleted: false,
            seq: 1,
            revision: 1,
        }
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn frames_decode_in_order() {
        let header = JournalFrame::Header { schema_version: 4 };
        let batch = JournalFrame::Batch {
            ops: vec![JournalOp::Put(sample_record()), JournalOp::Cursor(1_700_000_000_000)],
        };

        let mut data = header.encode().unwrap();
        data.extend(batch.encode().unwrap());

        let scan = scan(&data);
        assert!(scan.torn_tail.is_none());
        assert_eq!(scan.frames, vec![header, batch]);
    }

    #[test]
    fn truncated_tail_keeps_prefix() {
        let first = JournalFrame::Header { schema_version: 4 };
        let second = JournalFrame::Batch {
            ops: vec![JournalOp::Put(sample_record())],
        };

        let mut data = first.encode().unwrap();
        let second_bytes = second.encode().unwrap();
        data.extend_from_slice(&second_bytes[..second_bytes.len() - 3]);

        let scan = scan(&data);
        assert_eq!(scan.frames, vec![first.clone()]);
        let (offset, _) = scan.torn_tail.unwrap();
        assert_eq!(offset, first.encode().unwrap().len() as u64);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut data = JournalFrame::Batch {
            ops: vec![JournalOp::Cursor(7)],
        }
        .encode()
        .unwrap();
        let mid = data.len() / 2;
        data[mid] ^= 0xFF;

        let scan = scan(&data);
        assert!(scan.frames.is_empty());
        assert!(scan.torn_tail.is_some());
    }
}
