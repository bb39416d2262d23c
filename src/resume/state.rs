use super::Bitfield;
use crate::segments::{segment_count, SegmentSize};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"MULD";
pub const BITMAP_OFFSET: u64 = 256;
pub const DONE_MARKER: u8 = 0x59;
pub const MAX_SEGMENTS: u64 = 50_000;

const LEN_PREFIX_SIZE: usize = std::mem::size_of::<u16>();
const HEADER_OFFSET: usize = MAGIC.len() + LEN_PREFIX_SIZE;

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("could not read resume state: {0}")]
    Io(#[from] io::Error),

    #[error("invalid magic number")]
    BadMagic,

    #[error("malformed header: {0}")]
    Header(String),

    #[error("too many segments ({0}), at most {MAX_SEGMENTS} are supported")]
    TooManySegments(u64),

    #[error("invalid geometry, total length {total_length} with segment size {segment_size}")]
    InvalidGeometry {
        total_length: i64,
        segment_size: i64,
    },
}

// signed to stay compatible with state files written by earlier versions of the tool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
struct StateHeader {
    total_length: i64,
    segment_size: i64,
}

/// the persisted progress of one download.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeState {
    pub total_length: u64,
    pub segment_size: SegmentSize,
    pub segments_done: Bitfield,
}

impl ResumeState {
    /// fresh state with every segment pending.
    pub fn new(total_length: u64, segment_size: SegmentSize) -> Self {
        let n_segments = segment_count(total_length, segment_size) as usize;
        Self {
            total_length,
            segment_size,
            segments_done: Bitfield::repeat(false, n_segments),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments_done.len()
    }

    pub fn done_count(&self) -> usize {
        self.segments_done.count_ones()
    }

    pub fn is_done(&self, index: usize) -> bool {
        self.segments_done.get(index).is_some_and(|bit| *bit)
    }

    /// magic number followed by the u16 (big endian) length prefixed bencoded header. the bitmap
    /// is not part of it, entries are written one by one at `BITMAP_OFFSET + index`.
    pub fn encode_header(&self) -> anyhow::Result<Vec<u8>> {
        let header = StateHeader {
            total_length: i64::try_from(self.total_length)?,
            segment_size: i64::try_from(self.segment_size)?,
        };
        let encoded = serde_bencode::to_bytes(&header)?;

        if HEADER_OFFSET + encoded.len() > BITMAP_OFFSET as usize {
            anyhow::bail!(
                "encoded header of {} bytes overlaps the segment bitmap",
                encoded.len()
            );
        }

        let mut bytes = Vec::with_capacity(HEADER_OFFSET + encoded.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&encoded);
        Ok(bytes)
    }

    /// parse the whole contents of a state file. the bitmap may be cut short (the process was
    /// killed before the later segments were ever marked), missing entries are pending.
    pub fn decode(bytes: &[u8]) -> Result<Self, ResumeError> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(ResumeError::BadMagic);
        }

        let len_prefix: [u8; LEN_PREFIX_SIZE] = bytes
            .get(MAGIC.len()..HEADER_OFFSET)
            .and_then(|prefix| prefix.try_into().ok())
            .ok_or_else(|| ResumeError::Header("missing length prefix".into()))?;
        let header_len = u16::from_be_bytes(len_prefix) as usize;

        let encoded = bytes
            .get(HEADER_OFFSET..HEADER_OFFSET + header_len)
            .ok_or_else(|| ResumeError::Header(format!("truncated, expected {header_len} bytes")))?;
        let header: StateHeader = serde_bencode::from_bytes(encoded)
            .map_err(|err| ResumeError::Header(err.to_string()))?;

        let (total_length, segment_size) = match (
            u64::try_from(header.total_length),
            u64::try_from(header.segment_size),
        ) {
            (Ok(total_length), Ok(segment_size)) if segment_size > 0 => {
                (total_length, segment_size)
            }
            _ => {
                return Err(ResumeError::InvalidGeometry {
                    total_length: header.total_length,
                    segment_size: header.segment_size,
                })
            }
        };

        let n_segments = segment_count(total_length, segment_size);
        if n_segments > MAX_SEGMENTS {
            return Err(ResumeError::TooManySegments(n_segments));
        }

        let bitmap = bytes.get(BITMAP_OFFSET as usize..).unwrap_or_default();
        let segments_done = (0..n_segments as usize)
            .map(|index| bitmap.get(index) == Some(&DONE_MARKER))
            .collect();

        Ok(Self {
            total_length,
            segment_size,
            segments_done,
        })
    }
}
