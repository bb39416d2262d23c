mod planner;

pub use planner::{pending_segments, plan};

pub type SegmentIndex = usize;
pub type SegmentSize = u64;

pub const DEFAULT_SEGMENT_SIZE: SegmentSize = 1_000_000;

/// one contiguous byte range of the remote resource, the unit of work and of resumability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpec {
    pub index: SegmentIndex,
    pub start: u64,
    pub length: u64,
}

impl SegmentSpec {
    pub fn new(index: SegmentIndex, start: u64, length: u64) -> Self {
        Self {
            index,
            start,
            length,
        }
    }

    /// exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

/// number of segments needed to cover `total_length` bytes.
pub fn segment_count(total_length: u64, segment_size: SegmentSize) -> u64 {
    total_length.div_ceil(segment_size)
}
