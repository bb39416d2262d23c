use crate::fetch::ByteRange;
use crate::segments::SegmentSpec;

/// the part of a segment a worker still has to receive. shrinks from the front as bytes are
/// written, the segment only counts as done once nothing remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct InFlightRange {
    segment: SegmentSpec,
    offset: u64,
    remaining: u64,
}

impl InFlightRange {
    pub fn new(segment: SegmentSpec) -> Self {
        Self {
            segment,
            offset: segment.start,
            remaining: segment.length,
        }
    }

    pub fn segment(&self) -> &SegmentSpec {
        &self.segment
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    pub fn byte_range(&self) -> ByteRange {
        ByteRange::new(self.offset, self.offset + self.remaining)
    }

    pub fn advance(&mut self, n_bytes: u64) {
        assert!(
            n_bytes <= self.remaining,
            "advanced {} bytes past the end of segment {}",
            n_bytes - self.remaining,
            self.segment.index
        );
        self.offset += n_bytes;
        self.remaining -= n_bytes;
    }
}
