use super::{segment_count, SegmentIndex, SegmentSize, SegmentSpec};
use crate::resume::Bitfield;
use std::cmp::min;

/// split `[0, total_length)` into consecutive segments of `segment_size` bytes, the last one
/// holding whatever is left over.
pub fn plan(total_length: u64, segment_size: SegmentSize) -> Vec<SegmentSpec> {
    assert!(segment_size > 0, "segment size must be positive");

    (0..segment_count(total_length, segment_size))
        .map(|index| {
            let start = index * segment_size;
            let end = min(start + segment_size, total_length);
            SegmentSpec::new(index as SegmentIndex, start, end - start)
        })
        .collect()
}

/// segments not yet marked done, in ascending index order. bits past the end of `done` count as
/// pending.
pub fn pending_segments<'a>(
    segments: &'a [SegmentSpec],
    done: &'a Bitfield,
) -> impl Iterator<Item = SegmentSpec> + 'a {
    segments
        .iter()
        .filter(|segment| !done.get(segment.index).is_some_and(|bit| *bit))
        .copied()
}
