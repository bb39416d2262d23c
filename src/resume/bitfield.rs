use bitvec::{order::Lsb0, prelude as bv};

// one bit per segment, indexed by segment index. only lives in memory, the on-disk form spends a
// whole byte per segment so that single entries can be rewritten in place.
pub type Bitfield = bv::BitVec<u8, Lsb0>;
