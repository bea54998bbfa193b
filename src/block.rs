//! Handles of allocated blocks.

/// A block handed out by an allocator.
///
/// A `Block` is a plain `(offset, len)` pair relative to the base of the buffer of the allocator
/// which returned it, so it never dangles by itself.
/// The bytes behind it are reached through the allocator
/// (e.g., [`ArenaAllocator::block_bytes`]), which refuses blocks that have been rolled back.
///
/// [`ArenaAllocator::block_bytes`]: ../arena/struct.ArenaAllocator.html#method.block_bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
    offset: usize,
    len: usize,
}
impl Block {
    pub(crate) fn new(offset: usize, len: usize) -> Self {
        Block { offset, len }
    }

    /// Returns the offset of the block from the buffer base.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the length of the block in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the end offset of the block.
    ///
    /// **NOTE**: a block occupies `[offset, end)`, so nothing of it is stored at `end`.
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}
