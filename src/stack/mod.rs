//! Stack (LIFO) allocator.
//!
//! Every allocation is preceded by a [`BlockHeader`] written into the buffer itself.
//! Headers chain back to their predecessors, which lets the stack pop one block at a time
//! (`deallocate`) or roll back to a [`Mark`] taken earlier (`deallocate_to`).
//!
//! ```text
//! base                                                         top
//! |                                                             |
//! v                                                             v
//! +--------+-----+---------+--------+-----+---------------------+
//! | header | pad | payload | header | pad | payload             | (free)
//! +--------+-----+---------+--------+-----+---------------------+
//! ^                        ^
//! |                        previous_block
//! first header (back offset == 0)
//! ```
//!
//! [`BlockHeader`]: ./struct.BlockHeader.html
//! [`Mark`]: ./struct.Mark.html
use slog::Logger;

pub use self::header::{BlockHeader, HEADER_SIZE};
pub use self::mark::Mark;

use crate::block::Block;
use crate::buffer::{Alignment, ReservedBuffer};
use crate::builder::{AllocatorBuilder, Instrumentation};
use crate::metrics::AllocatorMetrics;
use crate::policy::{Contract, ViolationPolicy};
use crate::{ErrorKind, Result};

mod header;
mod mark;

/// LIFO allocator over a single reserved buffer.
///
/// # Hazards
///
/// - A `Mark` is a plain address. A mark taken before `clear` (or before a reallocation)
///   may still pass the range check later; it is only refused when the header found there
///   is inconsistent.
/// - `reallocate` and `reallocate_into` change the base address,
///   so every previously taken `Mark` becomes invalid.
#[derive(Debug)]
pub struct StackAllocator<'a> {
    buffer: ReservedBuffer<'a>,
    top: usize,
    previous_block: usize,
    allocated_bytes: usize,
    contract: Contract,
    logger: Logger,
    metrics: AllocatorMetrics,
}
impl<'a> StackAllocator<'a> {
    /// Makes a stack owning a newly acquired buffer of `size` bytes aligned to `alignment`.
    ///
    /// This is equivalent to `AllocatorBuilder::new().alignment(alignment).stack(size)`.
    pub fn new(size: usize, alignment: Alignment) -> Result<Self> {
        track!(AllocatorBuilder::new().alignment(alignment).stack(size))
    }

    /// Makes a stack borrowing `buf`.
    ///
    /// See `ArenaAllocator::with_buffer` for the alignment adjustment.
    pub fn with_buffer(buf: &'a mut [u8], alignment: Option<Alignment>) -> Result<Self> {
        let mut builder = AllocatorBuilder::new();
        if let Some(alignment) = alignment {
            builder.alignment(alignment);
        }
        track!(builder.stack_in(buf))
    }

    pub(crate) fn from_parts(buffer: ReservedBuffer<'a>, instrumentation: Instrumentation) -> Self {
        let Instrumentation {
            contract,
            logger,
            metrics,
        } = instrumentation;
        metrics.set_capacity(buffer.size());
        metrics.set_usage(0);
        debug!(logger, "Stack allocator is ready";
               "size" => buffer.size(),
               "alignment" => buffer.alignment().as_usize(),
               "owned" => buffer.is_owned(),
               "skipped_bytes" => buffer.skipped_bytes());
        StackAllocator {
            buffer,
            top: 0,
            previous_block: 0,
            allocated_bytes: 0,
            contract,
            logger,
            metrics,
        }
    }

    /// Allocates a block of `size` bytes without alignment padding.
    ///
    /// `Ok(None)` is returned if the free space cannot hold the block and its header.
    ///
    /// # Errors
    ///
    /// If `size` is `0`, an error which has the kind `ErrorKind::InvalidInput` will be returned
    /// (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn allocate(&mut self, size: usize) -> Result<Option<Block>> {
        track!(self.allocate_aligned(size, Alignment::none()))
    }

    /// Allocates a block of `size` bytes whose absolute address is a multiple of `alignment`.
    ///
    /// # Errors
    ///
    /// See `allocate`.
    pub fn allocate_aligned(&mut self, size: usize, alignment: Alignment) -> Result<Option<Block>> {
        track!(self.contract.enforce(validate_size(size)))?;
        let (padding, footprint) = match self.fit(size, alignment) {
            None => {
                self.metrics.nospace_failures.increment();
                return Ok(None);
            }
            Some(fit) => fit,
        };

        let top = self.top;
        let back_offset = if self.is_empty() {
            0
        } else {
            top - self.previous_block
        };
        let header = BlockHeader::new(size, padding, back_offset);
        track!(header.write_to(&mut self.buffer.as_bytes_mut()[top..top + HEADER_SIZE]))?;

        let payload = top + HEADER_SIZE + padding;
        self.previous_block = top;
        self.top = payload + size;
        self.allocated_bytes += footprint;
        self.metrics.count_allocation(footprint, self.allocated_bytes);
        Ok(Some(Block::new(payload, size)))
    }

    /// Returns `true` if `allocate(size)` would succeed now.
    pub fn can_allocate(&self, size: usize) -> bool {
        self.can_allocate_aligned(size, Alignment::none())
    }

    /// Returns `true` if `allocate_aligned(size, alignment)` would succeed now.
    ///
    /// The header overhead is taken into account,
    /// so a request as large as `free_bytes()` never succeeds.
    pub fn can_allocate_aligned(&self, size: usize, alignment: Alignment) -> bool {
        self.fit(size, alignment).is_some()
    }

    /// Pops the most recent block.
    ///
    /// # Errors
    ///
    /// If the stack is empty, an error which has the kind `ErrorKind::InvalidRollbackTarget`
    /// will be returned (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn deallocate(&mut self) -> Result<()> {
        let header = track!(self.contract.enforce(self.last_frame()))?;
        let offset = self.previous_block;
        self.top = offset;
        self.previous_block = offset - header.previous_header_back_offset();
        self.allocated_bytes -= header.footprint();

        self.metrics.deallocations.increment();
        self.metrics.set_usage(self.allocated_bytes);
        Ok(())
    }

    /// Pops every block allocated after `mark` was taken.
    ///
    /// If `mark` equals the current top, nothing happens.
    ///
    /// # Errors
    ///
    /// If `mark` lies outside `[base, base + top]`,
    /// an error which has the kind `ErrorKind::InvalidRollbackTarget` will be returned.
    /// If no consistent header is found at `mark`,
    /// an error which has the kind `ErrorKind::InconsistentState` will be returned.
    /// In both cases the state is left unchanged (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn deallocate_to(&mut self, mark: Mark) -> Result<()> {
        let offset = track!(self.contract.enforce(self.locate(mark)))?;
        if offset == self.top {
            return Ok(());
        }
        let header = track!(self.contract.enforce(self.read_header(offset)))?;

        let released = self.top - offset;
        debug!(self.logger, "Rolled back"; "mark" => mark.address(), "released_bytes" => released);
        self.allocated_bytes -= released;
        self.previous_block = offset - header.previous_header_back_offset();
        self.top = offset;

        self.metrics.rollbacks.increment();
        self.metrics.set_usage(self.allocated_bytes);
        Ok(())
    }

    /// Resets the stack to the empty state in O(1).
    ///
    /// The memory is not zeroed.
    pub fn clear(&mut self) {
        debug!(self.logger, "Cleared"; "released_bytes" => self.allocated_bytes);
        self.top = 0;
        self.previous_block = 0;
        self.allocated_bytes = 0;
        self.metrics.clears.increment();
        self.metrics.set_usage(0);
    }

    /// Returns a restore point at the current top.
    pub fn mark(&self) -> Mark {
        Mark::new(self.base_address() + self.top)
    }

    /// Copies the allocated region (headers included) of this stack into the head of `destination`.
    ///
    /// Afterwards `destination` has the same blocks as this stack.
    /// Blocks aligned beyond the buffer alignment are aligned in `destination` only if
    /// both base addresses are congruent modulo that alignment.
    ///
    /// # Errors
    ///
    /// If the alignments of both buffers differ, or `destination` is smaller than this stack,
    /// an error which has the kind `ErrorKind::IncompatibleCopy` will be returned
    /// (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn copy_to(&self, destination: &mut StackAllocator<'_>) -> Result<()> {
        track!(self.contract.enforce(self.validate_destination(destination)))?;

        let n = self.allocated_bytes;
        destination.buffer.as_bytes_mut()[..n].copy_from_slice(&self.buffer.as_bytes()[..n]);
        destination.top = self.top;
        destination.previous_block = self.previous_block;
        destination.allocated_bytes = n;
        destination.metrics.set_usage(n);
        self.metrics.copies.increment();
        Ok(())
    }

    /// Grows an owned buffer to `new_size` bytes.
    ///
    /// Headers hold relative offsets only, so all blocks survive the move.
    /// If `new_size` is not larger than the current size, nothing happens and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// If the buffer is borrowed, or `new_size` is too large to be acquired,
    /// an error will be returned and the current buffer is kept
    /// (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn reallocate(&mut self, new_size: usize) -> Result<bool> {
        let old_size = self.size();
        let moved = track!(self.contract.enforce(self.buffer.grow(new_size, self.top)))?;
        if moved {
            self.count_reallocation(old_size);
        }
        Ok(moved)
    }

    /// Moves a borrowed buffer to `new_location`.
    ///
    /// See `ArenaAllocator::reallocate_into`.
    ///
    /// # Errors
    ///
    /// If the buffer is owned or `new_location` is empty,
    /// an error which has the kind `ErrorKind::InvalidInput` will be returned
    /// (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn reallocate_into(&mut self, new_location: &'a mut [u8]) -> Result<bool> {
        let old_size = self.size();
        let requested = new_location.len();
        let moved = track!(self
            .contract
            .enforce(self.buffer.relocate(new_location, self.top)))?;
        if moved {
            if self.size() < requested {
                info!(self.logger, "Usable size shrank by the alignment adjustment";
                      "requested" => requested, "usable" => self.size());
            }
            self.count_reallocation(old_size);
        }
        Ok(moved)
    }

    /// Returns the header of the most recent block.
    ///
    /// `Ok(None)` is returned if the stack is empty.
    pub fn last_header(&self) -> Result<Option<BlockHeader>> {
        if self.is_empty() {
            Ok(None)
        } else {
            track!(self.last_frame()).map(Some)
        }
    }

    /// Returns the headers of all live blocks, the most recent first.
    pub fn headers(&self) -> Result<Vec<BlockHeader>> {
        let mut headers = Vec::new();
        if self.is_empty() {
            return Ok(headers);
        }

        let mut offset = self.previous_block;
        loop {
            let header = track!(self.read_header(offset))?;
            headers.push(header);
            if header.is_first() {
                break;
            }
            offset -= header.previous_header_back_offset();
        }
        Ok(headers)
    }

    /// Returns `true` if no block is allocated.
    pub fn is_empty(&self) -> bool {
        self.top == 0
    }

    /// Returns the usable size of the buffer.
    pub fn size(&self) -> usize {
        debug_assert!(self.allocated_bytes <= self.buffer.size());
        self.buffer.size()
    }

    /// Returns the number of consumed bytes (headers and alignment padding included).
    pub fn allocated_bytes(&self) -> usize {
        debug_assert!(self.allocated_bytes <= self.buffer.size());
        self.allocated_bytes
    }

    /// Returns the number of bytes still available (before the header overhead).
    pub fn free_bytes(&self) -> usize {
        self.size() - self.allocated_bytes()
    }

    /// Returns the absolute address of the buffer base.
    pub fn base_address(&self) -> usize {
        self.buffer.base_address()
    }

    /// Returns the alignment of the buffer base.
    pub fn alignment(&self) -> Alignment {
        self.buffer.alignment()
    }

    /// Returns `true` if the buffer is owned by this stack.
    pub fn is_owned(&self) -> bool {
        self.buffer.is_owned()
    }

    /// Returns the current absolute address of `block`.
    pub fn address_of(&self, block: &Block) -> usize {
        self.base_address() + block.offset()
    }

    /// Returns the allocated region, headers included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer.as_bytes()[..self.top]
    }

    /// Returns the bytes of `block`.
    ///
    /// `None` is returned if `block` has been popped.
    pub fn block_bytes(&self, block: &Block) -> Option<&[u8]> {
        if block.end() <= self.top {
            Some(&self.buffer.as_bytes()[block.offset()..block.end()])
        } else {
            None
        }
    }

    /// Mutable version of `block_bytes`.
    ///
    /// **NOTE**: writing through a block that was popped and then overlapped
    /// by later allocations could destroy their headers. Such a block is refused
    /// only when it reaches beyond the current top.
    pub fn block_bytes_mut(&mut self, block: &Block) -> Option<&mut [u8]> {
        if block.end() <= self.top {
            Some(&mut self.buffer.as_bytes_mut()[block.offset()..block.end()])
        } else {
            None
        }
    }

    /// Returns how this stack reacts to contract violations.
    pub fn policy(&self) -> ViolationPolicy {
        self.contract.policy()
    }

    /// Returns the metrics of this stack.
    pub fn metrics(&self) -> &AllocatorMetrics {
        &self.metrics
    }

    fn fit(&self, size: usize, alignment: Alignment) -> Option<(usize, usize)> {
        if size == 0 {
            return None;
        }
        let start = self.base_address() + self.top + HEADER_SIZE;
        let padding = alignment.ceil_align(start)? - start;
        let footprint = HEADER_SIZE.checked_add(padding)?.checked_add(size)?;
        if footprint <= self.size() - self.allocated_bytes {
            Some((padding, footprint))
        } else {
            None
        }
    }

    fn locate(&self, mark: Mark) -> Result<usize> {
        let base = self.base_address();
        track_assert!(
            base <= mark.address() && mark.address() - base <= self.top,
            ErrorKind::InvalidRollbackTarget,
            "mark={}, base={}, top={}",
            mark.address(),
            base,
            self.top
        );
        Ok(mark.address() - base)
    }

    fn last_frame(&self) -> Result<BlockHeader> {
        track_assert!(
            !self.is_empty(),
            ErrorKind::InvalidRollbackTarget,
            "Empty stack"
        );
        let header = track!(self.read_header(self.previous_block))?;
        track_assert_eq!(
            self.previous_block + header.footprint(),
            self.top,
            ErrorKind::InconsistentState
        );
        Ok(header)
    }

    fn read_header(&self, offset: usize) -> Result<BlockHeader> {
        track_assert!(
            offset + HEADER_SIZE <= self.top,
            ErrorKind::InconsistentState,
            "No room for a header: offset={}, top={}",
            offset,
            self.top
        );
        let bytes = &self.buffer.as_bytes()[offset..offset + HEADER_SIZE];
        let header = track!(BlockHeader::read_from(bytes), "offset:{}", offset)?;
        track_assert!(
            header.footprint() <= self.top - offset,
            ErrorKind::InconsistentState,
            "Block beyond the top: offset={}, header={:?}, top={}",
            offset,
            header,
            self.top
        );
        track_assert_eq!(
            header.is_first(),
            offset == 0,
            ErrorKind::InconsistentState,
            "Broken back offset: offset={}, header={:?}",
            offset,
            header
        );
        track_assert!(
            header.previous_header_back_offset() <= offset,
            ErrorKind::InconsistentState,
            "Previous header before the base: offset={}, header={:?}",
            offset,
            header
        );
        Ok(header)
    }

    fn validate_destination(&self, destination: &StackAllocator<'_>) -> Result<()> {
        track_assert_eq!(
            destination.alignment(),
            self.alignment(),
            ErrorKind::IncompatibleCopy
        );
        track_assert!(
            destination.size() >= self.size(),
            ErrorKind::IncompatibleCopy,
            "Too small destination: size={}, required={}",
            destination.size(),
            self.size()
        );
        Ok(())
    }

    fn count_reallocation(&self, old_size: usize) {
        debug!(self.logger, "Buffer reallocated";
               "old_size" => old_size, "new_size" => self.size(),
               "allocated_bytes" => self.allocated_bytes);
        self.metrics.reallocations.increment();
        self.metrics.set_capacity(self.size());
    }
}

fn validate_size(size: usize) -> Result<()> {
    track_assert_ne!(size, 0, ErrorKind::InvalidInput, "Zero-sized allocation");
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use trackable::result::TestResult;

    use super::*;
    use crate::buffer::AlignedBytes;

    fn align(n: usize) -> Alignment {
        Alignment::new(n).expect("power of two")
    }

    #[test]
    fn pop_and_push_reuses_the_address() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(1)))?;
        let first = track!(stack.allocate(32))?.expect("fits");
        assert_eq!(first.offset(), HEADER_SIZE);
        assert_eq!(stack.allocated_bytes(), HEADER_SIZE + 32);

        track!(stack.deallocate())?;
        assert!(stack.is_empty());
        assert_eq!(stack.allocated_bytes(), 0);

        let second = track!(stack.allocate(32))?.expect("fits");
        assert_eq!(stack.address_of(&second), stack.address_of(&first));
        assert_eq!(stack.metrics().deallocations(), 1);
        Ok(())
    }

    #[test]
    fn rollback_to_mark_works() -> TestResult {
        let mut stack = track!(StackAllocator::new(160, align(1)))?;
        track!(stack.allocate(32))?.expect("fits");
        let mark = stack.mark();

        track!(stack.allocate(16))?.expect("fits");
        track!(stack.allocate(16))?.expect("fits");
        assert_eq!(stack.allocated_bytes(), 3 * HEADER_SIZE + 64);
        assert_eq!(track!(stack.headers())?.len(), 3);

        track!(stack.deallocate_to(mark))?;
        assert_eq!(track!(stack.headers())?.len(), 1);
        assert_eq!(stack.allocated_bytes(), HEADER_SIZE + 32);
        assert_eq!(stack.mark(), mark);

        let header = track!(stack.last_header())?.expect("non empty");
        assert_eq!(header.block_size(), 32);
        assert!(header.is_first());

        track!(stack.deallocate())?;
        assert!(stack.is_empty());
        assert_eq!(stack.metrics().rollbacks(), 1);
        Ok(())
    }

    #[test]
    fn rollback_to_the_top_is_noop() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(1)))?;
        track!(stack.allocate(8))?;
        let allocated = stack.allocated_bytes();

        track!(stack.deallocate_to(stack.mark()))?;
        assert_eq!(stack.allocated_bytes(), allocated);
        assert_eq!(stack.metrics().rollbacks(), 0);
        Ok(())
    }

    #[test]
    fn rollback_to_an_empty_stack_mark_works() -> TestResult {
        let mut stack = track!(StackAllocator::new(256, align(8)))?;
        let mark = stack.mark();
        for size in &[3, 17, 8] {
            track!(stack.allocate_aligned(*size, align(8)))?.expect("fits");
        }
        assert_eq!(track!(stack.headers())?.len(), 3);

        track!(stack.deallocate_to(mark))?;
        assert!(stack.is_empty());
        assert_eq!(stack.allocated_bytes(), 0);
        assert_eq!(track!(stack.last_header())?, None);
        Ok(())
    }

    #[test]
    fn out_of_range_marks_are_refused() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(1)))?;
        track!(stack.allocate(4))?;
        let beyond = Mark::new(stack.base_address() + stack.allocated_bytes() + 1);
        let before = Mark::new(stack.base_address() - 1);

        for mark in vec![beyond, before] {
            let e = stack.deallocate_to(mark).err().map(|e| *e.kind());
            assert_eq!(e, Some(ErrorKind::InvalidRollbackTarget));
        }
        assert_eq!(stack.allocated_bytes(), HEADER_SIZE + 4);
        assert_eq!(stack.metrics().contract_violations(), 2);
        Ok(())
    }

    #[test]
    fn mark_inside_a_block_is_refused() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(1)))?;
        let block = track!(stack.allocate(4))?.expect("fits");
        let inside = Mark::new(stack.address_of(&block));

        let e = stack.deallocate_to(inside).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InconsistentState));
        assert_eq!(stack.allocated_bytes(), HEADER_SIZE + 4);
        Ok(())
    }

    #[test]
    #[should_panic]
    fn out_of_range_mark_panics_in_strict_mode() {
        let mut stack = AllocatorBuilder::new()
            .policy(ViolationPolicy::Strict)
            .stack(64)
            .expect("Never fails");
        let mark = Mark::new(stack.base_address() + 1);
        let _ = stack.deallocate_to(mark);
    }

    #[test]
    fn popping_an_empty_stack_is_refused() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(1)))?;
        let e = stack.deallocate().err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidRollbackTarget));
        Ok(())
    }

    #[test]
    fn zero_sized_allocation_is_refused() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(1)))?;
        let e = stack.allocate(0).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidInput));
        assert!(!stack.can_allocate(0));
        Ok(())
    }

    #[test]
    fn header_overhead_is_accounted() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(1)))?;
        assert!(!stack.can_allocate(64));
        assert!(stack.can_allocate(64 - HEADER_SIZE));
        assert_eq!(track!(stack.allocate(64))?, None);
        assert!(track!(stack.allocate(64 - HEADER_SIZE))?.is_some());
        assert_eq!(stack.free_bytes(), 0);
        assert_eq!(stack.metrics().nospace_failures(), 1);
        Ok(())
    }

    #[test]
    fn headers_are_chained() -> TestResult {
        let mut stack = track!(StackAllocator::new(256, align(16)))?;
        track!(stack.allocate(5))?;
        track!(stack.allocate_aligned(10, align(16)))?;
        track!(stack.allocate(7))?;

        let headers = track!(stack.headers())?;
        let sizes = headers.iter().map(|h| h.block_size()).collect::<Vec<_>>();
        assert_eq!(sizes, vec![7, 10, 5]);
        assert!(headers[2].is_first());
        assert_eq!(headers[1].previous_header_back_offset(), headers[2].footprint());
        assert_eq!(headers[0].previous_header_back_offset(), headers[1].footprint());

        let total = headers.iter().map(|h| h.footprint()).sum::<usize>();
        assert_eq!(total, stack.allocated_bytes());
        Ok(())
    }

    #[test]
    fn borrowed_buffer_is_adjusted() -> TestResult {
        let mut backing = track!(AlignedBytes::new(40, align(4)))?;
        let base = backing.as_ptr() as usize;

        let stack = track!(StackAllocator::with_buffer(
            &mut backing[2..34],
            Some(align(4))
        ))?;
        assert_eq!(stack.size(), 30);
        assert_eq!(stack.base_address(), base + 4);
        assert!(!stack.is_owned());
        Ok(())
    }

    #[test]
    fn copy_to_works() -> TestResult {
        let mut source = track!(StackAllocator::new(64, align(8)))?;
        let block = track!(source.allocate(4))?.expect("fits");
        source
            .block_bytes_mut(&block)
            .expect("live")
            .copy_from_slice(b"abcd");
        track!(source.allocate(2))?;

        let mut destination = track!(StackAllocator::new(64, align(8)))?;
        track!(source.copy_to(&mut destination))?;
        assert_eq!(destination.as_bytes(), source.as_bytes());
        assert_eq!(destination.allocated_bytes(), source.allocated_bytes());
        assert_eq!(destination.block_bytes(&block), Some(&b"abcd"[..]));

        track!(destination.deallocate())?;
        track!(destination.deallocate())?;
        assert!(destination.is_empty());
        Ok(())
    }

    #[test]
    fn incompatible_copies_are_refused() -> TestResult {
        let mut source = track!(StackAllocator::new(64, align(8)))?;
        track!(source.allocate(4))?;

        let mut smaller = track!(StackAllocator::new(63, align(8)))?;
        let e = source.copy_to(&mut smaller).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::IncompatibleCopy));

        let mut misaligned = track!(StackAllocator::new(128, align(4)))?;
        let e = source.copy_to(&mut misaligned).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::IncompatibleCopy));
        assert!(misaligned.is_empty());
        Ok(())
    }

    #[test]
    fn reallocate_into_keeps_blocks() -> TestResult {
        let mut first = track!(AlignedBytes::new(64, align(8)))?;
        let mut second = track!(AlignedBytes::new(72, align(8)))?;
        let mut third = track!(AlignedBytes::new(128, align(8)))?;

        let mut stack = track!(StackAllocator::with_buffer(&mut first[..], Some(align(8))))?;
        let block = track!(stack.allocate(8))?.expect("fits");
        stack
            .block_bytes_mut(&block)
            .expect("live")
            .copy_from_slice(b"abcdefgh");
        track!(stack.allocate_aligned(4, align(8)))?.expect("fits");
        let allocated = stack.allocated_bytes();

        // 71 bytes minus 7 skipped bytes is not larger than 64
        assert!(!track!(stack.reallocate_into(&mut second[1..]))?);
        assert_eq!(stack.size(), 64);

        assert!(track!(stack.reallocate_into(&mut third[1..]))?);
        assert_eq!(stack.size(), 120);
        assert_eq!(stack.allocated_bytes(), allocated);
        assert_eq!(stack.block_bytes(&block), Some(&b"abcdefgh"[..]));

        let sizes = track!(stack.headers())?
            .iter()
            .map(|h| h.block_size())
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![4, 8]);

        let mark = stack.mark();
        track!(stack.allocate(16))?.expect("fits");
        track!(stack.deallocate_to(mark))?;
        assert_eq!(stack.allocated_bytes(), allocated);

        track!(stack.deallocate())?;
        assert_eq!(track!(stack.last_header())?.map(|h| h.block_size()), Some(8));
        track!(stack.deallocate())?;
        assert!(stack.is_empty());
        assert_eq!(stack.metrics().reallocations(), 1);
        Ok(())
    }

    #[test]
    fn reallocate_into_refuses_owned_buffers() -> TestResult {
        let mut outside = [0u8; 128];
        let mut stack = track!(StackAllocator::new(32, align(8)))?;
        track!(stack.allocate(4))?;

        let e = stack
            .reallocate_into(&mut outside[..])
            .err()
            .map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidInput));
        assert_eq!(stack.size(), 32);
        assert_eq!(track!(stack.headers())?.len(), 1);
        Ok(())
    }

    #[test]
    fn reallocate_keeps_blocks() -> TestResult {
        let mut stack = track!(StackAllocator::new(48, align(8)))?;
        let mark = stack.mark();
        let block = track!(stack.allocate(8))?.expect("fits");
        stack
            .block_bytes_mut(&block)
            .expect("live")
            .copy_from_slice(b"12345678");

        assert!(track!(stack.reallocate(128))?);
        assert_eq!(stack.size(), 128);
        assert_eq!(stack.block_bytes(&block), Some(&b"12345678"[..]));
        assert_eq!(track!(stack.headers())?.len(), 1);
        assert_ne!(stack.mark(), mark);

        track!(stack.deallocate())?;
        assert!(stack.is_empty());
        Ok(())
    }

    #[test]
    fn clear_works() -> TestResult {
        let mut stack = track!(StackAllocator::new(64, align(4)))?;
        let first = track!(stack.allocate(4))?.expect("fits");
        track!(stack.allocate(4))?;

        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.allocated_bytes(), 0);
        assert_eq!(stack.block_bytes(&first), None);

        let again = track!(stack.allocate(4))?.expect("fits");
        assert_eq!(again, first);
        Ok(())
    }

    proptest! {
        #[test]
        fn payloads_are_aligned(
            requests in proptest::collection::vec((1usize..48, 0u32..6), 1..24),
        ) {
            let mut stack = StackAllocator::new(1024, align(8)).expect("Never fails");
            for (size, shift) in requests {
                let alignment = align(1 << shift);
                let expected = stack.can_allocate_aligned(size, alignment);
                let block = stack.allocate_aligned(size, alignment).expect("valid request");
                prop_assert_eq!(block.is_some(), expected);
                if let Some(block) = block {
                    prop_assert!(alignment.is_aligned(stack.address_of(&block)));
                }
                prop_assert!(stack.allocated_bytes() <= stack.size());
            }
        }

        #[test]
        fn mark_restores_allocated_bytes(
            before in proptest::collection::vec(1usize..32, 0..8),
            after in proptest::collection::vec(1usize..32, 0..8),
        ) {
            let mut stack = StackAllocator::new(1024, align(4)).expect("Never fails");
            for size in before {
                stack.allocate_aligned(size, align(4)).expect("valid request");
            }
            let mark = stack.mark();
            let allocated = stack.allocated_bytes();
            let depth = stack.headers().expect("consistent").len();

            for size in after {
                stack.allocate(size).expect("valid request");
            }
            stack.deallocate_to(mark).expect("valid mark");
            prop_assert_eq!(stack.allocated_bytes(), allocated);
            prop_assert_eq!(stack.headers().expect("consistent").len(), depth);
        }

        #[test]
        fn deallocate_undoes_allocate(
            sizes in proptest::collection::vec(1usize..32, 1..16),
        ) {
            let mut stack = StackAllocator::new(1024, align(1)).expect("Never fails");
            let mut history = Vec::new();
            for size in sizes {
                history.push(stack.allocated_bytes());
                stack.allocate(size).expect("valid request");
            }
            while let Some(allocated) = history.pop() {
                stack.deallocate().expect("non empty");
                prop_assert_eq!(stack.allocated_bytes(), allocated);
            }
            prop_assert!(stack.is_empty());
        }
    }
}
