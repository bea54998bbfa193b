//! Arena (bump) allocator.
//!
//! An arena hands out increasingly offset blocks from a fixed buffer and
//! reclaims all of them at once with `clear`.
use slog::Logger;

use crate::block::Block;
use crate::buffer::{Alignment, ReservedBuffer};
use crate::builder::{AllocatorBuilder, Instrumentation};
use crate::metrics::AllocatorMetrics;
use crate::policy::{Contract, ViolationPolicy};
use crate::{ErrorKind, Result};

/// Bump-pointer allocator over a single reserved buffer.
///
/// The cursor `top` only moves forward between `clear` calls,
/// and `allocated_bytes() == top` (alignment padding included).
///
/// # Hazards
///
/// - After `clear`, previously returned blocks still refer to the untouched bytes,
///   but the next allocations will hand out the same region again.
/// - `reallocate` and `reallocate_into` move the buffer,
///   so every address previously observed via `address_of` becomes stale
///   (offsets stay valid, addresses do not).
#[derive(Debug)]
pub struct ArenaAllocator<'a> {
    buffer: ReservedBuffer<'a>,
    top: usize,
    contract: Contract,
    logger: Logger,
    metrics: AllocatorMetrics,
}
impl<'a> ArenaAllocator<'a> {
    /// Makes an arena owning a newly acquired buffer of `size` bytes aligned to `alignment`.
    ///
    /// This is equivalent to `AllocatorBuilder::new().alignment(alignment).arena(size)`.
    pub fn new(size: usize, alignment: Alignment) -> Result<Self> {
        track!(AllocatorBuilder::new().alignment(alignment).arena(size))
    }

    /// Makes an arena borrowing `buf`.
    ///
    /// If `alignment` is given and `buf` is misaligned,
    /// the head of `buf` is skipped and the usable size is reduced permanently.
    pub fn with_buffer(buf: &'a mut [u8], alignment: Option<Alignment>) -> Result<Self> {
        let mut builder = AllocatorBuilder::new();
        if let Some(alignment) = alignment {
            builder.alignment(alignment);
        }
        track!(builder.arena_in(buf))
    }

    pub(crate) fn from_parts(buffer: ReservedBuffer<'a>, instrumentation: Instrumentation) -> Self {
        let Instrumentation {
            contract,
            logger,
            metrics,
        } = instrumentation;
        metrics.set_capacity(buffer.size());
        metrics.set_usage(0);
        debug!(logger, "Arena allocator is ready";
               "size" => buffer.size(),
               "alignment" => buffer.alignment().as_usize(),
               "owned" => buffer.is_owned(),
               "skipped_bytes" => buffer.skipped_bytes());
        ArenaAllocator {
            buffer,
            top: 0,
            contract,
            logger,
            metrics,
        }
    }

    /// Allocates a block of `size` bytes without alignment padding.
    ///
    /// `Ok(None)` is returned if the free space is insufficient.
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
    /// The padding skipped in front of the block counts toward `allocated_bytes`.
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

        let block = Block::new(self.top + padding, size);
        self.top += footprint;
        self.metrics.count_allocation(footprint, self.top);
        Ok(Some(block))
    }

    /// Returns `true` if `allocate(size)` would succeed now.
    pub fn can_allocate(&self, size: usize) -> bool {
        self.can_allocate_aligned(size, Alignment::none())
    }

    /// Returns `true` if `allocate_aligned(size, alignment)` would succeed now.
    ///
    /// A zero-sized request can never succeed.
    pub fn can_allocate_aligned(&self, size: usize, alignment: Alignment) -> bool {
        self.fit(size, alignment).is_some()
    }

    /// Rewinds the arena to its base in O(1).
    ///
    /// The memory is not zeroed.
    pub fn clear(&mut self) {
        debug!(self.logger, "Cleared"; "released_bytes" => self.top);
        self.top = 0;
        self.metrics.clears.increment();
        self.metrics.set_usage(0);
    }

    /// Copies the allocated region of this arena into the head of `destination`.
    ///
    /// After the copy, `destination.allocated_bytes()` equals `self.allocated_bytes()`.
    ///
    /// Only the alignment of the first block is guaranteed to be preserved:
    /// the copy is a flat byte copy, and the base addresses of both buffers may differ
    /// modulo larger alignments.
    ///
    /// # Errors
    ///
    /// If `destination` is smaller than `self.allocated_bytes()`,
    /// an error which has the kind `ErrorKind::IncompatibleCopy` will be returned
    /// (or a panic occurs under `ViolationPolicy::Strict`).
    pub fn copy_to(&self, destination: &mut ArenaAllocator<'_>) -> Result<()> {
        let n = self.top;
        track!(self
            .contract
            .enforce(validate_destination(destination.size(), n)))?;

        destination.buffer.as_bytes_mut()[..n].copy_from_slice(&self.buffer.as_bytes()[..n]);
        destination.top = n;
        destination.metrics.set_usage(n);
        self.metrics.copies.increment();
        Ok(())
    }

    /// Grows an owned buffer to `new_size` bytes.
    ///
    /// A new buffer is acquired, the allocated bytes are copied, and the old buffer is released.
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
    /// `new_location` is adjusted for alignment first, which may leave its usable size
    /// below `new_location.len()`. Unless the usable size is strictly larger than the current size,
    /// nothing happens and `Ok(false)` is returned.
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

    /// Returns the usable size of the buffer.
    pub fn size(&self) -> usize {
        self.buffer.size()
    }

    /// Returns the number of consumed bytes (alignment padding included).
    pub fn allocated_bytes(&self) -> usize {
        self.top
    }

    /// Returns the number of bytes still available.
    pub fn free_bytes(&self) -> usize {
        self.size() - self.top
    }

    /// Returns the absolute address of the buffer base.
    pub fn base_address(&self) -> usize {
        self.buffer.base_address()
    }

    /// Returns the alignment of the buffer base.
    pub fn alignment(&self) -> Alignment {
        self.buffer.alignment()
    }

    /// Returns `true` if the buffer is owned by this arena.
    pub fn is_owned(&self) -> bool {
        self.buffer.is_owned()
    }

    /// Returns the current absolute address of `block`.
    pub fn address_of(&self, block: &Block) -> usize {
        self.base_address() + block.offset()
    }

    /// Returns the allocated region `[base, base + allocated_bytes())`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer.as_bytes()[..self.top]
    }

    /// Returns the bytes of `block`.
    ///
    /// `None` is returned if `block` is not within the allocated region
    /// (e.g., the arena has been cleared since).
    pub fn block_bytes(&self, block: &Block) -> Option<&[u8]> {
        if block.end() <= self.top {
            Some(&self.buffer.as_bytes()[block.offset()..block.end()])
        } else {
            None
        }
    }

    /// Mutable version of `block_bytes`.
    pub fn block_bytes_mut(&mut self, block: &Block) -> Option<&mut [u8]> {
        if block.end() <= self.top {
            Some(&mut self.buffer.as_bytes_mut()[block.offset()..block.end()])
        } else {
            None
        }
    }

    /// Returns how this arena reacts to contract violations.
    pub fn policy(&self) -> ViolationPolicy {
        self.contract.policy()
    }

    /// Returns the metrics of this arena.
    pub fn metrics(&self) -> &AllocatorMetrics {
        &self.metrics
    }

    fn fit(&self, size: usize, alignment: Alignment) -> Option<(usize, usize)> {
        if size == 0 {
            return None;
        }
        let start = self.base_address() + self.top;
        let padding = alignment.ceil_align(start)? - start;
        let footprint = padding.checked_add(size)?;
        if footprint <= self.free_bytes() {
            Some((padding, footprint))
        } else {
            None
        }
    }

    fn count_reallocation(&self, old_size: usize) {
        debug!(self.logger, "Buffer reallocated";
               "old_size" => old_size, "new_size" => self.size(),
               "allocated_bytes" => self.top);
        self.metrics.reallocations.increment();
        self.metrics.set_capacity(self.size());
    }
}

fn validate_size(size: usize) -> Result<()> {
    track_assert_ne!(size, 0, ErrorKind::InvalidInput, "Zero-sized allocation");
    Ok(())
}

fn validate_destination(destination_size: usize, required: usize) -> Result<()> {
    track_assert!(
        destination_size >= required,
        ErrorKind::IncompatibleCopy,
        "Too small destination: size={}, required={}",
        destination_size,
        required
    );
    Ok(())
}
