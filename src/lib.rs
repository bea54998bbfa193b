//! Buffer allocators.
//!
//! `bufalloc` hands out sub-blocks of a single pre-reserved buffer,
//! so that no per-object request reaches the general-purpose heap.
//!
//! # Allocators
//!
//! - [ArenaAllocator]: a bump allocator which only grows until it is cleared
//! - [StackAllocator]: a LIFO allocator which writes a [BlockHeader] in front of every block,
//!   and can pop blocks one at a time or roll back to a [Mark]
//!
//! Both allocators work on a [ReservedBuffer],
//! which is either owned by the allocator or borrowed from the caller.
//! Allocated blocks are returned as [Block] handles (offsets into the buffer),
//! and the bytes behind them are reached through the allocator.
//!
//! # Failures
//!
//! Running out of space is not an error: allocations return `Ok(None)`.
//! Broken contracts (e.g., a zero-sized request) are handled according to the [ViolationPolicy]
//! given to [AllocatorBuilder]: a panic under `Strict`, an `Err` under `Lenient`.
//!
//! # Examples
//!
//! ```
//! use bufalloc::buffer::Alignment;
//! use bufalloc::StackAllocator;
//!
//! # fn main() -> Result<(), bufalloc::Error> {
//! let mut stack = StackAllocator::new(256, Alignment::new(8)?)?;
//! stack.allocate(32)?;
//!
//! let mark = stack.mark();
//! let block = stack.allocate_aligned(16, Alignment::new(16)?)?.expect("fits");
//! stack.block_bytes_mut(&block).expect("live").copy_from_slice(&[7; 16]);
//!
//! stack.deallocate_to(mark)?;
//! assert_eq!(stack.block_bytes(&block), None);
//! # Ok(())
//! # }
//! ```
//!
//! [ArenaAllocator]: ./arena/struct.ArenaAllocator.html
//! [StackAllocator]: ./stack/struct.StackAllocator.html
//! [BlockHeader]: ./stack/struct.BlockHeader.html
//! [Mark]: ./stack/struct.Mark.html
//! [ReservedBuffer]: ./buffer/struct.ReservedBuffer.html
//! [Block]: ./block/struct.Block.html
//! [ViolationPolicy]: ./policy/enum.ViolationPolicy.html
//! [AllocatorBuilder]: ./builder/struct.AllocatorBuilder.html
#![warn(missing_docs)]
extern crate byteorder;
extern crate prometrics;
#[cfg(test)]
extern crate proptest;
#[macro_use]
extern crate trackable;
#[macro_use]
extern crate slog;

pub use crate::arena::ArenaAllocator;
pub use crate::block::Block;
pub use crate::builder::AllocatorBuilder;
pub use crate::error::{Error, ErrorKind};
pub use crate::policy::ViolationPolicy;
pub use crate::stack::{Mark, StackAllocator};

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| track!(crate::Error::from(e)))
    };
}

pub mod arena;
pub mod block;
pub mod buffer;
pub mod builder;
pub mod metrics;
pub mod policy;
pub mod stack;

mod error;

/// Crate specific `Result` type.
pub type Result<T> = std::result::Result<T, Error>;
