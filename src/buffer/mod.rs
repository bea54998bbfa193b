//! The reserved buffers that allocators carve their blocks out of.
//!
//! A [`ReservedBuffer`] is a contiguous byte region `[base, base + size)` which is either
//! owned by the allocator (backed by [`AlignedBytes`]) or borrowed from the caller.
//!
//! [`ReservedBuffer`]: ./struct.ReservedBuffer.html
//! [`AlignedBytes`]: ./struct.AlignedBytes.html
pub use self::aligned_bytes::AlignedBytes;
pub use self::alignment::Alignment;

use crate::{ErrorKind, Result};

mod aligned_bytes;
mod alignment;

#[derive(Debug)]
enum Region<'a> {
    Owned(AlignedBytes),
    Borrowed(&'a mut [u8]),
}

/// A contiguous byte region with a fixed alignment and ownership.
///
/// When a borrowed region is not aligned as requested,
/// its head is skipped once at construction time and the usable size shrinks accordingly.
/// This loss is permanent (see `skipped_bytes`).
#[derive(Debug)]
pub struct ReservedBuffer<'a> {
    region: Region<'a>,
    alignment: Alignment,
    skipped_bytes: usize,
}
impl<'a> ReservedBuffer<'a> {
    /// Acquires an owned buffer of `size` bytes aligned to `alignment`.
    ///
    /// # Errors
    ///
    /// If `size` is `0` or too large to be reserved, an error will be returned
    /// (see `AlignedBytes::new` for the latter).
    pub fn acquire(size: usize, alignment: Alignment) -> Result<Self> {
        track_assert_ne!(size, 0, ErrorKind::InvalidInput, "Zero-sized buffer");
        let bytes = track!(AlignedBytes::new(size, alignment))?;
        Ok(ReservedBuffer {
            region: Region::Owned(bytes),
            alignment,
            skipped_bytes: 0,
        })
    }

    /// Borrows `buf` as a reserved buffer.
    ///
    /// If `alignment` is given and `buf` does not start on its boundary,
    /// the head of `buf` is skipped up to the next boundary.
    ///
    /// # Errors
    ///
    /// An error which has the kind `ErrorKind::InvalidInput` will be returned if:
    ///
    /// - `buf` is empty
    /// - no byte of `buf` remains after the alignment adjustment
    pub fn borrow(buf: &'a mut [u8], alignment: Option<Alignment>) -> Result<Self> {
        track_assert_ne!(buf.len(), 0, ErrorKind::InvalidInput, "Empty external buffer");

        let alignment = alignment.unwrap_or_default();
        let skipped_bytes = alignment.padding(buf.as_ptr() as usize);
        track_assert!(
            skipped_bytes < buf.len(),
            ErrorKind::InvalidInput,
            "Too small external buffer: len={}, skipped={}",
            buf.len(),
            skipped_bytes
        );
        Ok(ReservedBuffer {
            region: Region::Borrowed(&mut buf[skipped_bytes..]),
            alignment,
            skipped_bytes,
        })
    }

    /// Returns the usable size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns the alignment of the buffer base.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Returns `true` if the buffer is released together with this instance.
    pub fn is_owned(&self) -> bool {
        match self.region {
            Region::Owned(_) => true,
            Region::Borrowed(_) => false,
        }
    }

    /// Returns the number of leading bytes dropped from a borrowed region to align it.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped_bytes
    }

    /// Returns the absolute address of the buffer base.
    pub fn base_address(&self) -> usize {
        self.as_bytes().as_ptr() as usize
    }

    /// Returns the whole usable region.
    pub fn as_bytes(&self) -> &[u8] {
        match self.region {
            Region::Owned(ref b) => &b[..],
            Region::Borrowed(ref b) => &b[..],
        }
    }

    /// Returns the whole usable region mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self.region {
            Region::Owned(ref mut b) => &mut b[..],
            Region::Borrowed(ref mut b) => &mut b[..],
        }
    }

    /// Replaces an owned buffer with a newly acquired one of `new_size` bytes.
    ///
    /// The first `preserved` bytes are carried over, then the old buffer is released.
    /// Nothing happens (and `Ok(false)` is returned) if `new_size` is not larger than the current size.
    ///
    /// # Errors
    ///
    /// If the buffer is borrowed, an error which has the kind `ErrorKind::InvalidInput` will be returned.
    /// If the new buffer cannot be acquired, the error of `AlignedBytes::new` is returned
    /// and the current buffer is kept.
    pub fn grow(&mut self, new_size: usize, preserved: usize) -> Result<bool> {
        track_assert!(
            self.is_owned(),
            ErrorKind::InvalidInput,
            "A borrowed buffer cannot be reallocated without a new location"
        );
        debug_assert!(preserved <= self.size());
        if new_size <= self.size() {
            return Ok(false);
        }

        let new = track!(AlignedBytes::from_prefix(
            &self.as_bytes()[..preserved],
            new_size,
            self.alignment
        ))?;
        self.region = Region::Owned(new);
        Ok(true)
    }

    /// Moves a borrowed buffer to `new_location`.
    ///
    /// `new_location` is adjusted for alignment in the same way as `borrow`.
    /// The first `preserved` bytes are carried over.
    /// Nothing happens (and `Ok(false)` is returned) unless the adjusted size is strictly larger
    /// than the current size.
    ///
    /// # Errors
    ///
    /// An error which has the kind `ErrorKind::InvalidInput` will be returned if:
    ///
    /// - the buffer is owned
    /// - `new_location` is empty
    pub fn relocate(&mut self, new_location: &'a mut [u8], preserved: usize) -> Result<bool> {
        track_assert!(
            !self.is_owned(),
            ErrorKind::InvalidInput,
            "An owned buffer cannot be moved to an external location"
        );
        track_assert_ne!(new_location.len(), 0, ErrorKind::InvalidInput, "Empty external buffer");
        debug_assert!(preserved <= self.size());

        let skipped_bytes = self.alignment.padding(new_location.as_ptr() as usize);
        let usable = new_location.len().saturating_sub(skipped_bytes);
        if usable <= self.size() {
            return Ok(false);
        }

        let new_location = &mut new_location[skipped_bytes..];
        new_location[..preserved].copy_from_slice(&self.as_bytes()[..preserved]);
        self.region = Region::Borrowed(new_location);
        self.skipped_bytes = skipped_bytes;
        Ok(true)
    }
}
