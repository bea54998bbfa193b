use crate::buffer::Alignment;
use crate::{ErrorKind, Result};

/// A heap byte sequence whose start address is aligned to the given boundary.
///
/// Apart from how the memory is reserved, it can be handled like an ordinary byte slice.
/// The memory is released when the instance is dropped.
#[derive(Debug)]
pub struct AlignedBytes {
    buf: Vec<u8>,
    offset: usize,
    len: usize,
    alignment: Alignment,
}
impl AlignedBytes {
    /// Acquires a new zero-filled `AlignedBytes` of `size` bytes.
    ///
    /// # Errors
    ///
    /// If `size` plus the alignment slack does not fit in `usize`,
    /// an error which has the kind `ErrorKind::InvalidInput` will be returned.
    /// If the memory cannot be reserved, an error which has the kind `ErrorKind::Other` will be returned.
    pub fn new(size: usize, alignment: Alignment) -> Result<Self> {
        // Reserve enough slack to slide the start forward to a boundary
        let capacity = track_assert_some!(
            size.checked_add(alignment.as_usize() - 1),
            ErrorKind::InvalidInput,
            "Too large size: size={}, alignment={}",
            size,
            alignment.as_usize()
        );
        let mut buf = Vec::new();
        track_assert!(
            buf.try_reserve_exact(capacity).is_ok(),
            ErrorKind::Other,
            "Cannot reserve {} bytes",
            capacity
        );
        buf.resize(capacity, 0);
        Ok(Self::from_vec(buf, size, alignment))
    }

    /// Makes a new `AlignedBytes` of `size` bytes whose head is a copy of `bytes`.
    ///
    /// `bytes` longer than `size` are truncated.
    ///
    /// # Errors
    ///
    /// See `new`.
    pub fn from_prefix(bytes: &[u8], size: usize, alignment: Alignment) -> Result<Self> {
        let mut aligned = track!(Self::new(size, alignment))?;
        let n = bytes.len().min(size);
        aligned[..n].copy_from_slice(&bytes[..n]);
        Ok(aligned)
    }

    /// Returns the alignment of this byte sequence.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    fn from_vec(buf: Vec<u8>, len: usize, alignment: Alignment) -> Self {
        let offset = alignment.padding(buf.as_ptr() as usize);
        AlignedBytes {
            buf,
            offset,
            len,
            alignment,
        }
    }
}
impl std::ops::Deref for AlignedBytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.buf[self.offset..][..self.len]
    }
}
impl std::ops::DerefMut for AlignedBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.offset..][..self.len]
    }
}
impl AsRef<[u8]> for AlignedBytes {
    fn as_ref(&self) -> &[u8] {
        &*self
    }
}
impl AsMut<[u8]> for AlignedBytes {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut *self
    }
}
impl Clone for AlignedBytes {
    fn clone(&self) -> Self {
        // A buffer of the same capacity always has room for the aligned window
        let mut cloned = Self::from_vec(vec![0; self.buf.len()], self.len, self.alignment);
        cloned.copy_from_slice(self.as_ref());
        cloned
    }
}
