use std::convert::TryFrom;

use crate::{Error, ErrorKind, Result};

/// A power-of-two byte alignment.
///
/// Every allocator in this crate expresses alignment requirements through this type,
/// so that an invalid alignment can never reach the address arithmetic.
///
/// Helper methods for aligning addresses and offsets are also provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(usize);
impl Alignment {
    /// The smallest alignment (i.e., no alignment requirement at all).
    ///
    /// This is also the value used by `Alignment::default()`.
    pub const MIN: usize = 1;

    /// Returns the `Alignment` instance which imposes no requirement.
    ///
    /// # Examples
    ///
    /// ```
    /// use bufalloc::buffer::Alignment;
    ///
    /// assert_eq!(Alignment::none().as_usize(), Alignment::MIN);
    /// ```
    pub fn none() -> Self {
        Alignment(Self::MIN)
    }

    /// Makes a new `Alignment` instance.
    ///
    /// # Errors
    ///
    /// If `alignment` is not a power of two (including `0`),
    /// an error which has the kind `ErrorKind::InvalidInput` will be returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use bufalloc::ErrorKind;
    /// use bufalloc::buffer::Alignment;
    ///
    /// assert_eq!(Alignment::new(1).ok().map(|a| a.as_usize()), Some(1));
    /// assert_eq!(Alignment::new(4096).ok().map(|a| a.as_usize()), Some(4096));
    ///
    /// assert_eq!(Alignment::new(0).err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// assert_eq!(Alignment::new(12).err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(alignment: usize) -> Result<Self> {
        track_assert!(
            alignment.is_power_of_two(),
            ErrorKind::InvalidInput,
            "Not a power of two: {}",
            alignment
        );
        Ok(Alignment(alignment))
    }

    /// Returns the number of bytes needed to move `address` forward to the next boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use bufalloc::buffer::Alignment;
    ///
    /// let alignment = Alignment::new(8).unwrap();
    /// assert_eq!(alignment.padding(0), 0);
    /// assert_eq!(alignment.padding(1), 7);
    /// assert_eq!(alignment.padding(8), 0);
    /// assert_eq!(alignment.padding(13), 3);
    /// ```
    pub fn padding(self, address: usize) -> usize {
        address.wrapping_neg() & (self.0 - 1)
    }

    /// Returns the first boundary at or after `position`.
    ///
    /// `None` is returned if the result does not fit in `usize`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bufalloc::buffer::Alignment;
    ///
    /// let alignment = Alignment::new(16).unwrap();
    /// assert_eq!(alignment.ceil_align(0), Some(0));
    /// assert_eq!(alignment.ceil_align(1), Some(16));
    /// assert_eq!(alignment.ceil_align(16), Some(16));
    /// assert_eq!(alignment.ceil_align(usize::MAX), None);
    /// ```
    pub fn ceil_align(self, position: usize) -> Option<usize> {
        position.checked_add(self.padding(position))
    }

    /// Returns `true` if `address` lies on a boundary of this alignment.
    ///
    /// # Examples
    ///
    /// ```
    /// use bufalloc::buffer::Alignment;
    ///
    /// let alignment = Alignment::new(4).unwrap();
    /// assert!(alignment.is_aligned(0));
    /// assert!(alignment.is_aligned(8));
    /// assert!(!alignment.is_aligned(6));
    /// ```
    pub fn is_aligned(self, address: usize) -> bool {
        self.padding(address) == 0
    }

    /// Returns the alignment as `usize`.
    pub fn as_usize(self) -> usize {
        self.0
    }
}
impl Default for Alignment {
    fn default() -> Self {
        Self::none()
    }
}
impl From<Alignment> for usize {
    fn from(f: Alignment) -> Self {
        f.0
    }
}
impl TryFrom<usize> for Alignment {
    type Error = Error;

    fn try_from(f: usize) -> Result<Self> {
        track!(Alignment::new(f))
    }
}
