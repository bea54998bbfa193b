/// A restore point of a `StackAllocator`.
///
/// A mark is a snapshot of the absolute address of the stack top.
/// It is not tracked by the allocator: using a mark taken before a `clear` or a reallocation
/// is refused only when the address is out of range or lands on a broken header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mark {
    address: usize,
}
impl Mark {
    pub(crate) fn new(address: usize) -> Self {
        Mark { address }
    }

    /// Returns the absolute address of the restore point.
    pub fn address(&self) -> usize {
        self.address
    }
}
