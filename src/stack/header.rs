use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{ErrorKind, Result};

/// Number of bytes a `BlockHeader` occupies in the buffer.
pub const HEADER_SIZE: usize =
    8 /* block_size */ +
    8 /* alignment_offset */ +
    8 /* previous_header_back_offset */;

/// The record written just before every payload of a `StackAllocator`.
///
/// All offsets are relative, so a header stays meaningful after the buffer is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    block_size: usize,
    alignment_offset: usize,
    previous_header_back_offset: usize,
}
impl BlockHeader {
    pub(crate) fn new(
        block_size: usize,
        alignment_offset: usize,
        previous_header_back_offset: usize,
    ) -> Self {
        BlockHeader {
            block_size,
            alignment_offset,
            previous_header_back_offset,
        }
    }

    /// Returns the size of the payload.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the padding between the end of this header and the start of the payload.
    pub fn alignment_offset(&self) -> usize {
        self.alignment_offset
    }

    /// Returns the distance from the previous header to this header.
    ///
    /// `0` means that this header belongs to the first block of the stack.
    pub fn previous_header_back_offset(&self) -> usize {
        self.previous_header_back_offset
    }

    /// Returns `true` if this header belongs to the first block of the stack.
    pub fn is_first(&self) -> bool {
        self.previous_header_back_offset == 0
    }

    /// Returns the number of bytes the block consumes (header, padding and payload).
    pub fn footprint(&self) -> usize {
        HEADER_SIZE
            .saturating_add(self.alignment_offset)
            .saturating_add(self.block_size)
    }

    /// Reads a header from `reader`.
    ///
    /// # Errors
    ///
    /// If the decoded `block_size` is `0`,
    /// an error which has the kind `ErrorKind::InconsistentState` will be returned.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let block_size = track_io!(reader.read_u64::<LittleEndian>())?;
        let alignment_offset = track_io!(reader.read_u64::<LittleEndian>())?;
        let previous_header_back_offset = track_io!(reader.read_u64::<LittleEndian>())?;
        track_assert_ne!(block_size, 0, ErrorKind::InconsistentState);
        Ok(BlockHeader {
            block_size: block_size as usize,
            alignment_offset: alignment_offset as usize,
            previous_header_back_offset: previous_header_back_offset as usize,
        })
    }

    /// Writes this header to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_io!(writer.write_u64::<LittleEndian>(self.block_size as u64))?;
        track_io!(writer.write_u64::<LittleEndian>(self.alignment_offset as u64))?;
        track_io!(writer.write_u64::<LittleEndian>(
            self.previous_header_back_offset as u64
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;

    #[test]
    fn it_works() -> TestResult {
        let header = BlockHeader::new(10, 6, 48);
        assert_eq!(header.footprint(), HEADER_SIZE + 16);
        assert!(!header.is_first());

        let mut buf = Vec::new();
        track!(header.write_to(&mut buf))?;
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[..8], &[10, 0, 0, 0, 0, 0, 0, 0]);

        let decoded = track!(BlockHeader::read_from(&buf[..]))?;
        assert_eq!(decoded, header);
        Ok(())
    }

    #[test]
    fn first_block_has_no_back_offset() {
        assert!(BlockHeader::new(1, 0, 0).is_first());
    }

    #[test]
    fn read_rejects_broken_headers() {
        let zeros = [0; HEADER_SIZE];
        let e = BlockHeader::read_from(&zeros[..]).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InconsistentState));

        let short = [1; HEADER_SIZE - 1];
        let e = BlockHeader::read_from(&short[..]).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::Other));
    }
}
