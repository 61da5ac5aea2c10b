//! Byte cursor over an immutable buffer

use crate::error::{Result, StreamError};

/// Read position over a borrowed byte buffer
///
/// The position always stays within `[0, len]`. Reads that would pass the
/// end fail with [`StreamError::OutOfBounds`] and leave the position
/// untouched; there are no partial reads.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor at offset 0
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the buffer has no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the position and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The whole underlying buffer
    pub fn buffer(&self) -> &'a [u8] {
        self.data
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> StreamError {
        StreamError::OutOfBounds {
            offset,
            len,
            buffer_len: self.data.len(),
        }
    }

    /// Read the next `n` bytes and advance past them
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.out_of_bounds(self.pos, n))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read a little-endian unsigned integer of `width` bytes (1, 2, 4 or 8)
    pub fn read_uint(&mut self, width: usize) -> Result<u64> {
        self.read_uint_endian(width, true)
    }

    /// Read an unsigned integer of `width` bytes in the given byte order
    pub fn read_uint_endian(&mut self, width: usize, little_endian: bool) -> Result<u64> {
        if !is_valid_width(width) {
            return Err(StreamError::InvalidWidth {
                field: String::new(),
                width,
            });
        }
        let bytes = self.read(width)?;
        let mut buf = [0u8; 8];
        if little_endian {
            buf[..width].copy_from_slice(bytes);
            Ok(u64::from_le_bytes(buf))
        } else {
            buf[8 - width..].copy_from_slice(bytes);
            Ok(u64::from_be_bytes(buf))
        }
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Move to an absolute offset; `len` itself is a valid position
    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(self.out_of_bounds(offset, 0));
        }
        self.pos = offset;
        Ok(())
    }

    /// Run `f` at `offset`, then put the position back where it was
    ///
    /// The position is restored whether `f` succeeds or fails, and also when
    /// the seek itself fails.
    pub fn with_position<T>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = self.pos;
        let result = self.seek(offset).and_then(|()| f(self));
        self.pos = saved;
        result
    }
}

/// Integer widths the codec supports
pub const VALID_WIDTHS: [usize; 4] = [1, 2, 4, 8];

pub(crate) fn is_valid_width(width: usize) -> bool {
    VALID_WIDTHS.contains(&width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_uint(1).unwrap(), 0x01);
        assert_eq!(cursor.read_uint(2).unwrap(), 0x0302);
        assert_eq!(cursor.read_uint(4).unwrap(), 0x0706_0504);
        assert_eq!(cursor.position(), 7);
        assert_eq!(cursor.read(2).unwrap(), &[0x08, 0x09]);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_is_empty_ignores_position() {
        assert!(ByteCursor::new(&[]).is_empty());

        let data = [0xAAu8];
        let mut cursor = ByteCursor::new(&data);
        cursor.read(1).unwrap();
        assert_eq!(cursor.remaining(), 0);
        assert!(!cursor.is_empty());
    }

    #[test]
    fn test_read_uint_big_endian() {
        let data = [0x12u8, 0x34];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_uint_endian(2, false).unwrap(), 0x1234);
    }

    #[test]
    fn test_read_u64() {
        let data = 0xDEAD_BEEF_0000_0001u64.to_le_bytes();
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_uint(8).unwrap(), 0xDEAD_BEEF_0000_0001);
    }

    #[test]
    fn test_read_past_end_is_not_partial() {
        let data = [1u8, 2, 3];
        let mut cursor = ByteCursor::new(&data);
        cursor.seek(1).unwrap();

        let err = cursor.read(4).unwrap_err();
        assert_eq!(
            err,
            StreamError::OutOfBounds {
                offset: 1,
                len: 4,
                buffer_len: 3
            }
        );
        // Position is unchanged after a failed read
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_invalid_width() {
        let data = [0u8; 8];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            cursor.read_uint(3),
            Err(StreamError::InvalidWidth { width: 3, .. })
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_seek_to_end() {
        let data = [0u8; 4];
        let mut cursor = ByteCursor::new(&data);

        cursor.seek(4).unwrap();
        assert_eq!(cursor.read(0).unwrap(), &[] as &[u8]);
        assert!(cursor.read(1).is_err());
        assert!(matches!(
            cursor.seek(5),
            Err(StreamError::OutOfBounds { offset: 5, .. })
        ));
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_with_position_restores() {
        let data = [0xAAu8, 0xBB, 0xCC, 0xDD];
        let mut cursor = ByteCursor::new(&data);
        cursor.seek(1).unwrap();

        let value = cursor.with_position(3, |c| c.read_uint(1)).unwrap();
        assert_eq!(value, 0xDD);
        assert_eq!(cursor.position(), 1);

        assert!(cursor.with_position(3, |c| c.read_uint(2)).is_err());
        assert_eq!(cursor.position(), 1);

        assert!(cursor.with_position(10, |c| c.read_uint(1)).is_err());
        assert_eq!(cursor.position(), 1);
    }
}
