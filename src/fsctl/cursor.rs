use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Bounds-checked little-endian reader over a control response.
///
/// Every read either yields a complete field and advances, or fails with
/// [`Error::Truncated`] and leaves the position untouched.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(bytes),
        }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    /// Bytes left between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.inner.get_ref().len().saturating_sub(self.position())
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(Error::Truncated {
                offset: self.position(),
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.inner.read_i64::<LittleEndian>()?)
    }

    /// Advance past `len` bytes of padding
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.ensure(len)?;
        self.inner.set_position((self.position() + len) as u64);
        Ok(())
    }

    /// Borrow the next `len` bytes and advance past them
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let start = self.position();
        let bytes: &'a [u8] = *self.inner.get_ref();
        self.inner.set_position((start + len) as u64);
        Ok(&bytes[start..start + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_reads() {
        let mut data = Vec::new();
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(&[0xEE; 4]);
        data.extend_from_slice(&(-1i64).to_le_bytes());
        data.extend_from_slice(&[1, 2, 3]);

        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u32().unwrap(), 7);
        cursor.skip(4).unwrap();
        assert_eq!(cursor.read_i64().unwrap(), -1);
        assert_eq!(cursor.take(3).unwrap(), &[1, 2, 3]);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_short_read_does_not_advance() {
        let data = [0u8; 6];
        let mut cursor = ByteCursor::new(&data);
        cursor.skip(2).unwrap();

        match cursor.read_i64() {
            Err(Error::Truncated {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 8);
                assert_eq!(available, 4);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.read_u32().unwrap(), 0);
    }

    #[test]
    fn test_take_past_end() {
        let data = [0u8; 4];
        let mut cursor = ByteCursor::new(&data);
        assert!(cursor.take(5).is_err());
        assert!(cursor.take(4).is_ok());
    }
}
