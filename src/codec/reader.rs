//! Bounds-checked cursor over a byte buffer.

use crate::core::CodecError;

/// Little-endian read cursor used by all response decoders.
///
/// Every read validates the remaining length first and fails with
/// [`CodecError::UnexpectedEof`] instead of panicking or truncating.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Wrap a buffer, cursor at the start.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether any bytes are left.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    /// Take `n` raw bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Take a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array::<2>()?))
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array::<4>()?))
    }

    /// Fail if any bytes remain after a fixed-size message.
    pub fn expect_end(&self) -> Result<(), CodecError> {
        if self.has_remaining() {
            return Err(CodecError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance_cursor() {
        let buf = [1u8, 2, 0, 0x78, 0x56, 0x34, 0x12, 9];
        let mut reader = ByteReader::new(&buf);
        assert_eq!(reader.read_u8().unwrap(), 1);
        assert_eq!(reader.read_u16().unwrap(), 2);
        assert_eq!(reader.read_i32().unwrap(), 0x1234_5678);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_bytes(1).unwrap(), &[9]);
        assert!(reader.expect_end().is_ok());
    }

    #[test]
    fn test_eof_is_structured() {
        let mut reader = ByteReader::new(&[1, 2]);
        let err = reader.read_i32().unwrap_err();
        assert_eq!(
            err,
            crate::core::CodecError::UnexpectedEof {
                needed: 4,
                remaining: 2
            }
        );
        // Cursor untouched after a failed read.
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn test_trailing_bytes_detected() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        reader.read_u8().unwrap();
        assert_eq!(
            reader.expect_end().unwrap_err(),
            crate::core::CodecError::TrailingBytes(2)
        );
    }
}
