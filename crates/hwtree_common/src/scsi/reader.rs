//! Bounds-checked reader for fixed-layout SCSI replies.
//!
//! Offsets and widths come from the SCSI command set; every accessor
//! returns `None` instead of reading past the buffer.

#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.buf.get(offset).copied()
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        let end = offset.checked_add(len)?;
        self.buf.get(offset..end)
    }

    /// Big-endian unsigned integer of `width` bytes (1..=8)
    pub fn be_uint(&self, offset: usize, width: usize) -> Option<u64> {
        if width == 0 || width > 8 {
            return None;
        }
        let raw = self.bytes(offset, width)?;
        Some(raw.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn be_u16(&self, offset: usize) -> Option<u16> {
        self.be_uint(offset, 2).map(|v| v as u16)
    }

    pub fn be_u24(&self, offset: usize) -> Option<u32> {
        self.be_uint(offset, 3).map(|v| v as u32)
    }

    /// Fixed-width ASCII field, blank and NUL padding stripped.
    /// Non-ASCII bytes are dropped rather than failing the field.
    pub fn ascii(&self, offset: usize, len: usize) -> Option<String> {
        let raw = self.bytes(offset, len)?;
        let text: String = raw
            .iter()
            .filter(|b| b.is_ascii() && **b != 0)
            .map(|b| *b as char)
            .collect();
        Some(text.trim().to_string())
    }

    /// Reader over `offset..` (empty past the end)
    pub fn slice_from(&self, offset: usize) -> ByteReader<'a> {
        ByteReader::new(self.buf.get(offset..).unwrap_or(&[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_fields() {
        let buf = [0x01, 0x02, 0x03, 0x04];
        let r = ByteReader::new(&buf);
        assert_eq!(r.be_u16(0), Some(0x0102));
        assert_eq!(r.be_u24(1), Some(0x020304));
        assert_eq!(r.be_uint(0, 4), Some(0x01020304));
        assert_eq!(r.be_u16(3), None);
        assert_eq!(r.be_uint(0, 0), None);
        assert_eq!(r.be_uint(0, 9), None);
    }

    #[test]
    fn test_ascii_field() {
        let buf = b"xxATA     \0\0";
        let r = ByteReader::new(buf);
        assert_eq!(r.ascii(2, 10).as_deref(), Some("ATA"));
        assert_eq!(r.ascii(2, 11), None);
    }

    #[test]
    fn test_offset_overflow_is_none() {
        let r = ByteReader::new(&[0u8; 4]);
        assert_eq!(r.bytes(usize::MAX, 2), None);
        assert!(r.slice_from(10).is_empty());
        assert_eq!(r.slice_from(1).len(), 3);
    }
}
