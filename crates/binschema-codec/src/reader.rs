//! Stateful bit/byte reader over a [`crate::source::ByteSource`].
//!
//! A `Reader` tracks one cursor, `bit_pos`, counted in bits from the start of
//! the source. Bit reads accumulate within the current byte until the cursor
//! crosses a byte boundary; reading a multi-byte integer while the cursor
//! sits mid-byte is a [`ReadError::Misaligned`] error, per the runtime's
//! alignment rule.

use std::fs::File;
use std::io::Read;

use crate::bits::{self, BitOrder, Endianness};
use crate::errors::ReadError;
use crate::source::{BufferSource, ByteSource, FileSource, StreamSource};
use crate::varint::{self, VarlenEncoding};

pub struct Reader<S: ByteSource> {
    source: S,
    bit_pos: u64,
    default_bit_order: BitOrder,
}

impl Reader<BufferSource> {
    pub fn from_buffer(data: Vec<u8>) -> Self {
        Self::new(BufferSource::new(data))
    }
}

impl Reader<FileSource> {
    pub fn from_file(file: File) -> Self {
        Self::new(FileSource::new(file))
    }
}

impl Reader<StreamSource> {
    pub fn from_stream(stream: Box<dyn Read>) -> Self {
        Self::new(StreamSource::new(stream))
    }
}

impl<S: ByteSource> Reader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            bit_pos: 0,
            default_bit_order: BitOrder::MsbFirst,
        }
    }

    pub fn with_bit_order(mut self, bit_order: BitOrder) -> Self {
        self.default_bit_order = bit_order;
        self
    }

    /// `(byte_offset, bit_offset)` of the cursor, per the runtime's
    /// `current_position()` contract.
    pub fn current_position(&self) -> (u64, u32) {
        (self.bit_pos / 8, (self.bit_pos % 8) as u32)
    }

    pub fn len(&mut self) -> Result<u64, ReadError> {
        self.source.len()
    }

    fn window(&mut self, start_bit: u64, n_bits: u32) -> Result<Vec<u8>, ReadError> {
        let start_byte = start_bit / 8;
        let end_byte = (start_bit + n_bits as u64 + 7) / 8;
        let mut buf = vec![0u8; (end_byte - start_byte) as usize];
        self.source.read_at(start_byte, &mut buf)?;
        Ok(buf)
    }

    /// Reads `n` bits (1 ≤ n ≤ 64) using `bit_order`, advancing the cursor.
    pub fn read_bits_with_order(&mut self, n: u32, bit_order: BitOrder) -> Result<u64, ReadError> {
        let local_start = self.bit_pos % 8;
        let window = self.window(self.bit_pos, n)?;
        let value = bits::read_bits_at(&window, local_start, n, bit_order)?;
        self.bit_pos += n as u64;
        Ok(value)
    }

    pub fn read_bits(&mut self, n: u32) -> Result<u64, ReadError> {
        self.read_bits_with_order(n, self.default_bit_order)
    }

    pub fn peek_bits(&mut self, n: u32) -> Result<u64, ReadError> {
        let pos = self.bit_pos;
        let value = self.read_bits(n)?;
        self.bit_pos = pos;
        Ok(value)
    }

    fn require_byte_aligned(&self) -> Result<(), ReadError> {
        if self.bit_pos % 8 != 0 {
            return Err(ReadError::Misaligned {
                offset: self.bit_pos / 8,
                bit_offset: (self.bit_pos % 8) as u32,
            });
        }
        Ok(())
    }

    fn read_uint(&mut self, width: u32, endianness: Endianness) -> Result<u64, ReadError> {
        self.require_byte_aligned()?;
        let bytes = self.window(self.bit_pos, width)?;
        self.bit_pos += width as u64;

        let value = match endianness {
            Endianness::Big => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
            Endianness::Little => bytes
                .iter()
                .rev()
                .fold(0u64, |acc, &b| (acc << 8) | b as u64),
        };
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        self.read_uint(8, Endianness::Big).map(|v| v as u8)
    }

    pub fn read_u16(&mut self, endianness: Endianness) -> Result<u16, ReadError> {
        self.read_uint(16, endianness).map(|v| v as u16)
    }

    pub fn read_u32(&mut self, endianness: Endianness) -> Result<u32, ReadError> {
        self.read_uint(32, endianness).map(|v| v as u32)
    }

    pub fn read_u64(&mut self, endianness: Endianness) -> Result<u64, ReadError> {
        self.read_uint(64, endianness)
    }

    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        self.read_u8().map(|v| v as i8)
    }

    pub fn read_i16(&mut self, endianness: Endianness) -> Result<i16, ReadError> {
        self.read_u16(endianness).map(|v| v as i16)
    }

    pub fn read_i32(&mut self, endianness: Endianness) -> Result<i32, ReadError> {
        self.read_u32(endianness).map(|v| v as i32)
    }

    pub fn read_i64(&mut self, endianness: Endianness) -> Result<i64, ReadError> {
        self.read_u64(endianness).map(|v| v as i64)
    }

    pub fn peek_u8(&mut self) -> Result<u8, ReadError> {
        let pos = self.bit_pos;
        let v = self.read_u8()?;
        self.bit_pos = pos;
        Ok(v)
    }

    pub fn peek_u16(&mut self, endianness: Endianness) -> Result<u16, ReadError> {
        let pos = self.bit_pos;
        let v = self.read_u16(endianness)?;
        self.bit_pos = pos;
        Ok(v)
    }

    pub fn peek_u32(&mut self, endianness: Endianness) -> Result<u32, ReadError> {
        let pos = self.bit_pos;
        let v = self.read_u32(endianness)?;
        self.bit_pos = pos;
        Ok(v)
    }

    pub fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>, ReadError> {
        self.require_byte_aligned()?;
        let mut buf = vec![0u8; n as usize];
        self.source.read_at(self.bit_pos / 8, &mut buf)?;
        self.bit_pos += n * 8;
        Ok(buf)
    }

    pub fn read_varlen(&mut self, encoding: VarlenEncoding) -> Result<u64, ReadError> {
        self.require_byte_aligned()?;
        let offset = self.bit_pos / 8;
        // Variable-length encodings are at most 9 bytes for any of the four
        // supported schemes; read a generous window and let the decoder stop
        // at its own terminator.
        let remaining_bits = self.len()?.saturating_mul(8).saturating_sub(self.bit_pos);
        let probe_bits = remaining_bits.min(9 * 8) as u32;
        let window = self.window(self.bit_pos, probe_bits)?;
        let (value, consumed) = varint::read_varlen(&window, 0, encoding)
            .map_err(|_| ReadError::VarintTruncated { offset })?;
        self.bit_pos += consumed as u64 * 8;
        Ok(value)
    }

    pub fn seek(&mut self, absolute_byte: u64) -> Result<(), ReadError> {
        let len = self.len()?;
        if absolute_byte > len {
            return Err(ReadError::SeekOutOfBounds {
                position: absolute_byte,
                len,
            });
        }
        self.bit_pos = absolute_byte * 8;
        Ok(())
    }

    pub fn skip_bits(&mut self, n: u64) {
        self.bit_pos += n;
    }

    pub fn align_to_byte(&mut self) {
        let rem = self.bit_pos % 8;
        if rem != 0 {
            self.bit_pos += 8 - rem;
        }
    }

    pub fn check_alignment(&self, alignment: u64) -> Result<(), ReadError> {
        let position = self.bit_pos / 8;
        if alignment == 0 || position % alignment != 0 {
            return Err(ReadError::Unaligned {
                position,
                alignment,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_u8_matches_spec_example() {
        let mut r = Reader::from_buffer(vec![0x42]);
        assert_eq!(r.read_u8().unwrap(), 0x42);
    }

    #[test]
    fn read_u64_big_endian_matches_spec_example() {
        let mut r = Reader::from_buffer(vec![0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);
        assert_eq!(r.read_u64(Endianness::Big).unwrap(), 0x1234_5678_9ABC_DEF0);
    }

    #[test]
    fn read_u64_little_endian() {
        let mut r = Reader::from_buffer(vec![0xF0, 0xDE, 0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(
            r.read_u64(Endianness::Little).unwrap(),
            0x1234_5678_9ABC_DEF0
        );
    }

    #[test]
    fn misaligned_multi_byte_read_is_fatal() {
        let mut r = Reader::from_buffer(vec![0xFF, 0xFF]);
        r.read_bits(1).unwrap();
        assert!(matches!(
            r.read_u8().unwrap_err(),
            ReadError::Misaligned { .. }
        ));
    }

    #[test]
    fn peek_does_not_advance_cursor() {
        let mut r = Reader::from_buffer(vec![0x42, 0x43]);
        assert_eq!(r.peek_u8().unwrap(), 0x42);
        assert_eq!(r.read_u8().unwrap(), 0x42);
        assert_eq!(r.read_u8().unwrap(), 0x43);
    }

    #[test]
    fn out_of_bounds_read_is_reported() {
        let mut r = Reader::from_buffer(vec![0x01]);
        assert!(matches!(
            r.read_u16(Endianness::Big).unwrap_err(),
            ReadError::OutOfBounds { .. }
        ));
    }

    #[test]
    fn alignment_check_rejects_misaligned_position() {
        let mut r = Reader::from_buffer(vec![0u8; 8]);
        r.seek(3).unwrap();
        assert!(matches!(
            r.check_alignment(4).unwrap_err(),
            ReadError::Unaligned {
                position: 3,
                alignment: 4
            }
        ));
        r.seek(4).unwrap();
        assert!(r.check_alignment(4).is_ok());
    }

    #[test]
    fn current_position_tracks_byte_and_bit_offset() {
        let mut r = Reader::from_buffer(vec![0xFF, 0xFF]);
        r.read_bits(3).unwrap();
        assert_eq!(r.current_position(), (0, 3));
    }
}
