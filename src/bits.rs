#![forbid(unsafe_code)]
//! Bit-granular reads over a byte stream.

use super::error::Result;
use super::stream::ReadInto;

/// Serves arbitrary-width bit reads, most significant bit first within each
/// byte, on top of any [`ReadInto`] source.
///
/// At most one source byte is buffered, and upstream is asked for exactly one
/// byte at a time, so byte-aligned `read_bits(8)` sequences are plain byte
/// reads and bit-level consumers can interleave with them on the same reader
/// without desynchronizing.
pub struct BitReader<R> {
    src: R,
    byte: u8,
    avail: u32,
}

impl<R: ReadInto> BitReader<R> {
    pub fn new(src: R) -> Self {
        BitReader { src, byte: 0, avail: 0 }
    }

    /// Read `n` bits (`1 ..= 32`), returning `Ok(None)` if the source runs
    /// out before all of them arrive. End of input is a cooperative sentinel
    /// here, not an error; the caller decides whether it was expected.
    pub fn read_bits(&mut self, n: u32) -> Result<Option<u32>> {
        debug_assert!((1..=32).contains(&n));
        let mut acc: u64 = 0;
        let mut got = 0;
        while got < n {
            if self.avail == 0 {
                match self.next_byte()? {
                    Some(b) => {
                        self.byte = b;
                        self.avail = 8;
                    }
                    None => return Ok(None),
                }
            }
            let take = Ord::min(self.avail, n - got);
            let shift = self.avail - take;
            let bits = (self.byte >> shift) as u64 & ((1 << take) - 1);
            acc = (acc << take) | bits;
            self.avail -= take;
            got += take;
        }
        Ok(Some(acc as u32))
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        loop {
            let pull = self.src.read_into(&mut b)?;
            if pull.bytes == 1 {
                return Ok(Some(b[0]));
            }
            if pull.done {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::IoSource;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> BitReader<IoSource<Cursor<Vec<u8>>>> {
        BitReader::new(IoSource::new(Cursor::new(bytes.to_vec())))
    }

    #[test]
    fn msb_first_within_a_byte() {
        let mut r = reader(&[0b1011_0001]);
        assert_eq!(r.read_bits(1).unwrap(), Some(1));
        assert_eq!(r.read_bits(3).unwrap(), Some(0b011));
        assert_eq!(r.read_bits(4).unwrap(), Some(0b0001));
        assert_eq!(r.read_bits(1).unwrap(), None);
    }

    #[test]
    fn reads_span_byte_boundaries() {
        let mut r = reader(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(r.read_bits(12).unwrap(), Some(0xdea));
        assert_eq!(r.read_bits(12).unwrap(), Some(0xdbe));
        assert_eq!(r.read_bits(8).unwrap(), Some(0xef));
    }

    #[test]
    fn full_width_read() {
        let mut r = reader(&[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(r.read_bits(32).unwrap(), Some(0x12345678));
    }

    #[test]
    fn aligned_byte_reads_interleave_with_bit_reads() {
        let mut r = reader(&[0xff, 0x42, 0x00]);
        assert_eq!(r.read_bits(8).unwrap(), Some(0xff));
        assert_eq!(r.read_bits(8).unwrap(), Some(0x42));
        assert_eq!(r.read_bits(4).unwrap(), Some(0));
        assert_eq!(r.read_bits(4).unwrap(), Some(0));
    }

    #[test]
    fn exhaustion_mid_read_is_a_sentinel() {
        let mut r = reader(&[0xab]);
        assert_eq!(r.read_bits(4).unwrap(), Some(0xa));
        assert_eq!(r.read_bits(8).unwrap(), None);
    }
}
