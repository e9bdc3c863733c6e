#![forbid(unsafe_code)]
//! Compressed-container boundary.
//!
//! The entropy decoding itself is a collaborator capability, not something
//! implemented here: a [`ContainerDecoder`] consumes a [`BitReader`] and
//! yields decompressed chunks on demand. [`BzContainer`] is the production
//! implementation for the bzip2 containers bsdiff 4.x uses, delegating the
//! Huffman/MTF/BWT machinery to libbz2 through the `bzip2` crate.

use super::bits::BitReader;
use super::error::{Error, Result};
use super::stream::{ChunkSource, ReadInto};
use bzip2::{Decompress, Status};

/// Max decompressed bytes yielded per call, so one call never materializes
/// a whole 900 KiB bzip2 block.
const OUT_CHUNK: usize = 16384;

/// Compressed bytes pulled from the bit reader per refill round.
const FEED: usize = 512;

/// One compressed container, decoded incrementally through a bit reader.
pub trait ContainerDecoder {
    /// Consume the container's fixed stream header once, returning the
    /// stream size it declares.
    fn read_stream_size<R: ReadInto>(&mut self, bits: &mut BitReader<R>) -> Result<u64>;

    /// Yield the next decompressed chunk, or `Ok(None)` once the compressed
    /// stream is exhausted.
    fn decompress_next<R: ReadInto>(&mut self, bits: &mut BitReader<R>) -> Result<Option<Vec<u8>>>;
}

/// bzip2 container decoder backed by the `bzip2` crate's incremental
/// decompression state machine.
pub struct BzContainer {
    state: Decompress,
    /// Compressed bytes read from upstream but not yet consumed by libbz2.
    /// The stream header bytes are replayed through here as well.
    pending: Vec<u8>,
    eof: bool,
    finished: bool,
}

impl BzContainer {
    pub fn new() -> Self {
        BzContainer {
            state: Decompress::new(false),
            pending: Vec::new(),
            eof: false,
            finished: false,
        }
    }

    /// Pull up to `FEED` further compressed bytes, byte-aligned, from the
    /// bit reader. Sets `eof` when upstream reports exhaustion.
    fn refill<R: ReadInto>(&mut self, bits: &mut BitReader<R>) -> Result<()> {
        let target = self.pending.len() + FEED;
        while self.pending.len() < target && !self.eof {
            match bits.read_bits(8)? {
                Some(b) => self.pending.push(b as u8),
                None => self.eof = true,
            }
        }
        Ok(())
    }
}

impl Default for BzContainer {
    fn default() -> Self {
        BzContainer::new()
    }
}

impl ContainerDecoder for BzContainer {
    fn read_stream_size<R: ReadInto>(&mut self, bits: &mut BitReader<R>) -> Result<u64> {
        let mut hdr = [0u8; 4];
        for b in hdr.iter_mut() {
            match bits.read_bits(8)? {
                Some(v) => *b = v as u8,
                None => return Err(Error::UnexpectedEof("bzip2 stream header")),
            }
        }
        if &hdr[..3] != b"BZh" || !hdr[3].is_ascii_digit() || hdr[3] == b'0' {
            return Err(Error::Corrupt("bad bzip2 stream header"));
        }
        self.pending.extend_from_slice(&hdr);
        Ok(u64::from(hdr[3] - b'0') * 100_000)
    }

    fn decompress_next<R: ReadInto>(&mut self, bits: &mut BitReader<R>) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if !self.eof {
                self.refill(bits)?;
            }

            let mut out = Vec::with_capacity(OUT_CHUNK);
            let before = self.state.total_in();
            let status = self
                .state
                .decompress_vec(&self.pending, &mut out)
                .map_err(|_| Error::Corrupt("bad bzip2 data"))?;
            let used = (self.state.total_in() - before) as usize;
            self.pending.drain(..used);

            if let Status::StreamEnd = status {
                self.finished = true;
                if out.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(out));
            }
            if !out.is_empty() {
                return Ok(Some(out));
            }
            if self.eof && used == 0 {
                return Err(Error::UnexpectedEof("bzip2 stream truncated"));
            }
        }
    }
}

/// A decompression pipeline stage: bit reader plus container decoder,
/// exposed as a [`ChunkSource`] of decompressed bytes.
///
/// The stream-size header is consumed on first use. After the decoder
/// signals end of stream, a 32-bit trailing checksum field is read and
/// discarded (exhaustion there is tolerated, since the decoder may already
/// have drained it) before the stage reports completion.
pub struct ContainerStream<R, D = BzContainer> {
    bits: BitReader<R>,
    decoder: D,
    size: Option<u64>,
    drained: bool,
}

impl<R: ReadInto, D: ContainerDecoder> ContainerStream<R, D> {
    pub fn new(src: R, decoder: D) -> Self {
        ContainerStream {
            bits: BitReader::new(src),
            decoder,
            size: None,
            drained: false,
        }
    }

    /// The size declared by the container's stream header, once read.
    pub fn stream_size(&self) -> Option<u64> {
        self.size
    }
}

impl<R: ReadInto> ContainerStream<R> {
    pub fn bzip2(src: R) -> Self {
        ContainerStream::new(src, BzContainer::new())
    }
}

impl<R: ReadInto, D: ContainerDecoder> ChunkSource for ContainerStream<R, D> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.drained {
            return Ok(None);
        }
        if self.size.is_none() {
            self.size = Some(self.decoder.read_stream_size(&mut self.bits)?);
        }
        match self.decoder.decompress_next(&mut self.bits)? {
            Some(chunk) => Ok(Some(chunk)),
            None => {
                let _ = self.bits.read_bits(32)?;
                self.drained = true;
                Ok(None)
            }
        }
    }
}
