#![forbid(unsafe_code)]
//! Pull-based byte stream plumbing.
//!
//! Everything here revolves around two capabilities. [`ChunkSource`] is a
//! producer that hands over whatever chunk it has next; [`ReadInto`] fills a
//! destination buffer the caller supplies. [`PullStream`] adapts the former
//! into a stream offering both styles at once, and [`IoSource`] bridges any
//! [`std::io::Read`] into the contract.

use super::error::{Error, Result};
use std::io;

/// Outcome of a single pull against a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pull {
    /// Bytes produced by this pull.
    pub bytes: usize,
    /// Whether the stream is exhausted. Once `true`, no later pull will
    /// produce bytes again.
    pub done: bool,
}

/// A producer of owned byte chunks, driven one chunk at a time.
///
/// `Ok(None)` signals completion; implementations are fused and keep
/// returning `Ok(None)` afterwards without doing further upstream work.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// A byte stream read into caller-supplied buffers.
pub trait ReadInto {
    /// Attempt to fill up to `dest.len()` bytes, reporting how many bytes
    /// were produced and whether the stream is exhausted. A short fill with
    /// `done: false` just means more pulls are needed, not end of stream.
    fn read_into(&mut self, dest: &mut [u8]) -> Result<Pull>;

    /// Fill `dest` completely, erroring if the stream ends first.
    fn read_full(&mut self, dest: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < dest.len() {
            let pull = self.read_into(&mut dest[filled..])?;
            filled += pull.bytes;
            if pull.bytes == 0 && pull.done {
                return Err(Error::UnexpectedEof("stream ended early"));
            }
        }
        Ok(())
    }
}

/// Adapts a [`ChunkSource`] into a pull-based stream usable in both styles:
/// caller-supplied destination buffers via [`PullStream::pull`], or handing
/// chunks over via [`PullStream::pull_chunk`]. The two may be interleaved
/// freely within the lifetime of one stream.
///
/// At most one chunk is held back at a time, with a cursor tracking how much
/// of it earlier destination-buffer pulls already consumed. A consumer that
/// stops pulling stops all upstream reads; nothing runs ahead of demand.
pub struct PullStream<S> {
    source: S,
    pending: Vec<u8>,
    offset: usize,
    done: bool,
}

impl<S: ChunkSource> PullStream<S> {
    pub fn new(source: S) -> Self {
        PullStream {
            source,
            pending: Vec::new(),
            offset: 0,
            done: false,
        }
    }

    /// Copy bytes into `dest`, requesting chunks from the source until the
    /// destination is full or the source completes. One request may thus
    /// drive several upstream pulls.
    pub fn pull(&mut self, dest: &mut [u8]) -> Result<Pull> {
        let mut filled = 0;
        while filled < dest.len() {
            let held = self.pending.len() - self.offset;
            if held > 0 {
                let n = Ord::min(held, dest.len() - filled);
                dest[filled..filled + n]
                    .copy_from_slice(&self.pending[self.offset..self.offset + n]);
                self.offset += n;
                filled += n;
                continue;
            }
            if self.done || !self.refill()? {
                break;
            }
        }
        Ok(Pull {
            bytes: filled,
            done: self.done && self.offset >= self.pending.len(),
        })
    }

    /// Hand over the next chunk without copying it, or `Ok(None)` once the
    /// source has completed. A prefix already consumed through [`pull`] is
    /// dropped from the handed-over chunk.
    ///
    /// [`pull`]: PullStream::pull
    pub fn pull_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.offset < self.pending.len() {
            let mut chunk = std::mem::take(&mut self.pending);
            if self.offset > 0 {
                chunk.drain(..self.offset);
                self.offset = 0;
            }
            return Ok(Some(chunk));
        }
        if self.done || !self.refill()? {
            return Ok(None);
        }
        self.offset = 0;
        Ok(Some(std::mem::take(&mut self.pending)))
    }

    /// Request the next non-empty chunk. Returns whether one was installed.
    fn refill(&mut self) -> Result<bool> {
        loop {
            match self.source.next_chunk()? {
                Some(chunk) if chunk.is_empty() => continue,
                Some(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                    return Ok(true);
                }
                None => {
                    self.pending = Vec::new();
                    self.offset = 0;
                    self.done = true;
                    return Ok(false);
                }
            }
        }
    }
}

impl<S: ChunkSource> ReadInto for PullStream<S> {
    fn read_into(&mut self, dest: &mut [u8]) -> Result<Pull> {
        self.pull(dest)
    }
}

impl<S: ChunkSource> ChunkSource for PullStream<S> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.pull_chunk()
    }
}

impl<S: ChunkSource> io::Read for PullStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pull = self.pull(buf).map_err(io::Error::from)?;
        Ok(pull.bytes)
    }
}

/// Views any [`std::io::Read`] as a [`ReadInto`] stream.
pub struct IoSource<R> {
    inner: R,
}

impl<R: io::Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        IoSource { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read> ReadInto for IoSource<R> {
    fn read_into(&mut self, dest: &mut [u8]) -> Result<Pull> {
        if dest.is_empty() {
            return Ok(Pull { bytes: 0, done: false });
        }
        loop {
            match self.inner.read(dest) {
                Ok(0) => return Ok(Pull { bytes: 0, done: true }),
                Ok(n) => return Ok(Pull { bytes: n, done: false }),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}
