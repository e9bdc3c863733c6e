#![forbid(unsafe_code)]
use super::container::ContainerStream;
use super::error::{Error, Result};
use super::format::{self, Control, Header};
use super::stream::{ChunkSource, IoSource, Pull, PullStream, ReadInto};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Default size of the bounded work chunks.
pub const CHUNK_SIZE: usize = 4096;

/// Streaming patcher compatible with bspatch, reconstructing the target as
/// a pull-based byte stream through bounded memory.
///
/// Apply a patch and collect the target:
/// ```
/// use std::io::{self, Cursor, Read};
/// use bspatch_stream::Bspatch;
///
/// fn bspatch(source: &[u8], patch: &[u8]) -> io::Result<Vec<u8>> {
///     let mut target = Vec::new();
///     Bspatch::new(Cursor::new(patch.to_vec()))?
///         .apply(Cursor::new(source.to_vec()))?
///         .read_to_end(&mut target)?;
///     Ok(target)
/// }
/// ```
///
/// Drive the target stream chunk by chunk instead, preallocating from the
/// declared size:
/// ```
/// use std::io::{self, Cursor};
/// use bspatch_stream::Bspatch;
///
/// fn bspatch(source: &[u8], patch: &[u8]) -> io::Result<Vec<u8>> {
///     let patcher = Bspatch::new(Cursor::new(patch.to_vec()))?;
///     let mut target = Vec::with_capacity(patcher.hint_target_size() as usize);
///     let mut stream = patcher.apply(Cursor::new(source.to_vec()))?;
///     while let Some(chunk) = stream.pull_chunk()? {
///         target.extend_from_slice(&chunk);
///     }
///     Ok(target)
/// }
/// ```
pub struct Bspatch<P> {
    patch: P,
    header: Header,
    chunk_size: usize,
}

impl<P: Read> Bspatch<P> {
    /// Read and validate the patch header, creating a patcher configuration.
    ///
    /// A patch with bad magic bytes or a negative declared size is rejected
    /// here, before any output exists.
    pub fn new(mut patch: P) -> Result<Self> {
        let mut raw = [0; format::HEADER_LEN];
        patch
            .read_exact(&mut raw)
            .map_err(|e| eof_as(e, "patch header"))?;
        Ok(Bspatch {
            patch,
            header: format::parse_header(&raw)?,
            chunk_size: CHUNK_SIZE,
        })
    }

    /// Set the bounded work chunk size (`cs >= 1`, default is `CHUNK_SIZE`).
    ///
    /// Purely a memory/throughput knob; the produced bytes are identical for
    /// any chunk size.
    pub fn chunk_size(mut self, cs: usize) -> Self {
        self.chunk_size = Ord::max(cs, 1);
        self
    }

    /// Hint the final target size, as declared in the patch header.
    pub fn hint_target_size(&self) -> u64 {
        self.header.new_size
    }

    /// Set up the decompression pipelines and return the target stream.
    ///
    /// The old source must be randomly accessible (`Read + Seek`): bsdiff
    /// control records seek backward as well as forward, so a strictly
    /// forward-only reader cannot host a patch application. In-memory
    /// buffers wrapped in [`Cursor`] and files both qualify.
    ///
    /// The compressed control and diff segments have their exact extents
    /// declared up front and are buffered out of the patch stream here; the
    /// extra segment streams from the live remainder.
    pub fn apply<O: Read + Seek>(mut self, old: O) -> Result<PatchStream<O, P>> {
        let ctrl = read_segment(&mut self.patch, self.header.ctrl_len, "control segment")?;
        let diff = read_segment(&mut self.patch, self.header.diff_len, "diff segment")?;
        let new_size = self.header.new_size;
        let engine = Engine {
            old,
            ctrl: PullStream::new(ContainerStream::bzip2(IoSource::new(Cursor::new(ctrl)))),
            diff: PullStream::new(ContainerStream::bzip2(IoSource::new(Cursor::new(diff)))),
            extra: PullStream::new(ContainerStream::bzip2(IoSource::new(self.patch))),
            phase: Phase::Control,
            new_size,
            newpos: 0,
            chunk_size: self.chunk_size,
            scratch: vec![0; self.chunk_size],
        };
        Ok(PatchStream {
            stream: PullStream::new(engine),
            target_size: new_size,
        })
    }
}

/// Copy one declared-extent compressed segment out of the patch stream.
fn read_segment<P: Read>(patch: &mut P, len: u64, what: &'static str) -> Result<Vec<u8>> {
    let mut seg = Vec::new();
    patch.take(len).read_to_end(&mut seg).map_err(Error::Io)?;
    if (seg.len() as u64) < len {
        return Err(Error::UnexpectedEof(what));
    }
    Ok(seg)
}

fn eof_as(e: std::io::Error, what: &'static str) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof(what)
    } else {
        Error::Io(e)
    }
}

/// The reconstructed target, as a pull-based stream.
///
/// Supports both pull styles (caller-supplied buffers via [`pull`], owned
/// chunks via [`pull_chunk`]) as well as [`std::io::Read`], and itself
/// satisfies the same stream contracts the patcher consumes, so one patch
/// result can be collected and serve as the old source of the next.
///
/// Bytes appear in strictly increasing target order, one bounded chunk at a
/// time; no upstream read runs ahead of demand, and a consumer that stops
/// pulling stops all upstream work.
///
/// [`pull`]: PatchStream::pull
/// [`pull_chunk`]: PatchStream::pull_chunk
pub struct PatchStream<O, P> {
    stream: PullStream<Engine<O, P>>,
    target_size: u64,
}

impl<O: Read + Seek, P: Read> PatchStream<O, P> {
    /// Fill up to `dest.len()` bytes of reconstructed target.
    pub fn pull(&mut self, dest: &mut [u8]) -> Result<Pull> {
        self.stream.pull(dest)
    }

    /// Hand over the next reconstructed chunk, `Ok(None)` at completion.
    pub fn pull_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.stream.pull_chunk()
    }

    /// The target size declared in the patch header, reached exactly when
    /// the stream completes.
    pub fn target_size(&self) -> u64 {
        self.target_size
    }
}

impl<O: Read + Seek, P: Read> ReadInto for PatchStream<O, P> {
    fn read_into(&mut self, dest: &mut [u8]) -> Result<Pull> {
        self.stream.pull(dest)
    }
}

impl<O: Read + Seek, P: Read> ChunkSource for PatchStream<O, P> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.stream.pull_chunk()
    }
}

impl<O: Read + Seek, P: Read> Read for PatchStream<O, P> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let pull = self.stream.pull(buf).map_err(std::io::Error::from)?;
        Ok(pull.bytes)
    }
}

type SubStream<R> = PullStream<ContainerStream<IoSource<R>>>;

/// Patch application state machine. Each `next_chunk` call advances the
/// machine until one bounded chunk of target bytes exists (add and copy
/// phases) or the patch completes; control parsing and seeks emit nothing
/// and are stepped through in place.
struct Engine<O, P> {
    old: O,
    ctrl: SubStream<Cursor<Vec<u8>>>,
    diff: SubStream<Cursor<Vec<u8>>>,
    extra: SubStream<P>,

    phase: Phase,
    new_size: u64,
    newpos: u64,

    chunk_size: usize,
    scratch: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Next control record is due, or the target is complete.
    Control,
    /// Emitting `left` summed old+diff bytes; `copy` and `seek` follow.
    Add { left: u64, copy: u64, seek: i64 },
    /// Emitting `left` extra bytes verbatim; `seek` follows.
    Copy { left: u64, seek: i64 },
    /// Moving the old cursor without emitting.
    Seek { offset: i64 },
    Done,
}

impl<O: Read + Seek, P: Read> Engine<O, P> {
    fn read_control(&mut self) -> Result<Control> {
        let mut raw = [0; format::CONTROL_LEN];
        fill(&mut self.ctrl, &mut raw, "control stream")?;
        Ok(format::parse_control(&raw))
    }

    /// Bytes still missing from the target.
    fn remaining(&self) -> u64 {
        self.new_size - self.newpos
    }

    fn step_add(&mut self, left: u64) -> Result<Vec<u8>> {
        let k = Ord::min(left, self.chunk_size as u64) as usize;
        let mut out = vec![0; k];
        self.old
            .read_exact(&mut out)
            .map_err(|e| eof_as(e, "old source"))?;
        fill(&mut self.diff, &mut self.scratch[..k], "diff stream")?;
        for (o, d) in out.iter_mut().zip(self.scratch[..k].iter()) {
            *o = o.wrapping_add(*d);
        }
        self.newpos += k as u64;
        Ok(out)
    }

    fn step_copy(&mut self, left: u64) -> Result<Vec<u8>> {
        let k = Ord::min(left, self.chunk_size as u64) as usize;
        let mut out = vec![0; k];
        fill(&mut self.extra, &mut out, "extra stream")?;
        self.newpos += k as u64;
        Ok(out)
    }

    fn seek_old(&mut self, offset: i64) -> Result<()> {
        if offset == 0 {
            return Ok(());
        }
        self.old
            .seek(SeekFrom::Current(offset))
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidInput => {
                    Error::Unsupported("old source rejected the seek")
                }
                _ => Error::Io(e),
            })?;
        Ok(())
    }
}

impl<O: Read + Seek, P: Read> ChunkSource for Engine<O, P> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.phase {
                Phase::Control => {
                    if self.newpos == self.new_size {
                        self.phase = Phase::Done;
                        return Ok(None);
                    }
                    let ctl = self.read_control()?;
                    if ctl.add < 0 || ctl.copy < 0 {
                        return Err(Error::Corrupt("negative length in control record"));
                    }
                    self.phase = Phase::Add {
                        left: ctl.add as u64,
                        copy: ctl.copy as u64,
                        seek: ctl.seek,
                    };
                }
                Phase::Add { left: 0, copy, seek } => {
                    if copy > self.remaining() {
                        return Err(Error::Corrupt("copy overruns declared target size"));
                    }
                    self.phase = Phase::Copy { left: copy, seek };
                }
                Phase::Add { left, copy, seek } => {
                    if left > self.remaining() {
                        return Err(Error::Corrupt("add overruns declared target size"));
                    }
                    let out = self.step_add(left)?;
                    self.phase = Phase::Add {
                        left: left - out.len() as u64,
                        copy,
                        seek,
                    };
                    return Ok(Some(out));
                }
                Phase::Copy { left: 0, seek } => {
                    self.phase = Phase::Seek { offset: seek };
                }
                Phase::Copy { left, seek } => {
                    let out = self.step_copy(left)?;
                    self.phase = Phase::Copy {
                        left: left - out.len() as u64,
                        seek,
                    };
                    return Ok(Some(out));
                }
                Phase::Seek { offset } => {
                    self.seek_old(offset)?;
                    self.phase = Phase::Control;
                }
                Phase::Done => return Ok(None),
            }
        }
    }
}

/// Fill `dest` from a sub-stream, naming the stream on early end.
fn fill<R: ReadInto>(src: &mut R, dest: &mut [u8], what: &'static str) -> Result<()> {
    match src.read_full(dest) {
        Err(Error::UnexpectedEof(_)) => Err(Error::UnexpectedEof(what)),
        other => other,
    }
}
