#![allow(unused)]

use bspatch_stream::{Bspatch, Result};
use byteorder::{ByteOrder, LE};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::{Cursor, Read, Write};

/// One control instruction of a patch under construction.
#[derive(Debug, Clone, Copy)]
pub struct Ctl {
    pub add: i64,
    pub copy: i64,
    pub seek: i64,
}

impl Ctl {
    pub fn new(add: i64, copy: i64, seek: i64) -> Self {
        Ctl { add, copy, seek }
    }
}

/// Encodes the wire integer format (sign-magnitude, little-endian).
pub fn encode_int(x: i64, b: &mut [u8]) {
    if x < 0 {
        LE::write_u64(b, x.wrapping_neg() as u64 | 0x8000000000000000);
    } else {
        LE::write_u64(b, x as u64);
    }
}

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut enc = BzEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Assemble a complete BSDIFF40 patch file from its decompressed parts.
pub fn build_patch(ctls: &[Ctl], diff: &[u8], extra: &[u8], new_size: i64) -> Vec<u8> {
    let mut ctrl = Vec::with_capacity(ctls.len() * 24);
    let mut buf = [0; 24];
    for ctl in ctls {
        encode_int(ctl.add, &mut buf[0..8]);
        encode_int(ctl.copy, &mut buf[8..16]);
        encode_int(ctl.seek, &mut buf[16..24]);
        ctrl.extend_from_slice(&buf);
    }

    let bz_ctrl = compress(&ctrl);
    let bz_diff = compress(diff);
    let bz_extra = compress(extra);

    let mut patch = Vec::with_capacity(32 + bz_ctrl.len() + bz_diff.len() + bz_extra.len());
    let mut header = [0; 32];
    header[0..8].copy_from_slice(b"BSDIFF40");
    encode_int(bz_ctrl.len() as i64, &mut header[8..16]);
    encode_int(bz_diff.len() as i64, &mut header[16..24]);
    encode_int(new_size, &mut header[24..32]);
    patch.extend_from_slice(&header);
    patch.extend_from_slice(&bz_ctrl);
    patch.extend_from_slice(&bz_diff);
    patch.extend_from_slice(&bz_extra);
    patch
}

/// Deterministic windowed differ, good enough to produce valid patches for
/// round-trip testing: each window adds against the old data while any
/// remains, and copies the rest from the extra stream.
pub fn naive_diff(old: &[u8], new: &[u8]) -> Vec<u8> {
    const WINDOW: usize = 97;

    let mut ctls = Vec::new();
    let mut diff = Vec::new();
    let mut extra = Vec::new();

    let mut oldpos = 0;
    let mut t = 0;
    while t < new.len() {
        let window = Ord::min(WINDOW, new.len() - t);
        let add = Ord::min(window, old.len() - oldpos);
        let copy = window - add;

        for i in 0..add {
            diff.push(new[t + i].wrapping_sub(old[oldpos + i]));
        }
        extra.extend_from_slice(&new[t + add..t + window]);

        ctls.push(Ctl::new(add as i64, copy as i64, 0));
        oldpos += add;
        t += window;
    }

    build_patch(&ctls, &diff, &extra, new.len() as i64)
}

/// Apply a patch with the default chunk size.
pub fn bspatch(source: &[u8], patch: &[u8]) -> Result<Vec<u8>> {
    bspatch_chunked(source, patch, bspatch_stream::CHUNK_SIZE)
}

/// Apply a patch, working in bounded chunks of `chunk_size` bytes.
pub fn bspatch_chunked(source: &[u8], patch: &[u8], chunk_size: usize) -> Result<Vec<u8>> {
    let patcher = Bspatch::new(Cursor::new(patch.to_vec()))?.chunk_size(chunk_size);
    let mut target = Vec::with_capacity(patcher.hint_target_size() as usize);
    let mut stream = patcher.apply(Cursor::new(source.to_vec()))?;
    while let Some(chunk) = stream.pull_chunk()? {
        target.extend_from_slice(&chunk);
    }
    Ok(target)
}
