#![forbid(unsafe_code)]
//! The bsdiff 4.x wire format: a 32-byte header followed by three
//! bzip2-compressed segments (control records, diff bytes, extra bytes).
//!
//! Integers on the wire are sign-magnitude, not two's complement: a
//! little-endian 63-bit magnitude with bit 7 of the last byte as the sign
//! flag.

use super::error::{Error, Result};
use byteorder::{ByteOrder, LE};

pub(crate) const MAGIC: &[u8; 8] = b"BSDIFF40";
pub(crate) const HEADER_LEN: usize = 32;
pub(crate) const CONTROL_LEN: usize = 24;

/// Fixed-layout patch file header.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    /// Compressed length of the control segment.
    pub ctrl_len: u64,
    /// Compressed length of the diff segment.
    pub diff_len: u64,
    /// Length of the reconstructed output.
    pub new_size: u64,
}

/// Single control instruction, decoded but not yet validated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Control {
    pub add: i64,
    pub copy: i64,
    pub seek: i64,
}

/// Decodes a sign-magnitude integer. The sign is applied after assembling
/// the unsigned magnitude, so ±0 both decode to 0.
pub(crate) fn decode_int(b: &[u8]) -> i64 {
    let negative = b[7] & 0x80 != 0;
    let mut m = [0; 8];
    m.copy_from_slice(&b[..8]);
    m[7] &= 0x7f;
    let magnitude = LE::read_u64(&m) as i64;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

pub(crate) fn parse_header(raw: &[u8; HEADER_LEN]) -> Result<Header> {
    if &raw[..8] != MAGIC {
        return Err(Error::Corrupt("bad magic, not a bsdiff 4.x patch"));
    }
    let ctrl_len = decode_int(&raw[8..16]);
    let diff_len = decode_int(&raw[16..24]);
    let new_size = decode_int(&raw[24..32]);
    if ctrl_len < 0 || diff_len < 0 || new_size < 0 {
        return Err(Error::Corrupt("negative size in header"));
    }
    Ok(Header {
        ctrl_len: ctrl_len as u64,
        diff_len: diff_len as u64,
        new_size: new_size as u64,
    })
}

/// Decodes one 24-byte control record. There is no per-record magic;
/// validation of the fields is the patch loop's concern.
pub(crate) fn parse_control(raw: &[u8; CONTROL_LEN]) -> Control {
    Control {
        add: decode_int(&raw[0..8]),
        copy: decode_int(&raw[8..16]),
        seek: decode_int(&raw[16..24]),
    }
}
