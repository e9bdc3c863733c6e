#![forbid(unsafe_code)]
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Failure of a patch application.
///
/// Every variant is fatal to the current application: nothing is retried
/// internally and the stream cursors are not resumable after a fault.
/// Retrying means re-invoking the whole operation with fresh readers.
#[derive(Debug)]
pub enum Error {
    /// The patch data violates the bsdiff 4.x format.
    Corrupt(&'static str),

    /// A stream ended before a boundary the format declares.
    UnexpectedEof(&'static str),

    /// A supplied reader lacks a capability the patch requires, such as
    /// seeking backward in the old source. The patch itself may be fine.
    Unsupported(&'static str),

    /// An underlying reader failed.
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Corrupt(what) => write!(f, "corrupt patch: {}", what),
            Error::UnexpectedEof(what) => write!(f, "unexpected eof: {}", what),
            Error::Unsupported(what) => write!(f, "unsupported: {}", what),
            Error::Io(_) => write!(f, "i/o error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof("input ended early")
        } else {
            Error::Io(e)
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Corrupt(what) => io::Error::new(io::ErrorKind::InvalidData, what),
            Error::UnexpectedEof(what) => io::Error::new(io::ErrorKind::UnexpectedEof, what),
            Error::Unsupported(what) => io::Error::new(io::ErrorKind::Unsupported, what),
            Error::Io(e) => e,
        }
    }
}
