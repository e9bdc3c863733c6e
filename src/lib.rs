/*!
Streaming bsdiff 4.x compatible patcher.

Applies a `BSDIFF40` delta patch to an old byte source and exposes the
reconstructed target as a pull-based byte stream, keeping memory bounded
regardless of input sizes: the three bzip2 payload segments of the patch are
decompressed incrementally, in lockstep with the patch loop, never
materialized up front.

Producing patches is out of scope; pair this crate with any bsdiff 4.x
compatible differ.
*/

pub mod bits;
pub mod bspatch;
pub mod container;
pub mod error;
pub mod stream;

mod format;

pub use bspatch::{Bspatch, PatchStream, CHUNK_SIZE};
pub use error::{Error, Result};
