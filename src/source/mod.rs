//! Layer A's byte source: a forward-only window over the document plus an
//! encoding-agreement check (SPEC_FULL.md §4.1).
//!
//! Grounded on the three-way split in `reader/slice_reader.rs` /
//! `reader/buffered_reader.rs` / `reader/io_reader.rs`: one `Reader<S>` API,
//! several byte-source strategies behind it.

mod slice;
mod stream;

pub use slice::SliceSource;
pub use stream::ReaderSource;

use crate::error::Result;

/// A forward-only byte window over an XML document.
///
/// `fill` advances the window's base by `advance` bytes and returns up to
/// `want_len` bytes starting at the new base. A window shorter than
/// `want_len` means end of document; it never means "try again" — the
/// caller must not call `fill` with a larger `want_len` expecting different
/// results once a short window has been returned twice running with the
/// same `advance == 0`.
pub trait Source {
    fn fill(&mut self, advance: usize, want_len: usize) -> Result<&[u8]>;

    /// Case-insensitive check that an XML-declared encoding name matches
    /// what this source is actually delivering (SPEC_FULL §4.1).
    fn check_encoding(&self, name: &[u8]) -> bool;
}
