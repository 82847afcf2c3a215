//! Compression and decompression for materialized chapters.
//!
//! This crate wraps the deflate family (raw zlib and gzip framing) and bzip2
//! behind a unified [`Compression`] enum, providing:
//!
//! - **Format detection** from file extensions ([`Compression::from_path`]) or
//!   magic bytes ([`Compression::from_magic_bytes`])
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Verified** compression that round-trips before handing bytes back
//!   ([`Compression::compress_verified`])
//!
//! Every chapter file is an independent stream, so a corrupt chapter never
//! affects its neighbours.

mod construct;
pub mod error;
mod ops;
mod util;

/// A supported compression format.
///
/// Defaults to [`Gzip`](Self::Gzip), the deflate-style stream chapter files
/// are written with unless configured otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    None,
    /// Zlib-framed deflate stream (.zz)
    Deflate,
    /// Gzip compression (.gz)
    #[default]
    Gzip,
    /// Bzip2 compression (.bz2)
    Bzip2,
}

impl Compression {
    /// Every format, in the order readers should try them.
    pub const ALL: [Compression; 4] = [Compression::Gzip, Compression::Deflate, Compression::Bzip2, Compression::None];
}
