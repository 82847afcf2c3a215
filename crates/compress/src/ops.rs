//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::Compression as FlateCompression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use std::io::{Read, Write};
use tracing::instrument;

// Chapters are small and written once; favour size over speed.
const BZIP2_LEVEL: BzCompression = BzCompression::best();
const FLATE_LEVEL: FlateCompression = FlateCompression::best();

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use fray_compress::Compression;
    ///
    /// let data = b"Hello, world!";
    /// let compressed = Compression::Gzip.compress(data).unwrap();
    /// assert_ne!(compressed, data);
    /// ```
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.compress_into(input, &mut output)?;
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use fray_compress::Compression;
    ///
    /// let original = b"Hello, world!";
    /// let compressed = Compression::Deflate.compress(original).unwrap();
    /// let decompressed = Compression::Deflate.decompress(&compressed).unwrap();
    /// assert_eq!(decompressed, original);
    /// ```
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decompress_into(input, &mut output)?;
        Ok(output)
    }

    /// Compress, then decompress the result and compare it with the input
    /// before handing the compressed bytes back.
    ///
    /// Returns [`InvalidData`](ErrorKind::InvalidData) if the round trip does
    /// not reproduce the input exactly.
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn compress_verified(&self, input: &[u8]) -> Result<Vec<u8>> {
        let compressed = self.compress(input)?;
        if self.decompress(&compressed)? != input {
            exn::bail!(ErrorKind::InvalidData);
        }
        Ok(compressed)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn compress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = match self {
            Compression::None => {
                output.extend_from_slice(input);
                input.len()
            },
            Compression::Deflate => {
                let mut encoder = ZlibEncoder::new(&mut *output, FLATE_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut *output, FLATE_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut *output, BZIP2_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
                output.len()
            },
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }

    #[instrument(skip(input, output), fields(
        format = %self,
        input_size = input.len(),
        output_size
    ))]
    pub fn decompress_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let size = match self {
            Compression::None => {
                output.extend_from_slice(input);
                input.len()
            },
            Compression::Deflate => ZlibDecoder::new(input).read_to_end(output).or_raise(|| ErrorKind::InvalidData)?,
            Compression::Gzip => GzDecoder::new(input).read_to_end(output).or_raise(|| ErrorKind::InvalidData)?,
            Compression::Bzip2 => BzDecoder::new(input).read_to_end(output).or_raise(|| ErrorKind::InvalidData)?,
        };
        tracing::Span::current().record("output_size", size);
        Ok(size)
    }
}
