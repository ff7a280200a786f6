//! Raw deflate/inflate, no zlib or gzip framing.
//!
//! This is the compression layer a historic archive generation used
//! directly on the tar stream (`comp.c`, backed by miniz's
//! `tdefl_compress_mem_to_heap`/`tinfl_decompress_mem_to_heap`). The current
//! container format's archive region is a plain, uncompressed tar stream;
//! see [`crate::package`]. Nothing in this crate's install/remove path
//! calls these functions, but a complete implementation keeps them as a
//! tested, independent module rather than dropping them.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::error::{PackdudeError, Result};

/// Compresses `data` with raw deflate at the default compression level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|_| PackdudeError::CorruptData("failed to compress data".into()))?;
    encoder
        .finish()
        .map_err(|_| PackdudeError::CorruptData("failed to compress data".into()))
}

/// Decompresses a raw deflate stream produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| PackdudeError::CorruptData("failed to decompress data".into()))?;
    Ok(out)
}
