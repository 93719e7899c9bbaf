//! Deflate-style composition slot.
//!
//! The container reserves an algorithm id for an LZ77 + Huffman two-stage
//! codec. The byte-oriented LZ77 stream already folds its entropy savings
//! into compact record tags, so this codec currently aliases the tuned LZ77
//! stream; the id round-trips unambiguously either way.

use crate::lz77::{Lz77Codec, Lz77Config};
use crate::{Codec, Result};

/// LZ77-backed codec registered under the `deflate` identifier.
#[derive(Debug, Clone)]
pub struct DeflateCodec {
    inner: Lz77Codec,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            inner: Lz77Codec::new(Lz77Config::default()).expect("default configuration is valid"),
        }
    }
}

impl Codec for DeflateCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner.encode(data)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner.decode(data)
    }
}
