//! Lossless byte-stream compression codecs behind one uniform contract,
//! plus a checksummed container format.
//!
//! Codecs:
//! - Identity (reference oracle)
//! - Run-length encoding
//! - Huffman coding
//! - LZ77 sliding-window dictionary coding
//! - Burrows-Wheeler pipeline (BWT + MTF + RLE + Huffman)
//! - Adaptive arithmetic coding
//!
//! Every codec implements [`Codec`]: `encode` and `decode` over in-memory
//! byte buffers, returning [`Result`]. For any codec `c` and input `x`,
//! `c.decode(&c.encode(&x)?)? == x`.
//!
//! The container layer ([`format`]) wraps a payload with a magic number,
//! the algorithm id, the original length, and a CRC-32 of the original
//! bytes; [`format::unwrap`] re-derives both and fails loudly on mismatch.
//!
//! # Examples
//!
//! ```rust
//! use cpro::{format, Algorithm};
//!
//! let wrapped = format::wrap(Algorithm::Huffman, b"hello world")?;
//! assert_eq!(format::unwrap(&wrapped)?, b"hello world");
//! # Ok::<(), cpro::Error>(())
//! ```

pub mod adaptive;
pub mod arithmetic;
pub mod bitio;
pub mod bwt;
pub mod crc32;
pub mod deflate;
pub mod error;
pub mod format;
pub mod huffman;
pub mod lz77;
pub mod null;
pub mod rle;

pub use adaptive::AdaptiveCodec;
pub use bwt::{BwtCodec, BwtConfig};
pub use crc32::crc32;
pub use deflate::DeflateCodec;
pub use error::Error;
pub use format::{Algorithm, Header};
pub use huffman::HuffmanCodec;
pub use lz77::{Lz77Codec, Lz77Config, ParseMode};
pub use null::NullCodec;
pub use rle::RleCodec;

/// Result type for codec and container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Uniform codec contract: whole-buffer encode and decode.
///
/// Implementations are pure with respect to the codec object; a codec may
/// be shared across threads as long as it is not mutated after
/// construction. Per-call working state (hash tables, trees, models) is
/// allocated on entry and released on exit.
pub trait Codec {
    /// Compresses `data` into the codec's stream format.
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Recovers the exact original bytes from an encoded stream.
    fn decode(&self, data: &[u8]) -> Result<Vec<u8>>;
}
