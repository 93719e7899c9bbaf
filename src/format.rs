//! Container format: header layout, algorithm identifiers, and the
//! wrap/unwrap entry points.
//!
//! Every container starts with an 18-byte header: the magic `C P R O`, a
//! format version byte, the algorithm id byte, the original payload length
//! (`u64` little-endian), and the original payload's CRC-32 (`u32`
//! little-endian). Length and checksum always describe the *decoded*
//! payload, so unwrap can verify integrity after the codec runs.

use log::debug;

use crate::adaptive::AdaptiveCodec;
use crate::bwt::BwtCodec;
use crate::crc32::crc32;
use crate::deflate::DeflateCodec;
use crate::error::Error;
use crate::huffman::HuffmanCodec;
use crate::lz77::Lz77Codec;
use crate::null::NullCodec;
use crate::rle::RleCodec;
use crate::{Codec, Result};

/// Container magic bytes.
pub const MAGIC: [u8; 4] = *b"CPRO";
/// Current container format version.
pub const FORMAT_VERSION: u8 = 1;
/// Serialized header size in bytes.
pub const HEADER_SIZE: usize = 18;

/// Identifies the codec that produced a container payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Algorithm {
    Null = 0,
    Rle = 1,
    Huffman = 2,
    Lz77 = 3,
    Bwt = 4,
    /// LZ77 + Huffman composition slot; currently an alias for the
    /// optimized LZ77 byte stream.
    Deflate = 5,
    Arithmetic = 6,
}

impl Algorithm {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Algorithm::Null),
            1 => Some(Algorithm::Rle),
            2 => Some(Algorithm::Huffman),
            3 => Some(Algorithm::Lz77),
            4 => Some(Algorithm::Bwt),
            5 => Some(Algorithm::Deflate),
            6 => Some(Algorithm::Arithmetic),
            _ => None,
        }
    }

    /// Name used by command-line front-ends.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Null => "null",
            Algorithm::Rle => "rle",
            Algorithm::Huffman => "huffman",
            Algorithm::Lz77 => "lz77",
            Algorithm::Bwt => "bwt",
            Algorithm::Deflate => "deflate",
            Algorithm::Arithmetic => "arithmetic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Algorithm::Null),
            "rle" => Some(Algorithm::Rle),
            "huffman" => Some(Algorithm::Huffman),
            "lz77" => Some(Algorithm::Lz77),
            "bwt" => Some(Algorithm::Bwt),
            "deflate" => Some(Algorithm::Deflate),
            "arithmetic" => Some(Algorithm::Arithmetic),
            _ => None,
        }
    }
}

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub algorithm: Algorithm,
    /// Length of the decoded payload, not the compressed size.
    pub original_size: u64,
    /// CRC-32 of the decoded payload.
    pub original_checksum: u32,
}

impl Header {
    /// Builds a header describing `payload` before compression.
    pub fn describing(algorithm: Algorithm, payload: &[u8]) -> Self {
        Self {
            algorithm,
            original_size: payload.len() as u64,
            original_checksum: crc32(payload),
        }
    }

    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(&MAGIC);
        buf[4] = FORMAT_VERSION;
        buf[5] = self.algorithm.id();
        buf[6..14].copy_from_slice(&self.original_size.to_le_bytes());
        buf[14..18].copy_from_slice(&self.original_checksum.to_le_bytes());
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Truncated("container header"));
        }
        if data[..4] != MAGIC {
            return Err(Error::corrupted("bad container magic"));
        }
        if data[4] != FORMAT_VERSION {
            return Err(Error::corrupted(format!(
                "unsupported container version {}",
                data[4]
            )));
        }
        let algorithm = Algorithm::from_id(data[5])
            .ok_or_else(|| Error::corrupted(format!("unknown algorithm id {}", data[5])))?;
        let original_size = u64::from_le_bytes(data[6..14].try_into().expect("8 bytes"));
        let original_checksum = u32::from_le_bytes(data[14..18].try_into().expect("4 bytes"));
        Ok(Self {
            algorithm,
            original_size,
            original_checksum,
        })
    }
}

fn encode_with(algorithm: Algorithm, data: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        Algorithm::Null => NullCodec.encode(data),
        Algorithm::Rle => RleCodec.encode(data),
        Algorithm::Huffman => HuffmanCodec.encode(data),
        Algorithm::Lz77 => Lz77Codec::default().encode(data),
        Algorithm::Bwt => BwtCodec::default().encode(data),
        Algorithm::Deflate => DeflateCodec::default().encode(data),
        Algorithm::Arithmetic => unreachable!("arithmetic wrapper handled by the caller"),
    }
}

fn decode_with(algorithm: Algorithm, payload: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        Algorithm::Null => NullCodec.decode(payload),
        Algorithm::Rle => RleCodec.decode(payload),
        Algorithm::Huffman => HuffmanCodec.decode(payload),
        Algorithm::Lz77 => Lz77Codec::default().decode(payload),
        Algorithm::Bwt => BwtCodec::default().decode(payload),
        Algorithm::Deflate => DeflateCodec::default().decode(payload),
        Algorithm::Arithmetic => unreachable!("arithmetic wrapper handled by the caller"),
    }
}

/// Compresses `data` with the named algorithm and prepends the container
/// header.
///
/// The arithmetic wrapper emits its own header, so its output passes
/// through unchanged.
pub fn wrap(algorithm: Algorithm, data: &[u8]) -> Result<Vec<u8>> {
    debug!("wrap: {} bytes with {}", data.len(), algorithm.name());
    if algorithm == Algorithm::Arithmetic {
        return AdaptiveCodec::default().encode(data);
    }
    let header = Header::describing(algorithm, data);
    let payload = encode_with(algorithm, data)?;
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.serialize());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parses the container header, decodes the payload with the identified
/// algorithm, and verifies length and checksum.
pub fn unwrap(data: &[u8]) -> Result<Vec<u8>> {
    let header = Header::parse(data)?;
    debug!(
        "unwrap: {} container, {} expected bytes",
        header.algorithm.name(),
        header.original_size
    );
    if header.algorithm == Algorithm::Arithmetic {
        // The wrapper verifies length and checksum itself.
        return AdaptiveCodec::default().decode(data);
    }

    let decoded = decode_with(header.algorithm, &data[HEADER_SIZE..])?;
    if decoded.len() as u64 != header.original_size {
        return Err(Error::LengthMismatch {
            expected: header.original_size,
            actual: decoded.len() as u64,
        });
    }
    let actual = crc32(&decoded);
    if actual != header.original_checksum {
        return Err(Error::ChecksumMismatch {
            expected: header.original_checksum,
            actual,
        });
    }
    Ok(decoded)
}
