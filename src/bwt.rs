//! Block-sorting codec: BWT + Move-To-Front + RLE + Huffman.
//!
//! Each block is transformed with the Burrows-Wheeler transform (suffix
//! array over rotations), rank-coded with Move-To-Front, filtered with a
//! short run-length escape, and entropy-coded with the Huffman back-end.
//!
//! Stream envelope: the signature `B W T`, a version byte, and a flags byte
//! (bit 0 = RLE stage enabled, bit 1 = raw tiny-input block), followed by
//! one record per block: big-endian `u32` body length, big-endian `u32`
//! primary index, then the body bytes.

use log::trace;

use crate::error::Error;
use crate::huffman::HuffmanCodec;
use crate::{Codec, Result};

const SIGNATURE: [u8; 3] = *b"BWT";
const VERSION: u8 = 1;
const FLAG_RLE: u8 = 0b0000_0001;
/// Set when the whole input was stored as a single BWT-only block.
const FLAG_RAW: u8 = 0b0000_0010;

/// Below this many bytes, rotations are sorted by direct comparison.
const SMALL_SORT_CUTOFF: usize = 100;
/// Inputs shorter than this skip the MTF/RLE/entropy stages entirely.
const RAW_INPUT_LIMIT: usize = 10;
/// Inputs up to this size are processed as one block regardless of the
/// configured block size.
const SINGLE_BLOCK_LIMIT: usize = 100_000;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct BwtConfig {
    /// Block size for inputs above [`SINGLE_BLOCK_LIMIT`]; default 1 MiB.
    pub block_size: usize,
    /// Whether the internal RLE stage runs between MTF and entropy coding.
    pub rle_enabled: bool,
}

impl Default for BwtConfig {
    fn default() -> Self {
        Self {
            block_size: 1 << 20,
            rle_enabled: true,
        }
    }
}

/// Block-sorting codec with a Huffman entropy back-end.
#[derive(Debug, Clone)]
pub struct BwtCodec {
    config: BwtConfig,
    entropy: HuffmanCodec,
}

impl Default for BwtCodec {
    fn default() -> Self {
        Self::new(BwtConfig::default()).expect("default configuration is valid")
    }
}

impl BwtCodec {
    pub fn new(config: BwtConfig) -> Result<Self> {
        if config.block_size == 0 {
            return Err(Error::InvalidInput("block size cannot be zero".into()));
        }
        Ok(Self {
            config,
            entropy: HuffmanCodec,
        })
    }
}

/// Compares the rotations of `data` starting at `i` and `j`; equal
/// rotations order by start index so sorting stays deterministic.
fn compare_rotations(data: &[u8], i: usize, j: usize) -> std::cmp::Ordering {
    let n = data.len();
    for k in 0..n {
        let a = data[(i + k) % n];
        let b = data[(j + k) % n];
        if a != b {
            return a.cmp(&b);
        }
    }
    i.cmp(&j)
}

/// Builds the suffix array of all rotations of `data`.
///
/// Small inputs use a comparison sort. Larger inputs use prefix doubling:
/// in each round positions are ordered by the pair `(rank[i], rank[i+h])`
/// through two stable counting-sort passes, keyed on the second component
/// and then the first.
pub fn suffix_array(data: &[u8]) -> Vec<u32> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    if n < SMALL_SORT_CUTOFF {
        let mut sa: Vec<u32> = (0..n as u32).collect();
        sa.sort_by(|&a, &b| compare_rotations(data, a as usize, b as usize));
        return sa;
    }

    let mut rank: Vec<usize> = data.iter().map(|&b| b as usize).collect();
    let mut new_rank = vec![0usize; n];
    let mut sa: Vec<usize> = (0..n).collect();
    let mut by_second = vec![0usize; n];
    let buckets = n.max(256);
    let mut count = vec![0usize; buckets];

    let mut h = 1;
    while h < n {
        // Pass 1: stable counting sort of positions by rank[i + h].
        count[..buckets].fill(0);
        for i in 0..n {
            count[rank[(i + h) % n]] += 1;
        }
        let mut sum = 0;
        for c in count.iter_mut().take(buckets) {
            let start = sum;
            sum += *c;
            *c = start;
        }
        for i in 0..n {
            let key = rank[(i + h) % n];
            by_second[count[key]] = i;
            count[key] += 1;
        }

        // Pass 2: stable counting sort of that order by rank[i].
        count[..buckets].fill(0);
        for i in 0..n {
            count[rank[i]] += 1;
        }
        let mut sum = 0;
        for c in count.iter_mut().take(buckets) {
            let start = sum;
            sum += *c;
            *c = start;
        }
        for &p in &by_second {
            sa[count[rank[p]]] = p;
            count[rank[p]] += 1;
        }

        // Re-rank: positions with identical (first, second) pairs share a
        // rank.
        new_rank[sa[0]] = 0;
        for i in 1..n {
            let (a, b) = (sa[i - 1], sa[i]);
            let same = rank[a] == rank[b] && rank[(a + h) % n] == rank[(b + h) % n];
            new_rank[b] = new_rank[a] + usize::from(!same);
        }
        std::mem::swap(&mut rank, &mut new_rank);

        if rank[sa[n - 1]] == n - 1 {
            break;
        }
        h *= 2;
    }

    sa.into_iter().map(|i| i as u32).collect()
}

/// Forward BWT: returns the last column of the sorted rotation matrix and
/// the primary index (the row holding the original sequence).
pub fn bwt_encode(block: &[u8]) -> (Vec<u8>, u32) {
    if block.is_empty() {
        return (Vec::new(), 0);
    }
    let n = block.len();
    let sa = suffix_array(block);
    let mut last = Vec::with_capacity(n);
    let mut primary = 0;
    for (row, &start) in sa.iter().enumerate() {
        last.push(block[(start as usize + n - 1) % n]);
        if start == 0 {
            primary = row as u32;
        }
    }
    (last, primary)
}

/// Inverse BWT via the LF-mapping: linear time, iterative walk.
pub fn bwt_decode(last: &[u8], primary: u32) -> Result<Vec<u8>> {
    if last.is_empty() {
        return Ok(Vec::new());
    }
    let n = last.len();
    let primary = primary as usize;
    if primary >= n {
        return Err(Error::corrupted(format!(
            "primary index {primary} outside block of {n} bytes"
        )));
    }

    let mut counts = [0usize; 256];
    for &b in last {
        counts[b as usize] += 1;
    }
    let mut starts = [0usize; 256];
    let mut sum = 0;
    for (i, &c) in counts.iter().enumerate() {
        starts[i] = sum;
        sum += c;
    }

    let mut transform = vec![0usize; n];
    for (i, &b) in last.iter().enumerate() {
        transform[starts[b as usize]] = i;
        starts[b as usize] += 1;
    }

    let mut out = Vec::with_capacity(n);
    let mut next = transform[primary];
    for _ in 0..n {
        out.push(last[next]);
        next = transform[next];
    }
    Ok(out)
}

/// Move-To-Front transform: each byte is replaced by its rank in a
/// self-organizing alphabet list.
pub fn mtf_encode(data: &[u8]) -> Vec<u8> {
    let mut alphabet: Vec<u8> = (0..=255).collect();
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        let rank = alphabet
            .iter()
            .position(|&x| x == b)
            .expect("alphabet holds all byte values");
        out.push(rank as u8);
        if rank > 0 {
            alphabet.remove(rank);
            alphabet.insert(0, b);
        }
    }
    out
}

/// Inverse of [`mtf_encode`].
pub fn mtf_decode(data: &[u8]) -> Vec<u8> {
    let mut alphabet: Vec<u8> = (0..=255).collect();
    let mut out = Vec::with_capacity(data.len());
    for &rank in data {
        let b = alphabet[rank as usize];
        out.push(b);
        if rank > 0 {
            alphabet.remove(rank as usize);
            alphabet.insert(0, b);
        }
    }
    out
}

/// Pipeline-internal RLE.
///
/// Escape marker `(0, byte, k)`. For a nonzero byte the marker encodes runs
/// of 4..=259 (`k = run - 4`); shorter nonzero runs pass through bare. Zero
/// bytes are always routed through the marker with `k = run - 1` (runs of
/// 1..=256), so a bare zero never appears and decoding is unambiguous.
pub fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        let cap = if b == 0 { 256 } else { 259 };
        let mut run = 1;
        while i + run < data.len() && data[i + run] == b && run < cap {
            run += 1;
        }
        if b == 0 {
            out.push(0);
            out.push(0);
            out.push((run - 1) as u8);
        } else if run >= 4 {
            out.push(0);
            out.push(b);
            out.push((run - 4) as u8);
        } else {
            out.extend(std::iter::repeat(b).take(run));
        }
        i += run;
    }
    out
}

/// Inverse of [`rle_encode`].
pub fn rle_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        if data[i] == 0 {
            if i + 2 >= data.len() {
                return Err(Error::Truncated("rle escape marker"));
            }
            let b = data[i + 1];
            let k = data[i + 2] as usize;
            let run = if b == 0 { k + 1 } else { k + 4 };
            out.extend(std::iter::repeat(b).take(run));
            i += 3;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn push_u32_be(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn read_u32_be(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

impl BwtCodec {
    fn encode_block(&self, block: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let (last, primary) = bwt_encode(block);
        let ranks = mtf_encode(&last);
        let filtered = if self.config.rle_enabled {
            rle_encode(&ranks)
        } else {
            ranks
        };
        let body = self.entropy.encode(&filtered)?;
        trace!(
            "bwt block: {} bytes -> {} entropy-coded",
            block.len(),
            body.len()
        );
        push_u32_be(out, body.len() as u32);
        push_u32_be(out, primary);
        out.extend_from_slice(&body);
        Ok(())
    }

    fn decode_block(&self, body: &[u8], primary: u32, rle_on: bool) -> Result<Vec<u8>> {
        let filtered = self.entropy.decode(body)?;
        let ranks = if rle_on {
            rle_decode(&filtered)?
        } else {
            filtered
        };
        let last = mtf_decode(&ranks);
        bwt_decode(&last, primary)
    }
}

impl Codec for BwtCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let mut flags = if self.config.rle_enabled { FLAG_RLE } else { 0 };
        let raw = data.len() < RAW_INPUT_LIMIT;
        if raw {
            flags |= FLAG_RAW;
        }

        let mut out = Vec::with_capacity(data.len() / 2 + 16);
        out.extend_from_slice(&SIGNATURE);
        out.push(VERSION);
        out.push(flags);

        if raw {
            let (last, primary) = bwt_encode(data);
            push_u32_be(&mut out, last.len() as u32);
            push_u32_be(&mut out, primary);
            out.extend_from_slice(&last);
            return Ok(out);
        }

        if data.len() <= SINGLE_BLOCK_LIMIT {
            self.encode_block(data, &mut out)?;
        } else {
            for block in data.chunks(self.config.block_size) {
                self.encode_block(block, &mut out)?;
            }
        }
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() < 5 {
            return Err(Error::Truncated("bwt preamble"));
        }
        if data[..3] != SIGNATURE {
            return Err(Error::corrupted("bad bwt signature"));
        }
        if data[3] != VERSION {
            return Err(Error::corrupted(format!("unsupported bwt version {}", data[3])));
        }
        let flags = data[4];
        let rle_on = flags & FLAG_RLE != 0;
        let raw = flags & FLAG_RAW != 0;

        let mut out = Vec::new();
        let mut pos = 5;
        while pos < data.len() {
            if pos + 8 > data.len() {
                return Err(Error::Truncated("bwt block record"));
            }
            let body_len = read_u32_be(data, pos) as usize;
            let primary = read_u32_be(data, pos + 4);
            pos += 8;
            if pos + body_len > data.len() {
                return Err(Error::corrupted(format!(
                    "block length {body_len} exceeds remaining {} bytes",
                    data.len() - pos
                )));
            }
            let body = &data[pos..pos + body_len];
            pos += body_len;

            let block = if raw {
                bwt_decode(body, primary)?
            } else {
                self.decode_block(body, primary, rle_on)?
            };
            out.extend_from_slice(&block);
        }
        Ok(out)
    }
}
