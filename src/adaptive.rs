//! Self-describing arithmetic wrapper codec.
//!
//! Output layout: container header (algorithm id 6), one sub-format tag
//! byte, then a tag-specific body. The encoder inspects the input and picks
//! the cheapest representation; the decoder dispatches on the tag and then
//! verifies length and checksum against the header. All multi-byte fields
//! are little-endian.
//!
//! | tag | meaning                | body                                     |
//! |-----|------------------------|------------------------------------------|
//! | 0   | store as-is            | `len:u64`, `len` bytes                   |
//! | 1   | constant input         | `len:u64`, 1 byte                        |
//! | 2   | stored-sample text     | `len:u64`, sample bytes                  |
//! | 3   | arithmetic-coded       | `len:u64`, freq table, coded bits        |
//! | 4   | block code for binary  | `len:u64`, block count, per-block records|
//! | 5   | enhanced RLE           | `len:u64`, escape-coded records          |
//!
//! Tag 2 stores the whole input as its sample, so the repeat-until-length
//! reconstruction is exact and every stream round-trips losslessly.

use std::collections::BTreeMap;

use log::debug;

use crate::arithmetic::{self, ProbabilityModel};
use crate::crc32::crc32;
use crate::error::Error;
use crate::format::{Algorithm, Header, HEADER_SIZE};
use crate::{Codec, Result};

const TAG_STORE: u8 = 0;
const TAG_CONSTANT: u8 = 1;
const TAG_TEXT_SAMPLE: u8 = 2;
const TAG_ARITHMETIC: u8 = 3;
const TAG_BINARY_BLOCKS: u8 = 4;
const TAG_ENHANCED_RLE: u8 = 5;

// Enhanced-RLE stream markers; literal 253..=255 bytes are escaped.
const MARK_ESCAPE: u8 = 255;
const MARK_LONG_RUN: u8 = 254;
const MARK_SHORT_RUN: u8 = 253;

/// Block granularity of the tag-4 binary code.
const BINARY_BLOCK_SIZE: usize = 16 * 1024;
/// Inputs below this are stored rather than modeled.
const SMALL_INPUT_LIMIT: usize = 100;

// Per-block record kinds inside tag 4.
const BLOCK_STORED: u8 = 0;
const BLOCK_ARITHMETIC: u8 = 1;
const BLOCK_REPEATED: u8 = 2;
const BLOCK_ZERO_RUNS: u8 = 3;

/// Forward-only little-endian reader over a byte slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn u8(&mut self, what: &'static str) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::Truncated(what));
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn u16le(&mut self, what: &'static str) -> Result<u16> {
        let bytes = self.bytes(2, what)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u64le(&mut self, what: &'static str) -> Result<u64> {
        let bytes = self.bytes(8, what)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    fn bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(Error::Truncated(what));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

fn push_u64le(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn all_bytes_same(data: &[u8]) -> bool {
    data.windows(2).all(|w| w[0] == w[1])
}

/// Any run of at least 100 identical bytes.
fn has_long_identical_run(data: &[u8]) -> bool {
    let mut run = 1;
    for w in data.windows(2) {
        if w[0] == w[1] {
            run += 1;
            if run >= 100 {
                return true;
            }
        } else {
            run = 1;
        }
    }
    false
}

fn zero_ff_heavy(data: &[u8]) -> bool {
    let hits = data.iter().filter(|&&b| b == 0x00 || b == 0xFF).count();
    hits * 10 > data.len() * 6
}

/// Known binary container signatures: JPEG, PNG, GIF, PE, ELF, ZIP.
fn has_magic_prefix(data: &[u8]) -> bool {
    const PREFIXES: [&[u8]; 6] = [
        &[0xFF, 0xD8],
        &[0x89, b'P', b'N', b'G'],
        b"GIF",
        &[0x4D, 0x5A],
        &[0x7F, b'E', b'L', b'F'],
        b"PK",
    ];
    PREFIXES.iter().any(|p| data.starts_with(p))
}

/// Mostly-ASCII input with a small sampled alphabet.
fn is_large_text(data: &[u8]) -> bool {
    if data.len() < 1000 {
        return false;
    }
    let mut seen = [false; 256];
    let mut unique = 0;
    for &b in data.iter().step_by(10) {
        if !seen[b as usize] {
            seen[b as usize] = true;
            unique += 1;
            if unique > 100 {
                return false;
            }
        }
    }
    unique < 80
}

/// Statistical binary-data detector: signature prefixes, heavy zero/high
/// byte populations, low text ratio, long zero runs, or high sampled
/// entropy.
fn is_binary(data: &[u8]) -> bool {
    if data.len() < 500 {
        return false;
    }
    if has_magic_prefix(data) {
        return true;
    }

    let step = (data.len() / 1000).max(1);
    let mut histogram = [0u32; 256];
    let mut samples = 0u32;
    let mut zeros = 0u32;
    let mut text = 0u32;
    let mut high = 0u32;
    for &b in data.iter().step_by(step) {
        histogram[b as usize] += 1;
        samples += 1;
        match b {
            0 => zeros += 1,
            0x20..=0x7E | b'\t' | b'\n' | b'\r' => text += 1,
            0x80..=0xFF => high += 1,
            _ => {}
        }
    }

    let mut zero_runs = 0;
    let mut current = 0;
    for &b in data {
        if b == 0 {
            current += 1;
            if current > 4 {
                zero_runs += 1;
                current = 0;
            }
        } else {
            current = 0;
        }
    }

    let n = samples as f64;
    let mut entropy = 0.0;
    for &count in &histogram {
        if count > 0 {
            let p = count as f64 / n;
            entropy -= p * p.log2();
        }
    }

    entropy > 6.8
        || zeros as f64 / n > 0.15
        || high as f64 / n > 0.2
        || (text as f64 / n) < 0.7
        || zero_runs > 5
}

/// Escape-coded RLE body (tag 5): marker 254 is a 16-bit run, 253 an
/// 8-bit run, 255 escapes a literal marker byte.
fn encode_enhanced_rle(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4);
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == b && run < u16::MAX as usize {
            run += 1;
        }
        if run >= 8 {
            out.push(MARK_LONG_RUN);
            out.extend_from_slice(&(run as u16).to_le_bytes());
            out.push(b);
        } else if run >= 4 {
            out.push(MARK_SHORT_RUN);
            out.push(run as u8);
            out.push(b);
        } else {
            for _ in 0..run {
                if b >= MARK_SHORT_RUN {
                    out.push(MARK_ESCAPE);
                }
                out.push(b);
            }
        }
        i += run;
    }
    out
}

fn decode_enhanced_rle(cursor: &mut Cursor<'_>, expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    while out.len() < expected_len {
        let b = cursor.u8("rle marker")?;
        match b {
            MARK_ESCAPE => out.push(cursor.u8("escaped literal")?),
            MARK_LONG_RUN => {
                let run = cursor.u16le("long run length")? as usize;
                let value = cursor.u8("long run byte")?;
                if out.len() + run > expected_len {
                    return Err(Error::corrupted("rle run overflows declared length"));
                }
                out.extend(std::iter::repeat(value).take(run));
            }
            MARK_SHORT_RUN => {
                let run = cursor.u8("short run length")? as usize;
                let value = cursor.u8("short run byte")?;
                if out.len() + run > expected_len {
                    return Err(Error::corrupted("rle run overflows declared length"));
                }
                out.extend(std::iter::repeat(value).take(run));
            }
            literal => out.push(literal),
        }
    }
    Ok(out)
}

/// Serializes a `(symbol, frequency)` table for one arithmetic body.
fn push_frequency_table(out: &mut Vec<u8>, freq: &BTreeMap<u32, u64>) {
    push_u64le(out, freq.len() as u64);
    for (&sym, &f) in freq {
        out.push(sym as u8);
        push_u64le(out, f);
    }
}

fn read_frequency_table(cursor: &mut Cursor<'_>) -> Result<BTreeMap<u32, u64>> {
    let count = cursor.u64le("frequency table size")?;
    if count == 0 || count > 256 {
        return Err(Error::corrupted(format!(
            "frequency table of {count} symbols"
        )));
    }
    let mut freq = BTreeMap::new();
    for _ in 0..count {
        let sym = cursor.u8("frequency symbol")? as u32;
        let f = cursor.u64le("frequency value")?;
        if f == 0 {
            return Err(Error::corrupted("zero frequency in table"));
        }
        if freq.insert(sym, f).is_some() {
            return Err(Error::corrupted("duplicate symbol in frequency table"));
        }
    }
    Ok(freq)
}

/// Frequency table, encoded length, and coded bits for one arithmetic
/// body. The decoded symbol count is carried outside (the outer length
/// field for tag 3, the block record for tag 4).
fn arithmetic_body(block: &[u8]) -> Result<Vec<u8>> {
    let freq = arithmetic::byte_frequencies(block);
    let model = ProbabilityModel::from_frequencies(&freq);
    let encoded = arithmetic::encode(block.iter().map(|&b| b as u32), &model)?;
    let mut body = Vec::with_capacity(encoded.len() + freq.len() * 9 + 16);
    push_frequency_table(&mut body, &freq);
    push_u64le(&mut body, encoded.len() as u64);
    body.extend_from_slice(&encoded);
    Ok(body)
}

fn decode_arithmetic_body(cursor: &mut Cursor<'_>, decoded_len: usize) -> Result<Vec<u8>> {
    let freq = read_frequency_table(cursor)?;
    let encoded_len = cursor.u64le("encoded length")? as usize;
    let encoded = cursor.bytes(encoded_len, "arithmetic body")?;
    let model = ProbabilityModel::from_frequencies(&freq);
    let symbols = arithmetic::decode(encoded, &model, decoded_len)?;
    Ok(symbols.into_iter().map(|s| s as u8).collect())
}

/// Tag-4 body: per 16 KiB block, the cheapest of stored / arithmetic /
/// repeated-byte / zero-run coding. Returns `None` when the whole-input
/// ratio stays above 0.95.
fn encode_binary_blocks(data: &[u8]) -> Result<Option<Vec<u8>>> {
    let block_count = data.len().div_ceil(BINARY_BLOCK_SIZE);
    let mut body = Vec::with_capacity(data.len() / 2);
    push_u64le(&mut body, block_count as u64);

    for block in data.chunks(BINARY_BLOCK_SIZE) {
        if block.len() > 8 && all_bytes_same(block) {
            body.push(BLOCK_REPEATED);
            body.push(block[0]);
            push_u64le(&mut body, block.len() as u64);
            continue;
        }

        // Zero runs longer than 16 bytes, positions relative to the block.
        let mut zero_runs: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        let mut in_run = false;
        for (i, &b) in block.iter().enumerate() {
            if b == 0 {
                if !in_run {
                    start = i;
                    in_run = true;
                }
            } else if in_run {
                if i - start > 16 {
                    zero_runs.push((start, i - start));
                }
                in_run = false;
            }
        }
        if in_run && block.len() - start > 16 {
            zero_runs.push((start, block.len() - start));
        }

        if zero_runs.len() > 2 && zero_runs.len() * 16 < block.len() / 4 {
            body.push(BLOCK_ZERO_RUNS);
            push_u64le(&mut body, zero_runs.len() as u64);
            for &(pos, len) in &zero_runs {
                push_u64le(&mut body, pos as u64);
                push_u64le(&mut body, len as u64);
            }
            let mut residue = Vec::with_capacity(block.len());
            let mut pos = 0;
            for &(run_start, run_len) in &zero_runs {
                residue.extend_from_slice(&block[pos..run_start]);
                pos = run_start + run_len;
            }
            residue.extend_from_slice(&block[pos..]);
            push_u64le(&mut body, residue.len() as u64);
            body.extend_from_slice(&residue);
            continue;
        }

        let distinct = {
            let mut seen = [false; 256];
            let mut count = 0;
            for &b in block {
                if !seen[b as usize] {
                    seen[b as usize] = true;
                    count += 1;
                }
            }
            count
        };

        if distinct > 230 {
            body.push(BLOCK_STORED);
            push_u64le(&mut body, block.len() as u64);
            body.extend_from_slice(block);
            continue;
        }

        let coded = arithmetic_body(block)?;
        if coded.len() * 100 < block.len() * 95 {
            body.push(BLOCK_ARITHMETIC);
            push_u64le(&mut body, block.len() as u64);
            body.extend_from_slice(&coded);
        } else {
            body.push(BLOCK_STORED);
            push_u64le(&mut body, block.len() as u64);
            body.extend_from_slice(block);
        }
    }

    let total = HEADER_SIZE + 1 + 8 + body.len();
    if total * 100 >= data.len() * 95 {
        return Ok(None);
    }
    Ok(Some(body))
}

fn decode_binary_blocks(cursor: &mut Cursor<'_>, expected_len: usize) -> Result<Vec<u8>> {
    let block_count = cursor.u64le("block count")?;
    let mut out = Vec::with_capacity(expected_len);
    for _ in 0..block_count {
        let kind = cursor.u8("block record kind")?;
        match kind {
            BLOCK_STORED => {
                let len = cursor.u64le("stored block length")? as usize;
                out.extend_from_slice(cursor.bytes(len, "stored block")?);
            }
            BLOCK_ARITHMETIC => {
                let decoded_len = cursor.u64le("block decoded length")? as usize;
                if out.len() + decoded_len > expected_len {
                    return Err(Error::corrupted("block length overflows declared length"));
                }
                out.extend_from_slice(&decode_arithmetic_body(cursor, decoded_len)?);
            }
            BLOCK_REPEATED => {
                let value = cursor.u8("repeated byte")?;
                let count = cursor.u64le("repeat count")? as usize;
                if out.len() + count > expected_len {
                    return Err(Error::corrupted("repeat count overflows declared length"));
                }
                out.extend(std::iter::repeat(value).take(count));
            }
            BLOCK_ZERO_RUNS => {
                let run_count = cursor.u64le("zero run count")?;
                if run_count > 1_000_000 {
                    return Err(Error::corrupted(format!("{run_count} zero runs")));
                }
                let mut runs = Vec::with_capacity(run_count as usize);
                for _ in 0..run_count {
                    let pos = cursor.u64le("zero run position")? as usize;
                    let len = cursor.u64le("zero run length")? as usize;
                    runs.push((pos, len));
                }
                let residue_len = cursor.u64le("residue length")? as usize;
                let residue = cursor.bytes(residue_len, "residue bytes")?;

                let mut block = Vec::with_capacity(residue_len);
                let mut taken = 0;
                let mut block_pos = 0;
                for (run_start, run_len) in runs {
                    if run_start < block_pos {
                        return Err(Error::corrupted("zero runs out of order"));
                    }
                    let gap = run_start - block_pos;
                    if taken + gap > residue.len() {
                        return Err(Error::corrupted("zero run gap exceeds residue"));
                    }
                    block.extend_from_slice(&residue[taken..taken + gap]);
                    taken += gap;
                    if block.len() + run_len + out.len() > expected_len {
                        return Err(Error::corrupted("zero run overflows declared length"));
                    }
                    block.extend(std::iter::repeat(0u8).take(run_len));
                    block_pos = run_start + run_len;
                }
                block.extend_from_slice(&residue[taken..]);
                out.extend_from_slice(&block);
            }
            other => {
                return Err(Error::corrupted(format!(
                    "unknown binary block record {other}"
                )));
            }
        }
        if out.len() > expected_len {
            return Err(Error::corrupted("binary blocks overflow declared length"));
        }
    }
    Ok(out)
}

/// Arithmetic codec with adaptive per-input format dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveCodec;

impl AdaptiveCodec {
    fn store(header: &Header, data: &[u8]) -> Vec<u8> {
        let mut out = header.serialize().to_vec();
        out.push(TAG_STORE);
        push_u64le(&mut out, data.len() as u64);
        out.extend_from_slice(data);
        out
    }
}

impl Codec for AdaptiveCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        let header = Header::describing(Algorithm::Arithmetic, data);

        if data.is_empty() {
            let mut out = header.serialize().to_vec();
            out.push(TAG_STORE);
            push_u64le(&mut out, 0);
            return Ok(out);
        }

        if all_bytes_same(data) {
            debug!("adaptive: constant input, tag 1");
            let mut out = header.serialize().to_vec();
            out.push(TAG_CONSTANT);
            push_u64le(&mut out, data.len() as u64);
            out.push(data[0]);
            return Ok(out);
        }

        if data.len() < SMALL_INPUT_LIMIT {
            debug!("adaptive: small input, tag 0");
            return Ok(Self::store(&header, data));
        }

        if data.len() > 1000 && (has_long_identical_run(data) || zero_ff_heavy(data)) {
            let body = encode_enhanced_rle(data);
            if HEADER_SIZE + 9 + body.len() < data.len() {
                debug!("adaptive: run-heavy input, tag 5");
                let mut out = header.serialize().to_vec();
                out.push(TAG_ENHANCED_RLE);
                push_u64le(&mut out, data.len() as u64);
                out.extend_from_slice(&body);
                return Ok(out);
            }
        }

        if is_binary(data) {
            if let Some(body) = encode_binary_blocks(data)? {
                debug!("adaptive: binary input, tag 4");
                let mut out = header.serialize().to_vec();
                out.push(TAG_BINARY_BLOCKS);
                push_u64le(&mut out, data.len() as u64);
                out.extend_from_slice(&body);
                return Ok(out);
            }
        }

        if data.len() > 5000 && is_large_text(data) {
            // Lossless store in the sampled-text format: the sample is the
            // whole input, so reconstruction terminates after one copy.
            debug!("adaptive: large text, tag 2");
            let mut out = header.serialize().to_vec();
            out.push(TAG_TEXT_SAMPLE);
            push_u64le(&mut out, data.len() as u64);
            out.extend_from_slice(data);
            return Ok(out);
        }

        if data.len() > arithmetic::MAX_DECODED_SYMBOLS {
            debug!("adaptive: above symbol cap, tag 0");
            return Ok(Self::store(&header, data));
        }

        let body = arithmetic_body(data)?;
        let total = HEADER_SIZE + 1 + 8 + body.len();
        if total >= data.len() + HEADER_SIZE + 10 {
            debug!("adaptive: arithmetic not profitable, tag 0");
            return Ok(Self::store(&header, data));
        }

        debug!("adaptive: arithmetic coded, tag 3");
        let mut out = header.serialize().to_vec();
        out.push(TAG_ARITHMETIC);
        push_u64le(&mut out, data.len() as u64);
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let header = Header::parse(data)?;
        if header.algorithm != Algorithm::Arithmetic {
            return Err(Error::corrupted(format!(
                "container algorithm {} is not arithmetic",
                header.algorithm.name()
            )));
        }

        let mut cursor = Cursor::new(data, HEADER_SIZE);
        let tag = cursor.u8("sub-format tag")?;
        let declared_len = cursor.u64le("original length")? as usize;

        let out = match tag {
            TAG_STORE => cursor.bytes(declared_len, "stored body")?.to_vec(),
            TAG_CONSTANT => {
                let value = cursor.u8("constant byte")?;
                vec![value; declared_len]
            }
            TAG_TEXT_SAMPLE => {
                let sample = cursor.remaining();
                if sample.is_empty() && declared_len > 0 {
                    return Err(Error::corrupted("empty text sample"));
                }
                let mut out = Vec::with_capacity(declared_len);
                while out.len() < declared_len {
                    let take = sample.len().min(declared_len - out.len());
                    out.extend_from_slice(&sample[..take]);
                }
                out
            }
            TAG_ARITHMETIC => decode_arithmetic_body(&mut cursor, declared_len)?,
            TAG_BINARY_BLOCKS => decode_binary_blocks(&mut cursor, declared_len)?,
            TAG_ENHANCED_RLE => decode_enhanced_rle(&mut cursor, declared_len)?,
            other => {
                return Err(Error::corrupted(format!("unknown sub-format tag {other}")));
            }
        };

        if out.len() as u64 != header.original_size {
            return Err(Error::LengthMismatch {
                expected: header.original_size,
                actual: out.len() as u64,
            });
        }
        let actual = crc32(&out);
        if actual != header.original_checksum {
            return Err(Error::ChecksumMismatch {
                expected: header.original_checksum,
                actual,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_of(encoded: &[u8]) -> u8 {
        encoded[HEADER_SIZE]
    }

    #[test]
    fn constant_input_selects_tag_1() {
        let codec = AdaptiveCodec;
        let data = vec![0x41u8; 1000];
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(tag_of(&encoded), TAG_CONSTANT);
        // header || 01 || E8 03 .. 00 || 41
        let mut expected = Header::describing(Algorithm::Arithmetic, &data)
            .serialize()
            .to_vec();
        expected.push(0x01);
        expected.extend_from_slice(&1000u64.to_le_bytes());
        expected.push(0x41);
        assert_eq!(encoded, expected);
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn small_input_selects_tag_0() {
        let codec = AdaptiveCodec;
        let data = b"short and sweet";
        let encoded = codec.encode(data).unwrap();
        assert_eq!(tag_of(&encoded), TAG_STORE);
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn empty_input_round_trips_with_header() {
        let codec = AdaptiveCodec;
        let encoded = codec.encode(b"").unwrap();
        let header = Header::parse(&encoded).unwrap();
        assert_eq!(header.original_size, 0);
        assert_eq!(codec.decode(&encoded).unwrap(), b"");
    }

    #[test]
    fn compressible_text_selects_tag_3_and_round_trips() {
        let codec = AdaptiveCodec;
        let data: Vec<u8> = b"entropy coding rewards skewed distributions "
            .iter()
            .cycle()
            .take(4000)
            .copied()
            .collect();
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(tag_of(&encoded), TAG_ARITHMETIC);
        assert!(encoded.len() < data.len());
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn large_text_selects_tag_2_and_round_trips() {
        let codec = AdaptiveCodec;
        // Large, mostly-ASCII alphabet, no long runs, below binary
        // thresholds: text-heavy prose.
        let data: Vec<u8> = b"It is a truth universally acknowledged, that a single man \
                              in possession of a good fortune, must be in want of a wife. "
            .iter()
            .cycle()
            .take(20_000)
            .copied()
            .collect();
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(tag_of(&encoded), TAG_TEXT_SAMPLE);
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn zero_heavy_input_selects_tag_5_and_round_trips() {
        let codec = AdaptiveCodec;
        let mut data = vec![0u8; 8000];
        for i in (0..data.len()).step_by(200) {
            data[i] = 0xAB;
        }
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(tag_of(&encoded), TAG_ENHANCED_RLE);
        assert!(encoded.len() < data.len());
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn marker_bytes_survive_enhanced_rle() {
        let mut data = vec![0u8; 4000];
        // Sprinkle literal marker bytes in short runs.
        for i in (0..data.len()).step_by(37) {
            data[i] = 253 + (i % 3) as u8;
        }
        let codec = AdaptiveCodec;
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn binary_blob_round_trips() {
        // ELF-like prefix, long zero stretches, high-byte tables.
        let mut data = vec![0u8; 60_000];
        data[..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
        for i in 4..2048 {
            data[i] = (i * 31 % 256) as u8;
        }
        for i in 40_000..42_000 {
            data[i] = 0xF0 | (i % 16) as u8;
        }
        let codec = AdaptiveCodec;
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn high_byte_data_selects_tag_4_and_round_trips() {
        // High-byte values throughout, a skewed per-block distribution,
        // no long runs: the statistical detector fires and the block code
        // beats the 0.95 ratio bar.
        let data: Vec<u8> = (0..50_000).map(|i| 0x80 | (i % 97) as u8).collect();
        let codec = AdaptiveCodec;
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(tag_of(&encoded), TAG_BINARY_BLOCKS);
        assert!(encoded.len() < data.len());
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn zero_run_blocks_round_trip() {
        // Blocks of noise broken by many 90-byte zero runs: short of the
        // tag-5 long-run and density gates, but the per-block zero-run
        // record applies.
        let mut data = Vec::with_capacity(60_000);
        let mut i = 0u32;
        while data.len() < 60_000 {
            for _ in 0..320 {
                data.push(0x80 | (i % 113) as u8);
                i = i.wrapping_add(1);
            }
            data.extend(std::iter::repeat(0u8).take(90));
        }
        assert!(!has_long_identical_run(&data));
        assert!(!zero_ff_heavy(&data));
        assert!(is_binary(&data));
        let codec = AdaptiveCodec;
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(tag_of(&encoded), TAG_BINARY_BLOCKS);
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn incompressible_input_falls_back_to_store() {
        // A pseudo-random byte soup defeats every model; the wrapper must
        // fall back rather than expand unboundedly.
        let mut state = 0x2545F491_4F6CDD1Du64;
        let data: Vec<u8> = (0..4096)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 32) as u8
            })
            .collect();
        let codec = AdaptiveCodec;
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), data);
        // Bounded expansion: header + tag + length.
        assert!(encoded.len() <= data.len() + HEADER_SIZE + 9);
    }

    #[test]
    fn unknown_tag_is_corrupted() {
        let codec = AdaptiveCodec;
        let mut encoded = codec.encode(b"tag will be mangled").unwrap();
        encoded[HEADER_SIZE] = 9;
        assert!(matches!(codec.decode(&encoded), Err(Error::Corrupted(_))));
    }

    #[test]
    fn flipped_payload_byte_never_yields_wrong_data() {
        let codec = AdaptiveCodec;
        let data: Vec<u8> = b"checksummed contents, checksummed contents"
            .iter()
            .cycle()
            .take(3000)
            .copied()
            .collect();
        let mut encoded = codec.encode(&data).unwrap();
        // Flip inside the frequency table, which every decode path reads.
        encoded[HEADER_SIZE + 30] ^= 0x01;
        match codec.decode(&encoded) {
            Ok(decoded) => assert_eq!(decoded, data, "silent wrong output"),
            Err(_) => {}
        }
    }

    #[test]
    fn wrong_algorithm_id_is_corrupted() {
        let codec = AdaptiveCodec;
        let mut encoded = codec.encode(b"not for other codecs").unwrap();
        encoded[5] = Algorithm::Huffman.id();
        assert!(matches!(codec.decode(&encoded), Err(Error::Corrupted(_))));
    }
}
