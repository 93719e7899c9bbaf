//! Sliding-window dictionary codec (LZ77 family).
//!
//! The encoder tokenizes the input into literals and `(length, distance)`
//! matches found through a hash-chained dictionary over a window of up to
//! 32 768 bytes, then serializes the tokens into a byte-oriented record
//! stream:
//!
//! | tag  | body                          | meaning                         |
//! |------|-------------------------------|---------------------------------|
//! | 0x00 | 1 literal byte                | single literal                  |
//! | 0x01 | `len:u16le`, `dist:u16le`     | match, length 3..=258           |
//! | 0x02 | —                             | end of stream                   |
//! | 0x03 | `n:u8`, `n+1` bytes           | run of 1..=256 literals         |
//! | 0x04 | `u16le` = `((len-3)<<10)|dist`| short match, len 3..=6, dist<1024 |
//!
//! The encoder prefers the compact tag whenever it fits, batches two or more
//! consecutive literals under tag 0x03, and terminates with exactly one
//! end-of-stream record.

use log::debug;

use crate::error::Error;
use crate::{Codec, Result};

/// Shortest match worth representing.
pub const MIN_MATCH: usize = 3;
/// Longest representable match.
pub const MAX_MATCH: usize = 258;
/// Hard cap on the sliding window.
pub const MAX_WINDOW: usize = 32_768;

const HASH_BITS: u32 = 15;
const HASH_MASK: u32 = (1 << HASH_BITS) - 1;
/// Knuth's multiplicative hash constant.
const HASH_FACTOR: u32 = 2_654_435_761;
/// Chain search stops early once a match at least this long is found.
const SATISFACTORY_MATCH: usize = 64;

const TAG_LITERAL: u8 = 0x00;
const TAG_MATCH: u8 = 0x01;
const TAG_END: u8 = 0x02;
const TAG_LITERAL_RUN: u8 = 0x03;
const TAG_COMPACT: u8 = 0x04;

/// How the encoder resolves overlapping match opportunities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Take the best match at every position.
    Greedy,
    /// Defer to a strictly better match one position ahead.
    Lazy,
    /// Minimum-cost parse by dynamic programming. Intended for small
    /// inputs; cost grows with input size times maximum match length.
    Optimal,
}

/// Encoder tuning knobs. The decoder needs none of these.
#[derive(Debug, Clone)]
pub struct Lz77Config {
    /// Sliding window size; clamped to [`MAX_WINDOW`].
    pub window_size: usize,
    /// Minimum match length accepted, at least [`MIN_MATCH`].
    pub min_match: usize,
    /// Maximum match length emitted; clamped to [`MAX_MATCH`].
    pub max_match: usize,
    pub parse_mode: ParseMode,
    /// Search harder: full-length chains, denser hash insertion, and a
    /// two-position lookahead in lazy mode.
    pub aggressive: bool,
    /// Gate match acceptance on distance (far matches must be longer).
    pub adaptive_min_match: bool,
    /// Bound on hash chain length, clamped to 64..=8192.
    pub max_chain: usize,
}

impl Default for Lz77Config {
    fn default() -> Self {
        Self {
            window_size: MAX_WINDOW,
            min_match: MIN_MATCH,
            max_match: MAX_MATCH,
            parse_mode: ParseMode::Lazy,
            aggressive: false,
            adaptive_min_match: true,
            max_chain: 8192,
        }
    }
}

/// One parsed element of the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    Match { length: u16, distance: u16 },
    EndOfBlock,
}

#[derive(Debug, Clone, Copy)]
struct Match {
    len: usize,
    dist: usize,
}

impl Match {
    /// Serialized size of this match in the record stream.
    fn cost(&self) -> usize {
        if self.len <= 6 && self.dist <= 1023 {
            3 // compact record
        } else {
            5 // full record
        }
    }

    /// Spec scoring: match length minus its encoded cost.
    fn score(&self) -> i64 {
        self.len as i64 - self.cost() as i64
    }

    /// Bytes saved versus emitting the covered range as literals.
    fn benefit(&self) -> i64 {
        2 * self.len as i64 - self.cost() as i64
    }
}

/// Sliding-window dictionary codec.
#[derive(Debug, Clone)]
pub struct Lz77Codec {
    config: Lz77Config,
}

impl Default for Lz77Codec {
    fn default() -> Self {
        Self::new(Lz77Config::default()).expect("default configuration is valid")
    }
}

impl Lz77Codec {
    /// Creates a codec, validating and clamping the configuration.
    pub fn new(mut config: Lz77Config) -> Result<Self> {
        if config.window_size == 0 {
            return Err(Error::InvalidInput("window size cannot be zero".into()));
        }
        if config.min_match < MIN_MATCH {
            return Err(Error::InvalidInput(format!(
                "minimum match {} below stream minimum {MIN_MATCH}",
                config.min_match
            )));
        }
        config.window_size = config.window_size.min(MAX_WINDOW);
        config.max_match = config.max_match.min(MAX_MATCH);
        if config.max_match < config.min_match {
            return Err(Error::InvalidInput(format!(
                "maximum match {} below minimum match {}",
                config.max_match, config.min_match
            )));
        }
        config.max_chain = config.max_chain.clamp(64, 8192);
        Ok(Self { config })
    }

    pub fn config(&self) -> &Lz77Config {
        &self.config
    }

    fn min_len_for_distance(&self, dist: usize) -> usize {
        if !self.config.adaptive_min_match {
            return self.config.min_match;
        }
        let gate = if dist < 4096 {
            3
        } else if dist < 16_384 {
            4
        } else {
            5
        };
        gate.max(self.config.min_match)
    }

    fn acceptable(&self, len: usize, dist: usize) -> bool {
        if len < self.min_len_for_distance(dist) {
            return false;
        }
        // Minimum-length matches are never worth a far reference.
        if self.config.adaptive_min_match && len == MIN_MATCH && dist > 8192 {
            return false;
        }
        true
    }

    fn find_best_match(&self, data: &[u8], pos: usize, table: &HashTable) -> Option<Match> {
        if pos + MIN_MATCH > data.len() {
            return None;
        }

        let chain = table.chain(hash_triplet(data, pos));
        let window_start = pos.saturating_sub(self.config.window_size);
        let max_len = self.config.max_match.min(data.len() - pos);

        let mut best: Option<Match> = None;
        let mut best_score = i64::MIN;
        let mut checks = 0;

        // Most recent candidates first; ties in score therefore stay with
        // the smaller distance.
        for &q in chain.iter().rev() {
            let q = q as usize;
            if q < window_start {
                break;
            }
            if q >= pos {
                continue;
            }
            if checks >= self.config.max_chain {
                break;
            }
            checks += 1;

            if data[q] != data[pos] || data[q + 1] != data[pos + 1] || data[q + 2] != data[pos + 2]
            {
                continue;
            }
            let mut len = MIN_MATCH;
            while len < max_len && data[q + len] == data[pos + len] {
                len += 1;
            }

            let dist = pos - q;
            if !self.acceptable(len, dist) {
                continue;
            }

            let candidate = Match { len, dist };
            if candidate.score() > best_score {
                best_score = candidate.score();
                best = Some(candidate);
                if len >= SATISFACTORY_MATCH {
                    break;
                }
            }
        }
        best
    }

    /// Parses the input into a token stream ending in `EndOfBlock`.
    pub fn tokenize(&self, data: &[u8]) -> Vec<Token> {
        match self.config.parse_mode {
            ParseMode::Optimal => self.tokenize_optimal(data),
            _ => self.tokenize_sequential(data),
        }
    }

    fn tokenize_sequential(&self, data: &[u8]) -> Vec<Token> {
        let mut tokens = Vec::with_capacity(data.len() / 2 + 1);
        let mut table = HashTable::new(self.config.max_chain);
        let lazy = self.config.parse_mode == ParseMode::Lazy;

        let mut pos = 0;
        while pos < data.len() {
            let mut chosen = self
                .find_best_match(data, pos, &table)
                .filter(|m| m.benefit() > 0);

            if lazy {
                if let Some(cur) = chosen {
                    if pos + 1 < data.len() {
                        let next = self
                            .find_best_match(data, pos + 1, &table)
                            .filter(|m| m.benefit() > 0);
                        if let Some(next) = next {
                            if next.score() >= cur.score() + 1 {
                                // The deferred match dominates; emit one
                                // literal and re-evaluate from pos + 1.
                                chosen = None;
                            }
                        }
                    }
                }

                if self.config.aggressive && chosen.is_some() && pos + 2 < data.len() {
                    let cur = chosen.expect("checked above");
                    if let Some(two_ahead) = self.find_best_match(data, pos + 2, &table) {
                        if two_ahead.len > cur.len + 1 && two_ahead.score() > cur.score() + 3 {
                            for _ in 0..2 {
                                table.insert(data, pos);
                                tokens.push(Token::Literal(data[pos]));
                                pos += 1;
                            }
                            continue;
                        }
                    }
                }
            }

            table.insert(data, pos);
            match chosen {
                Some(m) => {
                    tokens.push(Token::Match {
                        length: m.len as u16,
                        distance: m.dist as u16,
                    });
                    let stride = if self.config.aggressive {
                        1
                    } else {
                        (m.len + 7) / 8
                    };
                    let mut i = stride;
                    while i < m.len {
                        table.insert(data, pos + i);
                        i += stride;
                    }
                    pos += m.len;
                }
                None => {
                    tokens.push(Token::Literal(data[pos]));
                    pos += 1;
                }
            }
        }

        tokens.push(Token::EndOfBlock);
        tokens
    }

    /// Minimum-cost parse: dynamic programming over positions, cost being
    /// the summed record sizes.
    fn tokenize_optimal(&self, data: &[u8]) -> Vec<Token> {
        let n = data.len();
        let mut table = HashTable::new(self.config.max_chain);
        let mut best_at = Vec::with_capacity(n);
        for pos in 0..n {
            best_at.push(self.find_best_match(data, pos, &table));
            table.insert(data, pos);
        }

        const LITERAL_COST: u64 = 2;
        let mut cost = vec![u64::MAX; n + 1];
        // (match length to take, distance); length 0 means a literal
        let mut choice = vec![(0usize, 0usize); n];
        cost[n] = 0;

        for pos in (0..n).rev() {
            let mut c = LITERAL_COST + cost[pos + 1];
            let mut ch = (0, 0);
            if let Some(m) = best_at[pos] {
                for len in self.min_len_for_distance(m.dist)..=m.len {
                    if !self.acceptable(len, m.dist) {
                        continue;
                    }
                    let candidate = Match { len, dist: m.dist };
                    let total = candidate.cost() as u64 + cost[pos + len];
                    if total < c {
                        c = total;
                        ch = (len, m.dist);
                    }
                }
            }
            cost[pos] = c;
            choice[pos] = ch;
        }

        let mut tokens = Vec::new();
        let mut pos = 0;
        while pos < n {
            let (len, dist) = choice[pos];
            if len == 0 {
                tokens.push(Token::Literal(data[pos]));
                pos += 1;
            } else {
                tokens.push(Token::Match {
                    length: len as u16,
                    distance: dist as u16,
                });
                pos += len;
            }
        }
        tokens.push(Token::EndOfBlock);
        tokens
    }

    /// Serializes a token stream into the byte-oriented record format.
    fn emit(&self, tokens: &[Token]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                Token::EndOfBlock => {
                    out.push(TAG_END);
                    i += 1;
                }
                Token::Literal(b) => {
                    let mut run = 1;
                    while run < 256
                        && matches!(tokens.get(i + run), Some(Token::Literal(_)))
                    {
                        run += 1;
                    }
                    if run >= 2 {
                        out.push(TAG_LITERAL_RUN);
                        out.push((run - 1) as u8);
                        for t in &tokens[i..i + run] {
                            if let Token::Literal(b) = t {
                                out.push(*b);
                            }
                        }
                        i += run;
                    } else {
                        out.push(TAG_LITERAL);
                        out.push(b);
                        i += 1;
                    }
                }
                Token::Match { length, distance } => {
                    if (3..=6).contains(&length) && (1..=1023).contains(&distance) {
                        let packed = (length - 3) << 10 | distance;
                        out.push(TAG_COMPACT);
                        out.extend_from_slice(&packed.to_le_bytes());
                    } else {
                        out.push(TAG_MATCH);
                        out.extend_from_slice(&length.to_le_bytes());
                        out.extend_from_slice(&distance.to_le_bytes());
                    }
                    i += 1;
                }
            }
        }
        out
    }
}

impl Codec for Lz77Codec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            "lz77 encode: {} bytes, {:?} parsing, window {}",
            data.len(),
            self.config.parse_mode,
            self.config.window_size
        );
        Ok(self.emit(&self.tokenize(data)))
    }

    fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::with_capacity(data.len() * 2);
        let mut pos = 0;
        loop {
            if pos >= data.len() {
                return Err(Error::Truncated("missing end-of-stream record"));
            }
            let tag = data[pos];
            pos += 1;
            match tag {
                TAG_LITERAL => {
                    if pos >= data.len() {
                        return Err(Error::Truncated("literal record"));
                    }
                    out.push(data[pos]);
                    pos += 1;
                }
                TAG_MATCH => {
                    if pos + 4 > data.len() {
                        return Err(Error::Truncated("match record"));
                    }
                    let length = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
                    let distance = u16::from_le_bytes([data[pos + 2], data[pos + 3]]) as usize;
                    pos += 4;
                    if !(MIN_MATCH..=MAX_MATCH).contains(&length) {
                        return Err(Error::corrupted(format!(
                            "match length {length} outside {MIN_MATCH}..={MAX_MATCH}"
                        )));
                    }
                    copy_match(&mut out, length, distance)?;
                }
                TAG_END => break,
                TAG_LITERAL_RUN => {
                    if pos >= data.len() {
                        return Err(Error::Truncated("literal run count"));
                    }
                    let run = data[pos] as usize + 1;
                    pos += 1;
                    if pos + run > data.len() {
                        return Err(Error::Truncated("literal run body"));
                    }
                    out.extend_from_slice(&data[pos..pos + run]);
                    pos += run;
                }
                TAG_COMPACT => {
                    if pos + 2 > data.len() {
                        return Err(Error::Truncated("compact match record"));
                    }
                    let packed = u16::from_le_bytes([data[pos], data[pos + 1]]);
                    pos += 2;
                    let length = (packed >> 10) as usize + 3;
                    let distance = (packed & 0x3FF) as usize;
                    copy_match(&mut out, length, distance)?;
                }
                other => {
                    return Err(Error::corrupted(format!(
                        "unknown record tag {other:#04x} at offset {}",
                        pos - 1
                    )));
                }
            }
        }
        Ok(out)
    }
}

/// Resolves a match against already-produced output. Copies byte by byte so
/// overlapping references replicate correctly.
fn copy_match(out: &mut Vec<u8>, length: usize, distance: usize) -> Result<()> {
    if distance == 0 || distance > out.len() {
        return Err(Error::corrupted(format!(
            "match distance {distance} outside produced output of {} bytes",
            out.len()
        )));
    }
    let start = out.len() - distance;
    for i in 0..length {
        let b = out[start + i];
        out.push(b);
    }
    Ok(())
}

/// Hash of the 3-byte group at `pos`, folded to [`HASH_BITS`] bits.
fn hash_triplet(data: &[u8], pos: usize) -> u32 {
    let v = (data[pos] as u32) << 16 | (data[pos + 1] as u32) << 8 | data[pos + 2] as u32;
    let mut h = v.wrapping_mul(HASH_FACTOR);
    h ^= h >> HASH_BITS;
    h & HASH_MASK
}

/// Maps triplet hashes to the positions where that triplet was seen, most
/// recent last. Chains are bounded; overflowing drops the oldest half.
struct HashTable {
    chains: Vec<Vec<u32>>,
    max_chain: usize,
}

impl HashTable {
    fn new(max_chain: usize) -> Self {
        Self {
            chains: vec![Vec::new(); 1 << HASH_BITS],
            max_chain,
        }
    }

    fn chain(&self, hash: u32) -> &[u32] {
        &self.chains[hash as usize]
    }

    fn insert(&mut self, data: &[u8], pos: usize) {
        if pos + MIN_MATCH > data.len() {
            return;
        }
        let chain = &mut self.chains[hash_triplet(data, pos) as usize];
        chain.push(pos as u32);
        if chain.len() > self.max_chain {
            let drop = chain.len() / 2;
            chain.drain(..drop);
        }
    }
}
