//! 64-bit binary range coder with a static frequency model.
//!
//! Registers `low` and `high` span a 63-bit code space (`TOP = 2^63 - 1`).
//! Encoding narrows the interval per symbol and renormalizes with the
//! classic E1/E2/E3 scheme, tracking underflow bits while the interval
//! straddles the midpoint. A reserved EOF symbol terminates every stream.
//!
//! All loops are bounded: renormalization is capped per symbol, total
//! decode iterations are capped relative to the requested symbol count, and
//! the decoded symbol count itself is capped. The decoder zero-extends past
//! the end of input, never reading more than the encoded bits.

use std::collections::BTreeMap;

use crate::bitio::{BitReader, BitWriter};
use crate::error::Error;
use crate::Result;

/// Sentinel end-of-stream symbol, distinct from any byte-derived symbol.
pub const EOF_SYMBOL: u32 = u32::MAX;

/// Hard cap on symbols produced by one decode call.
pub const MAX_DECODED_SYMBOLS: usize = 10_000_000;

const CODE_BITS: u32 = 64;
const TOP: u64 = (1 << (CODE_BITS - 1)) - 1;
const FIRST_QTR: u64 = TOP / 4 + 1;
const HALF: u64 = 2 * FIRST_QTR;
const THIRD_QTR: u64 = 3 * FIRST_QTR;

/// Renormalization steps allowed per symbol before the overflow guard
/// fires.
const MAX_RENORM_STEPS: usize = 100;

/// Cumulative frequency ranges per symbol, plus the EOF sentinel.
///
/// Built from raw counts: every present symbol is granted frequency >= 1,
/// counts are halved until the total fits 32 bits, and ranges are laid out
/// in ascending symbol order with EOF appended at width 1.
#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    /// `(symbol, cum_lo, cum_hi)`, ascending by symbol; EOF last.
    entries: Vec<(u32, u64, u64)>,
    total: u64,
}

impl ProbabilityModel {
    pub fn from_frequencies(freq: &BTreeMap<u32, u64>) -> Self {
        let mut freqs: Vec<(u32, u64)> = freq.iter().map(|(&s, &f)| (s, f.max(1))).collect();
        let mut total: u64 = freqs.iter().map(|&(_, f)| f).sum();
        while total > u32::MAX as u64 {
            total = 0;
            for f in freqs.iter_mut() {
                f.1 = (f.1 + 1) >> 1;
                total += f.1;
            }
        }

        let mut entries = Vec::with_capacity(freqs.len() + 1);
        let mut cum = 0u64;
        for (sym, f) in freqs {
            entries.push((sym, cum, cum + f));
            cum += f;
        }
        entries.push((EOF_SYMBOL, cum, cum + 1));
        cum += 1;

        ProbabilityModel { entries, total: cum }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn range_of(&self, symbol: u32) -> Result<(u64, u64)> {
        self.entries
            .binary_search_by_key(&symbol, |e| e.0)
            .map(|i| (self.entries[i].1, self.entries[i].2))
            .map_err(|_| Error::corrupted(format!("symbol {symbol} not in probability model")))
    }

    /// Finds the entry whose `[cum_lo, cum_hi)` contains `scaled`.
    fn symbol_for(&self, scaled: u64) -> Result<(u32, u64, u64)> {
        let idx = self.entries.partition_point(|e| e.2 <= scaled);
        match self.entries.get(idx) {
            Some(&(sym, lo, hi)) if lo <= scaled => Ok((sym, lo, hi)),
            _ => Err(Error::corrupted(format!(
                "scaled value {scaled} outside cumulative ranges"
            ))),
        }
    }
}

/// Narrows `[low, high]` to the sub-interval of `[cum_lo, cum_hi)`.
fn narrow(low: &mut u64, high: &mut u64, cum_lo: u64, cum_hi: u64, total: u64) {
    let mut range = *high - *low + 1;
    if range <= 1 {
        // Degenerate interval; reset to the full range.
        *low = 0;
        *high = TOP;
        range = TOP + 1;
    }
    let range = range as u128;
    *high = *low + (range * cum_hi as u128 / total as u128) as u64 - 1;
    *low += (range * cum_lo as u128 / total as u128) as u64;
}

/// Encodes a symbol sequence against `model`, appending EOF and the final
/// disambiguating bits.
pub fn encode<I>(symbols: I, model: &ProbabilityModel) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = u32>,
{
    let mut low = 0u64;
    let mut high = TOP;
    let mut underflow = 0u64;
    let mut writer = BitWriter::new();

    let mut emit = |writer: &mut BitWriter, bit: bool, underflow: &mut u64| {
        writer.write_bit(bit);
        while *underflow > 0 {
            writer.write_bit(!bit);
            *underflow -= 1;
        }
    };

    for sym in symbols.into_iter().chain(std::iter::once(EOF_SYMBOL)) {
        let (cum_lo, cum_hi) = model.range_of(sym)?;
        narrow(&mut low, &mut high, cum_lo, cum_hi, model.total);

        let mut steps = 0;
        loop {
            if high < HALF {
                emit(&mut writer, false, &mut underflow);
            } else if low >= HALF {
                emit(&mut writer, true, &mut underflow);
                low -= HALF;
                high -= HALF;
            } else if low >= FIRST_QTR && high < THIRD_QTR {
                underflow += 1;
                low -= FIRST_QTR;
                high -= FIRST_QTR;
            } else {
                break;
            }
            low <<= 1;
            high = high << 1 | 1;
            steps += 1;
            if steps > MAX_RENORM_STEPS {
                return Err(Error::Overflow("renormalization loop cap exceeded"));
            }
        }
        debug_assert!(low <= high);
    }

    // Select the final quarter, then flush pending underflow bits.
    let final_bit = low >= FIRST_QTR;
    writer.write_bit(final_bit);
    for _ in 0..=underflow {
        writer.write_bit(!final_bit);
    }

    Ok(writer.finish())
}

/// Decodes up to `max_symbols` symbols, stopping early at EOF.
pub fn decode(data: &[u8], model: &ProbabilityModel, max_symbols: usize) -> Result<Vec<u32>> {
    if max_symbols > MAX_DECODED_SYMBOLS {
        return Err(Error::Overflow("decoded symbol cap exceeded"));
    }

    let mut reader = BitReader::new(data);

    let mut value = 0u64;
    for _ in 0..CODE_BITS - 1 {
        value = value << 1 | read_bit_or_zero(&mut reader);
    }

    let mut low = 0u64;
    let mut high = TOP;
    let mut out = Vec::new();
    let iteration_cap = 2 * max_symbols + 2;
    let mut iterations = 0;

    while out.len() < max_symbols {
        iterations += 1;
        if iterations > iteration_cap {
            return Err(Error::Overflow("decode iteration cap exceeded"));
        }

        let mut range = high - low + 1;
        if range <= 1 {
            low = 0;
            high = TOP;
            range = TOP + 1;
        }
        if value < low || value > high {
            return Err(Error::corrupted("code value outside current interval"));
        }

        let scaled =
            (((value - low + 1) as u128 * model.total as u128 - 1) / range as u128) as u64;
        let (sym, cum_lo, cum_hi) = model.symbol_for(scaled)?;
        if sym == EOF_SYMBOL {
            break;
        }
        out.push(sym);

        narrow(&mut low, &mut high, cum_lo, cum_hi, model.total);

        let mut steps = 0;
        loop {
            if high < HALF {
                // Shared MSB of zero; shift it out.
            } else if low >= HALF {
                low -= HALF;
                high -= HALF;
                value -= HALF;
            } else if low >= FIRST_QTR && high < THIRD_QTR {
                low -= FIRST_QTR;
                high -= FIRST_QTR;
                value -= FIRST_QTR;
            } else {
                break;
            }
            low <<= 1;
            high = high << 1 | 1;
            value = value << 1 | read_bit_or_zero(&mut reader);
            steps += 1;
            if steps > MAX_RENORM_STEPS {
                return Err(Error::Overflow("renormalization loop cap exceeded"));
            }
        }
        debug_assert!(low <= high);
    }

    Ok(out)
}

/// Reads one code bit, zero-extending past the end of the encoded input.
fn read_bit_or_zero(reader: &mut BitReader<'_>) -> u64 {
    reader.read_bit().map(u64::from).unwrap_or(0)
}

/// Builds a byte-symbol frequency map suitable for
/// [`ProbabilityModel::from_frequencies`].
pub fn byte_frequencies(data: &[u8]) -> BTreeMap<u32, u64> {
    let mut freq = BTreeMap::new();
    for &b in data {
        *freq.entry(b as u32).or_insert(0) += 1;
    }
    freq
}
