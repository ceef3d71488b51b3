//! Order statistics by counting selection.
//!
//! Values are mapped onto `u64` keys whose unsigned order matches the numeric order, so one
//! binary search over the key range works for both integer and float columns. Each step of
//! the search is one full pass counting the keys `<=` the pivot; every requested rank is
//! searched at once, so the pass count is bounded by the key width (64) no matter how many
//! ranks are needed.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::summary::Number;

const SIGN: u64 = 1 << 63;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Integer,
    Float,
}

impl KeyKind {
    pub fn key_of_i64(v: i64) -> u64 {
        (v as u64) ^ SIGN
    }

    /// IEEE total order: negative floats have every bit flipped, positive ones only the sign.
    pub fn key_of_f64(v: f64) -> u64 {
        let bits = v.to_bits();
        if bits & SIGN != 0 {
            !bits
        } else {
            bits | SIGN
        }
    }

    /// The column value a key stands for; integer keys decode exactly.
    pub fn number(self, key: u64) -> Number {
        match self {
            KeyKind::Integer => Number::Integer((key ^ SIGN) as i64),
            KeyKind::Float => {
                let bits = if key & SIGN != 0 { key & !SIGN } else { !key };
                Number::Float(f64::from_bits(bits))
            }
        }
    }

    pub fn decode(self, key: u64) -> f64 {
        self.number(key).as_f64()
    }
}

/// Something that can replay every non-null key of a column, once per call.
pub trait KeyPass {
    fn pass(&mut self, visit: &mut dyn FnMut(u64)) -> Result<()>;
}

/// Key of the value at each 0-based `rank` among the keys produced by `source`.
///
/// `lo` and `hi` must bound every key (the min and max found in an earlier pass) and every
/// rank must be below the number of keys.
pub fn select_ranks<S: KeyPass + ?Sized>(
    source: &mut S,
    lo: u64,
    hi: u64,
    ranks: &[u64],
) -> Result<BTreeMap<u64, u64>> {
    struct Search {
        rank: u64,
        lo: u64,
        hi: u64,
    }

    let mut searches: Vec<Search> = ranks
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|rank| Search { rank, lo, hi })
        .collect();

    loop {
        let pivots: Vec<(usize, u64)> = searches
            .iter()
            .enumerate()
            .filter(|(_, s)| s.lo < s.hi)
            .map(|(i, s)| (i, s.lo + (s.hi - s.lo) / 2))
            .collect();
        if pivots.is_empty() {
            break;
        }

        let mut counts = vec![0u64; pivots.len()];
        source.pass(&mut |key| {
            for (count, (_, pivot)) in counts.iter_mut().zip(&pivots) {
                if key <= *pivot {
                    *count += 1;
                }
            }
        })?;

        for ((i, pivot), count) in pivots.into_iter().zip(counts) {
            let search = &mut searches[i];
            if count > search.rank {
                search.hi = pivot;
            } else {
                search.lo = pivot + 1;
            }
        }
    }

    Ok(searches.into_iter().map(|s| (s.rank, s.lo)).collect())
}

/// Weighted mean of two neighbours. Each side is scaled before the sum so values of opposite
/// sign near the float limits do not overflow.
fn interpolate(lower: Number, upper: Number, frac: f64) -> Number {
    if lower == upper {
        return lower;
    }
    Number::Float(lower.as_f64() * (1.0 - frac) + upper.as_f64() * frac)
}

/// Inclusive quantiles (linear interpolation at `p * (n - 1)`) of `n` keys.
///
/// A quantile that falls on a single rank is that value, exact for integer columns; only
/// interpolated quantiles are computed in floating point.
pub fn quantiles<S: KeyPass + ?Sized>(
    source: &mut S,
    kind: KeyKind,
    lo: u64,
    hi: u64,
    n: u64,
    probabilities: &[f64],
) -> Result<Vec<Number>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let positions: Vec<(u64, f64)> = probabilities
        .iter()
        .map(|p| {
            let pos = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let k = (pos.floor() as u64).min(n - 1);
            (k, pos - k as f64)
        })
        .collect();

    let mut ranks = Vec::with_capacity(positions.len() * 2);
    for &(k, frac) in &positions {
        ranks.push(k);
        if frac > 0.0 && k + 1 < n {
            ranks.push(k + 1);
        }
    }
    let keys = select_ranks(source, lo, hi, &ranks)?;
    let value = |rank: u64| {
        keys.get(&rank)
            .map_or(Number::Float(f64::NAN), |&key| kind.number(key))
    };

    Ok(positions
        .into_iter()
        .map(|(k, frac)| {
            if frac > 0.0 && k + 1 < n {
                interpolate(value(k), value(k + 1), frac)
            } else {
                value(k)
            }
        })
        .collect())
}
