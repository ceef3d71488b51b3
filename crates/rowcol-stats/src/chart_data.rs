//! Bounded inputs for the chart renderer: bucket counts and a fixed-size point sample.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rowcol_store::Dataset;
use serde::Serialize;

use crate::error::Result;
use crate::numeric::key_kind;
use crate::options::StatsOptions;
use crate::summary::NumericSummary;

pub const DEFAULT_BUCKETS: usize = 10;
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    /// `counts[b]` covers `[min + b * w, min + (b + 1) * w)`; the last bucket is closed.
    pub counts: Vec<u64>,
}

impl Histogram {
    pub fn bucket_width(&self) -> f64 {
        if self.counts.is_empty() {
            0.0
        } else {
            (self.max - self.min) / self.counts.len() as f64
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

fn bucket_of(x: f64, min: f64, max: f64, buckets: usize) -> usize {
    if max <= min {
        return 0;
    }
    let b = ((x - min) / (max - min) * buckets as f64).floor();
    (b.max(0.0) as usize).min(buckets - 1)
}

/// Count the values of a numeric column into `buckets` equal-width buckets over the
/// summary's `[min, max]`, in one pass.
///
/// Returns `None` when the column has no non-null values.
pub fn histogram(
    dataset: &Dataset,
    column: &str,
    buckets: usize,
    summary: &NumericSummary,
    options: &StatsOptions,
) -> Result<Option<Histogram>> {
    key_kind(dataset.column(column)?)?;
    let (Some(min), Some(max)) = (summary.min, summary.max) else {
        return Ok(None);
    };
    let (min, max) = (min.as_f64(), max.as_f64());
    let buckets = buckets.max(1);

    options.check()?;
    let mut counts = vec![0u64; buckets];
    for cell in dataset.cursor(column)? {
        if let Some(x) = cell?.value.as_f64() {
            counts[bucket_of(x, min, max, buckets)] += 1;
        }
    }
    Ok(Some(Histogram { min, max, counts }))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScatterSample {
    pub points: Vec<(f64, f64)>,
    /// Rows where both values were present.
    pub seen: u64,
}

/// Uniform sample of at most `size` `(x, y)` pairs (Algorithm R over an aligned cursor).
///
/// Rows where either value is null are skipped. The same `seed` gives the same sample.
pub fn scatter_sample(
    dataset: &Dataset,
    x: &str,
    y: &str,
    size: usize,
    seed: u64,
    options: &StatsOptions,
) -> Result<ScatterSample> {
    key_kind(dataset.column(x)?)?;
    key_kind(dataset.column(y)?)?;

    options.check()?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points: Vec<(f64, f64)> = Vec::new();
    let mut seen = 0u64;
    for row in dataset.aligned(&[x, y])? {
        let row = row?;
        let (Some(px), Some(py)) = (row.cells[0].value.as_f64(), row.cells[1].value.as_f64())
        else {
            continue;
        };
        seen += 1;
        if points.len() < size {
            points.push((px, py));
        } else {
            let j = rng.gen_range(0..seen);
            if (j as usize) < size {
                points[j as usize] = (px, py);
            }
        }
    }
    Ok(ScatterSample { points, seen })
}
