//! Descriptive statistics over a rowcol store without loading columns into memory.
//!
//! Every statistic is computed from full cursor passes:
//! - one pass for count, nulls, min, max, mean and sample standard deviation
//! - a bounded number of counting passes for the quartiles (see [`select`])
//! - one pass for categorical frequencies, spilling to disk past a distinct-value limit
//!
//! Cancellation and deadlines are checked before each pass; an interrupted computation
//! returns an error, never a partial summary.

#![forbid(unsafe_code)]

mod categorical;
mod chart_data;
mod error;
mod moments;
mod numeric;
mod options;
pub mod select;
mod summary;

use rowcol_store::{ColumnMeta, Dataset, Value};

pub use crate::categorical::{FrequencyCounter, Tally};
pub use crate::chart_data::{
    histogram, scatter_sample, Histogram, ScatterSample, DEFAULT_BUCKETS, DEFAULT_SAMPLE_SIZE,
};
pub use crate::error::{Result, StatsError};
pub use crate::moments::Moments;
pub use crate::options::{CancelToken, StatsOptions};
pub use crate::summary::{
    CategoricalSummary, ColumnSummary, Frequency, Number, NumericSummary, ScanReport,
    StatValue, Statistic, Summary,
};

use crate::summary::percentage;

/// Summarize one column: numeric summaries for Integer/Float, frequencies otherwise.
pub fn summarize(dataset: &Dataset, column: &str, options: &StatsOptions) -> Result<ColumnSummary> {
    let meta = dataset.column(column)?;
    if meta.column_type.is_numeric() {
        numeric::summarize_numeric(dataset, meta, options)
    } else {
        summarize_categorical(dataset, meta, options)
    }
}

fn summarize_categorical(
    dataset: &Dataset,
    meta: &ColumnMeta,
    options: &StatsOptions,
) -> Result<ColumnSummary> {
    let mut cursor = dataset.cursor(&meta.name)?;
    let mut counter = FrequencyCounter::new(options.max_in_memory_distinct, options.spill_dir.as_deref());
    let mut nulls = 0u64;

    options.check()?;
    while let Some(cell) = cursor.next_cell()? {
        match &cell.value {
            Value::Null => nulls += 1,
            Value::ShortString(s) => counter.insert(s)?,
            other => counter.insert(&other.to_string())?,
        }
    }
    let tally = counter.finish(options.top_n)?;
    log::debug!(
        "column `{}`: frequency pass done ({} distinct{})",
        meta.name,
        tally.distinct,
        if tally.spilled { ", spilled" } else { "" }
    );

    let top: Vec<Frequency> = tally
        .top
        .into_iter()
        .map(|(value, count)| Frequency {
            value,
            count,
            percentage: percentage(count, tally.total),
        })
        .collect();
    let summary = CategoricalSummary {
        count: tally.total,
        nulls,
        distinct: tally.distinct,
        mode: top.first().map(|f| f.value.clone()),
        mode_percentage: top.first().map(|f| f.percentage),
        top,
        missing_percentage: percentage(nulls, tally.total + nulls),
    };

    Ok(ColumnSummary {
        column: meta.name.clone(),
        column_type: meta.column_type,
        summary: Summary::Categorical(summary),
        scan: cursor.stats().into(),
    })
}

/// Summarize every column, in display order. Columns are independent: with the `parallel`
/// feature each one runs on a rayon worker with its own cursors.
pub fn summarize_all(dataset: &Dataset, options: &StatsOptions) -> Result<Vec<ColumnSummary>> {
    let names: Vec<&str> = dataset.column_names().collect();

    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
    {
        use rayon::prelude::*;
        names
            .par_iter()
            .map(|name| summarize(dataset, name, options))
            .collect()
    }

    #[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
    {
        names
            .iter()
            .map(|name| summarize(dataset, name, options))
            .collect()
    }
}
