use rowcol_store::{ColumnCursor, ColumnMeta, ColumnType, Dataset, Value};

use crate::error::{Result, StatsError};
use crate::moments::Moments;
use crate::options::StatsOptions;
use crate::select::{quantiles, KeyKind, KeyPass};
use crate::summary::{percentage, ColumnSummary, NumericSummary, Summary};

pub(crate) fn key_kind(meta: &ColumnMeta) -> Result<KeyKind> {
    match meta.column_type {
        ColumnType::Integer => Ok(KeyKind::Integer),
        ColumnType::Float => Ok(KeyKind::Float),
        other => Err(StatsError::NotNumeric {
            column: meta.name.clone(),
            column_type: other,
        }),
    }
}

fn key_of(value: &Value) -> Option<u64> {
    match value {
        Value::Integer(v) => Some(KeyKind::key_of_i64(*v)),
        Value::Float(v) => Some(KeyKind::key_of_f64(*v)),
        _ => None,
    }
}

/// Replays a column's non-null keys by restarting its cursor, one check per pass.
struct CursorKeys<'a, 'o> {
    cursor: ColumnCursor<'a>,
    options: &'o StatsOptions,
}

impl KeyPass for CursorKeys<'_, '_> {
    fn pass(&mut self, visit: &mut dyn FnMut(u64)) -> Result<()> {
        self.options.check()?;
        self.cursor.reset();
        while let Some(cell) = self.cursor.next_cell()? {
            if let Some(key) = key_of(&cell.value) {
                visit(key);
            }
        }
        log::debug!(
            "column `{}`: selection pass {} done",
            self.cursor.column().name,
            self.cursor.stats().passes
        );
        Ok(())
    }
}

pub(crate) fn summarize_numeric(
    dataset: &Dataset,
    meta: &ColumnMeta,
    options: &StatsOptions,
) -> Result<ColumnSummary> {
    let kind = key_kind(meta)?;
    let mut cursor = dataset.cursor(&meta.name)?;

    options.check()?;
    let mut moments = Moments::default();
    let mut nulls = 0u64;
    let mut bounds: Option<(u64, u64)> = None;
    while let Some(cell) = cursor.next_cell()? {
        let Some(key) = key_of(&cell.value) else {
            nulls += 1;
            continue;
        };
        bounds = Some(bounds.map_or((key, key), |(lo, hi)| (lo.min(key), hi.max(key))));
        moments.push(kind.decode(key));
    }
    log::debug!(
        "column `{}`: moments pass done ({} values, {nulls} nulls)",
        meta.name,
        moments.count()
    );

    let mut keys = CursorKeys { cursor, options };
    let quartiles = match bounds {
        Some((lo, hi)) => {
            quantiles(&mut keys, kind, lo, hi, moments.count(), &[0.25, 0.5, 0.75])?
        }
        None => Vec::new(),
    };
    let quartile = |i: usize| quartiles.get(i).copied();

    let summary = NumericSummary {
        count: moments.count(),
        nulls,
        min: bounds.map(|(lo, _)| kind.number(lo)),
        max: bounds.map(|(_, hi)| kind.number(hi)),
        mean: moments.mean(),
        stddev: moments.stddev(),
        q1: quartile(0),
        median: quartile(1),
        q3: quartile(2),
        missing_percentage: percentage(nulls, moments.count() + nulls),
    };

    Ok(ColumnSummary {
        column: meta.name.clone(),
        column_type: meta.column_type,
        summary: Summary::Numeric(summary),
        scan: keys.cursor.stats().into(),
    })
}
