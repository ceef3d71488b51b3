//! Plain-text rendering of command results.

use std::fmt::Display;
use std::io::{self, Write};

use rowcol_stats::{ColumnSummary, Summary};
use rowcol_store::{Dataset, InferenceReport};

fn number<T: Display>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

pub(crate) fn inference_issues(report: &InferenceReport) {
    for issue in &report.issues {
        eprintln!("warning: {issue}");
    }
}

pub(crate) fn describe(out: &mut dyn Write, dataset: &Dataset) -> io::Result<()> {
    let metadata = dataset.metadata();
    writeln!(out, "store:   {}", dataset.root().display())?;
    if let Some(provenance) = &metadata.provenance {
        writeln!(
            out,
            "source:  {} ({} bytes, sha256 {})",
            provenance.file_name, provenance.size_bytes, provenance.sha256
        )?;
    }
    writeln!(out, "rows:    {}", dataset.row_count())?;
    writeln!(out, "columns: {}", metadata.columns.len())?;

    let width = metadata
        .columns
        .iter()
        .map(|c| c.name.chars().count())
        .max()
        .unwrap_or(0);
    for (i, column) in metadata.columns.iter().enumerate() {
        writeln!(
            out,
            "  {:>3}  {:<width$}  {}{}",
            i + 1,
            column.name,
            column.column_type,
            if column.nullable { "" } else { " not null" },
        )?;
    }
    Ok(())
}

pub(crate) fn row(out: &mut dyn Write, index: u64, cells: &[(String, String)]) -> io::Result<()> {
    writeln!(out, "row {index}")?;
    let width = cells.iter().map(|(n, _)| n.chars().count()).max().unwrap_or(0);
    for (name, raw) in cells {
        writeln!(out, "  {name:<width$}  {raw}")?;
    }
    Ok(())
}

pub(crate) fn summaries(out: &mut dyn Write, summaries: &[ColumnSummary]) -> io::Result<()> {
    for (i, summary) in summaries.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{} ({})", summary.column, summary.column_type)?;
        match &summary.summary {
            Summary::Numeric(s) => {
                let lines = [
                    ("count", s.count.to_string()),
                    ("nulls", s.nulls.to_string()),
                    ("missing %", format!("{:.2}", s.missing_percentage)),
                    ("min", number(s.min)),
                    ("q1", number(s.q1)),
                    ("median", number(s.median)),
                    ("q3", number(s.q3)),
                    ("max", number(s.max)),
                    ("mean", number(s.mean)),
                    ("stddev", number(s.stddev)),
                ];
                for (label, value) in lines {
                    writeln!(out, "  {label:<10} {value}")?;
                }
            }
            Summary::Categorical(s) => {
                writeln!(out, "  {:<10} {}", "count", s.count)?;
                writeln!(out, "  {:<10} {}", "nulls", s.nulls)?;
                writeln!(out, "  {:<10} {:.2}", "missing %", s.missing_percentage)?;
                writeln!(out, "  {:<10} {}", "distinct", s.distinct)?;
                if let Some(mode) = &s.mode {
                    writeln!(out, "  {:<10} {mode}", "mode")?;
                }
                for f in &s.top {
                    writeln!(out, "    {:>8}  {:>6.2}%  {}", f.count, f.percentage, f.value)?;
                }
            }
        }
        log::debug!(
            "column `{}`: {} passes, {} cells read",
            summary.column,
            summary.scan.passes,
            summary.scan.cells_read
        );
    }
    Ok(())
}
