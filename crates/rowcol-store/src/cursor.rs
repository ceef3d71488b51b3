//! Forward-only, restartable readers over one column (or several in lock step).
//!
//! A cursor keeps only its next row index and counters between calls: each call to
//! `next` reads exactly one cell file and re-parses it under the column's type.

use crate::dataset::Dataset;
use crate::error::{Result, StoreError};
use crate::layout::Layout;
use crate::metadata::ColumnMeta;
use crate::types::{parse_cell, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub row: u64,
    pub raw: String,
    pub value: Value,
}

/// Instrumentation counters for a cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Scans that reached the end of the column.
    pub passes: u64,
    pub cells_read: u64,
}

impl std::ops::Add for ReadStats {
    type Output = ReadStats;

    fn add(self, rhs: ReadStats) -> ReadStats {
        ReadStats {
            passes: self.passes + rhs.passes,
            cells_read: self.cells_read + rhs.cells_read,
        }
    }
}

pub struct ColumnCursor<'a> {
    layout: &'a Layout,
    meta: &'a ColumnMeta,
    rows: u64,
    next_row: u64,
    done: bool,
    stats: ReadStats,
}

impl<'a> ColumnCursor<'a> {
    pub fn open(dataset: &'a Dataset, column: &str) -> Result<Self> {
        Ok(Self {
            layout: dataset.layout(),
            meta: dataset.column(column)?,
            rows: dataset.row_count(),
            next_row: 0,
            done: false,
            stats: ReadStats::default(),
        })
    }

    pub fn column(&self) -> &'a ColumnMeta {
        self.meta
    }

    pub fn stats(&self) -> ReadStats {
        self.stats
    }

    /// Restart the scan from row 0.
    pub fn reset(&mut self) {
        self.next_row = 0;
        self.done = false;
    }

    /// Read the next cell, or `None` once every row has been read.
    ///
    /// A cell missing before the expected end, or present past it, is a
    /// [`StoreError::RowMisalignment`].
    pub fn next_cell(&mut self) -> Result<Option<Cell>> {
        if self.done {
            return Ok(None);
        }
        let result = self.read_next();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn read_next(&mut self) -> Result<Option<Cell>> {
        let name = &self.meta.name;
        let row = self.next_row;
        if row == self.rows {
            if self.layout.read_cell(name, row)?.is_some() {
                return Err(StoreError::misaligned(
                    name,
                    format!("unexpected cell at row {row} past the end of {} rows", self.rows),
                ));
            }
            self.stats.passes += 1;
            return Ok(None);
        }

        let raw = self.layout.read_cell(name, row)?.ok_or_else(|| {
            StoreError::misaligned(
                name,
                format!("missing cell at row {row} (expected {} rows)", self.rows),
            )
        })?;
        let value = parse_cell(&raw, self.meta, row)?;
        self.next_row += 1;
        self.stats.cells_read += 1;
        Ok(Some(Cell { row, raw, value }))
    }
}

impl Iterator for ColumnCursor<'_> {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_cell().transpose()
    }
}

/// One row across the columns of an [`AlignedCursor`], in the order they were requested.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedRow {
    pub row: u64,
    pub cells: Vec<Cell>,
}

/// Several column cursors advanced in row-index lock step.
pub struct AlignedCursor<'a> {
    cursors: Vec<ColumnCursor<'a>>,
    done: bool,
}

impl<'a> AlignedCursor<'a> {
    pub fn open<S: AsRef<str>>(dataset: &'a Dataset, columns: &[S]) -> Result<Self> {
        let cursors = columns
            .iter()
            .map(|c| ColumnCursor::open(dataset, c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cursors,
            done: false,
        })
    }

    pub fn reset(&mut self) {
        self.cursors.iter_mut().for_each(ColumnCursor::reset);
        self.done = false;
    }

    pub fn stats(&self) -> ReadStats {
        self.cursors
            .iter()
            .map(ColumnCursor::stats)
            .fold(ReadStats::default(), |a, b| a + b)
    }

    pub fn next_row(&mut self) -> Result<Option<AlignedRow>> {
        if self.done || self.cursors.is_empty() {
            return Ok(None);
        }
        let result = self.read_next();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn read_next(&mut self) -> Result<Option<AlignedRow>> {
        let mut cells = Vec::with_capacity(self.cursors.len());
        let mut ended: Option<&str> = None;
        for cursor in &mut self.cursors {
            match cursor.next_cell()? {
                Some(cell) => cells.push(cell),
                None => {
                    let meta: &'a ColumnMeta = cursor.meta;
                    ended = Some(meta.name.as_str());
                }
            }
        }

        match (ended, cells.first()) {
            (None, Some(first)) => {
                let row = first.row;
                if let Some(odd) = cells.iter().position(|c| c.row != row) {
                    return Err(StoreError::misaligned(
                        &self.cursors[odd].meta.name,
                        format!("at row {} while other columns are at row {row}", cells[odd].row),
                    ));
                }
                Ok(Some(AlignedRow { row, cells }))
            }
            (Some(_), None) => Ok(None),
            (Some(short), Some(first)) => Err(StoreError::misaligned(
                short,
                format!("ended before row {} present in other columns", first.row),
            )),
            (None, None) => Ok(None),
        }
    }
}

impl Iterator for AlignedCursor<'_> {
    type Item = Result<AlignedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
