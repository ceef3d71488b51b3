//! Mapping between logical `(column, row)` addresses and paths under a dataset root.
//!
//! ```text
//! <root>/_metadata.json
//! <root>/_source.csv
//! <root>/<column>/rows_0-999/0
//! <root>/<column>/rows_0-999/1
//! ...
//! <root>/<column>/rows_1000-1999/1000
//! ```
//!
//! Column directories are the column name with a small set of characters percent-encoded;
//! reserved root entries all start with `_`, which is always encoded at the start of a
//! column name, so the two namespaces cannot collide. Row groups bound the fan-out of any
//! single directory to `rows_per_group` entries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Address, Result, StoreError};

pub const METADATA_FILE: &str = "_metadata.json";
pub const SOURCE_FILE: &str = "_source.csv";
pub const INCOMPLETE_MARKER: &str = "_INCOMPLETE";

const GROUP_PREFIX: &str = "rows_";

fn needs_escape(ch: char, first: bool) -> bool {
    matches!(ch, '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        || ch.is_control()
        || (first && matches!(ch, '.' | '_'))
}

/// Encode a column name as a single path component.
pub fn encode_column_dir(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, ch) in name.chars().enumerate() {
        if needs_escape(ch, idx == 0) {
            let mut buf = [0u8; 4];
            for b in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Inverse of [`encode_column_dir`]. Returns `None` for any component the encoder could not
/// have produced, so the mapping stays unambiguous.
pub fn decode_column_dir(component: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(component.len());
    let raw = component.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let hex = component.get(i + 1..i + 3)?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    let name = String::from_utf8(bytes).ok()?;
    (!name.is_empty() && encode_column_dir(&name) == component).then_some(name)
}

#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
    rows_per_group: u64,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, rows_per_group: u64) -> Self {
        Self {
            root: root.into(),
            rows_per_group: rows_per_group.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rows_per_group(&self) -> u64 {
        self.rows_per_group
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn source_path(&self) -> PathBuf {
        self.root.join(SOURCE_FILE)
    }

    pub fn incomplete_marker_path(&self) -> PathBuf {
        self.root.join(INCOMPLETE_MARKER)
    }

    pub fn column_dir(&self, column: &str) -> PathBuf {
        self.root.join(encode_column_dir(column))
    }

    fn group_start(&self, row: u64) -> u64 {
        row / self.rows_per_group * self.rows_per_group
    }

    pub fn group_name(&self, row: u64) -> String {
        let start = self.group_start(row);
        let end = start.saturating_add(self.rows_per_group - 1);
        format!("{GROUP_PREFIX}{start}-{end}")
    }

    /// Parse a group directory name back into its `(start, end)` row range.
    fn parse_group_name(&self, name: &str) -> Option<(u64, u64)> {
        let (start, end) = name.strip_prefix(GROUP_PREFIX)?.split_once('-')?;
        let start = parse_canonical_u64(start)?;
        let end = parse_canonical_u64(end)?;
        (self.group_name(start) == name).then_some((start, end))
    }

    pub fn resolve(&self, column: &str, row: u64) -> PathBuf {
        self.column_dir(column)
            .join(self.group_name(row))
            .join(row.to_string())
    }

    /// Inverse of [`Layout::resolve`]: only paths `resolve` could have produced map back.
    pub fn parse_path(&self, path: &Path) -> Option<(String, u64)> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut parts = rel.components().map(|c| c.as_os_str().to_str());
        let column = decode_column_dir(parts.next()??)?;
        let group = parts.next()??;
        let row = parse_canonical_u64(parts.next()??)?;
        if parts.next().is_some() || self.group_name(row) != group {
            return None;
        }
        Some((column, row))
    }

    /// Resolve a cell path, creating the column and group directories if needed.
    pub fn allocate(&self, column: &str, row: u64) -> Result<PathBuf> {
        let path = self.resolve(column, row);
        if let Some(group_dir) = path.parent() {
            rowcol_fs::retry_transient(|| fs::create_dir_all(group_dir)).map_err(|err| {
                StoreError::io(
                    Address::Cell {
                        column: column.to_owned(),
                        row,
                    },
                    err,
                )
            })?;
        }
        Ok(path)
    }

    /// Create the file for one cell. The cell becomes visible complete or not at all, and
    /// writing a cell that already exists fails with `AlreadyExists`.
    pub fn write_cell(&self, column: &str, row: u64, raw: &str) -> Result<()> {
        let address = || Address::Cell {
            column: column.to_owned(),
            row,
        };
        let mut content = String::with_capacity(raw.len() + 1);
        content.push_str(raw);
        content.push('\n');

        let path = self.resolve(column, row);
        match rowcol_fs::retry_transient(|| rowcol_fs::atomic_create(&path, content.as_bytes())) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let path = self.allocate(column, row)?;
                rowcol_fs::retry_transient(|| rowcol_fs::atomic_create(&path, content.as_bytes()))
                    .map_err(|err| StoreError::io(address(), err))
            }
            other => other.map_err(|err| StoreError::io(address(), err)),
        }
    }

    /// Read one cell's raw text, `None` if the cell file does not exist.
    ///
    /// Every cell is written with a trailing `\n`; a file without it was cut short and is
    /// reported as `InvalidData`, never returned as a value.
    pub fn read_cell(&self, column: &str, row: u64) -> Result<Option<String>> {
        let address = || Address::Cell {
            column: column.to_owned(),
            row,
        };
        let path = self.resolve(column, row);
        let bytes = match rowcol_fs::retry_transient(|| fs::read(&path)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(address(), err)),
        };
        let mut text = String::from_utf8(bytes).map_err(|err| {
            StoreError::io(address(), io::Error::new(io::ErrorKind::InvalidData, err))
        })?;
        if text.pop() != Some('\n') {
            return Err(StoreError::io(
                address(),
                io::Error::new(io::ErrorKind::InvalidData, "truncated cell: missing terminator"),
            ));
        }
        Ok(Some(text))
    }

    /// Lazily enumerate the row indices present for `column`, in order.
    ///
    /// Holds at most one group's entries at a time. Enumeration stops at the first missing
    /// group; [`Layout::row_count`] is the check that also catches gaps and stray entries.
    pub fn enumerate(&self, column: &str) -> RowIndices {
        RowIndices {
            layout: self.clone(),
            column: column.to_owned(),
            next_group_start: Some(0),
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// Count the rows of `column` by walking its directory tree.
    ///
    /// Memory is bounded by one group's fan-out. Any entry that is not a canonical group or
    /// cell name, a cell in the wrong group, or a hole in the row sequence is reported as
    /// [`StoreError::RowMisalignment`].
    pub fn row_count(&self, column: &str) -> Result<u64> {
        let column_dir = self.column_dir(column);
        let col_addr = || Address::Column {
            column: column.to_owned(),
        };
        let entries = fs::read_dir(&column_dir).map_err(|err| StoreError::io(col_addr(), err))?;

        let mut total: u64 = 0;
        let mut max_row: Option<u64> = None;
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io(col_addr(), err))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some((start, end)) = self.parse_group_name(&name) else {
                return Err(StoreError::misaligned(column, format!("stray entry `{name}`")));
            };
            let (count, group_max) = self.walk_group(column, &entry.path(), start, end)?;
            if count == 0 {
                return Err(StoreError::misaligned(column, format!("empty group `{name}`")));
            }
            total += count;
            max_row = max_row.max(Some(group_max));
        }

        match max_row {
            None => Ok(0),
            Some(max_row) if max_row + 1 == total => Ok(total),
            Some(max_row) => Err(StoreError::misaligned(
                column,
                format!("found {total} cells but the highest row index is {max_row}"),
            )),
        }
    }

    /// Sync every group directory of `column`, then the column directory itself, so the
    /// cell entries survive a crash. Returns the number of groups synced.
    pub fn sync_column(&self, column: &str) -> Result<u64> {
        let column_dir = self.column_dir(column);
        let col_addr = || Address::Column {
            column: column.to_owned(),
        };
        let mut groups = 0u64;
        for entry in fs::read_dir(&column_dir).map_err(|err| StoreError::io(col_addr(), err))? {
            let entry = entry.map_err(|err| StoreError::io(col_addr(), err))?;
            let path = entry.path();
            rowcol_fs::retry_transient(|| rowcol_fs::sync_dir(&path))
                .map_err(|err| StoreError::io(Address::File(path.clone()), err))?;
            groups += 1;
        }
        rowcol_fs::retry_transient(|| rowcol_fs::sync_dir(&column_dir))
            .map_err(|err| StoreError::io(col_addr(), err))?;
        Ok(groups)
    }

    /// Walk every listed column and return the row count they all agree on (0 for none).
    pub fn dataset_row_count<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Result<u64> {
        let mut agreed: Option<(&str, u64)> = None;
        for column in columns {
            let rows = self.row_count(column)?;
            match agreed {
                None => agreed = Some((column, rows)),
                Some((first, expected)) if expected != rows => {
                    return Err(StoreError::misaligned(
                        column,
                        format!("has {rows} rows but column `{first}` has {expected}"),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(agreed.map_or(0, |(_, rows)| rows))
    }

    fn walk_group(&self, column: &str, dir: &Path, start: u64, end: u64) -> Result<(u64, u64)> {
        let addr = || Address::File(dir.to_path_buf());
        let mut count = 0u64;
        let mut max_row = start;
        for entry in fs::read_dir(dir).map_err(|err| StoreError::io(addr(), err))? {
            let entry = entry.map_err(|err| StoreError::io(addr(), err))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match parse_canonical_u64(&name) {
                Some(row) if (start..=end).contains(&row) => {
                    count += 1;
                    max_row = max_row.max(row);
                }
                _ => {
                    return Err(StoreError::misaligned(
                        column,
                        format!("stray entry `{name}` in {}", dir.display()),
                    ))
                }
            }
        }
        Ok((count, max_row))
    }
}

/// Decimal without sign or leading zeros (except `0` itself).
fn parse_canonical_u64(s: &str) -> Option<u64> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) || !s.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    s.parse().ok()
}

/// Iterator returned by [`Layout::enumerate`].
pub struct RowIndices {
    layout: Layout,
    column: String,
    next_group_start: Option<u64>,
    buffer: Vec<u64>,
    pos: usize,
}

impl RowIndices {
    fn load_next_group(&mut self) -> Result<bool> {
        let Some(start) = self.next_group_start else {
            return Ok(false);
        };
        let dir = self
            .layout
            .column_dir(&self.column)
            .join(self.layout.group_name(start));
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.next_group_start = None;
                return Ok(false);
            }
            Err(err) => return Err(StoreError::io(Address::File(dir), err)),
        };

        self.buffer.clear();
        self.pos = 0;
        let end = start.saturating_add(self.layout.rows_per_group - 1);
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io(Address::File(dir.clone()), err))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match parse_canonical_u64(&name) {
                Some(row) if (start..=end).contains(&row) => self.buffer.push(row),
                _ => {
                    return Err(StoreError::misaligned(
                        &self.column,
                        format!("stray entry `{name}` in {}", dir.display()),
                    ))
                }
            }
        }
        self.buffer.sort_unstable();
        self.next_group_start = start.checked_add(self.layout.rows_per_group);
        Ok(true)
    }
}

impl Iterator for RowIndices {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos >= self.buffer.len() {
            match self.load_next_group() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => {
                    self.next_group_start = None;
                    self.buffer.clear();
                    return Some(Err(err));
                }
            }
        }
        let row = self.buffer[self.pos];
        self.pos += 1;
        Some(Ok(row))
    }
}
