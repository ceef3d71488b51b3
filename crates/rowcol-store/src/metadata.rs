use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Address, Result, StoreError};
use crate::types::{ColumnType, ParseFacts};

pub const FORMAT_VERSION: u32 = 1;
pub const DEFAULT_ROWS_PER_GROUP: u64 = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub facts: ParseFacts,
}

fn default_nullable() -> bool {
    true
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            facts: ParseFacts::default(),
        }
    }
}

/// Where the dataset came from. The original CSV is kept next to the store but never read
/// again for queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub file_name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// The sidecar description of a dataset.
///
/// Columns are listed in display order; storage order is irrelevant since every column
/// lives in its own directory. `row_count` is a cache: the directory walk is the ground
/// truth and [`crate::Dataset::open`] checks the two agree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default = "default_rows_per_group")]
    pub rows_per_group: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    pub columns: Vec<ColumnMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

fn default_rows_per_group() -> u64 {
    DEFAULT_ROWS_PER_GROUP
}

impl Metadata {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            rows_per_group: DEFAULT_ROWS_PER_GROUP,
            row_count: None,
            columns,
            provenance: None,
        }
    }

    pub fn column(&self, name: &str) -> Result<&ColumnMeta> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownColumn(name.to_owned()))
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownColumn(name.to_owned()))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(StoreError::InvalidMetadata(format!(
                "unsupported format version {}",
                self.format_version
            )));
        }
        if self.rows_per_group == 0 {
            return Err(StoreError::InvalidMetadata(
                "rows_per_group must be at least 1".to_owned(),
            ));
        }
        if self.columns.is_empty() {
            return Err(StoreError::InvalidMetadata("no columns".to_owned()));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(StoreError::InvalidMetadata(
                    "column names must not be empty".to_owned(),
                ));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(StoreError::DuplicateColumn(column.name.clone()));
            }
            let sep = column.facts.decimal_separator;
            if sep.is_ascii_digit() || matches!(sep, 'e' | 'E' | '+' | '-') {
                return Err(StoreError::InvalidMetadata(format!(
                    "column `{}` has an unusable decimal separator {:?}",
                    column.name, column.facts.decimal_separator
                )));
            }
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let meta: Metadata = serde_json::from_str(text)
            .map_err(|err| StoreError::InvalidMetadata(err.to_string()))?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn to_json_pretty(&self) -> String {
        // Serializing plain data structures with string keys cannot fail.
        let mut text = serde_json::to_string_pretty(self).unwrap_or_default();
        text.push('\n');
        text
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = rowcol_fs::retry_transient(|| std::fs::read_to_string(path))
            .map_err(|err| StoreError::io(Address::File(path.to_path_buf()), err))?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        rowcol_fs::atomic_write_bytes(path, self.to_json_pretty().as_bytes())
            .map_err(|err| StoreError::io(Address::File(path.to_path_buf()), err))
    }
}
