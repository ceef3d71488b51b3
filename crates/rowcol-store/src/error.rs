use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ColumnType;

/// Logical location an I/O failure happened at, so a bad cell can be found by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Dataset(PathBuf),
    Column { column: String },
    Cell { column: String, row: u64 },
    File(PathBuf),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Dataset(path) => write!(f, "dataset {}", path.display()),
            Address::Column { column } => write!(f, "column `{column}`"),
            Address::Cell { column, row } => write!(f, "column `{column}` row {row}"),
            Address::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("duplicate column name `{0}`")]
    DuplicateColumn(String),
    #[error("type mismatch in column `{column}` at row {row}: {text:?} is not a valid {expected}")]
    TypeMismatch {
        column: String,
        row: u64,
        text: String,
        expected: ColumnType,
    },
    #[error(
        "value too long in column `{column}` at row {row}: {len} characters exceeds the limit of {max}"
    )]
    ValueTooLong {
        column: String,
        row: u64,
        text: String,
        len: usize,
        max: usize,
    },
    #[error("row misalignment in column `{column}`: {detail}")]
    RowMisalignment { column: String, detail: String },
    #[error("integrity check failed for {}: {reason}", .path.display())]
    IntegrityCheckFailed { path: PathBuf, reason: String },
    #[error("storage I/O failure at {address}: {source}")]
    StorageIo {
        address: Address,
        #[source]
        source: io::Error,
    },
    #[error("incomplete import at {}: {reason}", .path.display())]
    IncompleteImport { path: PathBuf, reason: String },
    #[error("row {row} is out of range (dataset has {rows} rows)")]
    RowOutOfRange { row: u64, rows: u64 },
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("csv parse error at record {record}: {reason}")]
    Csv { record: u64, reason: String },
    #[error("import target already exists: {}", .0.display())]
    TargetExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(address: Address, source: io::Error) -> Self {
        StoreError::StorageIo { address, source }
    }

    pub(crate) fn misaligned(column: &str, detail: impl Into<String>) -> Self {
        StoreError::RowMisalignment {
            column: column.to_owned(),
            detail: detail.into(),
        }
    }

    /// True for errors that describe a bad value rather than a broken store.
    pub fn is_cell_error(&self) -> bool {
        matches!(
            self,
            StoreError::TypeMismatch { .. } | StoreError::ValueTooLong { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_locate_the_cell() {
        let err = StoreError::TypeMismatch {
            column: "age".to_owned(),
            row: 3,
            text: "abc".to_owned(),
            expected: ColumnType::Integer,
        };
        assert_eq!(
            err.to_string(),
            "type mismatch in column `age` at row 3: \"abc\" is not a valid integer"
        );

        let err = StoreError::io(
            Address::Cell {
                column: "age".to_owned(),
                row: 7,
            },
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "storage I/O failure at column `age` row 7: denied");
    }
}
