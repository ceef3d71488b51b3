use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::cursor::{AlignedCursor, ColumnCursor};
use crate::error::{Address, Result, StoreError};
use crate::integrity::{require_verified, IntegrityVerifier};
use crate::layout::{decode_column_dir, Layout};
use crate::metadata::{ColumnMeta, Metadata};

#[derive(Clone)]
pub struct OpenOptions {
    /// Walk every column directory on open and fail fast on row misalignment.
    pub verify_alignment: bool,
    /// When set, the metadata file must pass this verifier before anything is read.
    pub integrity: Option<Arc<dyn IntegrityVerifier>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            verify_alignment: true,
            integrity: None,
        }
    }
}

impl std::fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenOptions")
            .field("verify_alignment", &self.verify_alignment)
            .field("integrity", &self.integrity.is_some())
            .finish()
    }
}

/// A read-only handle on an imported store.
///
/// Holds only the metadata record and the row count; cell data is always read through
/// cursors.
#[derive(Clone, Debug)]
pub struct Dataset {
    layout: Layout,
    metadata: Metadata,
    rows: u64,
}

impl Dataset {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(root, &OpenOptions::default())
    }

    pub fn open_with(root: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let root = root.as_ref();
        let root_only = Layout::new(root, 1);

        if !root.is_dir() {
            return Err(StoreError::io(
                Address::Dataset(root.to_path_buf()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "dataset directory not found"),
            ));
        }
        if root_only.incomplete_marker_path().exists() {
            return Err(StoreError::IncompleteImport {
                path: root.to_path_buf(),
                reason: "store is marked incomplete".to_owned(),
            });
        }
        if let Some(verifier) = &options.integrity {
            require_verified(verifier.as_ref(), &root_only.metadata_path())?;
        }

        let metadata = Metadata::load(root_only.metadata_path())?;
        let layout = Layout::new(root, metadata.rows_per_group);
        let mut dataset = Dataset {
            layout,
            rows: metadata.row_count.unwrap_or(0),
            metadata,
        };

        if options.verify_alignment || dataset.metadata.row_count.is_none() {
            dataset.rows = dataset.verify()?;
        }
        log::debug!(
            "opened dataset {} ({} columns, {} rows)",
            root.display(),
            dataset.metadata.columns.len(),
            dataset.rows
        );
        Ok(dataset)
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn row_count(&self) -> u64 {
        self.rows
    }

    pub fn column(&self, name: &str) -> Result<&ColumnMeta> {
        self.metadata.column(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.metadata.column_names()
    }

    /// Walk the whole store and return the row count every column agrees on.
    ///
    /// This is the ground truth the cached `row_count` in the metadata is checked against.
    pub fn verify(&self) -> Result<u64> {
        let root_addr = || Address::Dataset(self.root().to_path_buf());
        for entry in fs::read_dir(self.root()).map_err(|err| StoreError::io(root_addr(), err))? {
            let entry = entry.map_err(|err| StoreError::io(root_addr(), err))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('_') {
                continue;
            }
            let known = decode_column_dir(&name)
                .is_some_and(|column| self.metadata.column(&column).is_ok());
            if !known {
                return Err(StoreError::misaligned(
                    &name,
                    "directory does not belong to any column in the metadata",
                ));
            }
        }

        let rows = self.layout.dataset_row_count(self.metadata.column_names())?;
        if let Some(cached) = self.metadata.row_count {
            if cached != rows {
                let first = self.metadata.column_names().next().unwrap_or_default();
                return Err(StoreError::misaligned(
                    first,
                    format!("metadata records {cached} rows but the store holds {rows}"),
                ));
            }
        }
        Ok(rows)
    }

    pub fn cursor(&self, column: &str) -> Result<ColumnCursor<'_>> {
        ColumnCursor::open(self, column)
    }

    pub fn aligned<S: AsRef<str>>(&self, columns: &[S]) -> Result<AlignedCursor<'_>> {
        AlignedCursor::open(self, columns)
    }

    /// Raw text of one row across all columns, in display order.
    pub fn row(&self, row: u64) -> Result<Vec<(String, String)>> {
        if row >= self.rows {
            return Err(StoreError::RowOutOfRange {
                row,
                rows: self.rows,
            });
        }
        self.metadata
            .columns
            .iter()
            .map(|meta| {
                let raw = self.layout.read_cell(&meta.name, row)?.ok_or_else(|| {
                    StoreError::misaligned(&meta.name, format!("missing cell at row {row}"))
                })?;
                Ok((meta.name.clone(), raw))
            })
            .collect()
    }
}
