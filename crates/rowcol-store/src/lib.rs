//! Directory-backed columnar store.
//!
//! Every cell of an imported CSV lives in its own small file at
//! `<root>/<column>/rows_<start>-<end>/<row>`, holding the raw text. Types come from the
//! dataset's `_metadata.json` and are re-applied on every read. Nothing here keeps a whole
//! column in memory:
//! - [`import_csv`] streams a CSV into a new store (all-or-nothing)
//! - [`Dataset`] opens a store and checks that every column agrees on the row count
//! - [`ColumnCursor`] / [`AlignedCursor`] read cells one at a time, restartable
//! - [`export_csv`] streams a store back out as CSV

#![forbid(unsafe_code)]

mod cursor;
mod dataset;
mod error;
mod export;
mod import;
mod infer;
mod integrity;
mod layout;
mod metadata;
mod types;

pub use crate::cursor::{AlignedCursor, AlignedRow, Cell, ColumnCursor, ReadStats};
pub use crate::dataset::{Dataset, OpenOptions};
pub use crate::error::{Address, Result, StoreError};
pub use crate::export::{export_csv, export_csv_to_path, ExportOptions};
pub use crate::import::{
    import_csv, infer_metadata, write_inferred_metadata, ImportOptions, ImportSummary,
    MetadataSource, TextEncoding,
};
pub use crate::infer::{infer_from_sample, InferenceIssue, InferenceReport, SampleCounts};
pub use crate::integrity::{sha256_file, DigestFileVerifier, IntegrityVerifier};
pub use crate::layout::{
    decode_column_dir, encode_column_dir, Layout, RowIndices, INCOMPLETE_MARKER, METADATA_FILE,
    SOURCE_FILE,
};
pub use crate::metadata::{
    ColumnMeta, Metadata, Provenance, DEFAULT_ROWS_PER_GROUP, FORMAT_VERSION,
};
pub use crate::types::{parse_cell, parse_integer, ColumnType, ParseFacts, Value, DEFAULT_MAX_LENGTH};
