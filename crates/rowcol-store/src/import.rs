use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ByteRecord;
use encoding_rs::WINDOWS_1252;

use crate::error::{Address, Result, StoreError};
use crate::infer::{infer_from_sample, InferenceIssue, InferenceReport};
use crate::integrity::sha256_file;
use crate::layout::{Layout, INCOMPLETE_MARKER};
use crate::metadata::{ColumnMeta, Metadata, Provenance, DEFAULT_ROWS_PER_GROUP};
use crate::types::{parse_cell, parse_integer, ParseFacts};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    /// Attempt to decode as UTF-8; if a field contains invalid UTF-8, fall back to Windows-1252.
    Auto,
    /// Decode as UTF-8 and reject invalid byte sequences.
    Utf8,
    /// Decode as Windows-1252 (aka CP-1252).
    Windows1252,
}

#[derive(Clone, Debug)]
pub struct ImportOptions {
    pub delimiter: u8,
    /// `None` decides from the first two records: a first record with fewer numeric fields
    /// than the second is a header.
    pub has_header: Option<bool>,
    /// Data rows read for type inference; the rest of the file is never buffered.
    pub sample_rows: usize,
    /// Fan-out bound of each row group directory.
    pub rows_per_group: u64,
    pub encoding: TextEncoding,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: None,
            sample_rows: 100,
            rows_per_group: DEFAULT_ROWS_PER_GROUP,
            encoding: TextEncoding::Auto,
        }
    }
}

/// Where the column types come from.
#[derive(Clone, Debug)]
pub enum MetadataSource {
    Explicit(Metadata),
    File(PathBuf),
    Infer,
}

#[derive(Clone, Debug)]
pub struct ImportSummary {
    pub root: PathBuf,
    pub rows: u64,
    pub metadata: Metadata,
    /// Present when the metadata was inferred.
    pub report: Option<InferenceReport>,
}

/// Row-at-a-time CSV reader reporting consistent record numbers.
pub(crate) struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    record: ByteRecord,
    /// 1-based number of the last record read (header included).
    record_number: u64,
    encoding: TextEncoding,
}

impl CsvSource<BufReader<File>> {
    pub(crate) fn open(path: &Path, options: &ImportOptions) -> Result<Self> {
        let file = rowcol_fs::retry_transient(|| File::open(path))
            .map_err(|err| StoreError::io(Address::File(path.to_path_buf()), err))?;
        Ok(Self::from_reader(BufReader::new(file), options))
    }
}

impl<R: Read> CsvSource<R> {
    pub(crate) fn from_reader(reader: R, options: &ImportOptions) -> Self {
        let reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            // Headers are handled here so record numbers stay consistent.
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Self {
            reader,
            record: ByteRecord::new(),
            record_number: 0,
            encoding: options.encoding,
        }
    }

    pub(crate) fn record_number(&self) -> u64 {
        self.record_number
    }

    /// Read the next record into `out`, returning `false` at end of input.
    pub(crate) fn next_row(&mut self, out: &mut Vec<String>) -> Result<bool> {
        self.record.clear();
        let has_record = self
            .reader
            .read_byte_record(&mut self.record)
            .map_err(|err| map_csv_error(err, self.record_number + 1))?;
        if !has_record {
            return Ok(false);
        }
        self.record_number += 1;

        out.clear();
        for (idx, field) in self.record.iter().enumerate() {
            let text = decode_field(field, self.record_number, idx, self.encoding)?;
            out.push(text.into_owned());
        }
        Ok(true)
    }
}

/// Column names plus the data records read while deciding whether there is a header.
pub(crate) struct Header {
    pub(crate) names: Vec<String>,
    pub(crate) has_header: bool,
    /// Set when detection could not decide and a header was assumed.
    pub(crate) assumed: bool,
    /// Data records already consumed, with their record numbers.
    pub(crate) pending: Vec<(u64, Vec<String>)>,
}

fn numeric_fields(record: &[String]) -> usize {
    let facts = ParseFacts::default();
    record
        .iter()
        .filter(|f| parse_integer(f).is_some() || facts.parse_float(f).is_some())
        .count()
}

/// `Some(true)` when the first record has fewer numeric fields than the second, `Some(false)`
/// when it has numeric fields of its own, `None` when neither record says anything.
fn detect_header(first: &[String], second: Option<&[String]>) -> Option<bool> {
    let first_numeric = numeric_fields(first);
    let second_numeric = second.map_or(0, numeric_fields);
    if first_numeric < second_numeric {
        Some(true)
    } else if first_numeric > 0 {
        Some(false)
    } else {
        None
    }
}

pub(crate) fn read_header<R: Read>(
    source: &mut CsvSource<R>,
    options: &ImportOptions,
) -> Result<Header> {
    let mut first = Vec::new();
    if !source.next_row(&mut first)? {
        return Err(StoreError::Csv {
            record: 1,
            reason: "csv input was empty".to_owned(),
        });
    }

    let mut pending = Vec::new();
    let (has_header, assumed) = match options.has_header {
        Some(given) => (given, false),
        None => {
            let mut second = Vec::new();
            let has_second = source.next_row(&mut second)?;
            let detected = detect_header(&first, has_second.then_some(second.as_slice()));
            if has_second {
                pending.push((source.record_number(), second));
            }
            match detected {
                Some(answer) => {
                    log::debug!("header row detected: {answer}");
                    (answer, false)
                }
                None => {
                    log::warn!("{}", InferenceIssue::HeaderAssumed);
                    (true, true)
                }
            }
        }
    };

    if !has_header {
        let names = (0..first.len()).map(|i| format!("Column{}", i + 1)).collect();
        pending.insert(0, (1, first));
        return Ok(Header {
            names,
            has_header,
            assumed,
            pending,
        });
    }

    let mut seen = HashSet::new();
    let names: Vec<String> = first
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            if name.is_empty() {
                format!("Column{}", i + 1)
            } else {
                name
            }
        })
        .collect();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(StoreError::DuplicateColumn(name.clone()));
        }
    }
    Ok(Header {
        names,
        has_header,
        assumed,
        pending,
    })
}

fn check_width(row: &[String], names: &[String], record: u64) -> Result<()> {
    if row.len() == names.len() {
        return Ok(());
    }
    let column = names
        .get(row.len().min(names.len().saturating_sub(1)))
        .cloned()
        .unwrap_or_default();
    Err(StoreError::RowMisalignment {
        column,
        detail: format!(
            "record {record} has {} fields, expected {}",
            row.len(),
            names.len()
        ),
    })
}

/// Read the header and up to `options.sample_rows` data rows, then infer metadata.
pub fn infer_metadata(csv_path: &Path, options: &ImportOptions) -> Result<(Metadata, InferenceReport)> {
    let mut source = CsvSource::open(csv_path, options)?;
    let header = read_header(&mut source, options)?;
    let names = header.names;

    let mut sample: Vec<Vec<String>> = Vec::new();
    for (record, row) in header.pending {
        check_width(&row, &names, record)?;
        sample.push(row);
    }
    let mut row = Vec::new();
    while sample.len() < options.sample_rows && source.next_row(&mut row)? {
        check_width(&row, &names, source.record_number())?;
        sample.push(std::mem::take(&mut row));
    }

    let (mut meta, mut report) = infer_from_sample(&names, &sample);
    if header.assumed {
        report.issues.insert(0, InferenceIssue::HeaderAssumed);
    }
    meta.rows_per_group = options.rows_per_group.max(1);
    Ok((meta, report))
}

/// Infer metadata for `csv_path` and write it to `out` for review before importing.
pub fn write_inferred_metadata(
    csv_path: &Path,
    out: &Path,
    options: &ImportOptions,
) -> Result<(Metadata, InferenceReport)> {
    let (meta, report) = infer_metadata(csv_path, options)?;
    meta.save(out)?;
    Ok((meta, report))
}

/// Convert `csv_path` into a new store at `target`.
///
/// The store is built in a hidden staging directory next to `target` and renamed into place
/// only once every cell, the metadata file and the provenance copy are written. On failure
/// the staging directory is removed; nothing usable is left at `target`.
///
/// Problems with the input keep their own error (`TypeMismatch`, `ValueTooLong`, `Csv`,
/// `RowMisalignment`, `InvalidMetadata`, `UnknownColumn`) so the offending record can be
/// found. A storage failure while building is reported as `IncompleteImport`.
pub fn import_csv(
    csv_path: &Path,
    target: &Path,
    source: MetadataSource,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    if target.exists() {
        return Err(StoreError::TargetExists(target.to_path_buf()));
    }

    let (mut metadata, report) = match source {
        MetadataSource::Explicit(meta) => (meta, None),
        MetadataSource::File(path) => (Metadata::load(&path)?, None),
        MetadataSource::Infer => {
            let (meta, report) = infer_metadata(csv_path, options)?;
            (meta, Some(report))
        }
    };
    metadata.validate()?;

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dataset_addr = || Address::Dataset(target.to_path_buf());
    fs::create_dir_all(parent).map_err(|err| StoreError::io(dataset_addr(), err))?;

    let target_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_owned());
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{target_name}.importing-"))
        .tempdir_in(parent)
        .map_err(|err| StoreError::io(dataset_addr(), err))?;

    log::debug!(
        "importing {} into staging directory {}",
        csv_path.display(),
        staging.path().display()
    );

    let rows = match build_store(csv_path, staging.path(), &mut metadata, options) {
        Ok(rows) => rows,
        Err(err) => {
            let err = match err {
                StoreError::StorageIo { address, source } => StoreError::IncompleteImport {
                    path: target.to_path_buf(),
                    reason: format!("storage I/O failure at {address}: {source}"),
                },
                other => other,
            };
            if let Err(cleanup) = staging.close() {
                log::warn!("failed to remove staging directory after aborted import: {cleanup}");
            }
            return Err(err);
        }
    };

    let layout = Layout::new(staging.path(), metadata.rows_per_group);
    fs::remove_file(layout.incomplete_marker_path())
        .and_then(|()| rowcol_fs::sync_dir(staging.path()))
        .and_then(|()| fs::rename(staging.path(), target))
        .map_err(|err| StoreError::IncompleteImport {
            path: target.to_path_buf(),
            reason: format!("failed to publish store: {err}"),
        })?;
    let _ = rowcol_fs::sync_dir(parent);
    // The staging path no longer exists; dropping the guard is a no-op.
    drop(staging);

    log::info!(
        "imported {rows} rows x {} columns into {}",
        metadata.columns.len(),
        target.display()
    );

    Ok(ImportSummary {
        root: target.to_path_buf(),
        rows,
        metadata,
        report,
    })
}

fn build_store(
    csv_path: &Path,
    root: &Path,
    metadata: &mut Metadata,
    options: &ImportOptions,
) -> Result<u64> {
    let layout = Layout::new(root, metadata.rows_per_group);
    let root_addr = || Address::Dataset(root.to_path_buf());
    rowcol_fs::atomic_write_bytes(layout.incomplete_marker_path(), INCOMPLETE_MARKER.as_bytes())
        .map_err(|err| StoreError::io(root_addr(), err))?;

    let mut source = CsvSource::open(csv_path, options)?;
    let Header {
        names,
        has_header,
        pending,
        ..
    } = read_header(&mut source, options)?;
    let columns = map_columns(&names, metadata, has_header)?;

    for meta in &columns {
        fs::create_dir(layout.column_dir(&meta.name)).map_err(|err| {
            StoreError::io(
                Address::Column {
                    column: meta.name.clone(),
                },
                err,
            )
        })?;
    }

    let mut rows: u64 = 0;
    let write_row = |row: &[String], record: u64, rows: &mut u64| -> Result<()> {
        check_width(row, &names, record)?;
        for (raw, meta) in row.iter().zip(&columns) {
            parse_cell(raw, meta, *rows)?;
            layout.write_cell(&meta.name, *rows, raw)?;
        }
        *rows += 1;
        if *rows % 100_000 == 0 {
            log::debug!("imported {rows} rows");
        }
        Ok(())
    };

    for (record, row) in &pending {
        write_row(row.as_slice(), *record, &mut rows)?;
    }
    let mut row = Vec::new();
    while source.next_row(&mut row)? {
        write_row(row.as_slice(), source.record_number(), &mut rows)?;
    }

    // Cell files are synced as they are created; their directory entries are synced here,
    // before the marker comes off.
    for meta in &columns {
        layout.sync_column(&meta.name)?;
    }
    log::debug!("synced {} columns", columns.len());

    let source_copy = layout.source_path();
    let copy_addr = || Address::File(source_copy.clone());
    fs::copy(csv_path, &source_copy).map_err(|err| StoreError::io(copy_addr(), err))?;
    File::open(&source_copy)
        .and_then(|file| file.sync_all())
        .map_err(|err| StoreError::io(copy_addr(), err))?;
    let size_bytes = fs::metadata(&source_copy)
        .map_err(|err| StoreError::io(copy_addr(), err))?
        .len();
    let sha256 = sha256_file(&source_copy).map_err(|err| StoreError::io(copy_addr(), err))?;

    metadata.row_count = Some(rows);
    metadata.provenance = Some(Provenance {
        file_name: csv_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size_bytes,
        sha256,
    });
    metadata.save(layout.metadata_path())?;
    Ok(rows)
}

/// Match CSV columns to metadata columns: by name when the file has a header, by position
/// otherwise.
fn map_columns(names: &[String], metadata: &Metadata, has_header: bool) -> Result<Vec<ColumnMeta>> {
    if !has_header {
        if names.len() != metadata.columns.len() {
            return Err(StoreError::InvalidMetadata(format!(
                "csv has {} columns but metadata describes {}",
                names.len(),
                metadata.columns.len()
            )));
        }
        return Ok(metadata.columns.clone());
    }

    let columns = names
        .iter()
        .map(|name| metadata.column(name).cloned())
        .collect::<Result<Vec<_>>>()?;
    if let Some(missing) = metadata
        .columns
        .iter()
        .find(|c| !names.iter().any(|n| n == &c.name))
    {
        return Err(StoreError::InvalidMetadata(format!(
            "metadata column `{}` is not present in the csv header",
            missing.name
        )));
    }
    Ok(columns)
}

fn decode_field<'a>(
    field: &'a [u8],
    record: u64,
    column: usize,
    encoding: TextEncoding,
) -> Result<Cow<'a, str>> {
    // UTF-8 BOM at the start of the file, common in spreadsheet exports.
    let field = if record == 1 && column == 0 && field.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &field[3..]
    } else {
        field
    };

    match encoding {
        TextEncoding::Utf8 => std::str::from_utf8(field)
            .map(Cow::Borrowed)
            .map_err(|e| StoreError::Csv {
                record,
                reason: format!("invalid UTF-8 in field {}: {e}", column + 1),
            }),
        TextEncoding::Windows1252 => {
            let (cow, _, _) = WINDOWS_1252.decode(field);
            Ok(cow)
        }
        TextEncoding::Auto => match std::str::from_utf8(field) {
            Ok(s) => Ok(Cow::Borrowed(s)),
            Err(_) => {
                let (cow, _, _) = WINDOWS_1252.decode(field);
                Ok(cow)
            }
        },
    }
}

fn map_csv_error(err: csv::Error, fallback_record: u64) -> StoreError {
    let reason = err.to_string();
    let pos = err.position().cloned();

    match err.into_kind() {
        csv::ErrorKind::Io(e) => StoreError::io(Address::File(PathBuf::from("<csv input>")), e),
        _ => StoreError::Csv {
            record: pos.map(|p| p.record() + 1).unwrap_or(fallback_record),
            reason,
        },
    }
}
