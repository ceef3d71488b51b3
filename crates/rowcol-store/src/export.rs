use std::io::Write;
use std::path::Path;

use crate::dataset::Dataset;
use crate::error::{Address, Result, StoreError};

#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub include_header: bool,
    pub delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_header: true,
            delimiter: b',',
        }
    }
}

/// Write every row of `dataset` as CSV, returning the number of data rows written.
///
/// The store is walked for alignment before the first byte is written, so a broken store
/// never produces a truncated export.
pub fn export_csv<W: Write>(dataset: &Dataset, out: W, options: &ExportOptions) -> Result<u64> {
    dataset.verify()?;

    let out_addr = || Address::Dataset(dataset.root().to_path_buf());
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(out);
    let names: Vec<&str> = dataset.column_names().collect();
    if options.include_header {
        writer
            .write_record(&names)
            .map_err(|err| StoreError::io(out_addr(), err.into()))?;
    }

    let mut rows = 0u64;
    for row in dataset.aligned(names.as_slice())? {
        let row = row?;
        writer
            .write_record(row.cells.iter().map(|cell| cell.raw.as_bytes()))
            .map_err(|err| StoreError::io(out_addr(), err.into()))?;
        rows += 1;
    }
    writer
        .flush()
        .map_err(|err| StoreError::io(out_addr(), err))?;
    log::debug!("exported {rows} rows from {}", dataset.root().display());
    Ok(rows)
}

/// [`export_csv`] into a file that only appears once complete.
pub fn export_csv_to_path(dataset: &Dataset, path: &Path, options: &ExportOptions) -> Result<u64> {
    rowcol_fs::atomic_write(path, |file| export_csv(dataset, file, options)).map_err(|err| {
        match err {
            rowcol_fs::AtomicWriteError::Io(err) => {
                StoreError::io(Address::File(path.to_path_buf()), err)
            }
            rowcol_fs::AtomicWriteError::Writer(err) => err,
        }
    })
}
