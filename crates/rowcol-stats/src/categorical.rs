//! Distinct-value counting that stays exact past the in-memory limit.
//!
//! Counts live in a hash map until it holds `max_in_memory` distinct values. From then on
//! the map is a pre-aggregation buffer: whenever it fills up, its entries are appended to
//! one of [`PARTITIONS`] temp files chosen by value hash. At the end each partition is
//! counted on its own, so memory is bounded by the largest partition rather than the
//! column.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, StatsError};

const PARTITIONS: usize = 16;

fn stable_hash(s: &str) -> u64 {
    // FNV-1a, stable across runs.
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

// Field order matters: the files are closed before the directory is removed.
struct Spill {
    files: Vec<BufWriter<File>>,
    paths: Vec<std::path::PathBuf>,
    _dir: tempfile::TempDir,
}

impl Spill {
    fn create(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("rowcol-spill-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        let mut files = Vec::with_capacity(PARTITIONS);
        let mut paths = Vec::with_capacity(PARTITIONS);
        for i in 0..PARTITIONS {
            let path = dir.path().join(format!("part-{i:02}"));
            files.push(BufWriter::new(File::create(&path)?));
            paths.push(path);
        }
        Ok(Self {
            files,
            paths,
            _dir: dir,
        })
    }

    fn write(&mut self, value: &str, count: u64) -> io::Result<()> {
        let part = (stable_hash(value) % PARTITIONS as u64) as usize;
        let out = &mut self.files[part];
        out.write_all(&count.to_le_bytes())?;
        out.write_all(&(value.len() as u64).to_le_bytes())?;
        out.write_all(value.as_bytes())
    }
}

fn read_u64(reader: &mut impl Read) -> io::Result<Option<u64>> {
    let mut buf = [0u8; 8];
    match reader.read_exact(&mut buf) {
        Ok(()) => Ok(Some(u64::from_le_bytes(buf))),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err),
    }
}

/// Final tallies: total non-null values, distinct values and the `top_n` most frequent.
#[derive(Clone, Debug, PartialEq)]
pub struct Tally {
    pub total: u64,
    pub distinct: u64,
    /// Descending count, ties broken by ascending value.
    pub top: Vec<(String, u64)>,
    pub spilled: bool,
}

pub struct FrequencyCounter<'a> {
    counts: HashMap<String, u64>,
    max_in_memory: usize,
    spill_dir: Option<&'a Path>,
    spill: Option<Spill>,
    total: u64,
}

impl<'a> FrequencyCounter<'a> {
    pub fn new(max_in_memory: usize, spill_dir: Option<&'a Path>) -> Self {
        Self {
            counts: HashMap::new(),
            max_in_memory: max_in_memory.max(1),
            spill_dir,
            spill: None,
            total: 0,
        }
    }

    pub fn insert(&mut self, value: &str) -> Result<()> {
        self.total += 1;
        if let Some(count) = self.counts.get_mut(value) {
            *count += 1;
            return Ok(());
        }
        if self.counts.len() >= self.max_in_memory {
            self.flush()?;
        }
        self.counts.insert(value.to_owned(), 1);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.spill.is_none() {
            log::warn!(
                "more than {} distinct values, spilling frequency counts to disk",
                self.max_in_memory
            );
            self.spill = Some(Spill::create(self.spill_dir).map_err(StatsError::Spill)?);
        }
        if let Some(spill) = self.spill.as_mut() {
            for (value, count) in self.counts.drain() {
                spill.write(&value, count).map_err(StatsError::Spill)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self, top_n: usize) -> Result<Tally> {
        let mut top = TopN::new(top_n);
        let Some(mut spill) = self.spill.take() else {
            let distinct = self.counts.len() as u64;
            self.counts.into_iter().for_each(|(v, c)| top.offer(v, c));
            return Ok(Tally {
                total: self.total,
                distinct,
                top: top.into_sorted(),
                spilled: false,
            });
        };

        for (value, count) in self.counts.drain() {
            spill.write(&value, count).map_err(StatsError::Spill)?;
        }
        for file in &mut spill.files {
            file.flush().map_err(StatsError::Spill)?;
        }

        let mut distinct = 0u64;
        for path in &spill.paths {
            let mut reader = BufReader::new(File::open(path).map_err(StatsError::Spill)?);
            let mut partition: HashMap<String, u64> = HashMap::new();
            while let Some(count) = read_u64(&mut reader).map_err(StatsError::Spill)? {
                let len = read_u64(&mut reader)
                    .map_err(StatsError::Spill)?
                    .ok_or_else(|| StatsError::Spill(io::ErrorKind::UnexpectedEof.into()))?;
                let mut bytes = vec![0u8; len as usize];
                reader.read_exact(&mut bytes).map_err(StatsError::Spill)?;
                let value = String::from_utf8(bytes)
                    .map_err(|err| StatsError::Spill(io::Error::new(io::ErrorKind::InvalidData, err)))?;
                *partition.entry(value).or_insert(0) += count;
            }
            distinct += partition.len() as u64;
            partition.into_iter().for_each(|(v, c)| top.offer(v, c));
        }

        Ok(Tally {
            total: self.total,
            distinct,
            top: top.into_sorted(),
            spilled: true,
        })
    }
}

fn rank(a: &(String, u64), b: &(String, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Keeps the best `n` entries seen so far.
struct TopN {
    n: usize,
    entries: Vec<(String, u64)>,
}

impl TopN {
    fn new(n: usize) -> Self {
        Self {
            n,
            entries: Vec::with_capacity(n + 1),
        }
    }

    fn offer(&mut self, value: String, count: u64) {
        if self.n == 0 {
            return;
        }
        let entry = (value, count);
        let pos = self
            .entries
            .binary_search_by(|held| rank(held, &entry))
            .unwrap_or_else(|pos| pos);
        if pos < self.n {
            self.entries.insert(pos, entry);
            self.entries.truncate(self.n);
        }
    }

    fn into_sorted(self) -> Vec<(String, u64)> {
        self.entries
    }
}
