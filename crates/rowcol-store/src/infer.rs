//! Best-effort type inference over a bounded sample of rows.

use std::fmt;

use serde::Serialize;

use crate::metadata::{ColumnMeta, Metadata};
use crate::types::{parse_integer, ColumnType, ParseFacts, DEFAULT_MAX_LENGTH};

/// Per-column tallies over the non-empty sampled values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SampleCounts {
    pub non_empty: usize,
    pub empty: usize,
    pub boolean: usize,
    pub integer: usize,
    pub float: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InferenceIssue {
    /// Every sampled value was empty; the column defaulted to ShortString.
    Empty { column: String },
    /// Sampled values did not agree on a type; the column fell back to `chosen`.
    Mixed {
        column: String,
        chosen: ColumnType,
        counts: SampleCounts,
    },
    /// Nothing in the first records told names from data; the first record was taken as
    /// the header.
    HeaderAssumed,
}

impl fmt::Display for InferenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceIssue::Empty { column } => {
                write!(f, "column `{column}`: no non-empty values in sample, using short_string")
            }
            InferenceIssue::Mixed {
                column,
                chosen,
                counts,
            } => write!(
                f,
                "column `{column}`: mixed values ({} numeric, {} boolean of {} non-empty), using {chosen}",
                counts.float, counts.boolean, counts.non_empty
            ),
            InferenceIssue::HeaderAssumed => f.write_str(
                "could not tell whether the first record is a header, treating it as column names",
            ),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InferenceReport {
    pub sampled_rows: usize,
    pub issues: Vec<InferenceIssue>,
}

impl InferenceReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Pick a type per column from the sampled rows.
///
/// Boolean needs at least one word token (`yes`, `false`, ...): columns of bare `0`/`1`
/// stay Integer. Any disagreement falls back to ShortString and is reported, never
/// silently resolved.
pub fn infer_from_sample(names: &[String], sample: &[Vec<String>]) -> (Metadata, InferenceReport) {
    let facts = ParseFacts::default();
    let mut report = InferenceReport {
        sampled_rows: sample.len(),
        issues: Vec::new(),
    };

    let columns = names
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let mut counts = SampleCounts::default();
            let mut saw_word_bool = false;
            let mut max_len = 0usize;

            for row in sample {
                let raw = row.get(col).map(String::as_str).unwrap_or("");
                let v = raw.trim();
                if v.is_empty() {
                    counts.empty += 1;
                    continue;
                }
                counts.non_empty += 1;
                max_len = max_len.max(raw.chars().count());
                if facts.parse_bool(v).is_some() {
                    counts.boolean += 1;
                    if v != "0" && v != "1" {
                        saw_word_bool = true;
                    }
                }
                if parse_integer(v).is_some() {
                    counts.integer += 1;
                }
                if facts.parse_float(v).is_some() {
                    counts.float += 1;
                }
            }

            let all = counts.non_empty;
            let column_type = if all == 0 {
                report.issues.push(InferenceIssue::Empty {
                    column: name.clone(),
                });
                ColumnType::ShortString
            } else if counts.boolean == all && saw_word_bool {
                ColumnType::Boolean
            } else if counts.integer == all {
                ColumnType::Integer
            } else if counts.float == all {
                ColumnType::Float
            } else {
                if counts.float > 0 || (counts.boolean > 0 && saw_word_bool) {
                    report.issues.push(InferenceIssue::Mixed {
                        column: name.clone(),
                        chosen: ColumnType::ShortString,
                        counts: counts.clone(),
                    });
                }
                ColumnType::ShortString
            };

            let mut meta = ColumnMeta::new(name.clone(), column_type);
            meta.facts.max_length = max_len.max(DEFAULT_MAX_LENGTH);
            meta
        })
        .collect();

    for issue in &report.issues {
        log::warn!("type inference: {issue}");
    }

    (Metadata::new(columns), report)
}
