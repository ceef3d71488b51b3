use std::fmt;

use rowcol_store::{ColumnType, ReadStats};
use serde::Serialize;

use crate::error::{Result, StatsError};

/// Names of the statistics a summary may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Count,
    Nulls,
    MissingPercentage,
    Min,
    Max,
    Mean,
    Stddev,
    Q1,
    Median,
    Q3,
    Distinct,
    Mode,
}

impl Statistic {
    pub const ALL: [Statistic; 12] = [
        Statistic::Count,
        Statistic::Nulls,
        Statistic::MissingPercentage,
        Statistic::Min,
        Statistic::Max,
        Statistic::Mean,
        Statistic::Stddev,
        Statistic::Q1,
        Statistic::Median,
        Statistic::Q3,
        Statistic::Distinct,
        Statistic::Mode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Statistic::Count => "count",
            Statistic::Nulls => "nulls",
            Statistic::MissingPercentage => "missing_percentage",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Mean => "mean",
            Statistic::Stddev => "stddev",
            Statistic::Q1 => "q1",
            Statistic::Median => "median",
            Statistic::Q3 => "q3",
            Statistic::Distinct => "distinct",
            Statistic::Mode => "mode",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value taken from a numeric column (min, max, an exact-rank quartile). Integer columns
/// report exact `i64`s; only interpolated quartiles become `Float`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(v) => v as f64,
            Number::Float(v) => v,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Count(u64),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl From<Number> for StatValue {
    fn from(value: Number) -> Self {
        match value {
            Number::Integer(v) => StatValue::Integer(v),
            Number::Float(v) => StatValue::Number(v),
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Count(v) => write!(f, "{v}"),
            StatValue::Integer(v) => write!(f, "{v}"),
            StatValue::Number(v) => write!(f, "{v}"),
            StatValue::Text(v) => f.write_str(v),
        }
    }
}

/// Cursor work done to produce one summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub passes: u64,
    pub cells_read: u64,
}

impl From<ReadStats> for ScanReport {
    fn from(stats: ReadStats) -> Self {
        Self {
            passes: stats.passes,
            cells_read: stats.cells_read,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: u64,
    pub nulls: u64,
    pub min: Option<Number>,
    pub max: Option<Number>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub q1: Option<Number>,
    pub median: Option<Number>,
    pub q3: Option<Number>,
    pub missing_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frequency {
    pub value: String,
    pub count: u64,
    /// Share of the non-null values, in percent.
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub count: u64,
    pub nulls: u64,
    pub distinct: u64,
    /// Most frequent values first; ties ordered by value.
    pub top: Vec<Frequency>,
    pub mode: Option<String>,
    pub mode_percentage: Option<f64>,
    pub missing_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub column_type: ColumnType,
    pub summary: Summary,
    pub scan: ScanReport,
}

impl ColumnSummary {
    pub fn numeric(&self) -> Option<&NumericSummary> {
        match &self.summary {
            Summary::Numeric(s) => Some(s),
            Summary::Categorical(_) => None,
        }
    }

    pub fn categorical(&self) -> Option<&CategoricalSummary> {
        match &self.summary {
            Summary::Categorical(s) => Some(s),
            Summary::Numeric(_) => None,
        }
    }

    fn lookup(&self, statistic: Statistic) -> Option<StatValue> {
        use Statistic as S;
        match &self.summary {
            Summary::Numeric(s) => match statistic {
                S::Count => Some(StatValue::Count(s.count)),
                S::Nulls => Some(StatValue::Count(s.nulls)),
                S::MissingPercentage => Some(StatValue::Number(s.missing_percentage)),
                S::Min => s.min.map(StatValue::from),
                S::Max => s.max.map(StatValue::from),
                S::Mean => s.mean.map(StatValue::Number),
                S::Stddev => s.stddev.map(StatValue::Number),
                S::Q1 => s.q1.map(StatValue::from),
                S::Median => s.median.map(StatValue::from),
                S::Q3 => s.q3.map(StatValue::from),
                S::Distinct | S::Mode => None,
            },
            Summary::Categorical(s) => match statistic {
                S::Count => Some(StatValue::Count(s.count)),
                S::Nulls => Some(StatValue::Count(s.nulls)),
                S::MissingPercentage => Some(StatValue::Number(s.missing_percentage)),
                S::Distinct => Some(StatValue::Count(s.distinct)),
                S::Mode => s.mode.clone().map(StatValue::Text),
                _ => None,
            },
        }
    }

    /// Fails with [`StatsError::UndefinedStatistic`] when the statistic does not apply to
    /// the column's type or has no value (e.g. the mean of an all-null column).
    pub fn get(&self, statistic: Statistic) -> Result<StatValue> {
        self.lookup(statistic)
            .ok_or_else(|| StatsError::UndefinedStatistic {
                column: self.column.clone(),
                statistic,
            })
    }

    pub fn defined(&self) -> Vec<Statistic> {
        Statistic::ALL
            .into_iter()
            .filter(|&s| self.lookup(s).is_some())
            .collect()
    }

    pub fn undefined(&self) -> Vec<Statistic> {
        Statistic::ALL
            .into_iter()
            .filter(|&s| self.lookup(s).is_none())
            .collect()
    }
}

pub(crate) fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
