use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::metadata::ColumnMeta;

/// Declared type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    ShortString,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::ShortString => "short_string",
        }
    }

    /// Integer and Float columns get numeric summaries; everything else is categorical.
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "decimal" | "number" => Ok(ColumnType::Float),
            "short_string" | "shortstring" | "string" | "text" | "str" => {
                Ok(ColumnType::ShortString)
            }
            other => Err(StoreError::InvalidMetadata(format!(
                "unknown column type `{other}`"
            ))),
        }
    }
}

/// A typed cell value, derived from the cell's raw text on every read.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    ShortString(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::ShortString(v) => f.write_str(v),
        }
    }
}

/// Per-column facts needed to parse raw text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseFacts {
    /// Decimal separator used by Float cells. `.` matches `1234.56`, `,` matches `1234,56`.
    pub decimal_separator: char,
    /// Spellings accepted as `true` (compared case-insensitively).
    pub true_tokens: Vec<String>,
    /// Spellings accepted as `false` (compared case-insensitively).
    pub false_tokens: Vec<String>,
    /// Maximum ShortString length in characters.
    pub max_length: usize,
}

pub const DEFAULT_MAX_LENGTH: usize = 255;

impl Default for ParseFacts {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            true_tokens: ["true", "t", "yes", "y", "1"].map(String::from).to_vec(),
            false_tokens: ["false", "f", "no", "n", "0"].map(String::from).to_vec(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl ParseFacts {
    pub fn parse_bool(&self, v: &str) -> Option<bool> {
        let v = v.trim();
        if self.true_tokens.iter().any(|t| t.eq_ignore_ascii_case(v)) {
            Some(true)
        } else if self.false_tokens.iter().any(|t| t.eq_ignore_ascii_case(v)) {
            Some(false)
        } else {
            None
        }
    }

    pub fn parse_float(&self, v: &str) -> Option<f64> {
        let normalized = normalize_float(v.trim(), self.decimal_separator)?;
        let parsed: f64 = normalized.parse().ok()?;
        parsed.is_finite().then_some(parsed)
    }
}

/// Exact integer parse: optional sign and ASCII digits only, no truncation of `1.0` or `1e3`.
pub fn parse_integer(v: &str) -> Option<i64> {
    let v = v.trim();
    let digits = v.strip_prefix(['+', '-']).unwrap_or(v);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    v.parse().ok()
}

fn normalize_float(s: &str, decimal_separator: char) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    if let Some(&sign) = chars.peek() {
        if sign == '+' || sign == '-' {
            out.push(sign);
            chars.next();
        }
    }

    let mut saw_digit = false;
    let mut saw_decimal = false;
    let mut saw_exp = false;

    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            saw_digit = true;
            out.push(ch);
        } else if !saw_exp && !saw_decimal && ch == decimal_separator {
            saw_decimal = true;
            out.push('.');
        } else if !saw_exp && saw_digit && matches!(ch, 'e' | 'E') {
            saw_exp = true;
            out.push('e');
            if let Some(&sign) = chars.peek() {
                if sign == '+' || sign == '-' {
                    out.push(sign);
                    chars.next();
                }
            }
            // The exponent needs its own digits.
            if !chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                return None;
            }
        } else {
            return None;
        }
    }

    saw_digit.then_some(out)
}

/// Parse one raw cell under its column's declared type.
///
/// Fails with [`StoreError::TypeMismatch`] or [`StoreError::ValueTooLong`] carrying the
/// offending text, the column and the row.
pub fn parse_cell(raw: &str, meta: &ColumnMeta, row: u64) -> Result<Value> {
    let mismatch = || StoreError::TypeMismatch {
        column: meta.name.clone(),
        row,
        text: raw.to_owned(),
        expected: meta.column_type,
    };

    let is_empty = match meta.column_type {
        ColumnType::ShortString => raw.is_empty(),
        _ => raw.trim().is_empty(),
    };
    if is_empty {
        return if meta.nullable {
            Ok(Value::Null)
        } else {
            Err(mismatch())
        };
    }

    match meta.column_type {
        ColumnType::Boolean => meta.facts.parse_bool(raw).map(Value::Boolean).ok_or_else(mismatch),
        ColumnType::Integer => parse_integer(raw).map(Value::Integer).ok_or_else(mismatch),
        ColumnType::Float => meta.facts.parse_float(raw).map(Value::Float).ok_or_else(mismatch),
        ColumnType::ShortString => {
            let len = raw.chars().count();
            if len > meta.facts.max_length {
                return Err(StoreError::ValueTooLong {
                    column: meta.name.clone(),
                    row,
                    text: raw.to_owned(),
                    len,
                    max: meta.facts.max_length,
                });
            }
            Ok(Value::ShortString(raw.to_owned()))
        }
    }
}
