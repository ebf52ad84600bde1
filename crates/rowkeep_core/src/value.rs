//! Backend-neutral SQL values and result rows.
//!
//! # Responsibility
//! - Represent scalar values exchanged with every backend.
//! - Carry one result row as an ordered column → value map.
//! - Provide the comparison rules used by collection sorting.
//!
//! # Invariants
//! - `SqlValue::Function` is emitted verbatim by quoting, never escaped.
//! - `Row` preserves the column order reported by the backend.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Literal SQL expression that must reach the backend unquoted (`NOW()`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SqlFunction(String);

impl SqlFunction {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_sql(&self) -> &str {
        &self.0
    }
}

impl Display for SqlFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar value read from or written to a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Function(SqlFunction),
}

/// Comparison flavour used when ordering values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Numbers compare numerically, everything else as text.
    #[default]
    Regular,
    /// Every value is coerced to a number first.
    Numeric,
    /// Every value is compared by its text form.
    String,
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view of the value, parsing text when needed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Null | Self::Blob(_) | Self::Function(_) => None,
            Self::Bool(value) => Some(i64::from(*value)),
            Self::Int(value) => Some(*value),
            Self::Float(value) => Some(*value as i64),
            Self::Text(value) => {
                let trimmed = value.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().map(|float| float as i64))
            }
        }
    }

    /// Floating point view of the value, parsing text when needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Null | Self::Blob(_) | Self::Function(_) => None,
            Self::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(value) => value.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Text form used for key flattening and string literals.
    ///
    /// Returns `None` for `Null`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(value) => Some(if *value { "1" } else { "0" }.to_string()),
            Self::Int(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
            Self::Blob(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Function(function) => Some(function.as_sql().to_string()),
        }
    }

    fn is_numeric(&self) -> bool {
        match self {
            Self::Bool(_) | Self::Int(_) | Self::Float(_) => true,
            Self::Text(value) => value.trim().parse::<f64>().is_ok(),
            _ => false,
        }
    }

    /// Total ordering of two values under `mode`. `Null` sorts first.
    pub fn compare(&self, other: &Self, mode: SortMode) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        let numeric = match mode {
            SortMode::Numeric => true,
            SortMode::String => false,
            SortMode::Regular => self.is_numeric() && other.is_numeric(),
        };

        if numeric {
            if let (Self::Int(left), Self::Int(right)) = (self, other) {
                return left.cmp(right);
            }
            let left = self.as_f64().unwrap_or(0.0);
            let right = other.as_f64().unwrap_or(0.0);
            return left.total_cmp(&right);
        }

        self.to_text()
            .unwrap_or_default()
            .cmp(&other.to_text().unwrap_or_default())
    }
}

impl Display for SqlValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<SqlFunction> for SqlValue {
    fn from(value: SqlFunction) -> Self {
        Self::Function(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Errors raised while decoding a row into a domain object.
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    MissingColumn(String),
    InvalidValue { column: String, message: String },
}

impl Display for RowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn(column) => write!(f, "row has no column `{column}`"),
            Self::InvalidValue { column, message } => {
                write!(f, "invalid value in column `{column}`: {message}")
            }
        }
    }
}

impl Error for RowError {}

/// One result row keyed by column name, in backend column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: IndexMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used by drivers and tests.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value of the first column, if any.
    pub fn first_value(&self) -> Option<&SqlValue> {
        self.columns.get_index(0).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(|(column, value)| (column.as_str(), value))
    }

    pub fn require(&self, column: &str) -> Result<&SqlValue, RowError> {
        self.get(column)
            .ok_or_else(|| RowError::MissingColumn(column.to_string()))
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, RowError> {
        let value = self.require(column)?;
        value.as_i64().ok_or_else(|| RowError::InvalidValue {
            column: column.to_string(),
            message: format!("expected integer, got `{value}`"),
        })
    }

    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>, RowError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            _ => self.get_i64(column).map(Some),
        }
    }

    pub fn get_string(&self, column: &str) -> Result<String, RowError> {
        self.require(column)?
            .to_text()
            .ok_or_else(|| RowError::InvalidValue {
                column: column.to_string(),
                message: "unexpected NULL".to_string(),
            })
    }

    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>, RowError> {
        Ok(self.require(column)?.to_text())
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}
