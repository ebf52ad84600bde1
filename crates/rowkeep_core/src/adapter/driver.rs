//! Driver seam between adapters and a concrete client library.
//!
//! # Responsibility
//! - Define the primitive set an adapter needs from a backend binding.
//! - Turn prepared-statement type hints into typed, by-value parameters.
//!
//! # Invariants
//! - Drivers report statement failures as `DriverError`; adapters decide how
//!   to surface them.
//! - Drivers never retry a statement.

use crate::config::ServerConfig;
use crate::value::{Row, SqlValue};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure text reported by a driver binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for DriverError {}

/// What a statement produced on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    /// Statement returned a row set (possibly empty).
    Rows(Vec<Row>),
    /// Statement succeeded without a row set.
    Done,
}

/// Bind type of one prepared-statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Double,
    Text,
    Blob,
}

impl ParamType {
    /// Parses one type-hint letter (`i`, `d`, `s`, `b`).
    pub fn from_hint(hint: char) -> Option<Self> {
        match hint {
            'i' => Some(Self::Integer),
            'd' => Some(Self::Double),
            's' => Some(Self::Text),
            'b' => Some(Self::Blob),
            _ => None,
        }
    }
}

/// A parameter converted to its bind type, passed by value.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub kind: ParamType,
    pub value: SqlValue,
}

impl BoundParam {
    fn convert(kind: ParamType, value: &SqlValue) -> Result<Self, DriverError> {
        // Bytes never pass through a text conversion.
        let kind = match (kind, value) {
            (ParamType::Text, SqlValue::Blob(_)) => ParamType::Blob,
            _ => kind,
        };
        let converted = match (kind, value) {
            (_, SqlValue::Null) => SqlValue::Null,
            (ParamType::Blob, SqlValue::Blob(bytes)) => SqlValue::Blob(bytes.clone()),
            (ParamType::Integer, other) => SqlValue::Int(other.as_i64().ok_or_else(|| {
                DriverError::new(format!("cannot bind `{other}` as integer"))
            })?),
            (ParamType::Double, other) => SqlValue::Float(other.as_f64().ok_or_else(|| {
                DriverError::new(format!("cannot bind `{other}` as double"))
            })?),
            (ParamType::Text, other) => SqlValue::Text(other.to_text().unwrap_or_default()),
            (ParamType::Blob, other) => {
                SqlValue::Blob(other.to_text().unwrap_or_default().into_bytes())
            }
        };
        Ok(Self {
            kind,
            value: converted,
        })
    }
}

/// Pairs `params` with `type_hints`, one letter per parameter.
///
/// Empty hints bind every parameter as text.
pub fn bind_params(params: &[SqlValue], type_hints: &str) -> Result<Vec<BoundParam>, DriverError> {
    if type_hints.is_empty() {
        return params
            .iter()
            .map(|value| BoundParam::convert(ParamType::Text, value))
            .collect();
    }

    let hints = type_hints.chars().collect::<Vec<_>>();
    if hints.len() != params.len() {
        return Err(DriverError::new(format!(
            "number of type hints ({}) does not match number of parameters ({})",
            hints.len(),
            params.len()
        )));
    }

    hints
        .into_iter()
        .zip(params)
        .map(|(hint, value)| {
            let kind = ParamType::from_hint(hint)
                .ok_or_else(|| DriverError::new(format!("unknown type hint `{hint}`")))?;
            BoundParam::convert(kind, value)
        })
        .collect()
}

/// MySQL-style string escaping (`mysql_real_escape_string` character set).
pub fn escape_backslash_style(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\u{1a}' => escaped.push_str("\\Z"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// One open backend session as provided by a client library binding.
pub trait Driver {
    fn close(&mut self);
    fn select_db(&mut self, name: &str) -> Result<(), DriverError>;
    fn query(&mut self, sql: &str) -> Result<RawOutcome, DriverError>;

    fn supports_prepared(&self) -> bool {
        false
    }

    fn query_prepared(
        &mut self,
        _sql: &str,
        _params: &[BoundParam],
    ) -> Result<RawOutcome, DriverError> {
        Err(DriverError::new(
            "prepared statements are not supported by this driver",
        ))
    }

    /// Escapes `value` for use inside a string literal.
    fn escape_string(&self, value: &str) -> String {
        escape_backslash_style(value)
    }

    /// Rows touched by the most recent DML statement.
    fn affected_rows(&self) -> u64;

    /// Identity generated by the most recent insert, `0` when none.
    fn insert_id(&self) -> u64;
}

/// Opens driver sessions for networked backends.
pub trait Connector {
    fn connect(&self, config: &ServerConfig) -> Result<Box<dyn Driver>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::{bind_params, escape_backslash_style, ParamType};
    use crate::value::SqlValue;

    #[test]
    fn empty_hints_bind_every_parameter_as_text() {
        let bound = bind_params(&[SqlValue::Int(4), SqlValue::Null], "").unwrap();
        assert_eq!(bound[0].kind, ParamType::Text);
        assert_eq!(bound[0].value, SqlValue::Text("4".into()));
        assert_eq!(bound[1].value, SqlValue::Null);
    }

    #[test]
    fn hints_convert_values_to_their_bind_type() {
        let bound = bind_params(
            &[SqlValue::Text("12".into()), SqlValue::Int(3), SqlValue::from("x")],
            "ids",
        )
        .unwrap();
        assert_eq!(bound[0].value, SqlValue::Int(12));
        assert_eq!(bound[1].value, SqlValue::Float(3.0));
        assert_eq!(bound[2].value, SqlValue::Text("x".into()));
    }

    #[test]
    fn blobs_keep_their_bytes_under_text_hints() {
        let bytes = vec![0xff, 0xfe, 0x41];
        let bound = bind_params(
            &[SqlValue::Blob(bytes.clone()), SqlValue::Blob(bytes.clone())],
            "",
        )
        .unwrap();
        assert_eq!(bound[0].kind, ParamType::Blob);
        assert_eq!(bound[0].value, SqlValue::Blob(bytes.clone()));

        let bound =
            bind_params(&[SqlValue::Blob(bytes.clone()), SqlValue::from("x")], "sb").unwrap();
        assert_eq!(bound[0].kind, ParamType::Blob);
        assert_eq!(bound[0].value, SqlValue::Blob(bytes));
        assert_eq!(bound[1].value, SqlValue::Blob(b"x".to_vec()));
    }

    #[test]
    fn hint_count_mismatch_and_unknown_letters_fail() {
        let mismatch = bind_params(&[SqlValue::Int(1)], "ii").unwrap_err();
        assert!(mismatch.message().contains("does not match"));

        let unknown = bind_params(&[SqlValue::Int(1)], "q").unwrap_err();
        assert!(unknown.message().contains("unknown type hint"));

        let not_a_number = bind_params(&[SqlValue::from("abc")], "i").unwrap_err();
        assert!(not_a_number.message().contains("as integer"));
    }

    #[test]
    fn backslash_escaping_covers_quotes_and_control_characters() {
        assert_eq!(escape_backslash_style(r#"a'b"c\d"#), r#"a\'b\"c\\d"#);
        assert_eq!(escape_backslash_style("x\ny"), "x\\ny");
    }
}
