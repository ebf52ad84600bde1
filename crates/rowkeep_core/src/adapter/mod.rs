//! Backend adapters behind one connection/quoting/transaction contract.
//!
//! # Responsibility
//! - Define `DatabaseAdapter`, the contract collections and domain objects
//!   use to talk to any backend.
//! - Provide one implementation per backend plus a registry of named
//!   connections.
//!
//! # Invariants
//! - Errors travel on two channels: session-level problems are returned as
//!   `AdapterError`; a failed statement returns `QueryFailed` and its text is
//!   read afterwards through `last_error()`.
//! - Transaction depth > 0 iff a backend transaction was started and not yet
//!   committed or rolled back.

use crate::value::SqlValue;
use std::error::Error;
use std::fmt::{Display, Formatter, Write};

pub mod driver;
mod mssql;
mod mysql;
mod registry;
mod result;
mod session;
mod sqlite;
pub mod transaction;

pub use driver::{BoundParam, Connector, Driver, DriverError, ParamType, RawOutcome};
pub use mssql::MssqlAdapter;
pub use mysql::MysqlAdapter;
pub use registry::{open_adapter, AdapterRegistry, DEFAULT_CONNECTION};
pub use result::ResultSet;
pub use sqlite::{SqliteAdapter, SqliteDriver};

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Supported backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Mysql,
    Mssql,
    Sqlite,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-level adapter failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The backend refused or could not establish the connection.
    Connection {
        backend: Backend,
        host: String,
        port: Option<u16>,
        user: String,
        message: String,
    },
    /// The active backend does not implement the requested capability.
    Unsupported {
        backend: Backend,
        operation: &'static str,
    },
    /// Missing or ambiguous setup (unknown connection alias, missing driver).
    Configuration(String),
}

impl Display for AdapterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection {
                backend,
                host,
                port,
                user,
                message,
            } => {
                write!(f, "failed to connect to {backend} server {host}")?;
                if let Some(port) = port {
                    write!(f, ":{port}")?;
                }
                write!(f, " as `{user}`")?;
                if !message.is_empty() {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
            Self::Unsupported { backend, operation } => {
                write!(f, "{operation} is not supported by the {backend} adapter")
            }
            Self::Configuration(message) => write!(f, "adapter configuration error: {message}"),
        }
    }
}

impl Error for AdapterError {}

/// Failure marker for one statement; read the reason from `last_error()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFailed;

impl Display for QueryFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("statement failed; see the adapter's last error")
    }
}

impl Error for QueryFailed {}

/// Successful statement outcome.
#[derive(Debug)]
pub enum Executed {
    /// The statement produced a row set.
    Rows(ResultSet),
    /// The statement succeeded without a row set (DDL/DML).
    Success,
}

impl Executed {
    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Success => None,
        }
    }
}

pub type QueryResult = Result<Executed, QueryFailed>;

/// Uniform contract over one backend session.
///
/// One adapter models one logical session: calls block until the backend
/// answers and an instance must not be shared across concurrent callers.
pub trait DatabaseAdapter {
    fn backend(&self) -> Backend;

    fn is_connected(&self) -> bool;

    /// Releases the connection. Further statements fail.
    fn disconnect(&mut self);

    /// Switches the active database; `false` when the backend refused.
    fn select_database(&mut self, name: &str) -> bool;

    /// Database most recently selected successfully.
    fn database_name(&self) -> Option<&str>;

    /// Renders `value` as a SQL literal for this backend.
    fn quote(&self, value: &SqlValue) -> String;

    /// Wraps `name` in identifier delimiters after stripping any delimiter
    /// characters it already contains.
    fn quote_identifier(&self, name: &str) -> String;

    fn execute(&mut self, sql: &str) -> QueryResult;

    fn can_execute_prepared(&self) -> bool {
        false
    }

    /// Prepares `sql`, binds `params` positionally and executes it.
    ///
    /// `type_hints` holds one of `i`/`d`/`s`/`b` per parameter; an empty
    /// string binds everything as text.
    fn execute_prepared(
        &mut self,
        _sql: &str,
        _params: &[SqlValue],
        _type_hints: &str,
    ) -> AdapterResult<QueryResult> {
        Err(AdapterError::Unsupported {
            backend: self.backend(),
            operation: "prepared statements",
        })
    }

    /// Identity generated by the most recent insert on this session.
    fn last_insert_id(&mut self) -> Option<SqlValue>;

    fn affected_row_count(&self) -> u64;

    /// Rows the previous SELECT would have matched without its LIMIT.
    ///
    /// `Ok(None)` means the backend query itself failed.
    fn found_row_count(&mut self) -> AdapterResult<Option<u64>> {
        Err(AdapterError::Unsupported {
            backend: self.backend(),
            operation: "found row count",
        })
    }

    /// Text of the most recent statement failure, empty after a success.
    ///
    /// Annotated while a transaction is open. `None` once disconnected.
    fn last_error(&self) -> Option<String>;

    fn transaction_depth(&self) -> u32;

    fn start_transaction(&mut self);

    fn commit(&mut self);

    /// Rolls back and resets the depth to zero, whatever the nesting.
    fn rollback(&mut self);

    fn in_transaction(&self) -> bool {
        self.transaction_depth() > 0
    }

    /// First column of the first row returned by `sql`.
    fn scalar(&mut self, sql: &str) -> Option<SqlValue> {
        let mut rows = self.execute(sql).ok()?.into_rows()?;
        rows.next_row()?.first_value().cloned()
    }
}

/// Shared literal rendering for values that never reach the escaper.
pub(crate) fn quote_special(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => Some("NULL".to_string()),
        SqlValue::Bool(false) => Some("0".to_string()),
        SqlValue::Bool(true) => Some("1".to_string()),
        SqlValue::Function(function) => Some(function.as_sql().to_string()),
        _ => None,
    }
}

/// Lowercase hex digits of `bytes`, two per byte.
pub(crate) fn hex_digits(bytes: &[u8]) -> String {
    let mut digits = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(digits, "{byte:02x}");
    }
    digits
}

/// Strips every `delimiters` character from `name` and wraps it.
pub(crate) fn delimit_identifier(name: &str, open: char, close: char) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push(open);
    quoted.extend(name.chars().filter(|ch| *ch != open && *ch != close));
    quoted.push(close);
    quoted
}

#[cfg(test)]
mod tests {
    use super::{delimit_identifier, hex_digits, quote_special, AdapterError, Backend};
    use crate::value::{SqlFunction, SqlValue};

    #[test]
    fn special_values_render_without_escaping() {
        assert_eq!(quote_special(&SqlValue::Null).unwrap(), "NULL");
        assert_eq!(quote_special(&SqlValue::Bool(true)).unwrap(), "1");
        assert_eq!(quote_special(&SqlValue::Bool(false)).unwrap(), "0");
        assert_eq!(
            quote_special(&SqlValue::Function(SqlFunction::new("NOW()"))).unwrap(),
            "NOW()"
        );
        assert!(quote_special(&SqlValue::Int(1)).is_none());
    }

    #[test]
    fn hex_digits_pad_every_byte() {
        assert_eq!(hex_digits(&[0x00, 0x0f, 0xff, 0x41]), "000fff41");
        assert_eq!(hex_digits(&[]), "");
    }

    #[test]
    fn identifiers_lose_embedded_delimiters() {
        assert_eq!(delimit_identifier("a`b", '`', '`'), "`ab`");
        assert_eq!(delimit_identifier("we]ird[", '[', ']'), "[weird]");
    }

    #[test]
    fn connection_error_names_backend_host_port_and_user() {
        let err = AdapterError::Connection {
            backend: Backend::Mysql,
            host: "db.internal".to_string(),
            port: Some(3306),
            user: "app".to_string(),
            message: "access denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to mysql server db.internal:3306 as `app`: access denied"
        );
    }
}
