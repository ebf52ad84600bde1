//! Embedded SQLite backend built on `rusqlite`.
//!
//! # Responsibility
//! - Provide a `Driver` over a local SQLite connection.
//! - Provide the SQLite dialect of `DatabaseAdapter`.
//!
//! # Invariants
//! - Connections are opened with `foreign_keys=ON` and a busy timeout.
//! - "Databases" are the connection's attached schemas (`main`, `temp`, ...).
//! - Found-row counts are not supported.

use super::driver::{BoundParam, Driver, DriverError, RawOutcome};
use super::session::DriverSession;
use super::{
    delimit_identifier, hex_digits, quote_special, AdapterError, AdapterResult, Backend, DatabaseAdapter,
    QueryResult,
};
use crate::config::SqliteConfig;
use crate::value::{Row, SqlValue};
use log::{error, info};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSACTION_LABEL: &str = "SQLite error";
const IN_MEMORY_LABEL: &str = ":memory:";

/// `Driver` implementation over one rusqlite connection.
pub struct SqliteDriver {
    conn: Option<Connection>,
    affected_rows: u64,
}

impl SqliteDriver {
    /// Opens the file named by `config`, or a private in-memory database.
    pub fn open(config: &SqliteConfig) -> Result<Self, DriverError> {
        let conn = match config.path.as_deref() {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|err| DriverError::new(err.to_string()))?;
        Self::from_connection(conn)
    }

    /// Wraps an already opened connection.
    pub fn from_connection(conn: Connection) -> Result<Self, DriverError> {
        bootstrap_connection(&conn).map_err(|err| DriverError::new(err.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            affected_rows: 0,
        })
    }

    fn connection(&self) -> Result<&Connection, DriverError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DriverError::new("connection is closed"))
    }

    fn run(&mut self, sql: &str, params: Vec<Value>) -> Result<RawOutcome, DriverError> {
        let conn = self.connection()?;
        let (outcome, changed) =
            run_statement(conn, sql, params).map_err(|err| DriverError::new(err.to_string()))?;
        if let Some(changed) = changed {
            self.affected_rows = changed;
        }
        Ok(outcome)
    }
}

fn bootstrap_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

fn run_statement(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> rusqlite::Result<(RawOutcome, Option<u64>)> {
    let mut stmt = conn.prepare(sql)?;

    if stmt.column_count() == 0 {
        let changed = stmt.execute(params_from_iter(params))?;
        return Ok((RawOutcome::Done, Some(changed as u64)));
    }

    let columns = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (index, column) in columns.iter().enumerate() {
            record.insert(column.as_str(), from_sqlite(row.get_ref(index)?));
        }
        records.push(record);
    }

    Ok((RawOutcome::Rows(records), None))
}

fn from_sqlite(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(value) => SqlValue::Int(value),
        ValueRef::Real(value) => SqlValue::Float(value),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(value) => Value::Integer(i64::from(*value)),
        SqlValue::Int(value) => Value::Integer(*value),
        SqlValue::Float(value) => Value::Real(*value),
        SqlValue::Text(value) => Value::Text(value.clone()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
        SqlValue::Function(function) => Value::Text(function.as_sql().to_string()),
    }
}

impl Driver for SqliteDriver {
    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, err)) = conn.close() {
                error!("event=db_close module=adapter status=error backend=sqlite error={err}");
            }
        }
    }

    fn select_db(&mut self, name: &str) -> Result<(), DriverError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("PRAGMA database_list;")
            .map_err(|err| DriverError::new(err.to_string()))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|err| DriverError::new(err.to_string()))?;

        if names.iter().any(|schema| schema == name) {
            Ok(())
        } else {
            Err(DriverError::new(format!("unknown database `{name}`")))
        }
    }

    fn query(&mut self, sql: &str) -> Result<RawOutcome, DriverError> {
        self.run(sql, Vec::new())
    }

    fn supports_prepared(&self) -> bool {
        true
    }

    fn query_prepared(
        &mut self,
        sql: &str,
        params: &[BoundParam],
    ) -> Result<RawOutcome, DriverError> {
        let values = params
            .iter()
            .map(|param| to_sqlite(&param.value))
            .collect();
        self.run(sql, values)
    }

    fn escape_string(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.conn
            .as_ref()
            .map_or(0, |conn| conn.last_insert_rowid().max(0) as u64)
    }
}

/// Adapter for the embedded SQLite backend.
pub struct SqliteAdapter {
    session: DriverSession,
}

impl SqliteAdapter {
    /// Opens the database described by `config` and selects `config.db_name`
    /// when set.
    ///
    /// # Errors
    /// - `AdapterError::Connection` when the file cannot be opened.
    pub fn open(config: &SqliteConfig) -> AdapterResult<Self> {
        let started_at = Instant::now();
        let location = config
            .path
            .as_ref()
            .map_or_else(|| IN_MEMORY_LABEL.to_string(), |path| path.display().to_string());
        info!("event=db_connect module=adapter status=start backend=sqlite path={location}");

        let driver = SqliteDriver::open(config).map_err(|err| {
            error!(
                "event=db_connect module=adapter status=error backend=sqlite path={} duration_ms={} error={}",
                location,
                started_at.elapsed().as_millis(),
                err
            );
            AdapterError::Connection {
                backend: Backend::Sqlite,
                host: location.clone(),
                port: None,
                user: String::new(),
                message: err.to_string(),
            }
        })?;

        let mut adapter = Self::from_driver(driver);
        if let Some(db_name) = config.db_name.as_deref() {
            adapter.select_database(db_name);
        }

        info!(
            "event=db_connect module=adapter status=ok backend=sqlite path={} duration_ms={}",
            location,
            started_at.elapsed().as_millis()
        );
        Ok(adapter)
    }

    pub fn open_in_memory() -> AdapterResult<Self> {
        Self::open(&SqliteConfig::in_memory())
    }

    pub fn from_driver(driver: SqliteDriver) -> Self {
        Self {
            session: DriverSession::new(Backend::Sqlite, Box::new(driver)),
        }
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn disconnect(&mut self) {
        self.session.disconnect();
    }

    fn select_database(&mut self, name: &str) -> bool {
        self.session.select_database(name)
    }

    fn database_name(&self) -> Option<&str> {
        self.session.database()
    }

    fn quote(&self, value: &SqlValue) -> String {
        if let Some(literal) = quote_special(value) {
            return literal;
        }
        if let SqlValue::Blob(bytes) = value {
            return format!("X'{}'", hex_digits(bytes));
        }
        let text = value.to_text().unwrap_or_default();
        format!("'{}'", text.replace('\'', "''"))
    }

    fn quote_identifier(&self, name: &str) -> String {
        delimit_identifier(name, '"', '"')
    }

    fn execute(&mut self, sql: &str) -> QueryResult {
        self.session.run(sql)
    }

    fn can_execute_prepared(&self) -> bool {
        self.session.is_connected()
    }

    fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        type_hints: &str,
    ) -> AdapterResult<QueryResult> {
        Ok(self.session.run_prepared(sql, params, type_hints))
    }

    fn last_insert_id(&mut self) -> Option<SqlValue> {
        self.session
            .driver()
            .and_then(|driver| i64::try_from(driver.insert_id()).ok())
            .map(SqlValue::Int)
    }

    fn affected_row_count(&self) -> u64 {
        self.session
            .driver()
            .map_or(0, |driver| driver.affected_rows())
    }

    fn last_error(&self) -> Option<String> {
        self.session.error_text(TRANSACTION_LABEL)
    }

    fn transaction_depth(&self) -> u32 {
        self.session.transaction_depth()
    }

    fn start_transaction(&mut self) {
        self.session.begin("BEGIN TRANSACTION");
    }

    fn commit(&mut self) {
        self.session.commit();
    }

    fn rollback(&mut self) {
        self.session.rollback();
    }
}
