//! MySQL-family adapter.
//!
//! # Invariants
//! - String literals are `"`-delimited and escaped by the driver.
//! - Identifiers are backtick-delimited with embedded backticks stripped.
//! - Found-row counts rely on `SQL_CALC_FOUND_ROWS` in the preceding SELECT.

use super::driver::Connector;
use super::session::DriverSession;
use super::{
    delimit_identifier, hex_digits, quote_special, AdapterError, AdapterResult, Backend, DatabaseAdapter,
    QueryResult,
};
use crate::config::{ServerConfig, MYSQL_DEFAULT_PORT};
use crate::logging::loggable_sql;
use crate::value::SqlValue;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;

static CALC_FOUND_ROWS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*SELECT\b.*\bSQL_CALC_FOUND_ROWS\b").expect("valid regex"));

const TRANSACTION_LABEL: &str = "mysql_error";

/// Adapter for MySQL and wire-compatible servers.
pub struct MysqlAdapter {
    session: DriverSession,
}

impl MysqlAdapter {
    /// Connects through `connector` and selects `config.db_name` if set.
    ///
    /// # Errors
    /// - `AdapterError::Connection` when the driver cannot connect.
    pub fn connect(connector: &dyn Connector, config: &ServerConfig) -> AdapterResult<Self> {
        let started_at = Instant::now();
        let port = config.port_or(MYSQL_DEFAULT_PORT);
        let config = ServerConfig {
            port: Some(port),
            ..config.clone()
        };
        info!(
            "event=db_connect module=adapter status=start backend=mysql host={} port={} user={}",
            config.host, port, config.user
        );

        let driver = connector.connect(&config).map_err(|err| {
            error!(
                "event=db_connect module=adapter status=error backend=mysql host={} port={} duration_ms={} error={}",
                config.host,
                port,
                started_at.elapsed().as_millis(),
                err
            );
            AdapterError::Connection {
                backend: Backend::Mysql,
                host: config.host.clone(),
                port: Some(port),
                user: config.user.clone(),
                message: err.to_string(),
            }
        })?;

        let mut adapter = Self {
            session: DriverSession::new(Backend::Mysql, driver),
        };
        if let Some(db_name) = config.db_name.as_deref() {
            adapter.select_database(db_name);
        }

        info!(
            "event=db_connect module=adapter status=ok backend=mysql host={} port={} duration_ms={}",
            config.host,
            port,
            started_at.elapsed().as_millis()
        );
        Ok(adapter)
    }
}

impl DatabaseAdapter for MysqlAdapter {
    fn backend(&self) -> Backend {
        Backend::Mysql
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
        let escaped = match self.session.driver() {
            Some(driver) => driver.escape_string(&text),
            None => super::driver::escape_backslash_style(&text),
        };
        format!("\"{escaped}\"")
    }

    fn quote_identifier(&self, name: &str) -> String {
        delimit_identifier(name, '`', '`')
    }

    fn execute(&mut self, sql: &str) -> QueryResult {
        self.session.run(sql)
    }

    fn can_execute_prepared(&self) -> bool {
        self.session
            .driver()
            .is_some_and(|driver| driver.supports_prepared())
    }

    fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        type_hints: &str,
    ) -> AdapterResult<QueryResult> {
        if self.is_connected() && !self.can_execute_prepared() {
            return Err(AdapterError::Unsupported {
                backend: Backend::Mysql,
                operation: "prepared statements",
            });
        }
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

    fn found_row_count(&mut self) -> AdapterResult<Option<u64>> {
        let opted_in = self
            .session
            .last_sql()
            .is_some_and(|sql| CALC_FOUND_ROWS_RE.is_match(sql));
        if !opted_in {
            warn!(
                "event=db_found_rows module=adapter status=warn backend=mysql reason=missing_sql_calc_found_rows sql={}",
                loggable_sql(self.session.last_sql().unwrap_or_default())
            );
        }
        Ok(self
            .scalar("SELECT FOUND_ROWS()")
            .and_then(|value| value.as_i64())
            .map(|count| count.max(0) as u64))
    }

    fn last_error(&self) -> Option<String> {
        self.session.error_text(TRANSACTION_LABEL)
    }

    fn transaction_depth(&self) -> u32 {
        self.session.transaction_depth()
    }

    fn start_transaction(&mut self) {
        self.session.begin("START TRANSACTION");
    }

    fn commit(&mut self) {
        self.session.commit();
    }

    fn rollback(&mut self) {
        self.session.rollback();
    }
}
