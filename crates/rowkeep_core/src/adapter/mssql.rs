//! Microsoft SQL Server adapter.
//!
//! # Invariants
//! - String literals are `'`-delimited with embedded quotes doubled.
//! - Identifiers are bracket-delimited with embedded brackets stripped.
//! - No prepared statements and no found-row count.

use super::driver::Connector;
use super::session::DriverSession;
use super::{
    delimit_identifier, hex_digits, quote_special, AdapterError, AdapterResult, Backend, DatabaseAdapter,
    QueryResult,
};
use crate::config::{ServerConfig, MSSQL_DEFAULT_PORT};
use crate::value::SqlValue;
use log::{error, info};
use std::time::Instant;

const TRANSACTION_LABEL: &str = "MSSQL error";

pub struct MssqlAdapter {
    session: DriverSession,
}

impl MssqlAdapter {
    /// Connects through `connector` and selects `config.db_name` if set.
    ///
    /// # Errors
    /// - `AdapterError::Connection` when the driver cannot connect.
    pub fn connect(connector: &dyn Connector, config: &ServerConfig) -> AdapterResult<Self> {
        let started_at = Instant::now();
        let port = config.port_or(MSSQL_DEFAULT_PORT);
        let config = ServerConfig {
            port: Some(port),
            ..config.clone()
        };
        info!(
            "event=db_connect module=adapter status=start backend=mssql host={} port={} user={}",
            config.host, port, config.user
        );

        let driver = match connector.connect(&config) {
            Ok(driver) => driver,
            Err(err) => {
                error!(
                    "event=db_connect module=adapter status=error backend=mssql host={} port={} duration_ms={} error={}",
                    config.host,
                    port,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(AdapterError::Connection {
                    backend: Backend::Mssql,
                    host: config.host,
                    port: Some(port),
                    user: config.user,
                    message: err.to_string(),
                });
            }
        };

        let mut adapter = Self {
            session: DriverSession::new(Backend::Mssql, driver),
        };
        if let Some(db_name) = config.db_name.as_deref() {
            adapter.select_database(db_name);
        }

        info!(
            "event=db_connect module=adapter status=ok backend=mssql host={} port={} duration_ms={}",
            config.host,
            port,
            started_at.elapsed().as_millis()
        );
        Ok(adapter)
    }
}

impl DatabaseAdapter for MssqlAdapter {
    fn backend(&self) -> Backend {
        Backend::Mssql
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
            return format!("0x{}", hex_digits(bytes));
        }
        let text = value.to_text().unwrap_or_default();
        format!("'{}'", text.replace('\'', "''"))
    }

    fn quote_identifier(&self, name: &str) -> String {
        delimit_identifier(name, '[', ']')
    }

    fn execute(&mut self, sql: &str) -> QueryResult {
        self.session.run(sql)
    }

    fn last_insert_id(&mut self) -> Option<SqlValue> {
        self.scalar("SELECT SCOPE_IDENTITY()")
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
