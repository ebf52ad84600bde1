//! Connection state shared by the driver-backed adapters.
//!
//! Owns the driver handle, the error capture and the transaction counter so
//! each backend adapter only adds its dialect.

use super::driver::{bind_params, Driver, RawOutcome};
use super::result::ResultSet;
use super::transaction::TransactionDepth;
use super::{Backend, Executed, QueryFailed, QueryResult};
use crate::logging::loggable_sql;
use crate::value::SqlValue;
use log::{debug, info, warn};
use std::time::Instant;

const NOT_CONNECTED: &str = "connection is closed";

pub(crate) struct DriverSession {
    backend: Backend,
    driver: Option<Box<dyn Driver>>,
    database: Option<String>,
    last_error: String,
    last_sql: Option<String>,
    transactions: TransactionDepth,
}

impl DriverSession {
    pub(crate) fn new(backend: Backend, driver: Box<dyn Driver>) -> Self {
        Self {
            backend,
            driver: Some(driver),
            database: None,
            last_error: String::new(),
            last_sql: None,
            transactions: TransactionDepth::default(),
        }
    }

    pub(crate) fn driver(&self) -> Option<&dyn Driver> {
        self.driver.as_deref()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.driver.is_some()
    }

    pub(crate) fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub(crate) fn last_sql(&self) -> Option<&str> {
        self.last_sql.as_deref()
    }

    pub(crate) fn disconnect(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.close();
            info!(
                "event=db_disconnect module=adapter status=ok backend={}",
                self.backend
            );
        }
    }

    pub(crate) fn select_database(&mut self, name: &str) -> bool {
        let Some(driver) = self.driver.as_mut() else {
            return false;
        };
        match driver.select_db(name) {
            Ok(()) => {
                self.database = Some(name.to_string());
                true
            }
            Err(err) => {
                warn!(
                    "event=db_select module=adapter status=error backend={} database={} error={}",
                    self.backend, name, err
                );
                false
            }
        }
    }

    pub(crate) fn run(&mut self, sql: &str) -> QueryResult {
        let started_at = Instant::now();
        self.last_sql = Some(sql.to_string());
        let Some(driver) = self.driver.as_mut() else {
            return self.fail(sql, NOT_CONNECTED.to_string());
        };
        match driver.query(sql) {
            Ok(outcome) => Ok(self.succeed(sql, outcome, started_at)),
            Err(err) => self.fail(sql, err.to_string()),
        }
    }

    pub(crate) fn run_prepared(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        type_hints: &str,
    ) -> QueryResult {
        let started_at = Instant::now();
        self.last_sql = Some(sql.to_string());
        let Some(driver) = self.driver.as_mut() else {
            return self.fail(sql, NOT_CONNECTED.to_string());
        };
        let bound = match bind_params(params, type_hints) {
            Ok(bound) => bound,
            Err(err) => return self.fail(sql, err.to_string()),
        };
        match driver.query_prepared(sql, &bound) {
            Ok(outcome) => Ok(self.succeed(sql, outcome, started_at)),
            Err(err) => self.fail(sql, err.to_string()),
        }
    }

    fn succeed(&mut self, sql: &str, outcome: RawOutcome, started_at: Instant) -> Executed {
        self.last_error.clear();
        debug!(
            "event=db_query module=adapter status=ok backend={} duration_ms={} sql={}",
            self.backend,
            started_at.elapsed().as_millis(),
            loggable_sql(sql)
        );
        match outcome {
            RawOutcome::Rows(rows) => Executed::Rows(ResultSet::new(rows)),
            RawOutcome::Done => Executed::Success,
        }
    }

    fn fail(&mut self, sql: &str, message: String) -> QueryResult {
        warn!(
            "event=db_query module=adapter status=error backend={} tx_depth={} error={} sql={}",
            self.backend,
            self.transactions.depth(),
            message,
            loggable_sql(sql)
        );
        self.last_error = message;
        Err(QueryFailed)
    }

    /// Captured error text, prefixed with `transaction_label` inside a
    /// transaction.
    pub(crate) fn error_text(&self, transaction_label: &str) -> Option<String> {
        if !self.is_connected() {
            return None;
        }
        if self.transactions.is_open() {
            Some(format!(
                "Transaction Failed with {transaction_label}: {}",
                self.last_error
            ))
        } else {
            Some(self.last_error.clone())
        }
    }

    pub(crate) fn transaction_depth(&self) -> u32 {
        self.transactions.depth()
    }

    pub(crate) fn begin(&mut self, begin_sql: &str) {
        if self.transactions.enter() {
            debug!(
                "event=db_tx module=adapter status=begin backend={}",
                self.backend
            );
            let _ = self.run(begin_sql);
        }
    }

    pub(crate) fn commit(&mut self) {
        if self.transactions.leave() {
            debug!(
                "event=db_tx module=adapter status=commit backend={}",
                self.backend
            );
            let _ = self.run("COMMIT");
        }
    }

    pub(crate) fn rollback(&mut self) {
        debug!(
            "event=db_tx module=adapter status=rollback backend={} tx_depth={}",
            self.backend,
            self.transactions.depth()
        );
        let _ = self.run("ROLLBACK");
        self.transactions.reset();
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
