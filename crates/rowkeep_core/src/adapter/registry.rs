//! Named, externally owned adapters and config-driven backend selection.

use super::driver::Connector;
use super::{AdapterError, AdapterResult, DatabaseAdapter, MssqlAdapter, MysqlAdapter, SqliteAdapter};
use crate::config::DatabaseConfig;
use log::info;
use std::collections::HashMap;

/// Alias used by descriptors that do not name a connection.
pub const DEFAULT_CONNECTION: &str = "default";

/// Opens the adapter implementation selected by `config`.
///
/// Networked backends need a `connector` from the embedding application.
///
/// # Errors
/// - `AdapterError::Configuration` when a networked backend has no connector.
/// - `AdapterError::Connection` when connecting fails.
pub fn open_adapter(
    config: &DatabaseConfig,
    connector: Option<&dyn Connector>,
) -> AdapterResult<Box<dyn DatabaseAdapter>> {
    match config {
        DatabaseConfig::Sqlite(sqlite) => Ok(Box::new(SqliteAdapter::open(sqlite)?)),
        DatabaseConfig::Mysql(server) => {
            let connector = connector.ok_or_else(|| missing_connector("mysql"))?;
            Ok(Box::new(MysqlAdapter::connect(connector, server)?))
        }
        DatabaseConfig::Mssql(server) => {
            let connector = connector.ok_or_else(|| missing_connector("mssql"))?;
            Ok(Box::new(MssqlAdapter::connect(connector, server)?))
        }
    }
}

fn missing_connector(backend: &str) -> AdapterError {
    AdapterError::Configuration(format!("{backend} backend requires a driver connector"))
}

/// Connections shared by collections and domain objects, keyed by alias.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Box<dyn DatabaseAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `adapter` under `DEFAULT_CONNECTION`.
    pub fn with_default(adapter: Box<dyn DatabaseAdapter>) -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_CONNECTION, adapter);
        registry
    }

    /// Registers `adapter` under `alias`, returning any adapter it replaces.
    pub fn register(
        &mut self,
        alias: impl Into<String>,
        adapter: Box<dyn DatabaseAdapter>,
    ) -> Option<Box<dyn DatabaseAdapter>> {
        let alias = alias.into();
        info!(
            "event=registry_register module=adapter status=ok alias={} backend={}",
            alias,
            adapter.backend()
        );
        self.adapters.insert(alias, adapter)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.adapters.contains_key(alias)
    }

    pub fn get(&self, alias: &str) -> AdapterResult<&dyn DatabaseAdapter> {
        self.adapters
            .get(alias)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| unknown_alias(alias))
    }

    pub fn get_mut(&mut self, alias: &str) -> AdapterResult<&mut dyn DatabaseAdapter> {
        match self.adapters.get_mut(alias) {
            Some(adapter) => Ok(adapter.as_mut()),
            None => Err(unknown_alias(alias)),
        }
    }

    pub fn remove(&mut self, alias: &str) -> Option<Box<dyn DatabaseAdapter>> {
        self.adapters.remove(alias)
    }

    pub fn disconnect_all(&mut self) {
        for adapter in self.adapters.values_mut() {
            adapter.disconnect();
        }
    }
}

fn unknown_alias(alias: &str) -> AdapterError {
    AdapterError::Configuration(format!("no adapter registered as `{alias}`"))
}
