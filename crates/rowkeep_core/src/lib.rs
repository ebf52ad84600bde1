//! Core runtime for rowkeep: backend adapters and keyed object collections.
//! Domain objects plug in through `Record`/`Descriptor`; everything SQL goes
//! through a `DatabaseAdapter`.

pub mod adapter;
pub mod collection;
pub mod config;
pub mod logging;
pub mod model;
pub mod value;

pub use adapter::{
    open_adapter, AdapterError, AdapterRegistry, AdapterResult, Backend, DatabaseAdapter,
    Executed, MssqlAdapter, MysqlAdapter, QueryFailed, QueryResult, ResultSet, SqliteAdapter,
    DEFAULT_CONNECTION,
};
pub use collection::{
    Collection, CollectionError, CollectionResult, Iter, KeyValueIter, Lookup, Shared,
    SortDirection, SortSpec,
};
pub use config::{DatabaseConfig, LoggingConfig, ServerConfig, SqliteConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{flatten_key, Accessor, Descriptor, Record};
pub use value::{Row, RowError, SortMode, SqlFunction, SqlValue};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
