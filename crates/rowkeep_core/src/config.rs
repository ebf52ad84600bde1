//! Connection and logging configuration types.
//!
//! # Responsibility
//! - Describe how to reach each supported backend.
//! - Deserialize from whatever format the embedding application loads.
//!
//! # Invariants
//! - Missing server fields fall back to `localhost` / `nobody` / empty password.
//! - A missing port resolves to the backend default at connect time.
//! - `Debug` output never contains the password.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

pub const MYSQL_DEFAULT_PORT: u16 = 3306;
pub const MSSQL_DEFAULT_PORT: u16 = 1433;

/// Backend selection plus its connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DatabaseConfig {
    Mysql(ServerConfig),
    Mssql(ServerConfig),
    Sqlite(SqliteConfig),
}

/// Settings for a networked backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    /// Database selected right after connecting.
    pub db_name: Option<String>,
    pub socket: Option<String>,
    pub client_flags: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            user: "nobody".to_string(),
            password: String::new(),
            db_name: None,
            socket: None,
            client_flags: 0,
        }
    }
}

impl ServerConfig {
    pub fn port_or(&self, default_port: u16) -> u16 {
        self.port.unwrap_or(default_port)
    }
}

impl Debug for ServerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("socket", &self.socket)
            .field("client_flags", &self.client_flags)
            .finish()
    }
}

/// Settings for the embedded SQLite backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    pub db_name: Option<String>,
}

impl SqliteConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            db_name: None,
        }
    }
}

/// Logger bootstrap settings consumed by `logging::init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub log_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::{ServerConfig, MYSQL_DEFAULT_PORT};

    #[test]
    fn debug_output_redacts_password() {
        let config = ServerConfig {
            password: "hunter2".to_string(),
            ..ServerConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_port_uses_backend_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port_or(MYSQL_DEFAULT_PORT), 3306);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.user, "nobody");
    }
}
