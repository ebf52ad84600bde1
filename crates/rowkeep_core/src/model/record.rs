//! Domain object contracts consumed by collections.

use crate::adapter::{DatabaseAdapter, DEFAULT_CONNECTION};
use crate::value::{Row, RowError, SqlValue};

/// Read-only projection of a domain object to a comparable value.
pub type Accessor<E> = fn(&E) -> SqlValue;

/// Instance-level contract of a persisted domain object.
pub trait Record {
    /// Flattened primary key, `None` until the object has been persisted.
    fn key(&self) -> Option<String>;

    fn has_key(&self) -> bool {
        self.key().is_some()
    }

    /// Persists the object (insert, update or delete as it sees fit).
    ///
    /// Returns `false` on failure; the reason stays on `db.last_error()`.
    fn save(&mut self, db: &mut dyn DatabaseAdapter) -> bool;
}

/// Type-level metadata a collection needs to load and index objects.
pub trait Descriptor: Record + Sized {
    fn table_name() -> &'static str;

    fn primary_key_field_names() -> &'static [&'static str];

    /// Database selected before every load.
    fn database_name() -> &'static str;

    /// Registry alias of the adapter this type lives on.
    fn connection_alias() -> &'static str {
        DEFAULT_CONNECTION
    }

    /// Base SELECT used by collection loads; filters are appended to it.
    fn default_load_sql() -> String {
        format!("SELECT * FROM {}", Self::table_name())
    }

    /// Builds one object from a result row.
    fn from_row(row: &Row) -> Result<Self, RowError>;

    /// Named read-only accessor used by name-based sorting and projection.
    fn accessor(_name: &str) -> Option<Accessor<Self>> {
        None
    }
}

/// Joins key parts with `,`; `None` if any part is NULL or `parts` is empty.
pub fn flatten_key(parts: &[SqlValue]) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    let texts = parts
        .iter()
        .map(SqlValue::to_text)
        .collect::<Option<Vec<_>>>()?;
    Some(texts.join(","))
}
