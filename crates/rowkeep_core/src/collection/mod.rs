//! Keyed collections of persisted domain objects.
//!
//! # Responsibility
//! - Bulk-load objects of one `Descriptor` type through its adapter.
//! - Index objects by key, or by a synthetic key until their first save.
//! - Bulk-save live objects and flush soft-removed ones.
//!
//! # Invariants
//! - Keys are unique; an element is live or pending removal, never both.
//! - `save` attempts every element even after a failure and never rolls
//!   back; callers wanting atomicity wrap it in an adapter transaction.
//! - Removed elements are forgotten once `save` has flushed them.

use crate::adapter::{AdapterError, AdapterRegistry, DatabaseAdapter, Executed, QueryResult};
use crate::logging::loggable_sql;
use crate::model::{Accessor, Descriptor};
use crate::value::{RowError, SqlValue};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

mod iter;
mod ordered_map;
mod sort;

pub use iter::{Iter, KeyValueIter};
pub use ordered_map::OrderedMap;
pub use sort::{SortDirection, SortSpec};

/// Shared handle to a collected domain object.
pub type Shared<E> = Rc<RefCell<E>>;

pub type CollectionResult<T> = Result<T, CollectionError>;

const SYNTHETIC_KEY_PREFIX: char = '~';

#[derive(Debug)]
pub enum CollectionError {
    /// Ambiguous or missing type metadata (e.g. composite key without an
    /// explicit field for `load_by_ids`).
    Configuration(String),
    Adapter(AdapterError),
    InvalidRow(RowError),
    /// `sort_by_keys` named a key that is not in the collection.
    UnknownKey(String),
    UnknownAccessor(String),
    EmptySortSpec,
}

impl Display for CollectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "collection configuration error: {message}"),
            Self::Adapter(err) => write!(f, "{err}"),
            Self::InvalidRow(err) => write!(f, "cannot build element from row: {err}"),
            Self::UnknownKey(key) => write!(f, "collection has no element with key `{key}`"),
            Self::UnknownAccessor(name) => write!(f, "element type has no accessor `{name}`"),
            Self::EmptySortSpec => write!(f, "sort requires at least one accessor"),
        }
    }
}

impl Error for CollectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Adapter(err) => Some(err),
            Self::InvalidRow(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AdapterError> for CollectionError {
    fn from(value: AdapterError) -> Self {
        Self::Adapter(value)
    }
}

impl From<RowError> for CollectionError {
    fn from(value: RowError) -> Self {
        Self::InvalidRow(value)
    }
}

/// Target of `get`/`remove`: a key, or an element handle.
pub enum Lookup<'a, E> {
    Key(&'a str),
    Element(&'a Shared<E>),
}

impl<'a, E> From<&'a str> for Lookup<'a, E> {
    fn from(value: &'a str) -> Self {
        Self::Key(value)
    }
}

impl<'a, E> From<&'a String> for Lookup<'a, E> {
    fn from(value: &'a String) -> Self {
        Self::Key(value.as_str())
    }
}

impl<'a, E> From<&'a Shared<E>> for Lookup<'a, E> {
    fn from(value: &'a Shared<E>) -> Self {
        Self::Element(value)
    }
}

/// Ordered, key-addressable container of one domain object type.
pub struct Collection<E: Descriptor> {
    elements: OrderedMap<Shared<E>>,
    removed: Vec<Shared<E>>,
}

impl<E: Descriptor> Default for Collection<E> {
    fn default() -> Self {
        Self {
            elements: OrderedMap::new(),
            removed: Vec::new(),
        }
    }
}

impl<E: Descriptor> Collection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every row of `E::default_load_sql()`.
    ///
    /// Returns `Ok(false)` when the statement failed; the reason is on the
    /// adapter's `last_error()`.
    pub fn load(&mut self, registry: &mut AdapterRegistry) -> CollectionResult<bool> {
        self.load_by_sql(registry, &E::default_load_sql())
    }

    /// Loads every row returned by `sql`.
    pub fn load_by_sql(&mut self, registry: &mut AdapterRegistry, sql: &str) -> CollectionResult<bool> {
        let db = registry.get_mut(E::connection_alias())?;
        select_element_database::<E>(db);
        let outcome = db.execute(sql);
        self.populate(outcome, sql)
    }

    /// Loads rows whose fields equal the given values (`IS NULL` for nulls).
    ///
    /// An empty mapping performs no query.
    pub fn load_by_hash<I, K, V>(&mut self, registry: &mut AdapterRegistry, fields: I) -> CollectionResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SqlValue>,
    {
        let fields = fields
            .into_iter()
            .map(|(field, value)| (field.as_ref().to_string(), value.into()))
            .collect::<Vec<(String, SqlValue)>>();
        if fields.is_empty() {
            return Ok(true);
        }

        let sql = {
            let db = registry.get(E::connection_alias())?;
            let conditions = fields
                .iter()
                .map(|(field, value)| {
                    let column = db.quote_identifier(field);
                    if value.is_null() {
                        format!("{column} IS NULL")
                    } else {
                        format!("{column} = {}", db.quote(value))
                    }
                })
                .collect::<Vec<_>>();
            format!("{} WHERE {}", E::default_load_sql(), conditions.join(" AND "))
        };

        self.load_by_sql(registry, &sql)
    }

    /// Loads rows whose key field is one of `ids`.
    ///
    /// `field_name` defaults to the single primary-key field. An empty `ids`
    /// performs no query.
    ///
    /// # Errors
    /// - `CollectionError::Configuration` when no field is given and the type
    ///   does not have exactly one primary-key field.
    pub fn load_by_ids<I, V>(
        &mut self,
        registry: &mut AdapterRegistry,
        ids: I,
        field_name: Option<&str>,
    ) -> CollectionResult<bool>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let field = match field_name {
            Some(field) => field.to_string(),
            None => match E::primary_key_field_names() {
                [only] => (*only).to_string(),
                fields => {
                    return Err(CollectionError::Configuration(format!(
                        "cannot load `{}` by ids: expected exactly one primary key field or an explicit field name, found {}",
                        E::table_name(),
                        fields.len()
                    )))
                }
            },
        };

        let ids = ids.into_iter().map(Into::into).collect::<Vec<SqlValue>>();
        if ids.is_empty() {
            return Ok(true);
        }

        let sql = {
            let db = registry.get(E::connection_alias())?;
            let quoted_ids = ids.iter().map(|id| db.quote(id)).collect::<Vec<_>>();
            format!(
                "{} WHERE {}.{} IN ({})",
                E::default_load_sql(),
                db.quote_identifier(E::table_name()),
                db.quote_identifier(&field),
                quoted_ids.join(",")
            )
        };

        self.load_by_sql(registry, &sql)
    }

    /// Loads rows through the adapter's prepared-statement path.
    ///
    /// # Errors
    /// - `CollectionError::Adapter` with `AdapterError::Unsupported` on
    ///   backends without prepared statements.
    pub fn load_by_prepared_stmt(
        &mut self,
        registry: &mut AdapterRegistry,
        sql: &str,
        params: &[SqlValue],
        type_hints: &str,
    ) -> CollectionResult<bool> {
        let db = registry.get_mut(E::connection_alias())?;
        select_element_database::<E>(db);
        let outcome = db.execute_prepared(sql, params, type_hints)?;
        self.populate(outcome, sql)
    }

    fn populate(&mut self, outcome: QueryResult, sql: &str) -> CollectionResult<bool> {
        match outcome {
            Err(_) => {
                warn!(
                    "event=collection_load module=collection status=error table={} sql={}",
                    E::table_name(),
                    loggable_sql(sql)
                );
                Ok(false)
            }
            Ok(Executed::Success) => Ok(true),
            Ok(Executed::Rows(rows)) => {
                let row_count = rows.row_count();
                let loaded = rows
                    .map(|row| E::from_row(&row))
                    .collect::<Result<Vec<_>, _>>()?;
                for element in loaded {
                    self.add(element);
                }
                debug!(
                    "event=collection_load module=collection status=ok table={} rows={}",
                    E::table_name(),
                    row_count
                );
                Ok(true)
            }
        }
    }

    /// Saves every live element, then every removed one.
    ///
    /// All elements are attempted. Elements that gained a key while saving
    /// are re-indexed under it, keeping their position; an element already
    /// indexed under that key is replaced. The removed list is cleared
    /// whatever the outcome. Returns `Ok(true)` iff every save returned
    /// `true`.
    pub fn save(&mut self, registry: &mut AdapterRegistry) -> CollectionResult<bool> {
        let db = registry.get_mut(E::connection_alias())?;
        let mut success = true;
        let mut unkeyed = Vec::new();
        let mut failures = 0usize;

        for (key, element) in self.elements.iter() {
            if !element.borrow().has_key() {
                unkeyed.push(key.to_string());
            }
            if !element.borrow_mut().save(db) {
                success = false;
                failures += 1;
            }
        }

        for synthetic in unkeyed {
            let real_key = self
                .elements
                .get(&synthetic)
                .and_then(|element| element.borrow().key());
            if let Some(real_key) = real_key {
                if self.elements.contains_key(&real_key) {
                    warn!(
                        "event=collection_save module=collection status=warn table={} reason=key_collision key={}",
                        E::table_name(),
                        real_key
                    );
                }
                self.elements.rename_key(&synthetic, real_key);
            }
        }

        let removed = std::mem::take(&mut self.removed);
        for element in &removed {
            if !element.borrow_mut().save(db) {
                success = false;
                failures += 1;
            }
        }

        info!(
            "event=collection_save module=collection status={} table={} live={} removed={} failures={}",
            if success { "ok" } else { "error" },
            E::table_name(),
            self.elements.len(),
            removed.len(),
            failures
        );
        Ok(success)
    }

    /// Adds `element` under its key, or a synthetic key while it has none.
    pub fn add(&mut self, element: E) -> Shared<E> {
        let key = element.key().unwrap_or_else(synthetic_key);
        let element = Rc::new(RefCell::new(element));
        self.elements.insert(key, Rc::clone(&element));
        element
    }

    /// Adds an existing handle. Re-adding a collected handle keeps one entry.
    pub fn add_shared(&mut self, element: Shared<E>) -> Shared<E> {
        let existing = self.key_of_instance(&element);
        let own_key = element.borrow().key();
        let key = own_key.unwrap_or_else(|| existing.clone().unwrap_or_else(synthetic_key));
        if let Some(existing) = existing {
            if existing != key {
                self.elements.rename_key(&existing, key.clone());
            }
        }
        self.removed.retain(|pending| !Rc::ptr_eq(pending, &element));
        self.elements.insert(key, Rc::clone(&element));
        element
    }

    /// Resolves a key, or an element by its key (or by identity while it
    /// has none).
    pub fn get<'a>(&self, target: impl Into<Lookup<'a, E>>) -> Option<Shared<E>>
    where
        E: 'a,
    {
        let key = self.resolve(target.into())?;
        self.elements.get(&key).cloned()
    }

    /// Moves the resolved element to the pending-removal list.
    ///
    /// Returns `None` when nothing matched. The element's own `save` runs on
    /// the next collection `save`.
    pub fn remove<'a>(&mut self, target: impl Into<Lookup<'a, E>>) -> Option<Shared<E>>
    where
        E: 'a,
    {
        let key = self.resolve(target.into())?;
        let element = self.elements.remove(&key)?;
        self.removed.push(Rc::clone(&element));
        Some(element)
    }

    fn resolve(&self, target: Lookup<'_, E>) -> Option<String> {
        match target {
            Lookup::Key(key) => self.elements.contains_key(key).then(|| key.to_string()),
            Lookup::Element(element) => {
                let key = element.borrow().key();
                match key {
                    Some(key) => self.elements.contains_key(&key).then_some(key),
                    None => self.key_of_instance(element),
                }
            }
        }
    }

    fn key_of_instance(&self, target: &Shared<E>) -> Option<String> {
        self.elements
            .iter()
            .find(|(_, element)| Rc::ptr_eq(element, target))
            .map(|(key, _)| key.to_string())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.elements.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.keys()
    }

    /// Element at zero-based `position` in iteration order.
    pub fn position(&self, position: usize) -> Option<Shared<E>> {
        let mut iter = self.iter();
        if !iter.seek(position) {
            return None;
        }
        iter.current().map(|(_, element)| Rc::clone(element))
    }

    pub fn first(&self) -> Option<Shared<E>> {
        self.position(0)
    }

    pub fn last(&self) -> Option<Shared<E>> {
        self.len().checked_sub(1).and_then(|last| self.position(last))
    }

    /// Elements removed since the last `save`.
    pub fn removed(&self) -> &[Shared<E>] {
        &self.removed
    }

    pub fn iter(&self) -> Iter<'_, E> {
        Iter::new(&self.elements)
    }

    /// Projects elements to `(key, value)` pairs through named accessors.
    ///
    /// Without `key` the element's own key is used.
    pub fn key_values(&self, value: &str, key: Option<&str>) -> CollectionResult<KeyValueIter<'_, E>> {
        let value = resolve_accessor::<E>(value)?;
        let key = key.map(resolve_accessor::<E>).transpose()?;
        Ok(KeyValueIter::new(self.iter(), value, key))
    }

    /// Reorders to exactly `keys`; elements not listed are dropped.
    ///
    /// # Errors
    /// - `CollectionError::UnknownKey` for a key not in the collection; the
    ///   collection is left unchanged.
    pub fn sort_by_keys<K: AsRef<str>>(&mut self, keys: &[K]) -> CollectionResult<()> {
        self.elements
            .reorder(keys)
            .map_err(CollectionError::UnknownKey)
    }

    /// Stable sort by the named accessor.
    pub fn sort_by_method(&mut self, accessor: &str, direction: SortDirection) -> CollectionResult<()> {
        self.sort_by_methods(&[SortSpec::new(accessor, direction)])
    }

    /// Stable multi-column sort, like an ORDER BY over named accessors.
    pub fn sort_by_methods(&mut self, specs: &[SortSpec]) -> CollectionResult<()> {
        if specs.is_empty() {
            return Err(CollectionError::EmptySortSpec);
        }
        let columns = specs
            .iter()
            .map(|spec| resolve_accessor::<E>(&spec.accessor).map(|accessor| (accessor, spec)))
            .collect::<CollectionResult<Vec<_>>>()?;

        let mut rows = self
            .elements
            .iter()
            .map(|(key, element)| {
                let element = element.borrow();
                let values = columns
                    .iter()
                    .map(|(accessor, _)| accessor(&*element))
                    .collect::<Vec<_>>();
                (values, key.to_string())
            })
            .collect::<Vec<_>>();

        rows.sort_by(|(left, _), (right, _)| {
            columns
                .iter()
                .enumerate()
                .map(|(index, (_, spec))| {
                    spec.direction
                        .apply(left[index].compare(&right[index], spec.mode))
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let order = rows.into_iter().map(|(_, key)| key).collect::<Vec<_>>();
        self.elements.apply_order(&order);
        Ok(())
    }

    /// Stable sort by a derived key.
    pub fn sort_by<K: Ord>(&mut self, key_fn: impl Fn(&E) -> K, direction: SortDirection) {
        let mut rows = self
            .elements
            .iter()
            .map(|(key, element)| (key_fn(&*element.borrow()), key.to_string()))
            .collect::<Vec<_>>();
        rows.sort_by(|(left, _), (right, _)| direction.apply(left.cmp(right)));
        let order = rows.into_iter().map(|(_, key)| key).collect::<Vec<_>>();
        self.elements.apply_order(&order);
    }
}

fn select_element_database<E: Descriptor>(db: &mut dyn DatabaseAdapter) {
    if !db.select_database(E::database_name()) {
        warn!(
            "event=collection_select module=collection status=error table={} database={}",
            E::table_name(),
            E::database_name()
        );
    }
}

fn resolve_accessor<E: Descriptor>(name: &str) -> CollectionResult<Accessor<E>> {
    E::accessor(name).ok_or_else(|| CollectionError::UnknownAccessor(name.to_string()))
}

fn synthetic_key() -> String {
    format!("{SYNTHETIC_KEY_PREFIX}{}", Uuid::new_v4().simple())
}
