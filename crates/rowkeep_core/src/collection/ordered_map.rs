//! Insertion-ordered string-keyed map backing `Collection`.

use indexmap::IndexMap;

/// Ordered key → value store with positional access.
///
/// Removing an entry keeps the relative order of the others; inserting an
/// existing key replaces its value in place.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    entries: IndexMap<String, V>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.shift_remove(key)
    }

    /// Moves the entry under `from` to key `to`, keeping its position.
    ///
    /// An entry already stored under `to` is replaced: it leaves the map and
    /// the renamed entry stays in its own slot.
    pub fn rename_key(&mut self, from: &str, to: String) -> bool {
        let Some((mut index, _, value)) = self.entries.shift_remove_full(from) else {
            return false;
        };
        if let Some((displaced, _, _)) = self.entries.shift_remove_full(to.as_str()) {
            if displaced < index {
                index -= 1;
            }
        }
        self.entries
            .shift_insert(index.min(self.entries.len()), to, value);
        true
    }

    pub fn get_index(&self, index: usize) -> Option<(&str, &V)> {
        self.entries
            .get_index(index)
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    /// Rebuilds the map in the order of `keys`.
    ///
    /// Entries not named in `keys` are dropped. Fails with the first key that
    /// is not present, leaving the map untouched.
    pub fn reorder<K: AsRef<str>>(&mut self, keys: &[K]) -> Result<(), String> {
        if let Some(missing) = keys
            .iter()
            .map(AsRef::as_ref)
            .find(|key| !self.entries.contains_key(*key))
        {
            return Err(missing.to_string());
        }
        self.apply_order(keys);
        Ok(())
    }

    pub(crate) fn apply_order<K: AsRef<str>>(&mut self, keys: &[K]) {
        let mut previous = std::mem::take(&mut self.entries);
        let mut sorted = IndexMap::with_capacity(keys.len());
        for key in keys {
            if let Some((key, value)) = previous.swap_remove_entry(key.as_ref()) {
                sorted.insert(key, value);
            }
        }
        self.entries = sorted;
    }
}
