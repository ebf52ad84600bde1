//! Lazy traversal helpers over a `Collection`.

use super::{OrderedMap, Shared};
use crate::model::{Accessor, Record};
use crate::value::SqlValue;

/// Seekable cursor over `(key, element)` pairs in collection order.
pub struct Iter<'a, E> {
    entries: &'a OrderedMap<Shared<E>>,
    position: usize,
}

impl<'a, E> Iter<'a, E> {
    pub(crate) fn new(entries: &'a OrderedMap<Shared<E>>) -> Self {
        Self {
            entries,
            position: 0,
        }
    }

    /// Moves the cursor to `position`; `false` if that is past the end.
    pub fn seek(&mut self, position: usize) -> bool {
        self.position = position;
        position < self.entries.len()
    }

    /// Entry under the cursor without advancing.
    pub fn current(&self) -> Option<(&'a str, &'a Shared<E>)> {
        self.entries.get_index(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = (&'a str, &'a Shared<E>);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.current()?;
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.position);
        (remaining, Some(remaining))
    }
}

impl<E> ExactSizeIterator for Iter<'_, E> {}

/// Projects each element to a `(key, value)` pair through accessors.
///
/// Without a key accessor the element's own key is used (`Null` while
/// unsaved).
pub struct KeyValueIter<'a, E> {
    inner: Iter<'a, E>,
    value: Accessor<E>,
    key: Option<Accessor<E>>,
}

impl<'a, E> KeyValueIter<'a, E> {
    pub(crate) fn new(inner: Iter<'a, E>, value: Accessor<E>, key: Option<Accessor<E>>) -> Self {
        Self { inner, value, key }
    }
}

impl<E: Record> Iterator for KeyValueIter<'_, E> {
    type Item = (SqlValue, SqlValue);

    fn next(&mut self) -> Option<Self::Item> {
        let (_, element) = self.inner.next()?;
        let element = element.borrow();
        let key = match self.key {
            Some(accessor) => accessor(&*element),
            None => element.key().map_or(SqlValue::Null, SqlValue::Text),
        };
        Some((key, (self.value)(&*element)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
