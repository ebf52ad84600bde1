//! Forward-only cursor over a statement's row set.

use crate::value::Row;

/// Rows produced by one successful statement.
///
/// Rows are handed out once, in backend order; an exhausted result cannot be
/// rewound.
#[derive(Debug)]
pub struct ResultSet {
    total: usize,
    rows: std::vec::IntoIter<Row>,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            total: rows.len(),
            rows: rows.into_iter(),
        }
    }

    /// Total rows the statement produced, consumed or not.
    pub fn row_count(&self) -> usize {
        self.total
    }

    /// Next row, or `None` once the cursor is exhausted.
    pub fn next_row(&mut self) -> Option<Row> {
        self.rows.next()
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for ResultSet {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.next_row()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for ResultSet {}
