//! Sort specifications for name-based collection ordering.

use crate::value::SortMode;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// One ORDER BY column: a named accessor, its direction and comparison mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub accessor: String,
    pub direction: SortDirection,
    pub mode: SortMode,
}

impl SortSpec {
    pub fn new(accessor: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            accessor: accessor.into(),
            direction,
            mode: SortMode::Regular,
        }
    }

    pub fn asc(accessor: impl Into<String>) -> Self {
        Self::new(accessor, SortDirection::Ascending)
    }

    pub fn desc(accessor: impl Into<String>) -> Self {
        Self::new(accessor, SortDirection::Descending)
    }

    pub fn with_mode(mut self, mode: SortMode) -> Self {
        self.mode = mode;
        self
    }
}
