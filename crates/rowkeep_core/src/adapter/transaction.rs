//! Nesting counter shared by every adapter's transaction control.
//!
//! Only the outermost start issues a BEGIN and only the return to depth zero
//! issues a COMMIT. A rollback always unwinds the whole nesting; there is no
//! savepoint support.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionDepth {
    depth: u32,
}

impl TransactionDepth {
    pub fn depth(self) -> u32 {
        self.depth
    }

    pub fn is_open(self) -> bool {
        self.depth > 0
    }

    /// Records one more level; returns whether BEGIN must be issued.
    pub fn enter(&mut self) -> bool {
        let outermost = self.depth == 0;
        self.depth += 1;
        outermost
    }

    /// Leaves one level; returns whether COMMIT must be issued.
    ///
    /// At depth zero this keeps returning `true`, so unmatched commits are
    /// sent to the backend every time.
    pub fn leave(&mut self) -> bool {
        if self.depth > 0 {
            self.depth -= 1;
        }
        self.depth == 0
    }

    pub fn reset(&mut self) {
        self.depth = 0;
    }
}
