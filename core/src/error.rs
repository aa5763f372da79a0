//! Errors reported by the instruction buffer.

use core::fmt;

use crate::String;

/// A half-open or closed interval of valid indices, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidRange {
    pub end: usize,
    pub inclusive: bool,
}

impl ValidRange {
    /// `[0, len]`, positions between steps.
    pub fn positions(len: usize) -> Self {
        Self { end: len, inclusive: true }
    }

    /// `[0, len)`, existing steps.
    pub fn elements(len: usize) -> Self {
        Self { end: len, inclusive: false }
    }

    pub fn contains(&self, index: usize) -> bool {
        if self.inclusive { index <= self.end } else { index < self.end }
    }
}

impl fmt::Display for ValidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let close = if self.inclusive { ']' } else { ')' };
        write!(f, "[0, {}{close}", self.end)
    }
}

/// The buffer operation that received a bad index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedOperation {
    Insert,
    Remove,
    OffsetQuery,
}

impl fmt::Display for IndexedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Remove => "remove",
            Self::OffsetQuery => "offset query",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("{operation} index {index} is out of range, expected a value in {valid}")]
    IndexOutOfRange {
        operation: IndexedOperation,
        index: usize,
        valid: ValidRange,
    },

    #[error("no local is in scope for slot {slot} at step {index}")]
    MissingScope { slot: u16, index: usize },

    #[error("operand `{operand}` at step {index} is not a local slot")]
    InvalidSlot { operand: String, index: usize },

    #[error("slot {slot} at step {index} is claimed by both `{first}` and `{second}`")]
    ConflictingScopes {
        slot: u16,
        index: usize,
        first: String,
        second: String,
    },
}

impl BufferError {
    /// Check `index` against `valid`.
    pub(crate) fn check_index(
        operation: IndexedOperation,
        index: usize,
        valid: ValidRange,
    ) -> Result<(), BufferError> {
        if valid.contains(index) {
            Ok(())
        } else {
            Err(BufferError::IndexOutOfRange {
                operation,
                index,
                valid,
            })
        }
    }
}
