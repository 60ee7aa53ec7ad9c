//! Opaque pagination cursor.

use serde::{Deserialize, Serialize};

/// An opaque pagination position. Equal cursors resume the same position
/// for an in-memory backend, as long as the backend was not mutated in
/// between (spec.md §4.2). Callers should not construct or interpret the
/// inner value; it is only meaningful when passed back to
/// `list_paginated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(u64);

impl Cursor {
    pub(crate) fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub(crate) fn offset(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_cursors_compare_equal() {
        assert_eq!(Cursor::new(5), Cursor::new(5));
        assert_ne!(Cursor::new(5), Cursor::new(6));
    }
}
