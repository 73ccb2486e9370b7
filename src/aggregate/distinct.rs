//! DISTINCT row filtering.

use std::collections::HashSet;

use crate::query::Value;

/// Separator between values in a fingerprint, so `("1", "23")` and
/// `("12", "3")` stay distinct.
const SEPARATOR: char = '\u{1f}';

/// Remembers the fingerprint of every row seen so far.
#[derive(Debug, Clone, Default)]
pub struct Distinct {
    seen: HashSet<String>,
}

impl Distinct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text fingerprint of a row.
    pub fn fingerprint(row: &[Value]) -> String {
        let mut text = String::new();
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                text.push(SEPARATOR);
            }
            text.push_str(&value.to_string());
        }
        text
    }

    /// True the first time a row with this fingerprint is offered.
    pub fn insert(&mut self, row: &[Value]) -> bool {
        self.seen.insert(Self::fingerprint(row))
    }

    /// Keep the first row of each fingerprint, preserving order.
    pub fn dedup(&mut self, rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
        rows.into_iter().filter(|row| self.insert(row)).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn into_fingerprints(self) -> HashSet<String> {
        self.seen
    }
}
