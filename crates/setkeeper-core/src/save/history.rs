//! Bounded log of save attempts for diagnostics.

use std::collections::VecDeque;

use crate::models::SaveResult;

#[derive(Debug, Clone)]
pub struct SaveHistory {
    entries: VecDeque<SaveResult>,
    limit: usize,
}

impl SaveHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit: limit.max(1),
        }
    }

    /// Append, dropping the oldest entry once the limit is reached.
    pub fn push(&mut self, result: SaveResult) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&SaveResult> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn to_vec(&self) -> Vec<SaveResult> {
        self.entries.iter().cloned().collect()
    }
}
