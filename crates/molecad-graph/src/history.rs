//! Snapshot undo history.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Project state captured before a user edit
#[derive(Debug, Clone)]
pub struct UndoEntry {
    /// Project JSON as it was before the edit
    pub snapshot: String,
    /// Kind of edit, e.g. "placeAtom"
    pub operation: String,
    /// What the edit touched, for logs
    pub context: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded stack of snapshots; the oldest entry is dropped when full
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    depth: usize,
}

impl UndoStack {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    pub fn push(&mut self, snapshot: String, operation: &str, context: impl Into<String>) {
        if self.depth == 0 {
            return;
        }
        self.entries.push_back(UndoEntry {
            snapshot,
            operation: operation.to_string(),
            context: context.into(),
            timestamp: Utc::now(),
        });
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_is_bounded() {
        let mut stack = UndoStack::new(2);
        for i in 0..4 {
            stack.push(format!("{{\"n\":{}}}", i), "placeAtom", "");
        }
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().map(|e| e.snapshot), Some("{\"n\":3}".to_string()));
        assert_eq!(stack.pop().map(|e| e.snapshot), Some("{\"n\":2}".to_string()));
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_zero_depth_keeps_nothing() {
        let mut stack = UndoStack::new(0);
        stack.push("{}".to_string(), "deleteAtom", "a");
        assert!(!stack.can_undo());
    }
}
