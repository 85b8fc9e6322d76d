//! Undo/redo history of content snapshots.
//!
//! Provides:
//! - `UndoManager` trait for abstracting undo implementations
//! - `History` - bounded snapshot stacks used by `SnapshotEngine`

use crate::dom::Fragment;

/// Trait for managing undo/redo operations.
pub trait UndoManager {
    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// One captured state of the editable content.
pub type Snapshot = Vec<Fragment>;

/// Bounded undo/redo stacks.
///
/// `record` pushes the state *before* an edit. `undo` takes the current
/// state and returns the state to restore; `redo` mirrors it.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    max_steps: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

impl History {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_steps: max_steps.max(1),
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn record(&mut self, snapshot: Snapshot) {
        // Clear redo stack on new edit
        self.redo_stack.clear();
        if self.undo_stack.last() == Some(&snapshot) {
            return;
        }
        self.undo_stack.push(snapshot);
        // Trim if over max
        while self.undo_stack.len() > self.max_steps {
            self.undo_stack.remove(0);
        }
    }

    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(next)
    }

    /// Undo everything at once: the oldest recorded state.
    pub fn rewind(&mut self, current: Snapshot) -> Option<Snapshot> {
        if self.undo_stack.is_empty() {
            return None;
        }
        let mut current = current;
        while let Some(previous) = self.undo_stack.pop() {
            self.redo_stack.push(std::mem::replace(&mut current, previous));
        }
        Some(current)
    }
}

impl UndoManager for History {
    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;

    fn snap(text: &str) -> Snapshot {
        vec![Fragment {
            data: NodeData::Text(text.to_string()),
            children: Vec::new(),
        }]
    }

    #[test]
    fn test_undo_redo() {
        let mut history = History::new(10);
        history.record(snap("a"));
        history.record(snap("ab"));

        assert_eq!(history.undo(snap("abc")), Some(snap("ab")));
        assert_eq!(history.undo(snap("ab")), Some(snap("a")));
        assert_eq!(history.undo(snap("a")), None);
        assert!(history.can_redo());
        assert_eq!(history.redo(snap("a")), Some(snap("ab")));
        assert_eq!(history.redo(snap("ab")), Some(snap("abc")));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_new_record_clears_redo() {
        let mut history = History::new(10);
        history.record(snap("a"));
        history.undo(snap("ab"));
        assert!(history.can_redo());
        history.record(snap("a"));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_steps_evicts_oldest() {
        let mut history = History::new(2);
        history.record(snap("1"));
        history.record(snap("2"));
        history.record(snap("3"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(snap("4")), Some(snap("3")));
        assert_eq!(history.undo(snap("3")), Some(snap("2")));
        assert_eq!(history.undo(snap("2")), None);
    }

    #[test]
    fn test_duplicate_record_ignored_and_rewind() {
        let mut history = History::new(10);
        history.record(snap("a"));
        history.record(snap("a"));
        history.record(snap("b"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.rewind(snap("c")), Some(snap("a")));
        assert!(!history.can_undo());
        assert_eq!(history.rewind(snap("a")), None);
    }

    #[test]
    fn test_rewind_keeps_every_state_for_redo() {
        let mut history = History::new(10);
        history.record(snap("a"));
        history.record(snap("b"));
        assert_eq!(history.rewind(snap("c")), Some(snap("a")));
        assert_eq!(history.redo(snap("a")), Some(snap("b")));
        assert_eq!(history.redo(snap("b")), Some(snap("c")));
        assert!(!history.can_redo());
    }
}
