use std::collections::VecDeque;

/// Bounded undo stack with a redo stack that any new record clears.
#[derive(Debug, Clone)]
pub struct UndoHistory<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    limit: usize,
}

impl<T> UndoHistory<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(limit.min(64)),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Pushes the state being replaced. Oldest entries fall off past the limit.
    pub fn record(&mut self, previous: T) {
        self.undo.push_back(previous);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        self.clear_redo();
    }

    /// Returns the state to restore, stashing `current` for redo.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn undo_on_empty_history_is_noop() {
        let mut history = UndoHistory::<u32>::new(50);
        assert_eq!(history.undo(7), None);
        assert!(!history.can_redo());
    }

    #[test]
    fn record_clears_redo() {
        let mut history = UndoHistory::new(50);
        history.record(0);
        assert_eq!(history.undo(1), Some(0));
        assert!(history.can_redo());

        history.record(0);
        assert!(!history.can_redo());
        assert_eq!(history.redo(5), None);
    }

    #[test]
    fn oldest_entries_are_dropped_first() {
        let mut history = UndoHistory::new(3);
        for state in 0..5 {
            history.record(state);
        }
        assert_eq!(history.undo_len(), 3);
        assert_eq!(history.undo(5), Some(4));
        assert_eq!(history.undo(4), Some(3));
        assert_eq!(history.undo(3), Some(2));
        assert_eq!(history.undo(2), None);
    }

    proptest! {
        #[test]
        fn stack_never_exceeds_limit(edits in 0usize..200) {
            let mut history = UndoHistory::new(50);
            for state in 0..edits {
                history.record(state);
                prop_assert!(history.undo_len() <= 50);
            }
        }

        #[test]
        fn undo_then_redo_restores(states in proptest::collection::vec(any::<u8>(), 1..50)) {
            let mut history = UndoHistory::new(50);
            let mut current = 0u8;
            for state in &states {
                history.record(current);
                current = *state;
            }
            let last = current;
            while let Some(previous) = history.undo(current) {
                current = previous;
            }
            prop_assert_eq!(current, 0);
            while let Some(next) = history.redo(current) {
                current = next;
            }
            prop_assert_eq!(current, last);
        }
    }
}
