//! Bounded undo/redo history for scene edits.

use std::collections::VecDeque;

/// Maximum number of undo entries to keep.
pub const MAX_UNDO_ENTRIES: usize = 50;

/// Undo/redo stacks of edit records.
///
/// Pushing a new edit clears the redo stack. History is limited to
/// [`MAX_UNDO_ENTRIES`]; the oldest entries fall off first.
#[derive(Clone, Debug)]
pub struct CommandHistory<E> {
    undo: VecDeque<E>,
    redo: VecDeque<E>,
}

impl<E> Default for CommandHistory<E> {
    fn default() -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
        }
    }
}

impl<E> CommandHistory<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edit: E) {
        self.redo.clear();
        self.undo.push_back(edit);
        while self.undo.len() > MAX_UNDO_ENTRIES {
            self.undo.pop_front();
        }
    }

    /// Pops the most recent edit and parks it for redo.
    pub fn undo(&mut self) -> Option<&E> {
        let edit = self.undo.pop_back()?;
        self.redo.push_back(edit);
        self.redo.back()
    }

    /// Re-applies the most recently undone edit.
    pub fn redo(&mut self) -> Option<&E> {
        let edit = self.redo.pop_back()?;
        self.undo.push_back(edit);
        self.undo.back()
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[inline]
    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
