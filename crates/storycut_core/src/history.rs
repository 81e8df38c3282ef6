use crate::error::{CoreError, Result};
use crate::types::Timeline;

/// Undo/redo history of whole-timeline snapshots.
///
/// Every committed mutation records one snapshot of the full model (layered
/// clips plus the voice list). Transient drag state is never recorded; the
/// caller commits once on pointer release.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Timeline>,
    redo_stack: Vec<Timeline>,
    max_size: usize,
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Record the state that existed before a committed mutation. Clears
    /// the redo stack.
    pub fn record(&mut self, before: &Timeline) {
        self.redo_stack.clear();
        self.undo_stack.push(before.clone());
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    /// Swap the current model for the last recorded snapshot.
    pub fn undo(&mut self, current: &mut Timeline) -> Result<()> {
        let snapshot = self.undo_stack.pop().ok_or(CoreError::NothingToUndo)?;
        self.redo_stack.push(std::mem::replace(current, snapshot));
        Ok(())
    }

    /// Swap the current model for the last undone snapshot.
    pub fn redo(&mut self, current: &mut Timeline) -> Result<()> {
        let snapshot = self.redo_stack.pop().ok_or(CoreError::NothingToRedo)?;
        self.undo_stack.push(std::mem::replace(current, snapshot));
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
