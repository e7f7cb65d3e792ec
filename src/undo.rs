//! Undo/redo manager over serialized store snapshots.
//!
//! History is local to one participant: undo rewinds the local view and does
//! not retract previously-broadcast operations from other replicas. Both
//! stacks are bounded; undo/redo on an empty stack is a no-op, not an error.

use anyhow::Result;

use crate::store::StoreSnapshot;

/// Default maximum history depth
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Manages undo/redo with serialized snapshots of the visible element sequence
pub struct UndoManager {
    /// Stack of pre-gesture states (serialized for memory efficiency)
    undo_stack: Vec<Vec<u8>>,
    /// Redo stack
    redo_stack: Vec<Vec<u8>>,
    /// Maximum history size
    max_history: usize,
}

impl UndoManager {
    /// Create a new undo manager
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history,
        }
    }

    /// Push the pre-gesture snapshot; called once per completed local
    /// gesture, never per operation. Clears the redo stack.
    pub fn save_state(&mut self, snapshot: &StoreSnapshot) -> Result<()> {
        let bytes = rmp_serde::to_vec(snapshot)?;
        self.undo_stack.push(bytes);
        self.redo_stack.clear();

        // Evict oldest entries beyond the history bound
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    /// Pop the previous state, pushing `current` onto the redo stack.
    /// Returns `None` (a no-op) when there is nothing to undo.
    pub fn undo(&mut self, current: &StoreSnapshot) -> Option<StoreSnapshot> {
        let prev_bytes = self.undo_stack.pop()?;
        let previous = rmp_serde::from_slice(&prev_bytes).ok()?;
        if let Ok(bytes) = rmp_serde::to_vec(current) {
            self.redo_stack.push(bytes);
        }
        Some(previous)
    }

    /// Pop the next state, pushing `current` onto the undo stack.
    /// Returns `None` (a no-op) when there is nothing to redo.
    pub fn redo(&mut self, current: &StoreSnapshot) -> Option<StoreSnapshot> {
        let next_bytes = self.redo_stack.pop()?;
        let next = rmp_serde::from_slice(&next_bytes).ok()?;
        if let Ok(bytes) = rmp_serde::to_vec(current) {
            self.undo_stack.push(bytes);
        }
        Some(next)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}
