//! Bounded undo/redo history (spec §4.6).
//!
//! No direct teacher equivalent — grounded in the teacher's own
//! acknowledgement (`main.rs` module doc-comment: "State management is
//! handled by ProjectController in TypeScript") that this layer exists in
//! the original app but was never ported to Rust. Built from the spec's
//! contract directly: a bounded ring buffer of pre-image snapshots, with
//! composite grouping for multi-step operations like paste.

use std::collections::VecDeque;

use pls_core::{Calendar, Task};

/// A full pre-image of the state the controller can roll back to.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub calendar: Calendar,
}

/// Default ring-buffer depth (spec §4.6 "Bounded ring buffer (default 50
/// entries)").
pub const DEFAULT_CAPACITY: usize = 50;

struct CompositeBuilder {
    /// The state captured when the composite began; only one entry is
    /// ultimately pushed no matter how many `checkpoint` calls occur while
    /// it is open.
    opening_snapshot: Snapshot,
}

pub struct History {
    capacity: usize,
    undo_stack: VecDeque<Snapshot>,
    redo_stack: Vec<Snapshot>,
    composite: Option<CompositeBuilder>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        History {
            capacity,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            composite: None,
        }
    }

    /// Record `snapshot` as the pre-image of an about-to-happen mutation.
    /// Mutations after an undo truncate the redo stack (spec §4.6
    /// invariant). While a composite is open, only its opening snapshot is
    /// ever pushed, collapsing N mutations into one undo step.
    pub fn checkpoint(&mut self, snapshot: Snapshot) {
        self.redo_stack.clear();

        if self.composite.is_some() {
            return;
        }

        if self.undo_stack.len() == self.capacity {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(snapshot);
    }

    /// Start a composite: the next `checkpoint` calls are absorbed until
    /// `end_composite` or `cancel_composite`.
    pub fn begin_composite(&mut self, opening_snapshot: Snapshot) {
        self.redo_stack.clear();
        if self.undo_stack.len() == self.capacity {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(opening_snapshot.clone());
        self.composite = Some(CompositeBuilder { opening_snapshot });
    }

    pub fn end_composite(&mut self) {
        self.composite = None;
    }

    /// Discard an in-progress composite: removes the placeholder entry it
    /// pushed on `begin_composite` (used during rollback, spec §4.6).
    pub fn cancel_composite(&mut self) {
        if self.composite.take().is_some() {
            self.undo_stack.pop_back();
        }
    }

    /// Pop the most recent pre-image, pushing `current` onto the redo
    /// stack so a subsequent `redo` can restore it.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    /// Inverse of `undo`.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo_stack.pop()?;
        if self.undo_stack.len() == self.capacity {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(marker: &str) -> Snapshot {
        Snapshot {
            tasks: vec![Task::new(marker, "V", 1)],
            calendar: Calendar::default(),
        }
    }

    #[test]
    fn undo_then_redo_restores_exact_state() {
        let mut history = History::new(DEFAULT_CAPACITY);
        history.checkpoint(snap("before"));
        let undone = history.undo(snap("after")).unwrap();
        assert_eq!(undone, snap("before"));
        let redone = history.redo(snap("before")).unwrap();
        assert_eq!(redone, snap("after"));
    }

    #[test]
    fn mutation_after_undo_truncates_redo_stack() {
        let mut history = History::new(DEFAULT_CAPACITY);
        history.checkpoint(snap("v1"));
        history.undo(snap("v2")).unwrap();
        assert!(history.can_redo());
        history.checkpoint(snap("v2"));
        assert!(!history.can_redo());
    }

    #[test]
    fn ring_buffer_drops_oldest_entry_past_capacity() {
        let mut history = History::new(2);
        history.checkpoint(snap("v0"));
        history.checkpoint(snap("v1"));
        history.checkpoint(snap("v2"));
        assert_eq!(history.undo(snap("v3")).unwrap(), snap("v2"));
        assert_eq!(history.undo(snap("v2")).unwrap(), snap("v1"));
        assert!(!history.can_undo());
    }

    #[test]
    fn composite_collapses_multiple_checkpoints_into_one_entry() {
        let mut history = History::new(DEFAULT_CAPACITY);
        history.begin_composite(snap("opening"));
        history.checkpoint(snap("mid1"));
        history.checkpoint(snap("mid2"));
        history.end_composite();
        assert_eq!(history.undo(snap("final")).unwrap(), snap("opening"));
        assert!(!history.can_undo());
    }

    #[test]
    fn cancel_composite_discards_its_placeholder() {
        let mut history = History::new(DEFAULT_CAPACITY);
        history.checkpoint(snap("v0"));
        history.begin_composite(snap("opening"));
        history.cancel_composite();
        assert_eq!(history.undo(snap("v1")).unwrap(), snap("v0"));
        assert!(!history.can_undo());
    }
}
