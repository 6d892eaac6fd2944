//! Undo/redo stacks over [`StoreDelta`] entries.
//!
//! The stacks are owned exclusively by `History`; nothing else mutates them.
//! Entries are continuously rebased against remote state as it lands, so an
//! undo issued after N remote mutations reflects all N. Entries whose replay
//! produces no observable change (their elements were deleted remotely, for
//! instance) are transparently skipped, with selection state threaded
//! through the skipped steps.
//!
//! ERROR HANDLING
//! ==============
//! When an entry's application fails, the entry is still transferred to the
//! opposite stack before the error propagates. The user can always undo/redo
//! past a corrupted entry; they are never stuck. If invisible entries were
//! skipped before the failure, the state they produced rides along in the
//! error so the caller can write it back and keep the scene in step with
//! the transferred stacks.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use tracing::{debug, warn};

use crate::app_state::AppState;
use crate::delta::{DeltaError, StoreDelta};
use crate::element::{ElementMap, visible_change};

/// Error returned by `undo`/`redo`.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A history entry failed to apply. The entry has already been moved to
    /// the opposite stack.
    #[error("failed to apply history entry: {source}")]
    Apply {
        source: DeltaError,
        /// State produced by entries skipped invisibly before the failure,
        /// if any. Those entries have been applied and transferred; the
        /// caller should adopt this state so the scene matches the stacks.
        applied: Option<Box<(ElementMap, AppState)>>,
    },
}

/// Which direction a history step moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

/// The undo and redo stacks, most-recent-last.
#[derive(Debug, Default)]
pub struct History {
    undo_stack: Vec<StoreDelta>,
    redo_stack: Vec<StoreDelta>,
}

impl History {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a captured delta: push onto the undo stack and clear redo.
    ///
    /// Empty deltas are rejected by the store before they reach here; this
    /// guards anyway so the stacks never hold a no-op entry.
    pub fn record(&mut self, delta: StoreDelta) {
        if delta.is_empty() {
            return;
        }
        self.undo_stack.push(delta);
        self.redo_stack.clear();
    }

    /// Drop both stacks. Used when a new document is loaded.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Rebase every entry on both stacks against the latest canonical
    /// element values. Called on every remote commit so that no intermediate
    /// remote value is lost between two undos of the same field.
    pub fn rebase(&mut self, latest: &ElementMap) {
        if latest.is_empty() {
            return;
        }
        for entry in self.undo_stack.iter_mut().chain(self.redo_stack.iter_mut()) {
            *entry = entry.rebased(latest);
        }
        debug!(
            undo = self.undo_stack.len(),
            redo = self.redo_stack.len(),
            changed = latest.len(),
            "rebased history entries against remote state"
        );
    }

    /// Undo the most recent entry, skipping invisible ones.
    ///
    /// Returns the new `(elements, app_state)` pair, or `None` when the undo
    /// stack was already empty.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Apply`] when an entry fails to apply; the entry has
    /// still been transferred to the redo stack.
    pub fn undo(
        &mut self,
        elements: &ElementMap,
        app_state: &AppState,
    ) -> Result<Option<(ElementMap, AppState)>, HistoryError> {
        self.step(Direction::Undo, elements, app_state)
    }

    /// Redo the most recently undone entry, skipping invisible ones.
    ///
    /// Returns the new `(elements, app_state)` pair, or `None` when the redo
    /// stack was already empty.
    ///
    /// # Errors
    ///
    /// [`HistoryError::Apply`] when an entry fails to apply; the entry has
    /// still been transferred to the undo stack.
    pub fn redo(
        &mut self,
        elements: &ElementMap,
        app_state: &AppState,
    ) -> Result<Option<(ElementMap, AppState)>, HistoryError> {
        self.step(Direction::Redo, elements, app_state)
    }

    /// Number of entries on the undo stack.
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of entries on the redo stack.
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    #[must_use]
    pub fn is_undo_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn is_redo_empty(&self) -> bool {
        self.redo_stack.is_empty()
    }

    /// Pop/apply/transfer loop shared by undo and redo.
    ///
    /// Undo applies each entry inverted; redo applies it forward. Either
    /// way the original entry moves to the opposite stack — even when its
    /// application fails — so forward progress is guaranteed. The loop pops
    /// again while the resulting transition is invisible; it terminates
    /// because every iteration shrinks the source stack by one.
    fn step(
        &mut self,
        direction: Direction,
        elements: &ElementMap,
        app_state: &AppState,
    ) -> Result<Option<(ElementMap, AppState)>, HistoryError> {
        let mut current_elements = elements.clone();
        let mut current_app_state = app_state.clone();
        let mut popped_any = false;
        let mut applied_any = false;

        loop {
            let source = match direction {
                Direction::Undo => &mut self.undo_stack,
                Direction::Redo => &mut self.redo_stack,
            };
            let Some(entry) = source.pop() else {
                break;
            };
            popped_any = true;

            let applying = match direction {
                Direction::Undo => entry.invert(),
                Direction::Redo => entry.clone(),
            };
            let result = applying.apply_to(&current_elements, &current_app_state);

            // Transfer before surfacing any error.
            match direction {
                Direction::Undo => self.redo_stack.push(entry),
                Direction::Redo => self.undo_stack.push(entry),
            }

            match result {
                Err(source) => {
                    warn!(%source, ?direction, "history entry failed to apply; entry transferred");
                    let applied = applied_any.then(|| Box::new((current_elements, current_app_state)));
                    return Err(HistoryError::Apply { source, applied });
                }
                Ok((next_elements, next_app_state)) => {
                    applied_any = true;
                    let visible = visible_change(&current_elements, &next_elements)
                        || current_app_state != next_app_state;
                    // Thread state through even when skipping, so selection
                    // moves along with the skipped steps.
                    current_elements = next_elements;
                    current_app_state = next_app_state;
                    if visible {
                        break;
                    }
                    debug!(?direction, "skipping invisible history entry");
                }
            }
        }

        if popped_any {
            Ok(Some((current_elements, current_app_state)))
        } else {
            Ok(None)
        }
    }
}
