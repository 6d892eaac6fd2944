//! Editor session: the glue that owns the canonical scene and wires scene
//! mutations through the store's capture policy into history.
//!
//! A `Session` stands in for the editor document object: it holds the live
//! `(elements, app_state)` pair, commits every mutation with a
//! [`CaptureMode`] directive, feeds captured deltas to [`History::record`],
//! routes remote updates through the `Never` channel (which rebases the
//! stacks instead of growing them), and writes undo/redo results back.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use tracing::debug;

use crate::app_state::AppState;
use crate::element::{Element, ElementId, ElementMap, changed_elements};
use crate::history::{History, HistoryError};
use crate::store::{CaptureMode, CaptureOutcome, Snapshot, Store};

/// An editor session owning the canonical scene, the store, and history.
#[derive(Debug, Default)]
pub struct Session {
    elements: ElementMap,
    app_state: AppState,
    store: Store,
    history: History,
}

impl Session {
    /// Create a session over an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session over an existing scene. The initial state is the
    /// baseline: it is not undoable.
    #[must_use]
    pub fn with_scene(elements: ElementMap, app_state: AppState) -> Self {
        Self {
            store: Store::new(Snapshot::new(elements.clone(), app_state.clone())),
            elements,
            app_state,
            history: History::new(),
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn elements(&self) -> &ElementMap {
        &self.elements
    }

    #[must_use]
    pub fn app_state(&self) -> &AppState {
        &self.app_state
    }

    /// Look up an element by id.
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.history.undo_len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.history.redo_len()
    }

    #[must_use]
    pub fn is_undo_empty(&self) -> bool {
        self.history.is_undo_empty()
    }

    #[must_use]
    pub fn is_redo_empty(&self) -> bool {
        self.history.is_redo_empty()
    }

    // --- Mutations ---

    /// Mutate the scene and commit under the given directive.
    ///
    /// The closure edits the live `(elements, app_state)` pair in place;
    /// element edits must bump versions (the [`Self::update_element`] helper
    /// does). The commit outcome is routed: captured deltas are recorded,
    /// remote updates rebase the stacks, deferred/no-change outcomes do
    /// nothing.
    ///
    /// For `Never` the session diffs the scene around the closure itself,
    /// so that only what the remote mutation touched enters the snapshot:
    /// local edits deferred with `Eventually` stay pending and are still
    /// captured (and undoable) at the end of the gesture.
    pub fn apply(&mut self, mode: CaptureMode, mutate: impl FnOnce(&mut ElementMap, &mut AppState)) {
        let outcome = if mode == CaptureMode::Never {
            let before = self.elements.clone();
            mutate(&mut self.elements, &mut self.app_state);
            self.store.commit_remote(changed_elements(&before, &self.elements))
        } else {
            mutate(&mut self.elements, &mut self.app_state);
            self.store.commit(&self.elements, &self.app_state, mode)
        };
        match outcome {
            CaptureOutcome::Captured(delta) => self.history.record(delta),
            CaptureOutcome::Remote(changed) => self.history.rebase(&changed),
            CaptureOutcome::NoChange | CaptureOutcome::Deferred => {}
        }
    }

    /// Insert a new element.
    pub fn insert_element(&mut self, mode: CaptureMode, element: Element) {
        self.apply(mode, |elements, _| {
            elements.insert(element.id, element);
        });
    }

    /// Edit an existing element in place, bumping its version. A missing id
    /// is a no-op.
    pub fn update_element(&mut self, mode: CaptureMode, id: ElementId, edit: impl FnOnce(&mut Element)) {
        self.apply(mode, |elements, _| {
            if let Some(el) = elements.get_mut(&id) {
                edit(el);
                el.bump_version();
            }
        });
    }

    /// Tombstone an element. A missing id is a no-op.
    pub fn delete_element(&mut self, mode: CaptureMode, id: ElementId) {
        self.update_element(mode, id, |el| el.is_deleted = true);
    }

    /// Edit the app state.
    pub fn update_app_state(&mut self, mode: CaptureMode, edit: impl FnOnce(&mut AppState)) {
        self.apply(mode, |_, app_state| edit(app_state));
    }

    // --- History ---

    /// Undo one visible step. Returns whether anything was popped.
    ///
    /// # Errors
    ///
    /// Propagates [`HistoryError`] from a corrupted entry; the entry has
    /// still moved to the redo stack, and any state produced by invisible
    /// entries skipped before the failure has been written back.
    pub fn undo(&mut self) -> Result<bool, HistoryError> {
        let result = self.history.undo(&self.elements, &self.app_state);
        self.finish_step(result)
    }

    /// Redo one visible step. Returns whether anything was popped.
    ///
    /// # Errors
    ///
    /// Propagates [`HistoryError`] from a corrupted entry; the entry has
    /// still moved to the undo stack, and any state produced by invisible
    /// entries skipped before the failure has been written back.
    pub fn redo(&mut self) -> Result<bool, HistoryError> {
        let result = self.history.redo(&self.elements, &self.app_state);
        self.finish_step(result)
    }

    /// Reset history, e.g. when loading a new document into the session.
    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Route a history step's result: write successful state back; on
    /// failure adopt the state of any entries skipped before the failing
    /// one, then surface the error.
    fn finish_step(
        &mut self,
        result: Result<Option<(ElementMap, AppState)>, HistoryError>,
    ) -> Result<bool, HistoryError> {
        match result {
            Ok(Some((elements, app_state))) => {
                self.write_back(elements, app_state);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(HistoryError::Apply { source, applied }) => {
                if let Some(recovered) = applied {
                    let (elements, app_state) = *recovered;
                    self.write_back(elements, app_state);
                }
                Err(HistoryError::Apply { source, applied: None })
            }
        }
    }

    fn write_back(&mut self, elements: ElementMap, app_state: AppState) {
        debug!(elements = elements.len(), "writing history result back to scene");
        self.elements = elements;
        self.app_state = app_state;
        // The write-back is canonical but must not be re-captured.
        self.store.replace_snapshot(self.elements.clone(), self.app_state.clone());
    }
}
