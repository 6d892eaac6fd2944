//! Capture policy: deciding whether and how a scene mutation becomes a
//! history entry.
//!
//! The store owns the last-committed snapshot of the canonical
//! `(elements, app_state)` pair. Call sites commit with a [`CaptureMode`]
//! directive; the store diffs against its snapshot and reports what the
//! caller should do with the result. Remote mutations flow through the
//! `Never` channel: only the remotely-changed elements are folded into the
//! snapshot, no entry is produced, and the canonical values History needs
//! for rebasing are handed back. Folding element-by-element keeps local
//! edits deferred with `Eventually` diffable at the next capture.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use tracing::debug;

use crate::app_state::AppState;
use crate::delta::StoreDelta;
use crate::element::{ElementMap, changed_elements, visible_change};

/// Tri-state capture directive consumed by scene-mutation call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Diff against the last-committed snapshot now; a non-empty delta goes
    /// onto the undo stack and clears the redo stack.
    Immediately,
    /// Defer: the snapshot does not advance, so the next `Immediately`
    /// capture coalesces everything since into one entry — one undo step per
    /// user gesture, not per intermediate frame.
    Eventually,
    /// Fold the changed elements into the canonical snapshot without any
    /// history entry and without clearing the redo stack. The channel for
    /// externally-applied (remote) changes.
    Never,
}

/// What a commit resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// A non-empty delta to record on the undo stack.
    Captured(StoreDelta),
    /// The diff was empty; nothing to record. Also covers a repeated capture
    /// of an unchanged state, which must not create a duplicate entry.
    NoChange,
    /// Deferred until the next `Immediately` capture.
    Deferred,
    /// Remote update applied: the canonical values of every element the
    /// remote mutation changed, to be fed to `History::rebase`.
    Remote(ElementMap),
}

/// The last-committed canonical snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub elements: ElementMap,
    pub app_state: AppState,
}

impl Snapshot {
    #[must_use]
    pub fn new(elements: ElementMap, app_state: AppState) -> Self {
        Self { elements, app_state }
    }
}

/// Observes scene mutations and decides whether/how to capture a delta.
#[derive(Debug, Default)]
pub struct Store {
    snapshot: Snapshot,
}

impl Store {
    /// Create a store whose baseline is the given snapshot.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// The last-committed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Commit the current scene state under the given directive.
    pub fn commit(&mut self, elements: &ElementMap, app_state: &AppState, mode: CaptureMode) -> CaptureOutcome {
        match mode {
            CaptureMode::Eventually => {
                debug!("capture deferred");
                CaptureOutcome::Deferred
            }
            CaptureMode::Never => {
                // The snapshot diff cannot tell a remote change apart from
                // a pending deferred local edit; call sites that observe
                // the mutation boundary compute the precise set and use
                // `commit_remote` directly.
                let changed = changed_elements(&self.snapshot.elements, elements);
                self.commit_remote(changed)
            }
            CaptureMode::Immediately => {
                let delta = StoreDelta::calculate(&self.snapshot.elements, &self.snapshot.app_state, elements, app_state);
                self.snapshot = Snapshot::new(elements.clone(), app_state.clone());
                if delta.is_empty() {
                    debug!("capture resolved to empty delta");
                    CaptureOutcome::NoChange
                } else {
                    debug!(
                        added = delta.elements.added.len(),
                        removed = delta.elements.removed.len(),
                        updated = delta.elements.updated.len(),
                        "delta captured"
                    );
                    CaptureOutcome::Captured(delta)
                }
            }
        }
    }

    /// Fold remotely-changed canonical values into the snapshot, leaving
    /// the rest of the baseline untouched. Local edits deferred with
    /// `Eventually` that are pending when the remote commit lands stay
    /// diffable at the next `Immediately` capture.
    pub fn commit_remote(&mut self, changed: ElementMap) -> CaptureOutcome {
        for (id, el) in &changed {
            self.snapshot.elements.insert(*id, el.clone());
        }
        debug!(changed = changed.len(), "remote update committed");
        CaptureOutcome::Remote(changed)
    }

    /// Replace the snapshot wholesale without producing any outcome. Used
    /// for the post-undo/redo write-back, which must not be re-captured.
    pub fn replace_snapshot(&mut self, elements: ElementMap, app_state: AppState) {
        self.snapshot = Snapshot::new(elements, app_state);
    }

    /// Whether the given scene differs observably from the snapshot.
    #[must_use]
    pub fn is_dirty(&self, elements: &ElementMap) -> bool {
        visible_change(&self.snapshot.elements, elements)
    }
}
