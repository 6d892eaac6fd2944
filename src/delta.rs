//! Invertible deltas: the unit of history.
//!
//! [`ElementsDelta`] is a computed diff between two element maps, partitioned
//! into `added` / `removed` / `updated` with each id in at most one
//! partition. [`AppStateDelta`] diffs the whitelisted UI state.
//! [`StoreDelta`] pairs the two and is what the undo/redo stacks hold.
//!
//! Application never mutates its input: `apply_to` clones, merges, runs the
//! binding repair pass, and returns the new state. A patch aimed at a
//! missing id is skipped — that corruption stays contained to the one key —
//! while a structurally malformed delta surfaces as [`DeltaError`] and
//! propagates to the caller unaltered.

#[cfg(test)]
#[path = "delta_test.rs"]
mod delta_test;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::app_state::{AppState, AppStatePatch};
use crate::binding;
use crate::element::{Element, ElementId, ElementMap, ElementPatch};

/// Error raised by delta application.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// The same id appears in more than one of `added`/`removed`/`updated`.
    #[error("element {0} appears in more than one delta partition")]
    OverlappingPartitions(ElementId),
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// An invertible diff between two element maps, aware of binding
/// relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementsDelta {
    /// Elements newly created by this delta, as full snapshots.
    /// Inverse: delete.
    pub added: HashMap<ElementId, Element>,
    /// Elements deleted by this delta, as full pre-deletion snapshots.
    /// Inverse: recreate.
    pub removed: HashMap<ElementId, Element>,
    /// Per-id `(before, after)` attribute patches for elements that existed
    /// on both sides.
    pub updated: HashMap<ElementId, (ElementPatch, ElementPatch)>,
}

impl ElementsDelta {
    /// The identity delta.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this delta is the identity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    /// Compare two element maps by id.
    ///
    /// Present-in-next-only goes to `added`; a live-to-tombstone transition
    /// goes to `removed` (and the reverse to `added`, resurrect); elements
    /// present on both sides with a differing version pair get a minimal
    /// `updated` patch.
    #[must_use]
    pub fn calculate(prev: &ElementMap, next: &ElementMap) -> Self {
        let mut delta = Self::empty();
        let ids: HashSet<&ElementId> = prev.keys().chain(next.keys()).collect();
        for id in ids {
            match (prev.get(id), next.get(id)) {
                (None, Some(after)) => {
                    delta.added.insert(*id, after.clone());
                }
                (Some(before), None) => {
                    delta.removed.insert(*id, before.clone());
                }
                (Some(before), Some(after)) => {
                    if before.version == after.version && before.version_nonce == after.version_nonce {
                        continue;
                    }
                    if before.is_deleted && !after.is_deleted {
                        delta.added.insert(*id, after.clone());
                    } else if !before.is_deleted && after.is_deleted {
                        delta.removed.insert(*id, before.clone());
                    } else {
                        let (b, a) = Element::patch_between(before, after);
                        if !a.is_empty() {
                            delta.updated.insert(*id, (b, a));
                        }
                    }
                }
                (None, None) => unreachable!("id came from one of the two maps"),
            }
        }
        delta
    }

    /// Swap `added`/`removed` and each updated patch pair.
    #[must_use]
    pub fn invert(&self) -> Self {
        Self {
            added: self.removed.clone(),
            removed: self.added.clone(),
            updated: self
                .updated
                .iter()
                .map(|(id, (before, after))| (*id, (after.clone(), before.clone())))
                .collect(),
        }
    }

    /// Every id this delta mentions.
    #[must_use]
    pub fn touched_ids(&self) -> HashSet<ElementId> {
        self.added
            .keys()
            .chain(self.removed.keys())
            .chain(self.updated.keys())
            .copied()
            .collect()
    }

    /// Apply the delta to a map, returning a new, binding-symmetric map.
    ///
    /// # Errors
    ///
    /// [`DeltaError::OverlappingPartitions`] when the partition invariant is
    /// violated; the input map is untouched in that case.
    pub fn apply_to(&self, elements: &ElementMap) -> Result<ElementMap, DeltaError> {
        self.check_partitions()?;

        let mut next = elements.clone();
        for (id, snapshot) in &self.added {
            let mut el = snapshot.clone();
            el.is_deleted = false;
            el.bump_version();
            next.insert(*id, el);
        }
        for id in self.removed.keys() {
            // Tombstone, retaining all fields. A missing id raced with an
            // external deletion; skip it.
            if let Some(el) = next.get_mut(id) {
                el.is_deleted = true;
                el.bump_version();
            }
        }
        for (id, (_before, after)) in &self.updated {
            if let Some(el) = next.get_mut(id) {
                el.apply_patch(after);
            }
        }

        binding::repair_bindings(&mut next, &self.touched_ids());
        Ok(next)
    }

    /// Rewrite captured "after" values with the latest canonical values for
    /// any id present in `latest`, so a later inversion undoes relative to
    /// current truth rather than a stale snapshot.
    #[must_use]
    pub fn rebased(&self, latest: &ElementMap) -> Self {
        let mut next = self.clone();
        for (id, snapshot) in &mut next.added {
            if let Some(current) = latest.get(id) {
                *snapshot = current.clone();
            }
        }
        for (id, (_before, after)) in &mut next.updated {
            if let Some(current) = latest.get(id) {
                after.refresh_from(current);
            }
        }
        next
    }

    fn check_partitions(&self) -> Result<(), DeltaError> {
        for id in self.added.keys() {
            if self.removed.contains_key(id) || self.updated.contains_key(id) {
                return Err(DeltaError::OverlappingPartitions(*id));
            }
        }
        for id in self.removed.keys() {
            if self.updated.contains_key(id) {
                return Err(DeltaError::OverlappingPartitions(*id));
            }
        }
        Ok(())
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// An invertible diff over the whitelisted UI state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStateDelta {
    /// Whitelisted fields as they were before.
    pub before: AppStatePatch,
    /// Whitelisted fields as they are after.
    pub after: AppStatePatch,
}

impl AppStateDelta {
    /// The identity delta.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether before and after agree on every whitelisted field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Diff the whitelisted fields of two states.
    #[must_use]
    pub fn calculate(prev: &AppState, next: &AppState) -> Self {
        let (before, after) = AppState::patch_between(prev, next);
        Self { before, after }
    }

    /// Swap before and after.
    #[must_use]
    pub fn invert(&self) -> Self {
        Self { before: self.after.clone(), after: self.before.clone() }
    }

    /// Merge the after-patch and drop references whose referent elements are
    /// gone. Must run after the paired elements delta has been applied.
    #[must_use]
    pub fn apply_to(&self, app_state: &AppState, elements: &ElementMap) -> AppState {
        let mut next = app_state.clone();
        next.apply_patch(&self.after);
        next.retain_live(elements);
        next
    }
}

// =============================================================================
// STORE DELTA
// =============================================================================

/// One history entry: an elements delta paired with an app-state delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDelta {
    /// Element changes.
    pub elements: ElementsDelta,
    /// Whitelisted UI state changes.
    pub app_state: AppStateDelta,
}

impl StoreDelta {
    /// The identity delta.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty deltas are never pushed onto a history stack.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.app_state.is_empty()
    }

    /// Diff two `(elements, app_state)` pairs.
    #[must_use]
    pub fn calculate(
        prev_elements: &ElementMap,
        prev_app_state: &AppState,
        next_elements: &ElementMap,
        next_app_state: &AppState,
    ) -> Self {
        Self {
            elements: ElementsDelta::calculate(prev_elements, next_elements),
            app_state: AppStateDelta::calculate(prev_app_state, next_app_state),
        }
    }

    /// Invert both members.
    #[must_use]
    pub fn invert(&self) -> Self {
        Self { elements: self.elements.invert(), app_state: self.app_state.invert() }
    }

    /// Apply both members, elements first so the app-state referent
    /// filtering sees the post-delta map.
    ///
    /// # Errors
    ///
    /// Propagates [`DeltaError`] from the elements delta unaltered.
    pub fn apply_to(&self, elements: &ElementMap, app_state: &AppState) -> Result<(ElementMap, AppState), DeltaError> {
        let next_elements = self.elements.apply_to(elements)?;
        let next_app_state = self.app_state.apply_to(app_state, &next_elements);
        Ok((next_elements, next_app_state))
    }

    /// Rebase the elements member against the latest canonical values.
    #[must_use]
    pub fn rebased(&self, latest: &ElementMap) -> Self {
        Self { elements: self.elements.rebased(latest), app_state: self.app_state.clone() }
    }
}
