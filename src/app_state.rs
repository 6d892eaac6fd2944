//! History-tracked UI state.
//!
//! The editor's full application state is a large, open-ended bag; history
//! deliberately observes only the closed whitelist of fields below. Anything
//! outside this struct is never captured and never restored by undo/redo.

#[cfg(test)]
#[path = "app_state_test.rs"]
mod app_state_test;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::{Element, ElementId, ElementMap};

/// The whitelisted slice of application state that history observes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Ids of the currently selected elements.
    pub selected_element_ids: BTreeSet<ElementId>,
    /// Ids of the currently selected groups.
    pub selected_group_ids: BTreeSet<Uuid>,
    /// Group currently being edited (entered), if any.
    pub editing_group_id: Option<Uuid>,
    /// Linear element selected for point editing, if any.
    pub selected_linear_element: Option<ElementId>,
    /// Canvas background color as a CSS color string.
    pub view_background_color: String,
    /// Scene name shown in the title bar.
    pub name: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            selected_element_ids: BTreeSet::new(),
            selected_group_ids: BTreeSet::new(),
            editing_group_id: None,
            selected_linear_element: None,
            view_background_color: "#F5F0E8".to_owned(),
            name: "Untitled scene".to_owned(),
        }
    }
}

impl AppState {
    /// Merge a sparse patch into this state.
    pub fn apply_patch(&mut self, patch: &AppStatePatch) {
        if let Some(ref ids) = patch.selected_element_ids {
            self.selected_element_ids = ids.clone();
        }
        if let Some(ref ids) = patch.selected_group_ids {
            self.selected_group_ids = ids.clone();
        }
        if let Some(ref id) = patch.editing_group_id {
            self.editing_group_id = *id;
        }
        if let Some(ref id) = patch.selected_linear_element {
            self.selected_linear_element = *id;
        }
        if let Some(ref color) = patch.view_background_color {
            self.view_background_color = color.clone();
        }
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
    }

    /// Compute the minimal `(before, after)` patch pair between two states.
    #[must_use]
    pub fn patch_between(before: &AppState, after: &AppState) -> (AppStatePatch, AppStatePatch) {
        let mut b = AppStatePatch::default();
        let mut a = AppStatePatch::default();
        if before.selected_element_ids != after.selected_element_ids {
            b.selected_element_ids = Some(before.selected_element_ids.clone());
            a.selected_element_ids = Some(after.selected_element_ids.clone());
        }
        if before.selected_group_ids != after.selected_group_ids {
            b.selected_group_ids = Some(before.selected_group_ids.clone());
            a.selected_group_ids = Some(after.selected_group_ids.clone());
        }
        if before.editing_group_id != after.editing_group_id {
            b.editing_group_id = Some(before.editing_group_id);
            a.editing_group_id = Some(after.editing_group_id);
        }
        if before.selected_linear_element != after.selected_linear_element {
            b.selected_linear_element = Some(before.selected_linear_element);
            a.selected_linear_element = Some(after.selected_linear_element);
        }
        if before.view_background_color != after.view_background_color {
            b.view_background_color = Some(before.view_background_color.clone());
            a.view_background_color = Some(after.view_background_color.clone());
        }
        if before.name != after.name {
            b.name = Some(before.name.clone());
            a.name = Some(after.name.clone());
        }
        (b, a)
    }

    /// Drop references to elements and groups that no longer resolve to a
    /// live element. Runs after the paired elements delta has been applied,
    /// so a restored selection never points at tombstones.
    pub fn retain_live(&mut self, elements: &ElementMap) {
        self.selected_element_ids
            .retain(|id| elements.get(id).is_some_and(Element::is_live));
        if let Some(id) = self.selected_linear_element
            && !elements.get(&id).is_some_and(Element::is_live)
        {
            self.selected_linear_element = None;
        }
        let live_groups: BTreeSet<Uuid> = elements
            .values()
            .filter(|el| el.is_live())
            .filter_map(|el| el.group_id)
            .collect();
        self.selected_group_ids.retain(|id| live_groups.contains(id));
        if let Some(id) = self.editing_group_id
            && !live_groups.contains(&id)
        {
            self.editing_group_id = None;
        }
    }
}

/// Sparse update for [`AppState`]. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_element_ids: Option<BTreeSet<ElementId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_group_ids: Option<BTreeSet<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editing_group_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_linear_element: Option<Option<ElementId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AppStatePatch {
    /// Whether the patch carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
