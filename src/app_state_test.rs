use std::collections::BTreeSet;

use uuid::Uuid;

use super::*;
use crate::element::{Element, ElementKind, ElementMap};

fn make_rect() -> Element {
    Element::new(ElementKind::Rectangle, 0.0, 0.0, 100.0, 80.0)
}

fn selected(ids: &[Uuid]) -> BTreeSet<Uuid> {
    ids.iter().copied().collect()
}

// =============================================================
// defaults
// =============================================================

#[test]
fn default_state_has_no_selection() {
    let state = AppState::default();
    assert!(state.selected_element_ids.is_empty());
    assert!(state.selected_group_ids.is_empty());
    assert!(state.editing_group_id.is_none());
    assert!(state.selected_linear_element.is_none());
}

// =============================================================
// patch_between / apply_patch
// =============================================================

#[test]
fn patch_between_identical_is_empty() {
    let state = AppState::default();
    let (before, after) = AppState::patch_between(&state, &state.clone());
    assert!(before.is_empty());
    assert!(after.is_empty());
}

#[test]
fn patch_between_captures_only_changed_fields() {
    let a = AppState::default();
    let mut b = a.clone();
    let id = Uuid::new_v4();
    b.selected_element_ids = selected(&[id]);
    b.name = "Flowchart".to_owned();

    let (before, after) = AppState::patch_between(&a, &b);
    assert_eq!(before.selected_element_ids.as_ref().map(BTreeSet::len), Some(0));
    assert_eq!(after.selected_element_ids, Some(selected(&[id])));
    assert_eq!(after.name.as_deref(), Some("Flowchart"));
    assert!(after.view_background_color.is_none());
    assert!(after.editing_group_id.is_none());
}

#[test]
fn apply_patch_merges_present_fields() {
    let mut state = AppState::default();
    let patch = AppStatePatch {
        view_background_color: Some("#FFFFFF".to_owned()),
        editing_group_id: Some(Some(Uuid::new_v4())),
        ..Default::default()
    };
    state.apply_patch(&patch);
    assert_eq!(state.view_background_color, "#FFFFFF");
    assert!(state.editing_group_id.is_some());
    assert_eq!(state.name, "Untitled scene"); // untouched
}

#[test]
fn apply_patch_roundtrips_through_patch_between() {
    let a = AppState::default();
    let mut b = a.clone();
    b.selected_element_ids = selected(&[Uuid::new_v4()]);
    b.view_background_color = "#112233".to_owned();

    let (before, after) = AppState::patch_between(&a, &b);
    let mut forward = a.clone();
    forward.apply_patch(&after);
    assert_eq!(forward, b);
    forward.apply_patch(&before);
    assert_eq!(forward, a);
}

// =============================================================
// retain_live
// =============================================================

#[test]
fn retain_live_drops_deleted_and_unknown_selection() {
    let live = make_rect();
    let mut dead = make_rect();
    dead.is_deleted = true;
    let unknown = Uuid::new_v4();

    let mut state = AppState {
        selected_element_ids: selected(&[live.id, dead.id, unknown]),
        ..Default::default()
    };
    let map: ElementMap = [live.clone(), dead].into_iter().map(|el| (el.id, el)).collect();

    state.retain_live(&map);
    assert_eq!(state.selected_element_ids, selected(&[live.id]));
}

#[test]
fn retain_live_clears_dangling_linear_selection() {
    let mut arrow = Element::new(ElementKind::Arrow, 0.0, 0.0, 10.0, 10.0);
    arrow.is_deleted = true;
    let mut state = AppState { selected_linear_element: Some(arrow.id), ..Default::default() };
    let map: ElementMap = [(arrow.id, arrow)].into_iter().collect();

    state.retain_live(&map);
    assert!(state.selected_linear_element.is_none());
}

#[test]
fn retain_live_keeps_linear_selection_on_live_element() {
    let arrow = Element::new(ElementKind::Arrow, 0.0, 0.0, 10.0, 10.0);
    let mut state = AppState { selected_linear_element: Some(arrow.id), ..Default::default() };
    let map: ElementMap = [(arrow.id, arrow.clone())].into_iter().collect();

    state.retain_live(&map);
    assert_eq!(state.selected_linear_element, Some(arrow.id));
}

#[test]
fn retain_live_filters_groups_to_live_members() {
    let group_live = Uuid::new_v4();
    let group_dead = Uuid::new_v4();
    let mut member = make_rect();
    member.group_id = Some(group_live);
    let mut ghost = make_rect();
    ghost.group_id = Some(group_dead);
    ghost.is_deleted = true;

    let mut state = AppState {
        selected_group_ids: [group_live, group_dead].into_iter().collect(),
        editing_group_id: Some(group_dead),
        ..Default::default()
    };
    let map: ElementMap = [member, ghost].into_iter().map(|el| (el.id, el)).collect();

    state.retain_live(&map);
    assert_eq!(state.selected_group_ids, [group_live].into_iter().collect());
    assert!(state.editing_group_id.is_none());
}
