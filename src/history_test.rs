use std::collections::HashMap;

use super::*;
use crate::delta::ElementsDelta;
use crate::element::{Element, ElementKind};

fn make_rect() -> Element {
    Element::new(ElementKind::Rectangle, 0.0, 0.0, 100.0, 80.0)
}

fn map_of(elements: Vec<Element>) -> ElementMap {
    elements.into_iter().map(|el| (el.id, el)).collect()
}

fn delta_between(prev: &ElementMap, next: &ElementMap) -> StoreDelta {
    StoreDelta::calculate(prev, &AppState::default(), next, &AppState::default())
}

/// A structurally malformed entry: the same id claims two partitions.
fn corrupted_delta() -> StoreDelta {
    let el = make_rect();
    StoreDelta {
        elements: ElementsDelta {
            added: HashMap::from([(el.id, el.clone())]),
            removed: HashMap::from([(el.id, el)]),
            updated: HashMap::new(),
        },
        app_state: crate::delta::AppStateDelta::empty(),
    }
}

// =============================================================
// record / clear
// =============================================================

#[test]
fn record_pushes_undo_and_clears_redo() {
    let mut history = History::new();
    let el = make_rect();
    let d = delta_between(&ElementMap::new(), &map_of(vec![el.clone()]));

    history.record(d.clone());
    assert_eq!(history.undo_len(), 1);

    // Park an entry on the redo stack, then record: redo must clear.
    let scene = map_of(vec![el]);
    history.undo(&scene, &AppState::default()).unwrap();
    assert_eq!(history.redo_len(), 1);
    history.record(d);
    assert_eq!(history.undo_len(), 1);
    assert_eq!(history.redo_len(), 0);
}

#[test]
fn record_ignores_empty_delta() {
    let mut history = History::new();
    history.record(StoreDelta::empty());
    assert!(history.is_undo_empty());
}

#[test]
fn clear_drops_both_stacks() {
    let mut history = History::new();
    let d = delta_between(&ElementMap::new(), &map_of(vec![make_rect()]));
    history.record(d);
    history.clear();
    assert!(history.is_undo_empty());
    assert!(history.is_redo_empty());
}

// =============================================================
// undo / redo basics
// =============================================================

#[test]
fn undo_and_redo_on_empty_stacks_return_none() {
    let mut history = History::new();
    let scene = ElementMap::new();
    let state = AppState::default();
    assert!(history.undo(&scene, &state).unwrap().is_none());
    assert!(history.redo(&scene, &state).unwrap().is_none());
}

#[test]
fn undo_of_creation_tombstones_the_element() {
    let el = make_rect();
    let scene = map_of(vec![el.clone()]);
    let mut history = History::new();
    history.record(delta_between(&ElementMap::new(), &scene));

    let (elements, _) = history.undo(&scene, &AppState::default()).unwrap().unwrap();
    // The element stays in the map as a tombstone, never physically removed.
    assert!(elements[&el.id].is_deleted);
    assert_eq!(history.undo_len(), 0);
    assert_eq!(history.redo_len(), 1);
}

#[test]
fn n_undos_then_n_redos_restore_both_stacks_and_state() {
    let el = make_rect();
    let id = el.id;
    let mut scenes = vec![map_of(vec![el])];
    for color in ["#111111", "#222222", "#333333"] {
        let mut next = scenes.last().unwrap().clone();
        let edited = next.get_mut(&id).unwrap();
        edited.background = color.to_owned();
        edited.bump_version();
        scenes.push(next);
    }

    let mut history = History::new();
    for pair in scenes.windows(2) {
        history.record(delta_between(&pair[0], &pair[1]));
    }
    assert_eq!(history.undo_len(), 3);

    let state = AppState::default();
    let mut current = scenes.last().unwrap().clone();
    for expected in ["#222222", "#111111", "#D94B4B"] {
        let (elements, _) = history.undo(&current, &state).unwrap().unwrap();
        assert_eq!(elements[&id].background, expected);
        current = elements;
    }
    assert!(history.undo(&current, &state).unwrap().is_none());
    assert_eq!(history.redo_len(), 3);

    for expected in ["#111111", "#222222", "#333333"] {
        let (elements, _) = history.redo(&current, &state).unwrap().unwrap();
        assert_eq!(elements[&id].background, expected);
        current = elements;
    }
    assert!(history.redo(&current, &state).unwrap().is_none());
    assert_eq!(history.undo_len(), 3);
    assert!(current[&id].same_content(&scenes.last().unwrap()[&id]));
}

// =============================================================
// corrupted entries
// =============================================================

#[test]
fn corrupted_entry_is_transferred_before_the_error_surfaces() {
    let el = make_rect();
    let scene = map_of(vec![el.clone()]);
    let mut history = History::new();
    history.record(delta_between(&ElementMap::new(), &scene));
    history.record(corrupted_delta());
    assert_eq!(history.undo_len(), 2);

    let state = AppState::default();
    let err = history.undo(&scene, &state).unwrap_err();
    assert!(matches!(
        err,
        HistoryError::Apply { source: DeltaError::OverlappingPartitions(_), applied: None }
    ));
    // The bad entry moved across; the user is not stuck.
    assert_eq!(history.undo_len(), 1);
    assert_eq!(history.redo_len(), 1);

    // The next undo reaches the healthy entry underneath.
    let (elements, _) = history.undo(&scene, &state).unwrap().unwrap();
    assert!(elements[&el.id].is_deleted);
}

#[test]
fn state_from_skipped_entries_rides_along_with_the_error() {
    let b = make_rect(); // background "#D94B4B"
    let prev = map_of(vec![b.clone()]);
    let mut next = prev.clone();
    let edited = next.get_mut(&b.id).unwrap();
    edited.background = "#000000".to_owned();
    edited.bump_version();

    let mut history = History::new();
    history.record(corrupted_delta());
    history.record(delta_between(&prev, &next));

    // The updated element is a tombstone by the time undo runs, so the
    // top entry is skipped invisibly before the corrupted one fails.
    let mut scene = next.clone();
    let ghost = scene.get_mut(&b.id).unwrap();
    ghost.is_deleted = true;
    ghost.bump_version();

    let err = history.undo(&scene, &AppState::default()).unwrap_err();
    let HistoryError::Apply { applied: Some(applied), .. } = err else {
        panic!("expected the skipped entries' state in the error");
    };
    // The skipped entry's inversion did land and must not be lost.
    assert_eq!(applied.0[&b.id].background, "#D94B4B");
    assert_eq!(history.undo_len(), 0);
    assert_eq!(history.redo_len(), 2);
}

// =============================================================
// invisible entries
// =============================================================

/// Two recorded entries, the newer of which targets an element that was
/// tombstoned remotely in the meantime.
fn history_with_invisible_top(extra_updates: usize) -> (History, ElementMap, Element) {
    let a = make_rect();
    let b = make_rect();
    let mut history = History::new();
    history.record(delta_between(&ElementMap::new(), &map_of(vec![a.clone()])));

    let mut prev = map_of(vec![a.clone(), b.clone()]);
    for i in 0..extra_updates {
        let mut next = prev.clone();
        let edited = next.get_mut(&b.id).unwrap();
        edited.background = format!("#0000{i:02}");
        edited.bump_version();
        history.record(delta_between(&prev, &next));
        prev = next;
    }

    // The remote peer deleted b; the local scene sees only its tombstone.
    let mut scene = prev;
    let ghost = scene.get_mut(&b.id).unwrap();
    ghost.is_deleted = true;
    ghost.bump_version();
    (history, scene, a)
}

#[test]
fn single_undo_skips_past_invisible_entry() {
    let (mut history, scene, a) = history_with_invisible_top(1);
    assert_eq!(history.undo_len(), 2);

    let (elements, _) = history.undo(&scene, &AppState::default()).unwrap().unwrap();
    // Both entries consumed by one undo: the invisible update to the
    // tombstoned element, then the visible un-creation underneath.
    assert_eq!(history.undo_len(), 0);
    assert_eq!(history.redo_len(), 2);
    assert!(elements[&a.id].is_deleted);
}

#[test]
fn single_undo_skips_a_run_of_invisible_entries() {
    let (mut history, scene, a) = history_with_invisible_top(2);
    assert_eq!(history.undo_len(), 3);

    let (elements, _) = history.undo(&scene, &AppState::default()).unwrap().unwrap();
    assert_eq!(history.undo_len(), 0);
    assert_eq!(history.redo_len(), 3);
    assert!(elements[&a.id].is_deleted);
}

#[test]
fn undo_exhausting_the_stack_invisibly_still_reports_progress() {
    let b = make_rect();
    let mut before = map_of(vec![b.clone()]);
    let mut after = before.clone();
    let edited = after.get_mut(&b.id).unwrap();
    edited.background = "#000000".to_owned();
    edited.bump_version();

    let mut history = History::new();
    history.record(delta_between(&before, &after));

    // The only recorded element is now a tombstone.
    let ghost = before.get_mut(&b.id).unwrap();
    ghost.is_deleted = true;
    ghost.bump_version();
    let result = history.undo(&before, &AppState::default()).unwrap();
    assert!(result.is_some()); // the stack was consumed, not ignored
    assert_eq!(history.redo_len(), 1);
}

#[test]
fn app_state_only_entry_is_visible() {
    let named = AppState { name: "Flowchart".to_owned(), ..Default::default() };
    let delta = StoreDelta::calculate(
        &ElementMap::new(),
        &AppState::default(),
        &ElementMap::new(),
        &named,
    );
    let mut history = History::new();
    history.record(delta);

    let (_, app_state) = history.undo(&ElementMap::new(), &named).unwrap().unwrap();
    assert_eq!(app_state.name, "Untitled scene");
    assert_eq!(history.redo_len(), 1);
}

// =============================================================
// rebasing
// =============================================================

#[test]
fn undo_after_remote_edit_restores_the_local_before_value() {
    let el = make_rect(); // default background "#D94B4B"
    let id = el.id;
    let before = map_of(vec![el]);
    let mut after = before.clone();
    let edited = after.get_mut(&id).unwrap();
    edited.background = "#0000FF".to_owned();
    edited.bump_version();

    let mut history = History::new();
    history.record(delta_between(&before, &after));

    // Remote peer turns it yellow; rebase against the canonical value.
    let mut scene = after.clone();
    let remote = scene.get_mut(&id).unwrap();
    remote.background = "#FFFF00".to_owned();
    remote.bump_version();
    history.rebase(&scene);

    let state = AppState::default();
    let (elements, _) = history.undo(&scene, &state).unwrap().unwrap();
    assert_eq!(elements[&id].background, "#D94B4B");
    assert_eq!(history.undo_len(), 0);
    assert_eq!(history.redo_len(), 1);

    // Redo replays toward the rebased (remote) value, not the stale blue.
    let (elements, _) = history.redo(&elements, &state).unwrap().unwrap();
    assert_eq!(elements[&id].background, "#FFFF00");
}

#[test]
fn rebase_covers_the_redo_stack_too() {
    let el = make_rect();
    let id = el.id;
    let before = map_of(vec![el]);
    let mut after = before.clone();
    let edited = after.get_mut(&id).unwrap();
    edited.background = "#0000FF".to_owned();
    edited.bump_version();

    let mut history = History::new();
    history.record(delta_between(&before, &after));
    let state = AppState::default();
    let (undone, _) = history.undo(&after, &state).unwrap().unwrap();

    // Remote edit lands while the entry sits on the redo stack.
    let mut canonical = after.clone();
    let remote = canonical.get_mut(&id).unwrap();
    remote.background = "#00FF00".to_owned();
    remote.bump_version();
    history.rebase(&canonical);

    let (elements, _) = history.redo(&undone, &state).unwrap().unwrap();
    assert_eq!(elements[&id].background, "#00FF00");
}

#[test]
fn rebase_with_no_changes_is_a_noop() {
    let el = make_rect();
    let scene = map_of(vec![el.clone()]);
    let mut history = History::new();
    history.record(delta_between(&ElementMap::new(), &scene));

    history.rebase(&ElementMap::new());
    let (elements, _) = history.undo(&scene, &AppState::default()).unwrap().unwrap();
    assert!(elements[&el.id].is_deleted);
}
