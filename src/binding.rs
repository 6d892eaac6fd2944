//! Binding repair: the invariant-enforcement pass shared by delta
//! application and history.
//!
//! Invariant: a dependent B references a bindable A iff A's back-reference
//! list contains B, and neither side references the other across a tombstone.
//! The one exception: a tombstoned dependent may keep its pointer at a live
//! target when that relationship existed before tombstoning, which is what
//! lets undo restore the binding later.
//!
//! Repair runs over the elements touched by a delta plus anything one
//! binding hop away, in four steps: unbind dangling references, resolve
//! exclusive-slot conflicts, rebuild back-reference lists, and refresh the
//! geometry of arrows whose anchor moved.

#[cfg(test)]
#[path = "binding_test.rs"]
mod binding_test;

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::trace;

use crate::element::{BoundElement, BoundKind, Element, ElementId, ElementKind, ElementMap};
use crate::geometry;

/// Repair binding symmetry around the elements touched by a delta.
///
/// `touched` identifies the delta under application; those elements are the
/// "originators" that win exclusive-slot conflicts against concurrent
/// claimants.
pub fn repair_bindings(map: &mut ElementMap, touched: &HashSet<ElementId>) {
    let scope = expand_scope(map, touched);

    unbind_dangling(map, &scope);
    resolve_exclusive_containers(map, &scope, touched);
    rebuild_back_references(map, &scope);
    refresh_bound_arrows(map, &scope, touched);
}

/// The touched set plus everything one binding hop away: elements referenced
/// by a touched element and elements referencing a touched element.
fn expand_scope(map: &ElementMap, touched: &HashSet<ElementId>) -> HashSet<ElementId> {
    let mut scope: HashSet<ElementId> = touched.clone();
    for id in touched {
        let Some(el) = map.get(id) else {
            continue;
        };
        if let Some(target) = el.container_id {
            scope.insert(target);
        }
        if let Some(target) = el.frame_id {
            scope.insert(target);
        }
        if let Some(ref binding) = el.start_binding {
            scope.insert(binding.element_id);
        }
        if let Some(ref binding) = el.end_binding {
            scope.insert(binding.element_id);
        }
        for bound in &el.bound_elements {
            scope.insert(bound.id);
        }
    }
    for el in map.values() {
        if references_any(el, touched) {
            scope.insert(el.id);
        }
    }
    scope
}

fn references_any(el: &Element, ids: &HashSet<ElementId>) -> bool {
    el.container_id.is_some_and(|id| ids.contains(&id))
        || el.frame_id.is_some_and(|id| ids.contains(&id))
        || el.start_binding.as_ref().is_some_and(|b| ids.contains(&b.element_id))
        || el.end_binding.as_ref().is_some_and(|b| ids.contains(&b.element_id))
        || el.bound_elements.iter().any(|b| ids.contains(&b.id))
}

fn is_live(map: &ElementMap, id: ElementId) -> bool {
    map.get(&id).is_some_and(Element::is_live)
}

/// Clear every forward reference whose target is missing or tombstoned.
/// Tombstoned dependents pointing at a live target are left alone.
fn unbind_dangling(map: &mut ElementMap, scope: &HashSet<ElementId>) {
    #[derive(Clone, Copy)]
    enum Slot {
        Container,
        Frame,
        Start,
        End,
    }

    let mut clears: Vec<(ElementId, Slot)> = Vec::new();
    for id in scope {
        let Some(el) = map.get(id) else {
            continue;
        };
        if let Some(target) = el.container_id
            && !is_live(map, target)
        {
            clears.push((*id, Slot::Container));
        }
        if let Some(target) = el.frame_id
            && !is_live(map, target)
        {
            clears.push((*id, Slot::Frame));
        }
        if let Some(ref binding) = el.start_binding
            && !is_live(map, binding.element_id)
        {
            clears.push((*id, Slot::Start));
        }
        if let Some(ref binding) = el.end_binding
            && !is_live(map, binding.element_id)
        {
            clears.push((*id, Slot::End));
        }
    }

    for (id, slot) in clears {
        let Some(el) = map.get_mut(&id) else {
            continue;
        };
        trace!(%id, "unbinding dangling reference");
        match slot {
            Slot::Container => el.container_id = None,
            Slot::Frame => el.frame_id = None,
            Slot::Start => el.start_binding = None,
            Slot::End => el.end_binding = None,
        }
        el.bump_version();
    }
}

/// A container holds at most one bound text. When two live texts claim the
/// same container, the one that originated the delta under application wins;
/// ties break on `(version, id)` for determinism. The loser is unbound, not
/// deleted.
fn resolve_exclusive_containers(map: &mut ElementMap, scope: &HashSet<ElementId>, touched: &HashSet<ElementId>) {
    let mut claims: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
    for el in map.values() {
        if el.kind == ElementKind::Text
            && el.is_live()
            && let Some(container) = el.container_id
            && scope.contains(&container)
        {
            claims.entry(container).or_default().push(el.id);
        }
    }

    for (container, mut claimants) in claims {
        if claimants.len() < 2 {
            continue;
        }
        claimants.sort_by_key(|id| {
            let version = map.get(id).map_or(0, |el| el.version);
            (touched.contains(id), version, *id)
        });
        let Some((winner, losers)) = claimants.split_last() else {
            continue;
        };
        for loser in losers {
            if let Some(el) = map.get_mut(loser) {
                trace!(%container, %winner, %loser, "resolving exclusive container conflict");
                el.container_id = None;
                el.bump_version();
            }
        }
    }
}

/// Recompute each bindable element's back-reference list as exactly the set
/// of live dependents that still reference it.
fn rebuild_back_references(map: &mut ElementMap, scope: &HashSet<ElementId>) {
    let mut expected: HashMap<ElementId, BTreeSet<BoundElement>> = HashMap::new();
    for el in map.values() {
        if !el.is_live() {
            continue;
        }
        if let Some(container) = el.container_id
            && scope.contains(&container)
        {
            expected
                .entry(container)
                .or_default()
                .insert(BoundElement { id: el.id, kind: BoundKind::Text });
        }
        for binding in [&el.start_binding, &el.end_binding].into_iter().flatten() {
            if scope.contains(&binding.element_id) {
                expected
                    .entry(binding.element_id)
                    .or_default()
                    .insert(BoundElement { id: el.id, kind: BoundKind::Arrow });
            }
        }
    }

    for id in scope {
        let Some(el) = map.get(id) else {
            continue;
        };
        if !el.kind.is_bindable() {
            continue;
        }
        let next: Vec<BoundElement> = expected.remove(id).unwrap_or_default().into_iter().collect();
        let mut current: Vec<BoundElement> = el.bound_elements.clone();
        current.sort_unstable();
        if current != next
            && let Some(el) = map.get_mut(id)
        {
            el.bound_elements = next;
            el.bump_version();
        }
    }
}

/// Refresh the endpoint geometry of arrows whose bound anchor was touched by
/// the delta under application.
fn refresh_bound_arrows(map: &mut ElementMap, scope: &HashSet<ElementId>, touched: &HashSet<ElementId>) {
    for id in scope {
        let Some(arrow) = map.get(id) else {
            continue;
        };
        if !arrow.kind.is_linear() {
            continue;
        }
        let anchor_touched = |binding: &Option<crate::element::ArrowBinding>| {
            binding.as_ref().is_some_and(|b| touched.contains(&b.element_id))
        };
        if !touched.contains(id) && !anchor_touched(&arrow.start_binding) && !anchor_touched(&arrow.end_binding) {
            continue;
        }

        let start = arrow
            .start_binding
            .clone()
            .and_then(|b| map.get(&b.element_id).cloned().map(|anchor| (anchor, b)));
        let end = arrow
            .end_binding
            .clone()
            .and_then(|b| map.get(&b.element_id).cloned().map(|anchor| (anchor, b)));
        if start.is_none() && end.is_none() {
            continue;
        }

        if let Some(arrow) = map.get_mut(id) {
            let before = arrow.points.clone();
            geometry::update_bound_arrow(
                arrow,
                start.as_ref().map(|(anchor, b)| (anchor, b)),
                end.as_ref().map(|(anchor, b)| (anchor, b)),
            );
            if arrow.points != before {
                arrow.bump_version();
            }
        }
    }
}
