//! Bound-arrow geometry: recomputing arrow endpoints against their anchors.
//!
//! This is the small geometry collaborator the binding repair pass delegates
//! to. When an anchor element moves, the arrows bound to it get fresh
//! endpoints projected onto the anchor's (gap-inflated) bounding box, so a
//! redo of the move replays the correct arrow shape instead of a stale
//! cached point list.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use crate::element::{ArrowBinding, Element, Point};

/// Recompute the endpoints of `arrow` against its (optional) start and end
/// anchors, then re-derive the arrow's bounding box from its points.
///
/// Each bound endpoint aims from the anchor's focus-adjusted center toward
/// its neighboring point on the polyline and stops at the anchor's bounding
/// box inflated by the binding gap.
pub fn update_bound_arrow(
    arrow: &mut Element,
    start: Option<(&Element, &ArrowBinding)>,
    end: Option<(&Element, &ArrowBinding)>,
) {
    if arrow.points.len() < 2 {
        // Degenerate polyline: seed from the bounding box diagonal.
        arrow.points = vec![
            Point::new(arrow.x, arrow.y),
            Point::new(arrow.x + arrow.width, arrow.y + arrow.height),
        ];
    }
    let last = arrow.points.len() - 1;

    if let Some((anchor, binding)) = start {
        let neighbor = arrow.points[1];
        arrow.points[0] = endpoint_on_anchor(anchor, binding, neighbor);
    }
    if let Some((anchor, binding)) = end {
        let neighbor = arrow.points[last - 1];
        arrow.points[last] = endpoint_on_anchor(anchor, binding, neighbor);
    }

    refresh_bounds(arrow);
}

/// Recompute `x`/`y`/`width`/`height` from the polyline.
pub fn refresh_bounds(arrow: &mut Element) {
    let Some(first) = arrow.points.first() else {
        return;
    };
    let mut min_x = first.x;
    let mut min_y = first.y;
    let mut max_x = first.x;
    let mut max_y = first.y;
    for p in &arrow.points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    arrow.x = min_x;
    arrow.y = min_y;
    arrow.width = max_x - min_x;
    arrow.height = max_y - min_y;
}

/// Where the segment from the anchor's focus-adjusted center toward `toward`
/// exits the anchor's bounding box inflated by the binding gap.
fn endpoint_on_anchor(anchor: &Element, binding: &ArrowBinding, toward: Point) -> Point {
    let center = anchor.center();
    let half_w = anchor.width.abs() / 2.0 + binding.gap;
    let half_h = anchor.height.abs() / 2.0 + binding.gap;

    let dx = toward.x - center.x;
    let dy = toward.y - center.y;
    let len = dx.hypot(dy);
    if len == 0.0 {
        return center;
    }
    let (ux, uy) = (dx / len, dy / len);

    // Shift the aim origin along the perpendicular by the binding focus.
    let (px, py) = (-uy, ux);
    let extent = px.abs() * half_w + py.abs() * half_h;
    let origin = Point::new(center.x + px * binding.focus * extent, center.y + py * binding.focus * extent);

    let tx = if ux == 0.0 { f64::INFINITY } else { half_w / ux.abs() };
    let ty = if uy == 0.0 { f64::INFINITY } else { half_h / uy.abs() };
    let t = tx.min(ty);
    Point::new(origin.x + ux * t, origin.y + uy * t)
}
