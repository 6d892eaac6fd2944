//! Scene element model: diagram elements, their binding fields, and the
//! sparse patch type used by history deltas.
//!
//! Elements are stored in an [`ElementMap`] keyed by stable id and are never
//! physically removed — deletion sets the `is_deleted` tombstone so a later
//! undo can resurrect the element with all of its fields intact. Cross-element
//! relationships (text-in-container, arrow-to-anchor, member-in-frame) are
//! expressed as id references plus a `bound_elements` back-reference list,
//! never as direct pointers between elements.

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a scene element.
pub type ElementId = Uuid;

/// All elements of a scene, tombstones included.
pub type ElementMap = HashMap<ElementId, Element>;

/// Opaque z-order key. Assignment is owned by the fractional-indexing
/// collaborator; this engine only compares and carries it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FractionalIndex(String);

impl FractionalIndex {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The kind of a scene element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Axis-aligned rectangle; may contain bound text.
    Rectangle,
    /// Ellipse inscribed within the bounding box; may contain bound text.
    Ellipse,
    /// Diamond with vertices at bounding-box edge midpoints; may contain bound text.
    Diamond,
    /// Text, either free-standing or bound into a container.
    Text,
    /// Directed arrow whose endpoints may bind to anchor elements.
    Arrow,
    /// Frame grouping member elements via their `frame_id`.
    Frame,
}

impl ElementKind {
    /// Whether elements of this kind can be the target of a binding
    /// (text container, arrow anchor).
    #[must_use]
    pub fn is_bindable(self) -> bool {
        matches!(self, Self::Rectangle | Self::Ellipse | Self::Diamond | Self::Frame)
    }

    /// Whether elements of this kind carry a `points` polyline.
    #[must_use]
    pub fn is_linear(self) -> bool {
        matches!(self, Self::Arrow)
    }
}

/// Kind tag on a back-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    /// A text element bound into this container.
    Text,
    /// An arrow with an endpoint bound to this element.
    Arrow,
}

/// Back-reference from a bindable element to one dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoundElement {
    /// Id of the dependent element.
    pub id: ElementId,
    /// What kind of dependent this is.
    pub kind: BoundKind,
}

/// Forward reference from an arrow endpoint to its anchor element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowBinding {
    /// Id of the anchor element.
    pub element_id: ElementId,
    /// Where along the anchor's cross-axis the arrow aims, in `-1.0..=1.0`.
    pub focus: f64,
    /// Distance kept between the anchor's edge and the arrow endpoint.
    pub gap: f64,
}

/// A point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A diagram element as stored in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Stable unique identifier.
    pub id: ElementId,
    /// Shape or role of the element.
    pub kind: ElementKind,
    /// Left edge of the bounding box in world coordinates.
    pub x: f64,
    /// Top edge of the bounding box in world coordinates.
    pub y: f64,
    /// Width of the bounding box in world coordinates.
    pub width: f64,
    /// Height of the bounding box in world coordinates.
    pub height: f64,
    /// Clockwise rotation in degrees around the bounding-box center.
    pub angle: f64,
    /// Opaque z-order key; lower keys are drawn beneath higher keys.
    pub index: FractionalIndex,
    /// Background (fill) color as a CSS color string.
    pub background: String,
    /// Stroke color as a CSS color string.
    pub stroke: String,
    /// Open-ended per-kind properties (text content, font, endpoints style...).
    pub props: serde_json::Value,
    /// Group membership, if any.
    pub group_id: Option<Uuid>,
    /// Tombstone flag. Deleted elements stay in the map.
    pub is_deleted: bool,
    /// Monotonically increasing edit counter used for change detection.
    pub version: i64,
    /// Random nonce regenerated on every edit, to disambiguate equal versions.
    pub version_nonce: u32,
    /// Back-references to live dependents (bound text, bound arrow endpoints).
    pub bound_elements: Vec<BoundElement>,
    /// For text elements: the container this text is bound into.
    pub container_id: Option<ElementId>,
    /// For arrows: binding of the start endpoint to an anchor element.
    pub start_binding: Option<ArrowBinding>,
    /// For arrows: binding of the end endpoint to an anchor element.
    pub end_binding: Option<ArrowBinding>,
    /// For frame members: the frame this element belongs to.
    pub frame_id: Option<ElementId>,
    /// For linear elements: polyline in absolute world coordinates.
    pub points: Vec<Point>,
}

impl Element {
    /// Create a plain element of the given kind and bounding box, with
    /// default style and no bindings.
    #[must_use]
    pub fn new(kind: ElementKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width,
            height,
            angle: 0.0,
            index: FractionalIndex::new("a0"),
            background: "#D94B4B".to_owned(),
            stroke: "#1F1A17".to_owned(),
            props: serde_json::json!({}),
            group_id: None,
            is_deleted: false,
            version: 1,
            version_nonce: rand::random(),
            bound_elements: Vec::new(),
            container_id: None,
            start_binding: None,
            end_binding: None,
            frame_id: None,
            points: Vec::new(),
        }
    }

    /// Whether the element is observable (not tombstoned).
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    /// Center of the bounding box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Bump the edit counter and regenerate the nonce. Called after every
    /// mutation so version-based change detection has signal.
    pub fn bump_version(&mut self) {
        self.version += 1;
        self.version_nonce = rand::random();
    }

    /// Structural equality ignoring the volatile `version`/`version_nonce`
    /// pair. This is the comparison used for visibility checks and for the
    /// inverse-law guarantee.
    #[must_use]
    pub fn same_content(&self, other: &Element) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
            && self.angle == other.angle
            && self.index == other.index
            && self.background == other.background
            && self.stroke == other.stroke
            && self.props == other.props
            && self.group_id == other.group_id
            && self.is_deleted == other.is_deleted
            && self.bound_elements == other.bound_elements
            && self.container_id == other.container_id
            && self.start_binding == other.start_binding
            && self.end_binding == other.end_binding
            && self.frame_id == other.frame_id
            && self.points == other.points
    }

    /// Merge a sparse patch into this element and bump the version.
    pub fn apply_patch(&mut self, patch: &ElementPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(angle) = patch.angle {
            self.angle = angle;
        }
        if let Some(ref points) = patch.points {
            self.points = points.clone();
        }
        if let Some(ref index) = patch.index {
            self.index = index.clone();
        }
        if let Some(ref background) = patch.background {
            self.background = background.clone();
        }
        if let Some(ref stroke) = patch.stroke {
            self.stroke = stroke.clone();
        }
        if let Some(ref props) = patch.props {
            self.props = props.clone();
        }
        if let Some(group_id) = patch.group_id {
            self.group_id = group_id;
        }
        if let Some(is_deleted) = patch.is_deleted {
            self.is_deleted = is_deleted;
        }
        if let Some(ref bound_elements) = patch.bound_elements {
            self.bound_elements = bound_elements.clone();
        }
        if let Some(ref container_id) = patch.container_id {
            self.container_id = *container_id;
        }
        if let Some(ref start_binding) = patch.start_binding {
            self.start_binding = start_binding.clone();
        }
        if let Some(ref end_binding) = patch.end_binding {
            self.end_binding = end_binding.clone();
        }
        if let Some(ref frame_id) = patch.frame_id {
            self.frame_id = *frame_id;
        }
        self.bump_version();
    }

    /// Compute the minimal `(before, after)` patch pair describing the
    /// difference between two versions of the same element.
    ///
    /// Geometry fields (`x`, `y`, `width`, `height`, `angle`, `points`) are
    /// captured as a group: if any of them changed, all of them are included
    /// verbatim on both sides. Partial merges of geometry are unsafe.
    /// Binding fields are likewise copied wholesale, never diffed internally.
    #[must_use]
    pub fn patch_between(before: &Element, after: &Element) -> (ElementPatch, ElementPatch) {
        let mut b = ElementPatch::default();
        let mut a = ElementPatch::default();

        let geometry_changed = before.x != after.x
            || before.y != after.y
            || before.width != after.width
            || before.height != after.height
            || before.angle != after.angle
            || before.points != after.points;
        if geometry_changed {
            b.x = Some(before.x);
            b.y = Some(before.y);
            b.width = Some(before.width);
            b.height = Some(before.height);
            b.angle = Some(before.angle);
            b.points = Some(before.points.clone());
            a.x = Some(after.x);
            a.y = Some(after.y);
            a.width = Some(after.width);
            a.height = Some(after.height);
            a.angle = Some(after.angle);
            a.points = Some(after.points.clone());
        }
        if before.index != after.index {
            b.index = Some(before.index.clone());
            a.index = Some(after.index.clone());
        }
        if before.background != after.background {
            b.background = Some(before.background.clone());
            a.background = Some(after.background.clone());
        }
        if before.stroke != after.stroke {
            b.stroke = Some(before.stroke.clone());
            a.stroke = Some(after.stroke.clone());
        }
        if before.props != after.props {
            b.props = Some(before.props.clone());
            a.props = Some(after.props.clone());
        }
        if before.group_id != after.group_id {
            b.group_id = Some(before.group_id);
            a.group_id = Some(after.group_id);
        }
        if before.is_deleted != after.is_deleted {
            b.is_deleted = Some(before.is_deleted);
            a.is_deleted = Some(after.is_deleted);
        }
        if before.bound_elements != after.bound_elements {
            b.bound_elements = Some(before.bound_elements.clone());
            a.bound_elements = Some(after.bound_elements.clone());
        }
        if before.container_id != after.container_id {
            b.container_id = Some(before.container_id);
            a.container_id = Some(after.container_id);
        }
        if before.start_binding != after.start_binding {
            b.start_binding = Some(before.start_binding.clone());
            a.start_binding = Some(after.start_binding.clone());
        }
        if before.end_binding != after.end_binding {
            b.end_binding = Some(before.end_binding.clone());
            a.end_binding = Some(after.end_binding.clone());
        }
        if before.frame_id != after.frame_id {
            b.frame_id = Some(before.frame_id);
            a.frame_id = Some(after.frame_id);
        }
        (b, a)
    }
}

/// Sparse update for an element. Only present fields are applied.
///
/// Nullable reference fields use `Option<Option<..>>`: the outer `None` means
/// "leave unchanged", `Some(None)` means "clear". The volatile
/// `version`/`version_nonce` pair is deliberately not part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<FractionalIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_elements: Option<Vec<BoundElement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<Option<ElementId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_binding: Option<Option<ArrowBinding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_binding: Option<Option<ArrowBinding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<Option<ElementId>>,
}

impl ElementPatch {
    /// Whether the patch carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Replace every present field with the element's current value. Used
    /// when rebasing a stale history entry against the latest canonical
    /// state: the patch keeps its shape but speaks for current truth.
    pub fn refresh_from(&mut self, current: &Element) {
        if self.x.is_some() {
            self.x = Some(current.x);
        }
        if self.y.is_some() {
            self.y = Some(current.y);
        }
        if self.width.is_some() {
            self.width = Some(current.width);
        }
        if self.height.is_some() {
            self.height = Some(current.height);
        }
        if self.angle.is_some() {
            self.angle = Some(current.angle);
        }
        if self.points.is_some() {
            self.points = Some(current.points.clone());
        }
        if self.index.is_some() {
            self.index = Some(current.index.clone());
        }
        if self.background.is_some() {
            self.background = Some(current.background.clone());
        }
        if self.stroke.is_some() {
            self.stroke = Some(current.stroke.clone());
        }
        if self.props.is_some() {
            self.props = Some(current.props.clone());
        }
        if self.group_id.is_some() {
            self.group_id = Some(current.group_id);
        }
        if self.is_deleted.is_some() {
            self.is_deleted = Some(current.is_deleted);
        }
        if self.bound_elements.is_some() {
            self.bound_elements = Some(current.bound_elements.clone());
        }
        if self.container_id.is_some() {
            self.container_id = Some(current.container_id);
        }
        if self.start_binding.is_some() {
            self.start_binding = Some(current.start_binding.clone());
        }
        if self.end_binding.is_some() {
            self.end_binding = Some(current.end_binding.clone());
        }
        if self.frame_id.is_some() {
            self.frame_id = Some(current.frame_id);
        }
    }
}

/// Canonical values of every element in `next` whose `version`/
/// `version_nonce` pair differs from its counterpart in `prev`, including
/// elements new to `next`.
#[must_use]
pub fn changed_elements(prev: &ElementMap, next: &ElementMap) -> ElementMap {
    let mut changed = ElementMap::new();
    for (id, el) in next {
        let same = prev
            .get(id)
            .is_some_and(|p| p.version == el.version && p.version_nonce == el.version_nonce);
        if !same {
            changed.insert(*id, el.clone());
        }
    }
    changed
}

/// Whether two scene maps differ observably: an element changed visibility
/// (live vs tombstoned/absent), or a live element changed content. Volatile
/// version fields are ignored; churn among tombstones is not observable.
#[must_use]
pub fn visible_change(prev: &ElementMap, next: &ElementMap) -> bool {
    let ids: HashSet<&ElementId> = prev.keys().chain(next.keys()).collect();
    for id in ids {
        let before = prev.get(id).filter(|el| el.is_live());
        let after = next.get(id).filter(|el| el.is_live());
        match (before, after) {
            (Some(b), Some(a)) => {
                if !b.same_content(a) {
                    return true;
                }
            }
            (None, None) => {}
            _ => return true,
        }
    }
    false
}
