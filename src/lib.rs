//! Delta-based history engine for a collaborative diagram editor.
//!
//! This crate records, inverts, replays, and reconciles edits to a shared
//! scene so that local undo/redo stays correct while remote collaborators
//! mutate the same scene concurrently. History entries are invertible deltas
//! rather than snapshots: they are continuously rebased against the latest
//! remote state, bidirectional element bindings are kept symmetric by a
//! shared repair pass, and entries whose replay is not observable are
//! transparently skipped.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`element`] | Scene element model, sparse patches, element map |
//! | [`app_state`] | Whitelisted history-tracked UI state |
//! | [`delta`] | Invertible element/app-state/store deltas |
//! | [`binding`] | Binding-symmetry repair pass |
//! | [`geometry`] | Bound-arrow endpoint recomputation |
//! | [`store`] | Capture policy: when a mutation becomes a history entry |
//! | [`history`] | Undo/redo stacks, rebasing, invisible-entry skipping |
//! | [`session`] | Editor-session glue owning the canonical scene |

pub mod app_state;
pub mod binding;
pub mod delta;
pub mod element;
pub mod geometry;
pub mod history;
pub mod session;
pub mod store;

pub use app_state::AppState;
pub use delta::{AppStateDelta, DeltaError, ElementsDelta, StoreDelta};
pub use element::{Element, ElementId, ElementKind, ElementMap};
pub use history::{History, HistoryError};
pub use session::Session;
pub use store::{CaptureMode, CaptureOutcome, Store};
