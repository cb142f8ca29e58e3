//! Part record: one instantiation of a template with selected children.
//!
//! # Invariants
//! - `selected_child_ids` is an ordered set; its order is independent of
//!   the children's own `order_position`.
//! - Every selected id points at a direct template child of `frame_id`
//!   when written. Ids may go stale later and are pruned at composition.
//! - `order_position` is unique and contiguous (`0..n-1`) per document
//!   after any successful mutation.
//! - `uid` is the sortable/UI key and is never reused; `id` is the
//!   persistence and edit-target key.

use crate::model::child::ChildId;
use crate::model::template::TemplateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned part identifier.
pub type PartId = i64;

/// Template instance placed in the assembled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    pub name: String,
    pub frame_id: TemplateId,
    /// Snapshot of the template markup taken when the part was created or
    /// last propagated.
    pub template_markup: String,
    pub selected_child_ids: Vec<ChildId>,
    pub order_position: i64,
    pub uid: Uuid,
    pub revision: i64,
}

/// Insert payload for a new part as requested by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPart {
    pub name: String,
    pub frame_id: TemplateId,
    pub template_markup: String,
    pub selected_child_ids: Vec<ChildId>,
}

/// Fully resolved insert row handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDraft {
    pub name: String,
    pub frame_id: TemplateId,
    pub template_markup: String,
    pub selected_child_ids: Vec<ChildId>,
    pub order_position: i64,
    pub uid: Uuid,
}

/// Partial part update. `None` fields are untouched.
///
/// Document positions change only through `update_parts_order` and the
/// reorder helpers built on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartPatch {
    pub name: Option<String>,
    pub selected_child_ids: Option<Vec<ChildId>>,
    pub template_markup: Option<String>,
}

/// One `(id, order_position)` pair for batch reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPosition {
    pub id: PartId,
    pub order_position: i64,
}

/// Collapses duplicates while keeping first-occurrence order.
pub fn dedupe_selection(ids: &[ChildId]) -> Vec<ChildId> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
