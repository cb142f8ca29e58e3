//! Sibling index over the flat child relation.
//!
//! # Invariants
//! - Every indexed child appears in exactly one group: the one keyed by
//!   its current `(parent_id, parent_kind)`.
//! - Settled groups are sorted by `(order_position, id)`.

use crate::compose::ChildLookup;
use crate::model::child::{ChildId, FrameChild, ParentRef};
use crate::reconcile::group::{OrderedGroup, SyncState};
use crate::reconcile::record::{merge_record, sort_group, MergeOutcome};
use crate::store::ChangeKind;
use std::collections::{HashMap, HashSet};

/// Children keyed by id plus one ordered group per parent.
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    records: HashMap<ChildId, FrameChild>,
    groups: HashMap<ParentRef, OrderedGroup<ChildId>>,
}

impl ChildIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a settled index from an unordered child list.
    pub fn from_children(children: impl IntoIterator<Item = FrameChild>) -> Self {
        let mut index = Self::new();
        for child in children {
            index.upsert(child);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: ChildId) -> Option<&FrameChild> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: ChildId) -> bool {
        self.records.contains_key(&id)
    }

    /// Ordered group for `parent`, if it has ever held a child.
    pub fn group(&self, parent: ParentRef) -> Option<&OrderedGroup<ChildId>> {
        self.groups.get(&parent)
    }

    /// Ordered ids under `parent`.
    pub fn ids_of(&self, parent: ParentRef) -> Vec<ChildId> {
        self.groups
            .get(&parent)
            .map(|group| group.keys().to_vec())
            .unwrap_or_default()
    }

    /// `max(sibling order_position) + 1`, or 0 for an empty group.
    pub fn next_position(&self, parent: ParentRef) -> i64 {
        self.ids_of(parent)
            .iter()
            .filter_map(|id| self.records.get(id))
            .map(|child| child.order_position)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Every child, grouped by parent and in group order.
    pub fn all(&self) -> Vec<&FrameChild> {
        let mut parents: Vec<ParentRef> = self.groups.keys().copied().collect();
        parents.sort_by_key(|parent| (parent.id, parent.kind.as_str()));
        parents
            .into_iter()
            .flat_map(|parent| self.children_of(parent))
            .collect()
    }

    /// Inserts or replaces a child, moving it between groups when its
    /// parent changed.
    pub fn upsert(&mut self, child: FrameChild) {
        let id = child.id;
        let parent = child.parent();
        if let Some(previous) = self.records.get(&id).map(FrameChild::parent) {
            if previous != parent {
                self.detach(previous, id);
            }
        }
        self.records.insert(id, child);
        let group = self.groups.entry(parent).or_default();
        group.push(id);
        if group.state() == SyncState::Settled {
            sort_group(&self.records, group);
        }
    }

    /// Removes one child. Its own descendants are left in place.
    pub fn remove(&mut self, id: ChildId) -> Option<FrameChild> {
        let child = self.records.remove(&id)?;
        self.detach(child.parent(), id);
        Some(child)
    }

    /// Descendants of `id` followed by `id` itself, deepest first.
    ///
    /// Siblings are visited in group order. Ids seen twice are skipped so
    /// corrupted parent links cannot loop.
    pub fn subtree_post_order(&self, id: ChildId) -> Vec<ChildId> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.collect_post_order(ParentRef::child(id), &mut visited, &mut out);
        if visited.insert(id) {
            out.push(id);
        }
        out
    }

    /// Post-order ids of every child hanging under `parent`.
    pub fn descendants_post_order(&self, parent: ParentRef) -> Vec<ChildId> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for id in self.ids_of(parent) {
            if visited.contains(&id) {
                continue;
            }
            self.collect_post_order(ParentRef::child(id), &mut visited, &mut out);
            if visited.insert(id) {
                out.push(id);
            }
        }
        out
    }

    /// Applies a manual order to one group and renumbers positions locally.
    pub fn stage_order(&mut self, parent: ParentRef, ordered: &[ChildId]) -> Vec<ChildId> {
        let Some(group) = self.groups.get_mut(&parent) else {
            return Vec::new();
        };
        let order = group.stage_order(ordered);
        self.renumber(&order);
        order
    }

    /// Drag-style move inside one group.
    pub fn move_to(&mut self, parent: ParentRef, active: ChildId, over: ChildId) -> bool {
        let Some(group) = self.groups.get_mut(&parent) else {
            return false;
        };
        if !group.move_to(active, over) {
            return false;
        }
        let order = group.keys().to_vec();
        self.renumber(&order);
        true
    }

    pub fn mark_settled(&mut self, parent: ParentRef) {
        if let Some(group) = self.groups.get_mut(&parent) {
            group.mark_settled();
            sort_group(&self.records, group);
        }
    }

    /// Merges one remote child event.
    ///
    /// `parent_known` tells whether the event's parent exists locally.
    /// Inserts and updates under an unknown parent are ignored.
    pub fn merge(
        &mut self,
        kind: ChangeKind,
        child: FrameChild,
        parent_known: bool,
    ) -> MergeOutcome {
        if kind != ChangeKind::Delete && !parent_known {
            return MergeOutcome::Ignored;
        }

        let id = child.id;
        let incoming_parent = child.parent();
        let local = self
            .records
            .get(&id)
            .map(|existing| (existing.parent(), existing.revision));

        let parent = match (kind, local) {
            // Deletes target the group the child lives in locally.
            (ChangeKind::Delete, Some((local_parent, _))) => local_parent,
            (ChangeKind::Update, Some((local_parent, revision)))
                if local_parent != incoming_parent =>
            {
                if child.revision < revision {
                    return MergeOutcome::Stale;
                }
                self.upsert(child);
                return MergeOutcome::Replaced;
            }
            _ => incoming_parent,
        };

        let group = self.groups.entry(parent).or_default();
        let outcome = merge_record(&mut self.records, group, kind, child);
        if group.is_empty() {
            self.groups.remove(&parent);
        }
        outcome
    }

    fn detach(&mut self, parent: ParentRef, id: ChildId) {
        if let Some(group) = self.groups.get_mut(&parent) {
            group.remove(id);
            if group.is_empty() {
                self.groups.remove(&parent);
            }
        }
    }

    fn renumber(&mut self, order: &[ChildId]) {
        for (position, id) in order.iter().enumerate() {
            if let Some(child) = self.records.get_mut(id) {
                child.order_position = position as i64;
            }
        }
    }

    fn collect_post_order(
        &self,
        parent: ParentRef,
        visited: &mut HashSet<ChildId>,
        out: &mut Vec<ChildId>,
    ) {
        for id in self.ids_of(parent) {
            if !visited.insert(id) {
                continue;
            }
            self.collect_post_order(ParentRef::child(id), visited, out);
            out.push(id);
        }
    }
}

impl ChildLookup for ChildIndex {
    fn child(&self, id: ChildId) -> Option<&FrameChild> {
        self.get(id)
    }

    fn children_of(&self, parent: ParentRef) -> Vec<&FrameChild> {
        self.groups
            .get(&parent)
            .map(|group| {
                group
                    .keys()
                    .iter()
                    .filter_map(|id| self.records.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}
