//! Hierarchy store: canonical local copies of templates, children and parts.
//!
//! # Responsibility
//! - Validate writes before any store call, persist them through an
//!   `EntityStore`, then apply the committed record locally.
//! - Maintain the sibling index and the document order of parts.
//! - Cascade deletes and reorders as sequences of single-row store calls.
//! - Merge remote change events and notify view subscribers.
//!
//! # Invariants
//! - Cascades delete descendants before their ancestor.
//! - Sibling groups and the document order keep `order_position`
//!   contiguous (`0..n-1`) after every successful mutation. Deletes compact
//!   the survivors; a dirty group is compacted locally and written by its
//!   next save.
//! - A cascade or batch halts at the first store failure. Items already
//!   written stay written and are reported in `HierarchyError::Partial`.
//! - Every selected child id written to a part is a direct template child
//!   of the part's frame.

pub mod index;

pub use index::ChildIndex;

use crate::compose::ChildLookup;
use crate::model::child::{
    ChildDraft, ChildId, FrameChild, FrameChildPatch, NewFrameChild, ParentKind, ParentRef,
};
use crate::model::part::{
    dedupe_selection, NewPart, Part, PartDraft, PartId, PartPatch, PartPosition,
};
use crate::model::template::{FrameTemplate, NewTemplate, TemplateId, TemplatePatch};
use crate::model::validation::{ensure_markup, normalize_content, normalize_name, ValidationError};
use crate::reconcile::{MergeOutcome, RecordSet};
use crate::store::{ChangeEvent, EntityKind, EntityRecord, EntityStore, StoreError, Subscription};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver, Sender};
use uuid::Uuid;

/// Result type used by hierarchy operations.
pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Cascade or batch that stopped at its first store failure.
#[derive(Debug)]
pub struct PartialFailure {
    /// Operation name, e.g. `delete_child`.
    pub operation: &'static str,
    /// Ids written before the failure. They stay committed.
    pub completed: Vec<i64>,
    /// Id whose store call failed.
    pub failed_at: i64,
    pub source: StoreError,
}

/// Errors from hierarchy operations.
#[derive(Debug)]
pub enum HierarchyError {
    /// Input rejected before any store call.
    Validation(ValidationError),
    /// Target entity is not present locally.
    NotFound { kind: EntityKind, id: i64 },
    /// No part instance carries this uid.
    UidNotFound(Uuid),
    /// Single store call failed.
    Store(StoreError),
    /// Multi-call operation halted part-way.
    Partial(PartialFailure),
}

impl Display for HierarchyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::UidNotFound(uid) => write!(f, "part instance not found: {uid}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Partial(failure) => write!(
                f,
                "{} stopped at {} after {} completed step(s): {}",
                failure.operation,
                failure.failed_at,
                failure.completed.len(),
                failure.source
            ),
        }
    }
}

impl Error for HierarchyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Partial(failure) => Some(&failure.source),
            _ => None,
        }
    }
}

impl From<ValidationError> for HierarchyError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for HierarchyError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

/// Ids removed by a successful cascade, in deletion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub deleted: Vec<ChildId>,
}

/// Local owner of templates, children and parts backed by an entity store.
pub struct HierarchyStore<S: EntityStore> {
    store: S,
    templates: RecordSet<FrameTemplate>,
    children: ChildIndex,
    parts: RecordSet<Part>,
    watchers: Vec<Sender<EntityKind>>,
}

impl<S: EntityStore> HierarchyStore<S> {
    /// Creates a store and loads every collection from `store`.
    pub fn load(store: S) -> HierarchyResult<Self> {
        let mut hierarchy = Self {
            store,
            templates: RecordSet::default(),
            children: ChildIndex::new(),
            parts: RecordSet::default(),
            watchers: Vec::new(),
        };
        hierarchy.refresh()?;
        Ok(hierarchy)
    }

    /// Backing entity store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Re-reads every collection and discards local state.
    pub fn refresh(&mut self) -> HierarchyResult<()> {
        let templates = self.store.list_templates()?;
        let children = self.store.list_children()?;
        let parts = self.store.list_parts()?;
        info!(
            "event=hierarchy_refresh module=hierarchy status=ok templates={} children={} parts={}",
            templates.len(),
            children.len(),
            parts.len()
        );
        self.templates = RecordSet::from_records(templates);
        self.children = ChildIndex::from_children(children);
        self.parts = RecordSet::from_records(parts);
        self.notify(EntityKind::Template);
        self.notify(EntityKind::Child);
        self.notify(EntityKind::Part);
        Ok(())
    }

    /// Receives the entity kind of every view that changed.
    pub fn subscribe_views(&mut self) -> Receiver<EntityKind> {
        let (sender, receiver) = channel();
        self.watchers.push(sender);
        receiver
    }

    // Views

    pub fn templates(&self) -> Vec<&FrameTemplate> {
        self.templates.ordered()
    }

    pub fn template(&self, id: TemplateId) -> Option<&FrameTemplate> {
        self.templates.get(id)
    }

    /// Every child, grouped by parent in sibling order.
    pub fn children(&self) -> Vec<&FrameChild> {
        self.children.all()
    }

    pub fn child(&self, id: ChildId) -> Option<&FrameChild> {
        self.children.get(id)
    }

    /// Siblings under one parent, in `order_position` order.
    pub fn children_of(&self, parent_id: i64, parent_kind: ParentKind) -> Vec<&FrameChild> {
        ChildLookup::children_of(
            &self.children,
            ParentRef {
                id: parent_id,
                kind: parent_kind,
            },
        )
    }

    pub fn child_index(&self) -> &ChildIndex {
        &self.children
    }

    /// Parts in document order.
    pub fn parts(&self) -> Vec<&Part> {
        self.parts.ordered()
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn part_by_uid(&self, uid: Uuid) -> Option<&Part> {
        self.parts.ordered().into_iter().find(|part| part.uid == uid)
    }

    pub fn parts_dirty(&self) -> bool {
        self.parts.order().is_dirty()
    }

    pub fn child_order_dirty(&self, parent: ParentRef) -> bool {
        self.children
            .group(parent)
            .is_some_and(|group| group.is_dirty())
    }

    // Templates

    /// Creates a template. The markup is stored verbatim.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        markup: impl Into<String>,
    ) -> HierarchyResult<FrameTemplate> {
        let name = normalize_name(&name.into())?;
        let markup = markup.into();
        ensure_markup(&markup)?;

        let template = self.store.insert_template(&NewTemplate { name, markup })?;
        info!(
            "event=template_add module=hierarchy status=ok template_id={}",
            template.id
        );
        self.templates.apply_local(template.clone());
        self.notify(EntityKind::Template);
        Ok(template)
    }

    /// Renames and/or re-marks a template. A markup change is propagated to
    /// every part built from it.
    pub fn update_template(
        &mut self,
        id: TemplateId,
        patch: TemplatePatch,
    ) -> HierarchyResult<FrameTemplate> {
        let current = self.require_template(id)?.clone();
        let patch = TemplatePatch {
            name: patch.name.as_deref().map(normalize_name).transpose()?,
            markup: patch.markup,
        };
        if let Some(markup) = &patch.markup {
            ensure_markup(markup)?;
        }
        if patch.is_empty() {
            return Ok(current);
        }

        let template = self.store.update_template(id, &patch)?;
        info!("event=template_update module=hierarchy status=ok template_id={id}");
        self.templates.apply_local(template.clone());
        self.notify(EntityKind::Template);

        if template.markup != current.markup {
            self.update_parts_by_frame_id(id, &template.markup)?;
        }
        Ok(template)
    }

    /// Deletes a template after its whole child subtree.
    ///
    /// Parts built from it keep their markup snapshot.
    pub fn delete_template(&mut self, id: TemplateId) -> HierarchyResult<CascadeReport> {
        self.require_template(id)?;
        let ids = self
            .children
            .descendants_post_order(ParentRef::template(id));
        let deleted = self.delete_children("delete_template", ids)?;

        if let Err(source) = self.store.delete_template(id) {
            if !matches!(source, StoreError::NotFound { .. }) {
                warn!(
                    "event=template_delete module=hierarchy status=partial template_id={id} deleted={}",
                    deleted.len()
                );
                return Err(HierarchyError::Partial(PartialFailure {
                    operation: "delete_template",
                    completed: deleted,
                    failed_at: id,
                    source,
                }));
            }
        }
        self.templates.remove(id);
        info!(
            "event=template_delete module=hierarchy status=ok template_id={id} deleted_children={}",
            deleted.len()
        );
        self.notify(EntityKind::Template);
        Ok(CascadeReport { deleted })
    }

    // Children

    /// Appends a child to its parent's sibling group.
    pub fn add_child(&mut self, new_child: NewFrameChild) -> HierarchyResult<FrameChild> {
        let name = normalize_name(&new_child.name)?;
        let content = normalize_content(&new_child.content)?;
        let parent = new_child.parent;
        if !self.parent_exists(parent) {
            return Err(HierarchyError::NotFound {
                kind: parent_entity(parent.kind),
                id: parent.id,
            });
        }

        let draft = ChildDraft {
            parent,
            name,
            content,
            order_position: self.children.next_position(parent),
        };
        let child = self.store.insert_child(&draft)?;
        info!(
            "event=child_add module=hierarchy status=ok child_id={} parent={parent} order_position={}",
            child.id, child.order_position
        );
        self.children.upsert(child.clone());
        self.notify(EntityKind::Child);
        Ok(child)
    }

    /// Partially updates a child's name or content.
    pub fn update_child(
        &mut self,
        id: ChildId,
        patch: FrameChildPatch,
    ) -> HierarchyResult<FrameChild> {
        let current = self.require_child(id)?.clone();
        let patch = FrameChildPatch {
            name: patch.name.as_deref().map(normalize_name).transpose()?,
            content: patch.content.as_deref().map(normalize_content).transpose()?,
        };
        if patch.is_empty() {
            return Ok(current);
        }

        let child = self.store.update_child(id, &patch)?;
        debug!("event=child_update module=hierarchy status=ok child_id={id}");
        self.children.upsert(child.clone());
        self.notify(EntityKind::Child);
        Ok(child)
    }

    /// Deletes a child and its descendants, deepest first, then closes the
    /// gap in its sibling group.
    ///
    /// If compaction fails, `Partial::completed` lists the deleted ids
    /// followed by the siblings already renumbered.
    pub fn delete_child(&mut self, id: ChildId) -> HierarchyResult<CascadeReport> {
        let parent = self.require_child(id)?.parent();
        let ids = self.children.subtree_post_order(id);
        let deleted = self.delete_children("delete_child", ids)?;
        self.compact_child_group(parent, "delete_child", &deleted)?;
        info!(
            "event=child_delete module=hierarchy status=ok child_id={id} deleted={}",
            deleted.len()
        );
        Ok(CascadeReport { deleted })
    }

    /// Reorders one sibling group and persists `order_position = index`.
    ///
    /// Listed ids come first in the given order, unlisted siblings follow
    /// in their current order, and ids outside the group are ignored. On a
    /// mid-way failure the group stays dirty.
    pub fn reorder_children(
        &mut self,
        parent_id: i64,
        parent_kind: ParentKind,
        ordered_ids: &[ChildId],
    ) -> HierarchyResult<Vec<ChildId>> {
        let parent = ParentRef {
            id: parent_id,
            kind: parent_kind,
        };
        self.stage_child_order(parent, ordered_ids);
        self.persist_child_order(parent, "reorder_children")
    }

    /// Applies a manual sibling order locally without persisting it.
    pub fn stage_child_order(&mut self, parent: ParentRef, ordered_ids: &[ChildId]) -> Vec<ChildId> {
        let order = self.children.stage_order(parent, ordered_ids);
        if !order.is_empty() {
            self.notify(EntityKind::Child);
        }
        order
    }

    /// Drag-style move of `active` onto the slot of `over`, locally.
    pub fn move_child(&mut self, parent: ParentRef, active: ChildId, over: ChildId) -> bool {
        let moved = self.children.move_to(parent, active, over);
        if moved {
            self.notify(EntityKind::Child);
        }
        moved
    }

    /// Persists a dirty sibling group. A settled group is left alone.
    pub fn save_child_order(&mut self, parent: ParentRef) -> HierarchyResult<Vec<ChildId>> {
        if !self.child_order_dirty(parent) {
            return Ok(self.children.ids_of(parent));
        }
        self.persist_child_order(parent, "save_child_order")
    }

    // Parts

    /// Creates a part at the end of the document with a fresh uid.
    pub fn add_part(&mut self, new_part: NewPart) -> HierarchyResult<Part> {
        let name = normalize_name(&new_part.name)?;
        ensure_markup(&new_part.template_markup)?;
        self.require_template(new_part.frame_id)?;
        let selected_child_ids =
            self.validate_selection(new_part.frame_id, &new_part.selected_child_ids)?;

        let draft = PartDraft {
            name,
            frame_id: new_part.frame_id,
            template_markup: new_part.template_markup,
            selected_child_ids,
            order_position: self.parts.next_position(),
            uid: Uuid::new_v4(),
        };
        self.insert_part(draft, "part_add")
    }

    /// Partially updates a part. Unspecified fields are untouched.
    pub fn update_part(&mut self, id: PartId, patch: PartPatch) -> HierarchyResult<Part> {
        let current = self.require_part(id)?.clone();
        let selected_child_ids = match &patch.selected_child_ids {
            Some(ids) => Some(self.validate_selection(current.frame_id, ids)?),
            None => None,
        };
        if let Some(markup) = &patch.template_markup {
            ensure_markup(markup)?;
        }
        let patch = PartPatch {
            name: patch.name.as_deref().map(normalize_name).transpose()?,
            selected_child_ids,
            template_markup: patch.template_markup,
        };
        if patch == PartPatch::default() {
            return Ok(current);
        }

        let part = self.store.update_part(id, &patch)?;
        debug!("event=part_update module=hierarchy status=ok part_id={id}");
        self.parts.apply_local(part.clone());
        self.notify(EntityKind::Part);
        Ok(part)
    }

    /// Deletes one part and closes the gap in the document order.
    ///
    /// If compaction fails, `Partial::completed` starts with the deleted id.
    pub fn delete_part(&mut self, id: PartId) -> HierarchyResult<()> {
        self.require_part(id)?;
        self.store.delete_part(id)?;
        self.parts.remove(id);
        info!("event=part_delete module=hierarchy status=ok part_id={id}");
        self.notify(EntityKind::Part);
        self.compact_parts(id)
    }

    /// Deletes exactly the part instance carrying `uid`.
    pub fn delete_part_by_uid(&mut self, uid: Uuid) -> HierarchyResult<()> {
        let id = self
            .part_by_uid(uid)
            .map(|part| part.id)
            .ok_or(HierarchyError::UidNotFound(uid))?;
        self.delete_part(id)
    }

    /// Persists a copy of a part with a fresh uid at the end of the document.
    pub fn duplicate_part(&mut self, id: PartId) -> HierarchyResult<Part> {
        let source = self.require_part(id)?.clone();
        let draft = PartDraft {
            name: source.name,
            frame_id: source.frame_id,
            template_markup: source.template_markup,
            selected_child_ids: source.selected_child_ids,
            order_position: self.parts.next_position(),
            uid: Uuid::new_v4(),
        };
        self.insert_part(draft, "part_duplicate")
    }

    /// Persists `(id, order_position)` pairs one by one.
    ///
    /// Not atomic: a failure leaves earlier pairs written and the document
    /// order dirty.
    pub fn update_parts_order(&mut self, positions: &[PartPosition]) -> HierarchyResult<()> {
        let mut completed = Vec::with_capacity(positions.len());
        for position in positions {
            match self
                .store
                .set_part_position(position.id, position.order_position)
            {
                Ok(part) => {
                    self.parts.apply_local(part);
                    completed.push(position.id);
                }
                Err(source) => {
                    warn!(
                        "event=parts_order module=hierarchy status=partial failed_at={} completed={}",
                        position.id,
                        completed.len()
                    );
                    self.notify(EntityKind::Part);
                    return Err(HierarchyError::Partial(PartialFailure {
                        operation: "update_parts_order",
                        completed,
                        failed_at: position.id,
                        source,
                    }));
                }
            }
        }
        self.parts.mark_settled();
        info!(
            "event=parts_order module=hierarchy status=ok count={}",
            completed.len()
        );
        self.notify(EntityKind::Part);
        Ok(())
    }

    /// Reorders the document and persists contiguous positions.
    pub fn reorder_parts(&mut self, ordered_ids: &[PartId]) -> HierarchyResult<Vec<PartId>> {
        let order = self.stage_parts_order(ordered_ids);
        self.update_parts_order(&positions_for(&order))?;
        Ok(order)
    }

    /// Applies a manual document order locally without persisting it.
    pub fn stage_parts_order(&mut self, ordered_ids: &[PartId]) -> Vec<PartId> {
        let order = self.parts.stage_order(ordered_ids);
        self.notify(EntityKind::Part);
        order
    }

    /// Drag-style move of one part onto another's slot, locally.
    pub fn move_part(&mut self, active: PartId, over: PartId) -> bool {
        let moved = self.parts.move_to(active, over);
        if moved {
            self.notify(EntityKind::Part);
        }
        moved
    }

    /// Persists a dirty document order. A settled order is left alone.
    pub fn save_parts_order(&mut self) -> HierarchyResult<()> {
        if !self.parts_dirty() {
            return Ok(());
        }
        let order = self.parts.order().keys().to_vec();
        self.update_parts_order(&positions_for(&order))
    }

    /// Rewrites the markup snapshot of every part built from `frame_id`.
    ///
    /// Returns the updated part ids. Stops at the first failure.
    pub fn update_parts_by_frame_id(
        &mut self,
        frame_id: TemplateId,
        markup: &str,
    ) -> HierarchyResult<Vec<PartId>> {
        ensure_markup(markup)?;
        let targets = self.store.list_parts_by_frame(frame_id)?;
        let mut updated = Vec::with_capacity(targets.len());
        for target in targets {
            let patch = PartPatch {
                template_markup: Some(markup.to_string()),
                ..PartPatch::default()
            };
            match self.store.update_part(target.id, &patch) {
                Ok(part) => {
                    self.parts.apply_local(part);
                    updated.push(target.id);
                }
                Err(source) => {
                    warn!(
                        "event=parts_propagate module=hierarchy status=partial frame_id={frame_id} failed_at={} completed={}",
                        target.id,
                        updated.len()
                    );
                    self.notify(EntityKind::Part);
                    return Err(HierarchyError::Partial(PartialFailure {
                        operation: "update_parts_by_frame_id",
                        completed: updated,
                        failed_at: target.id,
                        source,
                    }));
                }
            }
        }
        info!(
            "event=parts_propagate module=hierarchy status=ok frame_id={frame_id} count={}",
            updated.len()
        );
        if !updated.is_empty() {
            self.notify(EntityKind::Part);
        }
        Ok(updated)
    }

    // Remote changes

    /// Merges one committed change pushed by the feed.
    pub fn apply_remote(&mut self, event: ChangeEvent) -> MergeOutcome {
        let kind = event.record.entity_kind();
        let id = event.record.id();
        let outcome = match event.record {
            EntityRecord::Template(template) => self.templates.merge(event.kind, template),
            EntityRecord::Child(child) => {
                let parent_known = self.parent_exists(child.parent());
                self.children.merge(event.kind, child, parent_known)
            }
            EntityRecord::Part(part) => self.parts.merge(event.kind, part),
        };
        debug!(
            "event=remote_merge module=hierarchy status={outcome:?} kind={kind} id={id} change={:?}",
            event.kind
        );
        if outcome.changed() {
            self.notify(kind);
        }
        outcome
    }

    /// Drains a feed subscription and merges every pending event.
    ///
    /// Returns how many events changed local state.
    pub fn sync(&mut self, subscription: &Subscription) -> usize {
        subscription
            .drain()
            .into_iter()
            .map(|event| self.apply_remote(event))
            .filter(|outcome| outcome.changed())
            .count()
    }

    // Internals

    fn insert_part(&mut self, draft: PartDraft, event: &str) -> HierarchyResult<Part> {
        let part = self.store.insert_part(&draft)?;
        info!(
            "event={event} module=hierarchy status=ok part_id={} uid={} order_position={}",
            part.id, part.uid, part.order_position
        );
        self.parts.apply_local(part.clone());
        self.notify(EntityKind::Part);
        Ok(part)
    }

    fn delete_children(
        &mut self,
        operation: &'static str,
        ids: Vec<ChildId>,
    ) -> HierarchyResult<Vec<ChildId>> {
        let mut completed = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.delete_child(id) {
                // Already gone at the store counts as deleted.
                Ok(()) | Err(StoreError::NotFound { .. }) => {
                    self.children.remove(id);
                    completed.push(id);
                }
                Err(source) => {
                    warn!(
                        "event={operation} module=hierarchy status=partial failed_at={id} completed={}",
                        completed.len()
                    );
                    if !completed.is_empty() {
                        self.notify(EntityKind::Child);
                    }
                    return Err(HierarchyError::Partial(PartialFailure {
                        operation,
                        completed,
                        failed_at: id,
                        source,
                    }));
                }
            }
        }
        if !completed.is_empty() {
            self.notify(EntityKind::Child);
        }
        Ok(completed)
    }

    fn persist_child_order(
        &mut self,
        parent: ParentRef,
        operation: &'static str,
    ) -> HierarchyResult<Vec<ChildId>> {
        let order = self.children.ids_of(parent);
        let mut completed = Vec::with_capacity(order.len());
        for (index, id) in order.iter().enumerate() {
            match self.store.set_child_position(*id, index as i64) {
                Ok(child) => {
                    self.children.upsert(child);
                    completed.push(*id);
                }
                Err(source) => {
                    warn!(
                        "event={operation} module=hierarchy status=partial parent={parent} failed_at={id} completed={}",
                        completed.len()
                    );
                    return Err(HierarchyError::Partial(PartialFailure {
                        operation,
                        completed,
                        failed_at: *id,
                        source,
                    }));
                }
            }
        }
        self.children.mark_settled(parent);
        info!(
            "event={operation} module=hierarchy status=ok parent={parent} count={}",
            completed.len()
        );
        self.notify(EntityKind::Child);
        Ok(order)
    }

    /// Renumbers the survivors of a sibling group after a delete.
    ///
    /// Only children whose position moved are written. A failure leaves
    /// the group dirty so `save_child_order` can finish the job.
    fn compact_child_group(
        &mut self,
        parent: ParentRef,
        operation: &'static str,
        deleted: &[ChildId],
    ) -> HierarchyResult<()> {
        let order = self.children.ids_of(parent);
        if self.child_order_dirty(parent) {
            self.children.stage_order(parent, &order);
            return Ok(());
        }
        let mut completed = deleted.to_vec();
        for (index, id) in order.iter().enumerate() {
            let position = index as i64;
            if self
                .children
                .get(*id)
                .is_some_and(|child| child.order_position == position)
            {
                continue;
            }
            match self.store.set_child_position(*id, position) {
                Ok(child) => {
                    self.children.upsert(child);
                    completed.push(*id);
                }
                Err(source) => {
                    warn!(
                        "event={operation} module=hierarchy status=partial parent={parent} failed_at={id} completed={}",
                        completed.len()
                    );
                    self.children.stage_order(parent, &order);
                    self.notify(EntityKind::Child);
                    return Err(HierarchyError::Partial(PartialFailure {
                        operation,
                        completed,
                        failed_at: *id,
                        source,
                    }));
                }
            }
        }
        if completed.len() > deleted.len() {
            debug!(
                "event=child_compact module=hierarchy status=ok parent={parent} renumbered={}",
                completed.len() - deleted.len()
            );
            self.notify(EntityKind::Child);
        }
        Ok(())
    }

    /// Renumbers the document order after a part delete.
    fn compact_parts(&mut self, deleted: PartId) -> HierarchyResult<()> {
        let order = self.parts.order().keys().to_vec();
        if self.parts_dirty() {
            self.parts.stage_order(&order);
            return Ok(());
        }
        let mut completed = vec![deleted];
        for (index, id) in order.iter().enumerate() {
            let position = index as i64;
            if self
                .parts
                .get(*id)
                .is_some_and(|part| part.order_position == position)
            {
                continue;
            }
            match self.store.set_part_position(*id, position) {
                Ok(part) => {
                    self.parts.apply_local(part);
                    completed.push(*id);
                }
                Err(source) => {
                    warn!(
                        "event=part_delete module=hierarchy status=partial failed_at={id} completed={}",
                        completed.len()
                    );
                    self.parts.stage_order(&order);
                    self.notify(EntityKind::Part);
                    return Err(HierarchyError::Partial(PartialFailure {
                        operation: "delete_part",
                        completed,
                        failed_at: *id,
                        source,
                    }));
                }
            }
        }
        if completed.len() > 1 {
            debug!(
                "event=part_compact module=hierarchy status=ok renumbered={}",
                completed.len() - 1
            );
            self.notify(EntityKind::Part);
        }
        Ok(())
    }

    fn validate_selection(
        &self,
        frame_id: TemplateId,
        ids: &[ChildId],
    ) -> Result<Vec<ChildId>, ValidationError> {
        let frame = ParentRef::template(frame_id);
        let ids = dedupe_selection(ids);
        for id in &ids {
            let belongs = self
                .children
                .get(*id)
                .is_some_and(|child| child.parent() == frame);
            if !belongs {
                return Err(ValidationError::ForeignChild {
                    child_id: *id,
                    frame_id,
                });
            }
        }
        Ok(ids)
    }

    fn parent_exists(&self, parent: ParentRef) -> bool {
        match parent.kind {
            ParentKind::Template => self.templates.get(parent.id).is_some(),
            ParentKind::Child => self.children.contains(parent.id),
        }
    }

    fn require_template(&self, id: TemplateId) -> HierarchyResult<&FrameTemplate> {
        self.templates.get(id).ok_or(HierarchyError::NotFound {
            kind: EntityKind::Template,
            id,
        })
    }

    fn require_child(&self, id: ChildId) -> HierarchyResult<&FrameChild> {
        self.children.get(id).ok_or(HierarchyError::NotFound {
            kind: EntityKind::Child,
            id,
        })
    }

    fn require_part(&self, id: PartId) -> HierarchyResult<&Part> {
        self.parts.get(id).ok_or(HierarchyError::NotFound {
            kind: EntityKind::Part,
            id,
        })
    }

    fn notify(&mut self, kind: EntityKind) {
        self.watchers.retain(|watcher| watcher.send(kind).is_ok());
    }
}

impl<S: EntityStore> ChildLookup for HierarchyStore<S> {
    fn child(&self, id: ChildId) -> Option<&FrameChild> {
        self.children.get(id)
    }

    fn children_of(&self, parent: ParentRef) -> Vec<&FrameChild> {
        ChildLookup::children_of(&self.children, parent)
    }
}

fn parent_entity(kind: ParentKind) -> EntityKind {
    match kind {
        ParentKind::Template => EntityKind::Template,
        ParentKind::Child => EntityKind::Child,
    }
}

fn positions_for(order: &[PartId]) -> Vec<PartPosition> {
    order
        .iter()
        .enumerate()
        .map(|(index, id)| PartPosition {
            id: *id,
            order_position: index as i64,
        })
        .collect()
}
