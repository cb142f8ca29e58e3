//! Assembly surface: part instances dropped into the document.
//!
//! # Responsibility
//! - Duplicate a part on every drop, keyed by a fresh uid.
//! - Keep instance order with the same dirty/settled state machine as the
//!   persisted collections.
//!
//! # Invariants
//! - `uid` is the sort and UI key and is never reused. `id` keeps pointing
//!   at the backing part and is shared by duplicates.
//! - Removing by uid removes exactly one instance.

use crate::compose::{ChildLookup, Composer};
use crate::model::part::{Part, PartId};
use crate::reconcile::OrderedGroup;
use crate::store::ChangeKind;
use log::debug;
use std::collections::HashMap;
use uuid::Uuid;

/// Ordered part instances keyed by uid.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    instances: HashMap<Uuid, Part>,
    order: OrderedGroup<Uuid>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the surface with persisted parts, keeping their uids.
    pub fn from_parts(parts: impl IntoIterator<Item = Part>) -> Self {
        let mut assembly = Self::new();
        for part in parts {
            assembly.order.push(part.uid);
            assembly.instances.insert(part.uid, part);
        }
        assembly
    }

    /// Appends a copy of `source` under a fresh uid and returns that uid.
    ///
    /// The source is left where it is.
    pub fn drop_part(&mut self, source: &Part) -> Uuid {
        let uid = Uuid::new_v4();
        let mut instance = source.clone();
        instance.uid = uid;
        self.instances.insert(uid, instance);
        self.order.push(uid);
        debug!(
            "event=assembly_drop module=assembly status=ok part_id={} uid={uid}",
            source.id
        );
        uid
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instances in document order.
    pub fn instances(&self) -> Vec<&Part> {
        self.order
            .keys()
            .iter()
            .filter_map(|uid| self.instances.get(uid))
            .collect()
    }

    pub fn instance(&self, uid: Uuid) -> Option<&Part> {
        self.instances.get(&uid)
    }

    /// Uids of every instance backed by part `id`.
    pub fn uids_of(&self, id: PartId) -> Vec<Uuid> {
        self.instances()
            .into_iter()
            .filter(|part| part.id == id)
            .map(|part| part.uid)
            .collect()
    }

    /// Moves `active` onto the slot of `over` and marks the surface dirty.
    pub fn move_instance(&mut self, active: Uuid, over: Uuid) -> bool {
        self.order.move_to(active, over)
    }

    /// Removes exactly one instance.
    pub fn remove_instance(&mut self, uid: Uuid) -> Option<Part> {
        self.order.remove(uid);
        self.instances.remove(&uid)
    }

    /// Propagates a remote part change to every instance sharing its id.
    ///
    /// Updates replace content but keep each instance's uid. Deletes remove
    /// every instance. Returns the number of instances touched.
    pub fn apply_part_event(&mut self, kind: ChangeKind, part: &Part) -> usize {
        let uids = self.uids_of(part.id);
        match kind {
            ChangeKind::Insert => 0,
            ChangeKind::Update => {
                let mut touched = 0;
                for uid in uids {
                    if let Some(instance) = self.instances.get_mut(&uid) {
                        if part.revision < instance.revision {
                            continue;
                        }
                        *instance = Part {
                            uid,
                            ..part.clone()
                        };
                        touched += 1;
                    }
                }
                touched
            }
            ChangeKind::Delete => {
                for uid in &uids {
                    self.remove_instance(*uid);
                }
                uids.len()
            }
        }
    }

    /// Composes every instance in document order.
    pub fn compose<L: ChildLookup + ?Sized>(&self, composer: &Composer, lookup: &L) -> String {
        composer.compose_document(self.instances(), lookup)
    }

    pub fn is_dirty(&self) -> bool {
        self.order.is_dirty()
    }

    /// Marks the current instance order as saved.
    pub fn mark_saved(&mut self) {
        self.order.mark_settled();
    }
}
