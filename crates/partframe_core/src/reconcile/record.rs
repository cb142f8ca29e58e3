//! Keyed record collections and the remote-event merge rule.

use crate::model::child::FrameChild;
use crate::model::part::Part;
use crate::model::template::FrameTemplate;
use crate::reconcile::group::{OrderedGroup, SyncState};
use crate::store::ChangeKind;
use std::collections::HashMap;

/// Persisted record that can live in an ordered local collection.
pub trait Record: Clone {
    /// Persistence key.
    fn key(&self) -> i64;
    fn revision(&self) -> i64;
    /// Persisted rank inside its collection.
    fn order_position(&self) -> i64;
    fn set_order_position(&mut self, position: i64);
}

impl Record for FrameChild {
    fn key(&self) -> i64 {
        self.id
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn order_position(&self) -> i64 {
        self.order_position
    }

    fn set_order_position(&mut self, position: i64) {
        self.order_position = position;
    }
}

impl Record for Part {
    fn key(&self) -> i64 {
        self.id
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn order_position(&self) -> i64 {
        self.order_position
    }

    fn set_order_position(&mut self, position: i64) {
        self.order_position = position;
    }
}

// Templates are not user-sortable; creation order stands in for rank.
impl Record for FrameTemplate {
    fn key(&self) -> i64 {
        self.id
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn order_position(&self) -> i64 {
        self.id
    }

    fn set_order_position(&mut self, _position: i64) {}
}

/// Result of merging one change into a local collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    Removed,
    /// Incoming revision is older than the local one.
    Stale,
    /// Nothing to do (duplicate insert, unknown delete, unknown parent).
    Ignored,
}

impl MergeOutcome {
    /// Whether the local view changed.
    pub fn changed(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced | Self::Removed)
    }
}

/// Merges one change into `records` and its `group`.
///
/// - insert: appended if absent, otherwise ignored.
/// - update: replaces in place when not stale; absent ids are appended.
/// - delete: removes the id.
///
/// A settled group is re-sorted by persisted position after the merge. A
/// dirty group keeps its manual order and the local `order_position`.
pub fn merge_record<T: Record>(
    records: &mut HashMap<i64, T>,
    group: &mut OrderedGroup<i64>,
    kind: ChangeKind,
    incoming: T,
) -> MergeOutcome {
    let key = incoming.key();
    let local = records
        .get(&key)
        .map(|record| (record.revision(), record.order_position()));

    let outcome = match (kind, local) {
        (ChangeKind::Delete, Some(_)) => {
            records.remove(&key);
            group.remove(key);
            MergeOutcome::Removed
        }
        (ChangeKind::Delete, None) => MergeOutcome::Ignored,
        (ChangeKind::Insert, Some(_)) => MergeOutcome::Ignored,
        (ChangeKind::Update, Some((revision, _))) if incoming.revision() < revision => {
            MergeOutcome::Stale
        }
        (ChangeKind::Update, Some((_, local_position))) => {
            let mut incoming = incoming;
            if group.is_dirty() {
                incoming.set_order_position(local_position);
            }
            records.insert(key, incoming);
            group.push(key);
            MergeOutcome::Replaced
        }
        (ChangeKind::Insert | ChangeKind::Update, None) => {
            records.insert(key, incoming);
            group.push(key);
            MergeOutcome::Inserted
        }
    };

    if outcome.changed() && group.state() == SyncState::Settled {
        sort_group(records, group);
    }
    outcome
}

pub(crate) fn sort_group<T: Record>(records: &HashMap<i64, T>, group: &mut OrderedGroup<i64>) {
    group.sort_by_rank(|key| {
        let position = records
            .get(&key)
            .map_or(i64::MAX, |record| record.order_position());
        (position, key)
    });
}

/// Keyed records plus their local order.
#[derive(Debug, Clone)]
pub struct RecordSet<T: Record> {
    records: HashMap<i64, T>,
    order: OrderedGroup<i64>,
}

impl<T: Record> Default for RecordSet<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: OrderedGroup::new(),
        }
    }
}

impl<T: Record> RecordSet<T> {
    /// Builds a settled set ordered by persisted position.
    pub fn from_records(items: impl IntoIterator<Item = T>) -> Self {
        let mut set = Self::default();
        for item in items {
            set.order.push(item.key());
            set.records.insert(item.key(), item);
        }
        sort_group(&set.records, &mut set.order);
        set
    }

    pub fn get(&self, key: i64) -> Option<&T> {
        self.records.get(&key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in local order.
    pub fn ordered(&self) -> Vec<&T> {
        self.order
            .keys()
            .iter()
            .filter_map(|key| self.records.get(key))
            .collect()
    }

    pub fn order(&self) -> &OrderedGroup<i64> {
        &self.order
    }

    /// `max(order_position) + 1`, or 0 when empty.
    pub fn next_position(&self) -> i64 {
        self.records
            .values()
            .map(Record::order_position)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Applies a record returned by a local write.
    ///
    /// A response older than the local copy is dropped so a late reply
    /// never overwrites newer state. Returns whether the set changed.
    pub fn apply_local(&mut self, record: T) -> bool {
        if let Some(local) = self.records.get(&record.key()) {
            if record.revision() < local.revision() {
                return false;
            }
        }
        let key = record.key();
        self.records.insert(key, record);
        self.order.push(key);
        if !self.order.is_dirty() {
            sort_group(&self.records, &mut self.order);
        }
        true
    }

    pub fn remove(&mut self, key: i64) -> Option<T> {
        self.order.remove(key);
        self.records.remove(&key)
    }

    /// Applies a manual order locally and rewrites local positions.
    pub fn stage_order(&mut self, ordered: &[i64]) -> Vec<i64> {
        let order = self.order.stage_order(ordered);
        self.renumber(&order);
        order
    }

    /// Drag-style move of one key onto another's slot.
    pub fn move_to(&mut self, active: i64, over: i64) -> bool {
        if !self.order.move_to(active, over) {
            return false;
        }
        let order = self.order.keys().to_vec();
        self.renumber(&order);
        true
    }

    pub fn mark_settled(&mut self) {
        self.order.mark_settled();
        sort_group(&self.records, &mut self.order);
    }

    /// Merges one remote change.
    pub fn merge(&mut self, kind: ChangeKind, incoming: T) -> MergeOutcome {
        merge_record(&mut self.records, &mut self.order, kind, incoming)
    }

    fn renumber(&mut self, order: &[i64]) {
        for (index, key) in order.iter().enumerate() {
            if let Some(record) = self.records.get_mut(key) {
                record.set_order_position(index as i64);
            }
        }
    }
}
