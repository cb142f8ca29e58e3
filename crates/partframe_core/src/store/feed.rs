//! In-process change-notification feed.
//!
//! # Responsibility
//! - Fan committed changes out to subscribers of one entity kind.
//! - Stop delivery when a subscription is unsubscribed or dropped.
//!
//! # Invariants
//! - Events are delivered in publish order per subscriber.
//! - A disconnected subscriber is pruned on the next publish.

use crate::model::child::FrameChild;
use crate::model::part::Part;
use crate::model::template::FrameTemplate;
use crate::store::EntityKind;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// Kind of committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Record carried by a change event. Deletes carry the last known row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "data", rename_all = "snake_case")]
pub enum EntityRecord {
    Template(FrameTemplate),
    Child(FrameChild),
    Part(Part),
}

impl EntityRecord {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Template(_) => EntityKind::Template,
            Self::Child(_) => EntityKind::Child,
            Self::Part(_) => EntityKind::Part,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Self::Template(template) => template.id,
            Self::Child(child) => child.id,
            Self::Part(part) => part.id,
        }
    }
}

/// One committed change pushed by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: EntityRecord,
}

impl ChangeEvent {
    pub fn insert(record: EntityRecord) -> Self {
        Self {
            kind: ChangeKind::Insert,
            record,
        }
    }

    pub fn update(record: EntityRecord) -> Self {
        Self {
            kind: ChangeKind::Update,
            record,
        }
    }

    pub fn delete(record: EntityRecord) -> Self {
        Self {
            kind: ChangeKind::Delete,
            record,
        }
    }
}

struct Subscriber {
    id: u64,
    kind: EntityKind,
    sender: Sender<ChangeEvent>,
}

/// Receiving end of a feed subscription for one entity kind.
pub struct Subscription {
    id: u64,
    kind: EntityKind,
    receiver: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the next pending event without blocking.
    pub fn try_next(&self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Returns every pending event without blocking.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Multi-subscriber push feed.
#[derive(Default)]
pub struct ChangeFeed {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to changes of one entity kind.
    pub fn subscribe(&self, kind: EntityKind) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, kind, sender });
        debug!("event=feed_subscribe module=store status=ok kind={kind} subscription_id={id}");
        Subscription { id, kind, receiver }
    }

    /// Ends delivery to one subscription.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|subscriber| subscriber.id != subscription.id);
        debug!(
            "event=feed_unsubscribe module=store status=ok kind={} subscription_id={}",
            subscription.kind, subscription.id
        );
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers an event to every subscriber of its entity kind.
    pub fn publish(&self, event: ChangeEvent) {
        let kind = event.record.entity_kind();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| {
            if subscriber.kind != kind {
                return true;
            }
            subscriber.sender.send(event.clone()).is_ok()
        });
    }
}
