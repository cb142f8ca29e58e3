//! Ordering and remote-change reconciliation.
//!
//! # Responsibility
//! - Track the local order of each sortable collection together with its
//!   sync state (`Settled` or `Dirty`).
//! - Merge committed changes pushed by the feed into local collections.
//!
//! # Invariants
//! - Merges are idempotent and keyed by entity id.
//! - An incoming record older than the local revision never replaces it.
//! - A dirty collection keeps its manual order across merges; a settled
//!   one follows persisted `order_position`.

pub mod group;
pub mod record;

pub use group::{OrderedGroup, SyncState};
pub use record::{merge_record, MergeOutcome, Record, RecordSet};
