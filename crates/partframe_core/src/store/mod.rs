//! Persistent entity store contract and its change-notification feed.
//!
//! # Responsibility
//! - Define the request/response interface the hierarchy store writes
//!   through (`EntityStore`).
//! - Define the push feed of committed changes (`ChangeFeed`).
//! - Ship a SQLite-backed adapter for both.
//!
//! # Invariants
//! - Every call returns the committed record or a `StoreError` carrying a
//!   human-readable message.
//! - `revision` is incremented by the store on every successful update.
//! - Deletes are single-row; cascades are the caller's job.

pub mod feed;
pub mod sqlite;

use crate::db::DbError;
use crate::model::child::{ChildDraft, ChildId, FrameChild, FrameChildPatch};
use crate::model::part::{Part, PartDraft, PartId, PartPatch};
use crate::model::template::{FrameTemplate, NewTemplate, TemplateId, TemplatePatch};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use feed::{ChangeEvent, ChangeFeed, ChangeKind, EntityRecord, Subscription};
pub use sqlite::SqliteEntityStore;

/// Result type used by entity store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The three persisted entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Template,
    Child,
    Part,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Child => "child",
            Self::Part => "part",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by an entity store.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist.
    NotFound { kind: EntityKind, id: i64 },
    /// Persisted data cannot be converted into a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Failure reported by a non-SQLite backend.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::Backend(message) => write!(f, "{message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Request/response interface over persisted templates, children and parts.
pub trait EntityStore {
    fn insert_template(&self, draft: &NewTemplate) -> StoreResult<FrameTemplate>;
    fn update_template(&self, id: TemplateId, patch: &TemplatePatch)
        -> StoreResult<FrameTemplate>;
    fn delete_template(&self, id: TemplateId) -> StoreResult<()>;
    fn list_templates(&self) -> StoreResult<Vec<FrameTemplate>>;

    fn insert_child(&self, draft: &ChildDraft) -> StoreResult<FrameChild>;
    fn update_child(&self, id: ChildId, patch: &FrameChildPatch) -> StoreResult<FrameChild>;
    /// Writes one sibling position.
    fn set_child_position(&self, id: ChildId, order_position: i64) -> StoreResult<FrameChild>;
    fn delete_child(&self, id: ChildId) -> StoreResult<()>;
    /// Lists every child ordered by parent, then `order_position`.
    fn list_children(&self) -> StoreResult<Vec<FrameChild>>;

    fn insert_part(&self, draft: &PartDraft) -> StoreResult<Part>;
    fn update_part(&self, id: PartId, patch: &PartPatch) -> StoreResult<Part>;
    /// Writes one document position.
    fn set_part_position(&self, id: PartId, order_position: i64) -> StoreResult<Part>;
    fn delete_part(&self, id: PartId) -> StoreResult<()>;
    /// Lists every part in document order.
    fn list_parts(&self) -> StoreResult<Vec<Part>>;
    /// Lists parts instantiated from one template.
    fn list_parts_by_frame(&self, frame_id: TemplateId) -> StoreResult<Vec<Part>>;
}
