//! Frame child record and parent addressing.
//!
//! # Responsibility
//! - Describe one named markup fragment attached to a template or child.
//! - Provide `ParentRef`, the key of a sibling group.
//!
//! # Invariants
//! - `(parent_id, parent_kind)` partitions children into disjoint groups.
//! - `order_position` is unique and contiguous (`0..n-1`) within a group
//!   after any successful mutation.

use crate::model::template::TemplateId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Store-assigned child identifier.
pub type ChildId = i64;

/// Kind of entity a child hangs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    Template,
    Child,
}

impl ParentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Child => "child",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "template" => Some(Self::Template),
            "child" => Some(Self::Child),
            _ => None,
        }
    }
}

/// Address of a sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: i64,
    pub kind: ParentKind,
}

impl ParentRef {
    pub fn template(id: TemplateId) -> Self {
        Self {
            id,
            kind: ParentKind::Template,
        }
    }

    pub fn child(id: ChildId) -> Self {
        Self {
            id,
            kind: ParentKind::Child,
        }
    }
}

impl Display for ParentRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Named markup fragment attached under a template or another child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameChild {
    pub id: ChildId,
    pub parent_id: i64,
    pub parent_kind: ParentKind,
    pub name: String,
    pub content: String,
    pub order_position: i64,
    pub revision: i64,
}

impl FrameChild {
    pub fn parent(&self) -> ParentRef {
        ParentRef {
            id: self.parent_id,
            kind: self.parent_kind,
        }
    }
}

/// Insert payload for a new child. `order_position` is assigned by the
/// hierarchy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFrameChild {
    pub parent: ParentRef,
    pub name: String,
    pub content: String,
}

/// Partial child update. `None` fields are untouched.
///
/// Positions are owned by the hierarchy store and change only through
/// reorders and delete compaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameChildPatch {
    pub name: Option<String>,
    pub content: Option<String>,
}

impl FrameChildPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.content.is_none()
    }
}

/// Fully resolved insert row handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDraft {
    pub parent: ParentRef,
    pub name: String,
    pub content: String,
    pub order_position: i64,
}
