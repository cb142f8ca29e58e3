//! Frame template record.
//!
//! # Invariants
//! - `name` is trimmed and non-blank.
//! - `markup` is stored verbatim and is non-blank.

use serde::{Deserialize, Serialize};

/// Store-assigned template identifier.
pub type TemplateId = i64;

/// Root-level reusable markup skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTemplate {
    pub id: TemplateId,
    pub name: String,
    pub markup: String,
    /// Store write counter used to discard stale change echoes.
    pub revision: i64,
}

/// Insert payload for a new template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTemplate {
    pub name: String,
    pub markup: String,
}

/// Partial template update. `None` fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub markup: Option<String>,
}

impl TemplatePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.markup.is_none()
    }
}
