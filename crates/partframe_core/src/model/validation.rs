//! Input validation shared by every write path.
//!
//! # Invariants
//! - Validation runs before any store call, so a rejected write never
//!   reaches persistence.

use crate::model::child::ChildId;
use crate::model::template::TemplateId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is blank after trim.
    EmptyName,
    /// Child content is blank after trim.
    EmptyContent,
    /// Template markup is blank.
    EmptyMarkup,
    /// Selected child is not a direct child of the part's template.
    ForeignChild {
        child_id: ChildId,
        frame_id: TemplateId,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name must not be blank"),
            Self::EmptyContent => write!(f, "content must not be blank"),
            Self::EmptyMarkup => write!(f, "markup must not be blank"),
            Self::ForeignChild { child_id, frame_id } => write!(
                f,
                "child {child_id} is not attached to template {frame_id}"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Trims a required name.
pub fn normalize_name(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(trimmed.to_string())
}

/// Trims required child content.
pub fn normalize_content(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    Ok(trimmed.to_string())
}

/// Checks template markup without rewriting it.
///
/// Markup is stored verbatim; only blank input is rejected.
pub fn ensure_markup(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyMarkup);
    }
    Ok(())
}
