//! Core engine for partframe: templates, nested child fragments and parts
//! composed into one markup document.
//! This crate is the single source of truth for hierarchy and ordering
//! invariants.

pub mod assembly;
pub mod compose;
pub mod config;
pub mod db;
pub mod hierarchy;
pub mod logging;
pub mod markup;
pub mod model;
pub mod reconcile;
pub mod store;

pub use assembly::Assembly;
pub use compose::{ChildLookup, Composer};
pub use config::{ConfigError, EngineConfig};
pub use hierarchy::{
    CascadeReport, ChildIndex, HierarchyError, HierarchyResult, HierarchyStore, PartialFailure,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use markup::{has_drop_zone, resolve_insertion_point, InsertionStrategy, MarkupTree, ParseError};
pub use model::child::{
    ChildId, FrameChild, FrameChildPatch, NewFrameChild, ParentKind, ParentRef,
};
pub use model::part::{NewPart, Part, PartId, PartPatch, PartPosition};
pub use model::template::{FrameTemplate, TemplateId, TemplatePatch};
pub use model::validation::ValidationError;
pub use reconcile::{MergeOutcome, OrderedGroup, SyncState};
pub use store::{
    ChangeEvent, ChangeFeed, ChangeKind, EntityKind, EntityRecord, EntityStore,
    SqliteEntityStore, StoreError, StoreResult, Subscription,
};

/// Minimal health-check API for embedders.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
