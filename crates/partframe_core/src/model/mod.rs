//! Domain records for templates, child fragments, and parts.
//!
//! # Responsibility
//! - Define the canonical records owned by the hierarchy store.
//! - Keep validation rules next to the records they guard.
//!
//! # Invariants
//! - Every record is identified by a store-assigned id.
//! - `revision` is assigned by the store and only ever grows.

pub mod child;
pub mod part;
pub mod template;
pub mod validation;
