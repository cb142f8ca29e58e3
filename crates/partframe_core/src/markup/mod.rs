//! Markup fragment parsing and insertion-point resolution.
//!
//! # Responsibility
//! - Parse a markup fragment into a traversable element tree.
//! - Locate exactly one element where child content is injected.
//!
//! # Invariants
//! - Resolution never mutates the parsed tree.
//! - Only the first root element of a fragment is considered.
//! - Unmodified regions serialize byte-for-byte as they were parsed.

pub mod resolver;
pub mod tree;

pub use resolver::{has_drop_zone, resolve_insertion_point, InsertionPoint, InsertionStrategy};
pub use tree::{ElementHandle, MarkupTree, ParseError};
