//! Insertion-point strategies.
//!
//! Two strategies exist. `DeepestElement` follows the first element child
//! down to a leaf. `Placeholder` searches depth-first for the first empty
//! or placeholder leaf and falls back to the deepest element. `Placeholder`
//! is the canonical default: for single-path frames such as
//! `<div><h1></h1></div>` both strategies agree, and for branching frames
//! it finds the slot the author marked instead of the first heading.

use crate::markup::tree::{ElementHandle, MarkupTree};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PLACEHOLDER_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)insert content here|add content|enter text|コンテンツを追加|ここにコンテンツ|ここにHTMLコードを入力|テキストを入力",
    )
    .expect("valid placeholder phrase regex")
});
static ELLIPSIS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\.\.\.|…)$").expect("valid ellipsis regex"));

/// How the injection target is chosen inside a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionStrategy {
    /// First-child descent to a leaf, regardless of its text.
    DeepestElement,
    /// First empty or placeholder leaf, else the deepest element.
    #[default]
    Placeholder,
}

impl MarkupTree {
    /// Returns the injection target for this tree.
    ///
    /// Always yields an element: every strategy falls back to a
    /// structural target when nothing better matches.
    pub fn insertion_point(&self, strategy: InsertionStrategy) -> ElementHandle {
        match strategy {
            InsertionStrategy::DeepestElement => deepest_first_child(self),
            InsertionStrategy::Placeholder => {
                first_placeholder(self).unwrap_or_else(|| deepest_by_depth(self))
            }
        }
    }

    /// Returns whether the element qualifies as a placeholder slot.
    pub fn is_placeholder(&self, handle: ElementHandle) -> bool {
        if self.is_void(handle) || !self.element_children(handle).is_empty() {
            return false;
        }
        let text = self.text_content(handle);
        let trimmed = text.trim();
        trimmed.is_empty() || ELLIPSIS_RE.is_match(trimmed) || PLACEHOLDER_PHRASE_RE.is_match(trimmed)
    }
}

/// Parsed template together with its resolved target.
#[derive(Debug, Clone)]
pub struct InsertionPoint {
    tree: MarkupTree,
    target: ElementHandle,
}

impl InsertionPoint {
    pub fn target(&self) -> ElementHandle {
        self.target
    }

    pub fn tree(&self) -> &MarkupTree {
        &self.tree
    }

    /// Lowercased tag name of the target element.
    pub fn tag_name(&self) -> &str {
        self.tree.tag_name(self.target)
    }

    /// Replaces the target's inner content and returns the serialized root.
    pub fn inject(mut self, content: &str) -> String {
        self.tree.replace_inner(self.target, content);
        self.tree.serialize()
    }
}

/// Parses `markup` and locates its insertion point.
///
/// Returns `None` when the markup cannot be parsed or its root is a void
/// element with no room for content; callers then leave the markup
/// unchanged.
pub fn resolve_insertion_point(markup: &str, strategy: InsertionStrategy) -> Option<InsertionPoint> {
    let tree = MarkupTree::parse(markup).ok()?;
    if tree.is_void(tree.root()) {
        return None;
    }
    let target = tree.insertion_point(strategy);
    Some(InsertionPoint { tree, target })
}

/// Returns whether `markup` has at least one empty non-void leaf element.
pub fn has_drop_zone(markup: &str) -> bool {
    let Ok(tree) = MarkupTree::parse(markup) else {
        return false;
    };
    let mut stack = vec![tree.root()];
    while let Some(handle) = stack.pop() {
        let children = tree.element_children(handle);
        if children.is_empty() {
            if !tree.is_void(handle) && tree.text_content(handle).trim().is_empty() {
                return true;
            }
            continue;
        }
        stack.extend(children.into_iter().rev());
    }
    false
}

fn deepest_first_child(tree: &MarkupTree) -> ElementHandle {
    let mut current = tree.root();
    while let Some(first) = tree.element_children(current).first() {
        current = *first;
    }
    current
}

fn first_placeholder(tree: &MarkupTree) -> Option<ElementHandle> {
    let mut stack = vec![tree.root()];
    while let Some(handle) = stack.pop() {
        if tree.is_placeholder(handle) {
            return Some(handle);
        }
        stack.extend(tree.element_children(handle).into_iter().rev());
    }
    None
}

fn deepest_by_depth(tree: &MarkupTree) -> ElementHandle {
    let mut best = (tree.root(), 0usize);
    let mut stack = vec![(tree.root(), 0usize)];
    while let Some((handle, depth)) = stack.pop() {
        if depth > best.1 {
            best = (handle, depth);
        }
        stack.extend(
            tree.element_children(handle)
                .into_iter()
                .rev()
                .map(|child| (child, depth + 1)),
        );
    }
    best.0
}
