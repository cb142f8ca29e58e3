//! Composition engine.
//!
//! # Responsibility
//! - Merge a part's selected children, and everything nested under them,
//!   into the part's template markup.
//! - Concatenate composed parts into the final document.
//!
//! # Invariants
//! - Composition never fails: unparseable markup is returned unchanged and
//!   unresolvable ids are skipped.
//! - Output is a pure function of its inputs and the config.
//! - Only direct template children of the part's frame are honored at the
//!   top level, in selection order.

use crate::config::EngineConfig;
use crate::markup::resolve_insertion_point;
use crate::model::child::{ChildId, FrameChild, ParentRef};
use crate::model::part::Part;
use crate::model::template::TemplateId;
use log::debug;
use std::collections::HashSet;

/// Read access to children for composition.
pub trait ChildLookup {
    fn child(&self, id: ChildId) -> Option<&FrameChild>;
    /// Siblings under `parent`, sorted by `order_position` then id.
    fn children_of(&self, parent: ParentRef) -> Vec<&FrameChild>;
}

/// Stateless composer configured once per session.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: EngineConfig,
}

impl Composer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Composes one part from its markup snapshot and selection.
    pub fn compose_part<L: ChildLookup + ?Sized>(&self, part: &Part, lookup: &L) -> String {
        self.compose_template(
            &part.template_markup,
            &part.selected_child_ids,
            part.frame_id,
            lookup,
        )
    }

    /// Injects the selected children of `frame_id` into `markup`.
    ///
    /// Returns `markup` unchanged when nothing in the selection resolves.
    pub fn compose_template<L: ChildLookup + ?Sized>(
        &self,
        markup: &str,
        selected: &[ChildId],
        frame_id: TemplateId,
        lookup: &L,
    ) -> String {
        let frame = ParentRef::template(frame_id);
        let mut seen = HashSet::with_capacity(selected.len());
        let mut contents = Vec::with_capacity(selected.len());
        for id in selected {
            if !seen.insert(*id) {
                continue;
            }
            let Some(child) = lookup.child(*id) else {
                debug!("event=compose_prune module=compose status=skip child_id={id} reason=missing");
                continue;
            };
            if child.parent() != frame {
                debug!(
                    "event=compose_prune module=compose status=skip child_id={id} reason=foreign parent={}",
                    child.parent()
                );
                continue;
            }
            let mut visited = HashSet::new();
            contents.push(self.compose_child(child, lookup, 0, &mut visited));
        }

        if contents.is_empty() {
            return markup.to_string();
        }
        self.inject(markup, &contents.join(&self.config.child_separator))
    }

    /// Composes parts in the given order, joined by the separator.
    pub fn compose_document<'a, L, I>(&self, parts: I, lookup: &L) -> String
    where
        L: ChildLookup + ?Sized,
        I: IntoIterator<Item = &'a Part>,
    {
        parts
            .into_iter()
            .map(|part| self.compose_part(part, lookup))
            .collect::<Vec<_>>()
            .join(&self.config.child_separator)
    }

    /// Replaces the insertion point's inner content with `content`.
    pub fn inject(&self, markup: &str, content: &str) -> String {
        match resolve_insertion_point(markup, self.config.strategy) {
            Some(point) => point.inject(content),
            None => {
                debug!("event=compose_inject module=compose status=fallback reason=no_insertion_point");
                markup.to_string()
            }
        }
    }

    fn compose_child<L: ChildLookup + ?Sized>(
        &self,
        child: &FrameChild,
        lookup: &L,
        depth: usize,
        visited: &mut HashSet<ChildId>,
    ) -> String {
        visited.insert(child.id);
        if depth >= self.config.max_depth {
            debug!(
                "event=compose_depth module=compose status=truncated child_id={} depth={depth}",
                child.id
            );
            return child.content.clone();
        }

        let nested = lookup
            .children_of(ParentRef::child(child.id))
            .into_iter()
            .filter(|nested| !visited.contains(&nested.id))
            .collect::<Vec<_>>();
        if nested.is_empty() {
            return child.content.clone();
        }

        let mut parts = Vec::with_capacity(nested.len());
        for nested in nested {
            parts.push(self.compose_child(nested, lookup, depth + 1, visited));
        }
        self.inject(&child.content, &parts.join(&self.config.child_separator))
    }
}
