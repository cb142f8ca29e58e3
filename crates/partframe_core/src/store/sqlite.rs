//! SQLite-backed entity store.
//!
//! # Responsibility
//! - Persist templates, children and parts in migrated SQLite tables.
//! - Publish every committed write on the store's change feed.
//!
//! # Invariants
//! - Child listing is deterministic: `parent_id, parent_kind,
//!   order_position, id`.
//! - Part listing is deterministic: `order_position, id`.
//! - Feed events are published only after the row is committed.

use crate::db::migrations::latest_version;
use crate::model::child::{ChildDraft, ChildId, FrameChild, FrameChildPatch, ParentKind};
use crate::model::part::{Part, PartDraft, PartId, PartPatch};
use crate::model::template::{FrameTemplate, NewTemplate, TemplateId, TemplatePatch};
use crate::store::feed::{ChangeEvent, ChangeFeed, EntityRecord};
use crate::store::{EntityKind, EntityStore, StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const TEMPLATE_SELECT_SQL: &str = "SELECT id, name, markup, revision FROM frame_templates";
const CHILD_SELECT_SQL: &str = "SELECT
    id,
    parent_id,
    parent_kind,
    name,
    content,
    order_position,
    revision
FROM frame_children";
const PART_SELECT_SQL: &str = "SELECT
    id,
    uid,
    name,
    frame_id,
    template_markup,
    selected_child_ids,
    order_position,
    revision
FROM parts";

/// SQLite-backed store with an attached change feed.
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
    feed: ChangeFeed,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self {
            conn,
            feed: ChangeFeed::new(),
        })
    }

    /// Change feed fed by this store's committed writes.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn load_template(&self, id: TemplateId) -> StoreResult<FrameTemplate> {
        self.conn
            .query_row(
                &format!("{TEMPLATE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_template_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Template,
                id,
            })
    }

    fn load_child(&self, id: ChildId) -> StoreResult<FrameChild> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CHILD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return parse_child_row(row);
        }
        Err(StoreError::NotFound {
            kind: EntityKind::Child,
            id,
        })
    }

    fn load_part(&self, id: PartId) -> StoreResult<Part> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PART_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return parse_part_row(row);
        }
        Err(StoreError::NotFound {
            kind: EntityKind::Part,
            id,
        })
    }

    /// Reloads an updated child and publishes it. Zero changed rows means
    /// the id is gone.
    fn finish_child_update(&self, id: ChildId, changed: usize) -> StoreResult<FrameChild> {
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: EntityKind::Child,
                id,
            });
        }
        let child = self.load_child(id)?;
        self.feed
            .publish(ChangeEvent::update(EntityRecord::Child(child.clone())));
        Ok(child)
    }

    fn finish_part_update(&self, id: PartId, changed: usize) -> StoreResult<Part> {
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: EntityKind::Part,
                id,
            });
        }
        let part = self.load_part(id)?;
        self.feed
            .publish(ChangeEvent::update(EntityRecord::Part(part.clone())));
        Ok(part)
    }

    fn query_parts(&self, sql: &str, frame_id: Option<TemplateId>) -> StoreResult<Vec<Part>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match frame_id {
            Some(frame_id) => stmt.query([frame_id])?,
            None => stmt.query([])?,
        };
        let mut parts = Vec::new();
        while let Some(row) = rows.next()? {
            parts.push(parse_part_row(row)?);
        }
        Ok(parts)
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn insert_template(&self, draft: &NewTemplate) -> StoreResult<FrameTemplate> {
        self.conn.execute(
            "INSERT INTO frame_templates (name, markup) VALUES (?1, ?2);",
            params![draft.name, draft.markup],
        )?;
        let template = self.load_template(self.conn.last_insert_rowid())?;
        self.feed
            .publish(ChangeEvent::insert(EntityRecord::Template(template.clone())));
        Ok(template)
    }

    fn update_template(
        &self,
        id: TemplateId,
        patch: &TemplatePatch,
    ) -> StoreResult<FrameTemplate> {
        let changed = self.conn.execute(
            "UPDATE frame_templates
             SET name = COALESCE(?2, name),
                 markup = COALESCE(?3, markup),
                 revision = revision + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, patch.name, patch.markup],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: EntityKind::Template,
                id,
            });
        }
        let template = self.load_template(id)?;
        self.feed
            .publish(ChangeEvent::update(EntityRecord::Template(template.clone())));
        Ok(template)
    }

    fn delete_template(&self, id: TemplateId) -> StoreResult<()> {
        let template = self.load_template(id)?;
        self.conn
            .execute("DELETE FROM frame_templates WHERE id = ?1;", [id])?;
        self.feed
            .publish(ChangeEvent::delete(EntityRecord::Template(template)));
        Ok(())
    }

    fn list_templates(&self) -> StoreResult<Vec<FrameTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} ORDER BY id ASC;"))?;
        let rows = stmt.query_map([], parse_template_row)?;
        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?);
        }
        Ok(templates)
    }

    fn insert_child(&self, draft: &ChildDraft) -> StoreResult<FrameChild> {
        self.conn.execute(
            "INSERT INTO frame_children (
                parent_id,
                parent_kind,
                name,
                content,
                order_position
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                draft.parent.id,
                draft.parent.kind.as_str(),
                draft.name,
                draft.content,
                draft.order_position,
            ],
        )?;
        let child = self.load_child(self.conn.last_insert_rowid())?;
        self.feed
            .publish(ChangeEvent::insert(EntityRecord::Child(child.clone())));
        Ok(child)
    }

    fn update_child(&self, id: ChildId, patch: &FrameChildPatch) -> StoreResult<FrameChild> {
        let changed = self.conn.execute(
            "UPDATE frame_children
             SET name = COALESCE(?2, name),
                 content = COALESCE(?3, content),
                 revision = revision + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, patch.name, patch.content],
        )?;
        self.finish_child_update(id, changed)
    }

    fn set_child_position(&self, id: ChildId, order_position: i64) -> StoreResult<FrameChild> {
        let changed = self.conn.execute(
            "UPDATE frame_children
             SET order_position = ?2,
                 revision = revision + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, order_position],
        )?;
        self.finish_child_update(id, changed)
    }

    fn delete_child(&self, id: ChildId) -> StoreResult<()> {
        let child = self.load_child(id)?;
        self.conn
            .execute("DELETE FROM frame_children WHERE id = ?1;", [id])?;
        self.feed
            .publish(ChangeEvent::delete(EntityRecord::Child(child)));
        Ok(())
    }

    fn list_children(&self) -> StoreResult<Vec<FrameChild>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CHILD_SELECT_SQL}
             ORDER BY parent_id ASC, parent_kind ASC, order_position ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut children = Vec::new();
        while let Some(row) = rows.next()? {
            children.push(parse_child_row(row)?);
        }
        Ok(children)
    }

    fn insert_part(&self, draft: &PartDraft) -> StoreResult<Part> {
        self.conn.execute(
            "INSERT INTO parts (
                uid,
                name,
                frame_id,
                template_markup,
                selected_child_ids,
                order_position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                draft.uid.to_string(),
                draft.name,
                draft.frame_id,
                draft.template_markup,
                encode_selection(&draft.selected_child_ids)?,
                draft.order_position,
            ],
        )?;
        let part = self.load_part(self.conn.last_insert_rowid())?;
        self.feed
            .publish(ChangeEvent::insert(EntityRecord::Part(part.clone())));
        Ok(part)
    }

    fn update_part(&self, id: PartId, patch: &PartPatch) -> StoreResult<Part> {
        let selection = patch
            .selected_child_ids
            .as_deref()
            .map(encode_selection)
            .transpose()?;
        let changed = self.conn.execute(
            "UPDATE parts
             SET name = COALESCE(?2, name),
                 selected_child_ids = COALESCE(?3, selected_child_ids),
                 template_markup = COALESCE(?4, template_markup),
                 revision = revision + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, patch.name, selection, patch.template_markup],
        )?;
        self.finish_part_update(id, changed)
    }

    fn set_part_position(&self, id: PartId, order_position: i64) -> StoreResult<Part> {
        let changed = self.conn.execute(
            "UPDATE parts
             SET order_position = ?2,
                 revision = revision + 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, order_position],
        )?;
        self.finish_part_update(id, changed)
    }

    fn delete_part(&self, id: PartId) -> StoreResult<()> {
        let part = self.load_part(id)?;
        self.conn.execute("DELETE FROM parts WHERE id = ?1;", [id])?;
        self.feed.publish(ChangeEvent::delete(EntityRecord::Part(part)));
        Ok(())
    }

    fn list_parts(&self) -> StoreResult<Vec<Part>> {
        self.query_parts(
            &format!("{PART_SELECT_SQL} ORDER BY order_position ASC, id ASC;"),
            None,
        )
    }

    fn list_parts_by_frame(&self, frame_id: TemplateId) -> StoreResult<Vec<Part>> {
        self.query_parts(
            &format!("{PART_SELECT_SQL} WHERE frame_id = ?1 ORDER BY order_position ASC, id ASC;"),
            Some(frame_id),
        )
    }
}

fn parse_template_row(row: &Row<'_>) -> rusqlite::Result<FrameTemplate> {
    Ok(FrameTemplate {
        id: row.get("id")?,
        name: row.get("name")?,
        markup: row.get("markup")?,
        revision: row.get("revision")?,
    })
}

fn parse_child_row(row: &Row<'_>) -> StoreResult<FrameChild> {
    let kind_text: String = row.get("parent_kind")?;
    let parent_kind = ParentKind::parse(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid parent kind `{kind_text}` in frame_children.parent_kind"
        ))
    })?;

    Ok(FrameChild {
        id: row.get("id")?,
        parent_id: row.get("parent_id")?,
        parent_kind,
        name: row.get("name")?,
        content: row.get("content")?,
        order_position: row.get("order_position")?,
        revision: row.get("revision")?,
    })
}

fn parse_part_row(row: &Row<'_>) -> StoreResult<Part> {
    let uid_text: String = row.get("uid")?;
    let uid = Uuid::parse_str(&uid_text)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{uid_text}` in parts.uid")))?;

    let selection_text: String = row.get("selected_child_ids")?;
    let selected_child_ids = serde_json::from_str(&selection_text).map_err(|err| {
        StoreError::InvalidData(format!(
            "invalid selection `{selection_text}` in parts.selected_child_ids: {err}"
        ))
    })?;

    Ok(Part {
        id: row.get("id")?,
        name: row.get("name")?,
        frame_id: row.get("frame_id")?,
        template_markup: row.get("template_markup")?,
        selected_child_ids,
        order_position: row.get("order_position")?,
        uid,
        revision: row.get("revision")?,
    })
}

fn encode_selection(ids: &[ChildId]) -> StoreResult<String> {
    serde_json::to_string(ids)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode selection: {err}")))
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
