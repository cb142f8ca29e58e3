use partframe_core::db::open_db_in_memory;
use partframe_core::model::child::ChildDraft;
use partframe_core::model::part::PartDraft;
use partframe_core::model::template::NewTemplate;
use partframe_core::{
    ChildId, EntityKind, EntityStore, FrameChild, FrameChildPatch, FrameTemplate, HierarchyError,
    HierarchyStore, NewFrameChild, NewPart, ParentKind, ParentRef, Part, PartId, PartPatch,
    SqliteEntityStore, StoreError, StoreResult, TemplateId, TemplatePatch, ValidationError,
};
use rusqlite::Connection;
use std::cell::Cell;

/// Forwards to SQLite but fails chosen calls.
struct FailingStore<'conn> {
    inner: SqliteEntityStore<'conn>,
    fail_child_delete: Cell<Option<ChildId>>,
    fail_child_position: Cell<Option<ChildId>>,
    fail_part_update: Cell<Option<PartId>>,
}

impl<'conn> FailingStore<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteEntityStore::try_new(conn).unwrap(),
            fail_child_delete: Cell::new(None),
            fail_child_position: Cell::new(None),
            fail_part_update: Cell::new(None),
        }
    }
}

impl EntityStore for FailingStore<'_> {
    fn insert_template(&self, draft: &NewTemplate) -> StoreResult<FrameTemplate> {
        self.inner.insert_template(draft)
    }
    fn update_template(
        &self,
        id: TemplateId,
        patch: &TemplatePatch,
    ) -> StoreResult<FrameTemplate> {
        self.inner.update_template(id, patch)
    }
    fn delete_template(&self, id: TemplateId) -> StoreResult<()> {
        self.inner.delete_template(id)
    }
    fn list_templates(&self) -> StoreResult<Vec<FrameTemplate>> {
        self.inner.list_templates()
    }
    fn insert_child(&self, draft: &ChildDraft) -> StoreResult<FrameChild> {
        self.inner.insert_child(draft)
    }
    fn update_child(&self, id: ChildId, patch: &FrameChildPatch) -> StoreResult<FrameChild> {
        self.inner.update_child(id, patch)
    }
    fn set_child_position(&self, id: ChildId, order_position: i64) -> StoreResult<FrameChild> {
        if self.fail_child_position.get() == Some(id) {
            return Err(StoreError::Backend(format!("network down moving {id}")));
        }
        self.inner.set_child_position(id, order_position)
    }
    fn delete_child(&self, id: ChildId) -> StoreResult<()> {
        if self.fail_child_delete.get() == Some(id) {
            return Err(StoreError::Backend(format!("network down deleting {id}")));
        }
        self.inner.delete_child(id)
    }
    fn list_children(&self) -> StoreResult<Vec<FrameChild>> {
        self.inner.list_children()
    }
    fn insert_part(&self, draft: &PartDraft) -> StoreResult<Part> {
        self.inner.insert_part(draft)
    }
    fn update_part(&self, id: PartId, patch: &PartPatch) -> StoreResult<Part> {
        if self.fail_part_update.get() == Some(id) {
            return Err(StoreError::Backend(format!("network down updating {id}")));
        }
        self.inner.update_part(id, patch)
    }
    fn set_part_position(&self, id: PartId, order_position: i64) -> StoreResult<Part> {
        if self.fail_part_update.get() == Some(id) {
            return Err(StoreError::Backend(format!("network down moving {id}")));
        }
        self.inner.set_part_position(id, order_position)
    }
    fn delete_part(&self, id: PartId) -> StoreResult<()> {
        self.inner.delete_part(id)
    }
    fn list_parts(&self) -> StoreResult<Vec<Part>> {
        self.inner.list_parts()
    }
    fn list_parts_by_frame(&self, frame_id: TemplateId) -> StoreResult<Vec<Part>> {
        self.inner.list_parts_by_frame(frame_id)
    }
}

fn open_hierarchy(conn: &Connection) -> HierarchyStore<SqliteEntityStore<'_>> {
    HierarchyStore::load(SqliteEntityStore::try_new(conn).unwrap()).unwrap()
}

fn add_child<S: EntityStore>(
    hierarchy: &mut HierarchyStore<S>,
    parent: ParentRef,
    name: &str,
) -> FrameChild {
    hierarchy
        .add_child(NewFrameChild {
            parent,
            name: name.to_string(),
            content: format!("<p>{name}</p>"),
        })
        .unwrap()
}

fn add_part<S: EntityStore>(
    hierarchy: &mut HierarchyStore<S>,
    frame: &FrameTemplate,
    name: &str,
    selected: Vec<ChildId>,
) -> Part {
    hierarchy
        .add_part(NewPart {
            name: name.to_string(),
            frame_id: frame.id,
            template_markup: frame.markup.clone(),
            selected_child_ids: selected,
        })
        .unwrap()
}

fn names(children: &[&FrameChild]) -> Vec<String> {
    children.iter().map(|child| child.name.clone()).collect()
}

fn part_names<S: EntityStore>(hierarchy: &HierarchyStore<S>) -> Vec<String> {
    hierarchy.parts().iter().map(|part| part.name.clone()).collect()
}

#[test]
fn add_child_trims_and_appends_to_sibling_group() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("  Hero  ", "<div></div>").unwrap();
    assert_eq!(frame.name, "Hero");

    let first = hierarchy
        .add_child(NewFrameChild {
            parent: ParentRef::template(frame.id),
            name: "  Title ".to_string(),
            content: "  <h1>Hi</h1>\n".to_string(),
        })
        .unwrap();
    let second = add_child(&mut hierarchy, ParentRef::template(frame.id), "Body");

    assert_eq!(first.name, "Title");
    assert_eq!(first.content, "<h1>Hi</h1>");
    assert_eq!(first.order_position, 0);
    assert_eq!(second.order_position, 1);
    assert_eq!(
        names(&hierarchy.children_of(frame.id, ParentKind::Template)),
        vec!["Title", "Body"]
    );
}

#[test]
fn add_child_validates_before_store_call() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();

    let blank = hierarchy.add_child(NewFrameChild {
        parent: ParentRef::template(frame.id),
        name: "   ".to_string(),
        content: "<p></p>".to_string(),
    });
    assert!(matches!(
        blank,
        Err(HierarchyError::Validation(ValidationError::EmptyName))
    ));

    let empty_content = hierarchy.add_child(NewFrameChild {
        parent: ParentRef::template(frame.id),
        name: "Body".to_string(),
        content: " \n ".to_string(),
    });
    assert!(matches!(
        empty_content,
        Err(HierarchyError::Validation(ValidationError::EmptyContent))
    ));

    let orphan = hierarchy.add_child(NewFrameChild {
        parent: ParentRef::child(404),
        name: "Body".to_string(),
        content: "<p></p>".to_string(),
    });
    assert!(matches!(
        orphan,
        Err(HierarchyError::NotFound {
            kind: EntityKind::Child,
            id: 404
        })
    ));

    assert!(hierarchy.store().list_children().unwrap().is_empty());
}

#[test]
fn reorder_children_persists_contiguous_positions() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("List", "<ul></ul>").unwrap();
    let parent = ParentRef::template(frame.id);
    let a = add_child(&mut hierarchy, parent, "a");
    let b = add_child(&mut hierarchy, parent, "b");
    let c = add_child(&mut hierarchy, parent, "c");
    let d = add_child(&mut hierarchy, parent, "d");

    let order = hierarchy
        .reorder_children(frame.id, ParentKind::Template, &[d.id, 999, b.id])
        .unwrap();

    assert_eq!(order, vec![d.id, b.id, a.id, c.id]);
    let siblings = hierarchy.children_of(frame.id, ParentKind::Template);
    assert_eq!(names(&siblings), vec!["d", "b", "a", "c"]);
    let positions: Vec<i64> = siblings.iter().map(|c| c.order_position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    assert!(!hierarchy.child_order_dirty(parent));

    hierarchy.refresh().unwrap();
    assert_eq!(
        names(&hierarchy.children_of(frame.id, ParentKind::Template)),
        vec!["d", "b", "a", "c"]
    );
}

#[test]
fn staged_child_order_waits_for_save() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("List", "<ul></ul>").unwrap();
    let parent = ParentRef::template(frame.id);
    let a = add_child(&mut hierarchy, parent, "a");
    let b = add_child(&mut hierarchy, parent, "b");

    assert!(hierarchy.move_child(parent, b.id, a.id));
    assert!(hierarchy.child_order_dirty(parent));
    let stored: Vec<i64> = hierarchy
        .store()
        .list_children()
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(stored, vec![a.id, b.id]);

    hierarchy.save_child_order(parent).unwrap();
    assert!(!hierarchy.child_order_dirty(parent));
    let stored: Vec<i64> = hierarchy
        .store()
        .list_children()
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(stored, vec![b.id, a.id]);
}

#[test]
fn delete_child_removes_subtree_deepest_first() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Tree", "<div></div>").unwrap();
    let root = add_child(&mut hierarchy, ParentRef::template(frame.id), "root");
    let left = add_child(&mut hierarchy, ParentRef::child(root.id), "left");
    let leaf = add_child(&mut hierarchy, ParentRef::child(left.id), "leaf");
    let right = add_child(&mut hierarchy, ParentRef::child(root.id), "right");
    let keep = add_child(&mut hierarchy, ParentRef::template(frame.id), "keep");

    let report = hierarchy.delete_child(root.id).unwrap();

    assert_eq!(report.deleted, vec![leaf.id, left.id, right.id, root.id]);
    assert!(hierarchy.children_of(root.id, ParentKind::Child).is_empty());
    assert!(hierarchy.children_of(left.id, ParentKind::Child).is_empty());
    let remaining: Vec<i64> = hierarchy.children().iter().map(|c| c.id).collect();
    assert_eq!(remaining, vec![keep.id]);
    assert_eq!(hierarchy.store().list_children().unwrap().len(), 1);
}

#[test]
fn failed_cascade_reports_partial_progress() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = HierarchyStore::load(FailingStore::new(&conn)).unwrap();
    let frame = hierarchy.add_template("Tree", "<div></div>").unwrap();
    let root = add_child(&mut hierarchy, ParentRef::template(frame.id), "root");
    let middle = add_child(&mut hierarchy, ParentRef::child(root.id), "middle");
    let leaf = add_child(&mut hierarchy, ParentRef::child(middle.id), "leaf");
    hierarchy.store().fail_child_delete.set(Some(middle.id));

    let error = hierarchy.delete_child(root.id).unwrap_err();

    match &error {
        HierarchyError::Partial(failure) => {
            assert_eq!(failure.operation, "delete_child");
            assert_eq!(failure.completed, vec![leaf.id]);
            assert_eq!(failure.failed_at, middle.id);
            assert!(matches!(failure.source, StoreError::Backend(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.to_string().contains("network down"));
    assert!(hierarchy.child(leaf.id).is_none());
    assert!(hierarchy.child(middle.id).is_some());
    assert!(hierarchy.child(root.id).is_some());
    let mut stored: Vec<i64> = hierarchy
        .store()
        .list_children()
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    stored.sort_unstable();
    assert_eq!(stored, vec![root.id, middle.id]);
}

fn stored_child_positions<S: EntityStore>(hierarchy: &HierarchyStore<S>) -> Vec<(ChildId, i64)> {
    hierarchy
        .store()
        .list_children()
        .unwrap()
        .iter()
        .map(|c| (c.id, c.order_position))
        .collect()
}

fn stored_part_positions<S: EntityStore>(hierarchy: &HierarchyStore<S>) -> Vec<(PartId, i64)> {
    hierarchy
        .store()
        .list_parts()
        .unwrap()
        .iter()
        .map(|p| (p.id, p.order_position))
        .collect()
}

#[test]
fn deleting_a_sibling_compacts_positions() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("List", "<ul></ul>").unwrap();
    let parent = ParentRef::template(frame.id);
    let a = add_child(&mut hierarchy, parent, "a");
    let b = add_child(&mut hierarchy, parent, "b");
    let c = add_child(&mut hierarchy, parent, "c");

    hierarchy.delete_child(a.id).unwrap();

    let siblings = hierarchy.children_of(frame.id, ParentKind::Template);
    assert_eq!(names(&siblings), vec!["b", "c"]);
    let positions: Vec<i64> = siblings.iter().map(|c| c.order_position).collect();
    assert_eq!(positions, vec![0, 1]);
    assert!(!hierarchy.child_order_dirty(parent));
    assert_eq!(stored_child_positions(&hierarchy), vec![(b.id, 0), (c.id, 1)]);

    let d = add_child(&mut hierarchy, parent, "d");
    assert_eq!(d.order_position, 2);
    hierarchy.delete_child(c.id).unwrap();
    assert_eq!(stored_child_positions(&hierarchy), vec![(b.id, 0), (d.id, 1)]);
}

#[test]
fn updating_a_child_keeps_sibling_positions_unique() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("List", "<ul></ul>").unwrap();
    let parent = ParentRef::template(frame.id);
    let a = add_child(&mut hierarchy, parent, "a");
    let b = add_child(&mut hierarchy, parent, "b");

    let renamed = hierarchy
        .update_child(
            a.id,
            FrameChildPatch {
                name: Some("first".to_string()),
                ..FrameChildPatch::default()
            },
        )
        .unwrap();

    assert_eq!(renamed.order_position, 0);
    assert_eq!(stored_child_positions(&hierarchy), vec![(a.id, 0), (b.id, 1)]);
    assert_eq!(
        names(&hierarchy.children_of(frame.id, ParentKind::Template)),
        vec!["first", "b"]
    );
}

#[test]
fn failed_compaction_leaves_group_dirty_until_saved() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = HierarchyStore::load(FailingStore::new(&conn)).unwrap();
    let frame = hierarchy.add_template("List", "<ul></ul>").unwrap();
    let parent = ParentRef::template(frame.id);
    let a = add_child(&mut hierarchy, parent, "a");
    let b = add_child(&mut hierarchy, parent, "b");
    let c = add_child(&mut hierarchy, parent, "c");
    hierarchy.store().fail_child_position.set(Some(c.id));

    let error = hierarchy.delete_child(a.id).unwrap_err();

    let HierarchyError::Partial(failure) = error else {
        panic!("expected partial failure");
    };
    assert_eq!(failure.operation, "delete_child");
    assert_eq!(failure.completed, vec![a.id, b.id]);
    assert_eq!(failure.failed_at, c.id);
    assert!(hierarchy.child(a.id).is_none());
    assert!(hierarchy.child_order_dirty(parent));
    let local: Vec<i64> = hierarchy
        .children_of(frame.id, ParentKind::Template)
        .iter()
        .map(|c| c.order_position)
        .collect();
    assert_eq!(local, vec![0, 1]);

    hierarchy.store().fail_child_position.set(None);
    hierarchy.save_child_order(parent).unwrap();

    assert!(!hierarchy.child_order_dirty(parent));
    assert_eq!(stored_child_positions(&hierarchy), vec![(b.id, 0), (c.id, 1)]);
}

#[test]
fn delete_in_staged_group_renumbers_locally() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("List", "<ul></ul>").unwrap();
    let parent = ParentRef::template(frame.id);
    let a = add_child(&mut hierarchy, parent, "a");
    let b = add_child(&mut hierarchy, parent, "b");
    let c = add_child(&mut hierarchy, parent, "c");
    assert!(hierarchy.move_child(parent, c.id, a.id));

    hierarchy.delete_child(a.id).unwrap();

    assert!(hierarchy.child_order_dirty(parent));
    let siblings = hierarchy.children_of(frame.id, ParentKind::Template);
    assert_eq!(names(&siblings), vec!["c", "b"]);
    let positions: Vec<i64> = siblings.iter().map(|c| c.order_position).collect();
    assert_eq!(positions, vec![0, 1]);
    assert_eq!(stored_child_positions(&hierarchy), vec![(b.id, 1), (c.id, 2)]);

    hierarchy.save_child_order(parent).unwrap();
    assert_eq!(stored_child_positions(&hierarchy), vec![(c.id, 0), (b.id, 1)]);
}

#[test]
fn deleting_a_part_compacts_document_order() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let p0 = add_part(&mut hierarchy, &frame, "p0", Vec::new());
    let p1 = add_part(&mut hierarchy, &frame, "p1", Vec::new());
    let p2 = add_part(&mut hierarchy, &frame, "p2", Vec::new());

    hierarchy.delete_part(p0.id).unwrap();

    let positions: Vec<i64> = hierarchy.parts().iter().map(|p| p.order_position).collect();
    assert_eq!(positions, vec![0, 1]);
    assert!(!hierarchy.parts_dirty());
    assert_eq!(stored_part_positions(&hierarchy), vec![(p1.id, 0), (p2.id, 1)]);

    hierarchy.delete_part_by_uid(p1.uid).unwrap();
    assert_eq!(stored_part_positions(&hierarchy), vec![(p2.id, 0)]);
    assert_eq!(hierarchy.part(p2.id).unwrap().order_position, 0);
}

#[test]
fn failed_part_compaction_leaves_document_dirty() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = HierarchyStore::load(FailingStore::new(&conn)).unwrap();
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let p0 = add_part(&mut hierarchy, &frame, "p0", Vec::new());
    let p1 = add_part(&mut hierarchy, &frame, "p1", Vec::new());
    let p2 = add_part(&mut hierarchy, &frame, "p2", Vec::new());
    hierarchy.store().fail_part_update.set(Some(p2.id));

    let error = hierarchy.delete_part(p0.id).unwrap_err();

    let HierarchyError::Partial(failure) = error else {
        panic!("expected partial failure");
    };
    assert_eq!(failure.operation, "delete_part");
    assert_eq!(failure.completed, vec![p0.id, p1.id]);
    assert_eq!(failure.failed_at, p2.id);
    assert!(hierarchy.parts_dirty());
    assert_eq!(part_names(&hierarchy), vec!["p1", "p2"]);

    hierarchy.store().fail_part_update.set(None);
    hierarchy.save_parts_order().unwrap();
    assert!(!hierarchy.parts_dirty());
    assert_eq!(stored_part_positions(&hierarchy), vec![(p1.id, 0), (p2.id, 1)]);
}

#[test]
fn delete_template_cascades_and_parts_keep_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div><h1></h1></div>").unwrap();
    let title = add_child(&mut hierarchy, ParentRef::template(frame.id), "title");
    let nested = add_child(&mut hierarchy, ParentRef::child(title.id), "nested");
    let part = add_part(&mut hierarchy, &frame, "Hero part", vec![title.id]);

    let report = hierarchy.delete_template(frame.id).unwrap();

    assert_eq!(report.deleted, vec![nested.id, title.id]);
    assert!(hierarchy.template(frame.id).is_none());
    assert!(hierarchy.children().is_empty());
    let kept = hierarchy.part(part.id).unwrap();
    assert_eq!(kept.template_markup, "<div><h1></h1></div>");
    assert!(hierarchy.store().list_templates().unwrap().is_empty());
}

#[test]
fn template_markup_change_propagates_to_parts() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let other = hierarchy.add_template("Other", "<span></span>").unwrap();
    let first = add_part(&mut hierarchy, &frame, "one", Vec::new());
    let second = add_part(&mut hierarchy, &frame, "two", Vec::new());
    let unrelated = add_part(&mut hierarchy, &other, "three", Vec::new());

    let updated = hierarchy
        .update_template(
            frame.id,
            TemplatePatch {
                name: None,
                markup: Some("<section></section>".to_string()),
            },
        )
        .unwrap();

    assert_eq!(updated.revision, 1);
    for id in [first.id, second.id] {
        assert_eq!(
            hierarchy.part(id).unwrap().template_markup,
            "<section></section>"
        );
    }
    assert_eq!(
        hierarchy.part(unrelated.id).unwrap().template_markup,
        "<span></span>"
    );
}

#[test]
fn failed_propagation_stops_at_first_error() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = HierarchyStore::load(FailingStore::new(&conn)).unwrap();
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let first = add_part(&mut hierarchy, &frame, "one", Vec::new());
    let second = add_part(&mut hierarchy, &frame, "two", Vec::new());
    hierarchy.store().fail_part_update.set(Some(second.id));

    let error = hierarchy
        .update_parts_by_frame_id(frame.id, "<main></main>")
        .unwrap_err();

    let HierarchyError::Partial(failure) = error else {
        panic!("expected partial failure");
    };
    assert_eq!(failure.completed, vec![first.id]);
    assert_eq!(failure.failed_at, second.id);
    assert_eq!(hierarchy.part(first.id).unwrap().template_markup, "<main></main>");
    assert_eq!(hierarchy.part(second.id).unwrap().template_markup, "<div></div>");
}

#[test]
fn part_selection_must_belong_to_frame() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let other = hierarchy.add_template("Other", "<div></div>").unwrap();
    let own = add_child(&mut hierarchy, ParentRef::template(frame.id), "own");
    let foreign = add_child(&mut hierarchy, ParentRef::template(other.id), "foreign");
    let nested = add_child(&mut hierarchy, ParentRef::child(own.id), "nested");

    for bad in [foreign.id, nested.id, 404] {
        let result = hierarchy.add_part(NewPart {
            name: "Hero".to_string(),
            frame_id: frame.id,
            template_markup: frame.markup.clone(),
            selected_child_ids: vec![own.id, bad],
        });
        assert!(matches!(
            result,
            Err(HierarchyError::Validation(ValidationError::ForeignChild { child_id, .. }))
                if child_id == bad
        ));
    }
    assert!(hierarchy.parts().is_empty());

    let part = add_part(&mut hierarchy, &frame, "Hero", vec![own.id, own.id]);
    assert_eq!(part.selected_child_ids, vec![own.id]);
}

#[test]
fn add_part_appends_with_fresh_uid() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();

    let first = add_part(&mut hierarchy, &frame, "first", Vec::new());
    let second = add_part(&mut hierarchy, &frame, "second", Vec::new());

    assert_eq!(first.order_position, 0);
    assert_eq!(second.order_position, 1);
    assert_ne!(first.uid, second.uid);
    assert_eq!(hierarchy.part_by_uid(second.uid).unwrap().id, second.id);

    let empty_markup = hierarchy.add_part(NewPart {
        name: "broken".to_string(),
        frame_id: frame.id,
        template_markup: "  ".to_string(),
        selected_child_ids: Vec::new(),
    });
    assert!(matches!(
        empty_markup,
        Err(HierarchyError::Validation(ValidationError::EmptyMarkup))
    ));
}

#[test]
fn update_part_leaves_unspecified_fields() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let a = add_child(&mut hierarchy, ParentRef::template(frame.id), "a");
    let b = add_child(&mut hierarchy, ParentRef::template(frame.id), "b");
    let part = add_part(&mut hierarchy, &frame, "Hero", vec![a.id]);

    let renamed = hierarchy
        .update_part(
            part.id,
            PartPatch {
                name: Some(" Renamed ".to_string()),
                ..PartPatch::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Renamed");
    assert_eq!(renamed.selected_child_ids, vec![a.id]);

    let reselected = hierarchy
        .update_part(
            part.id,
            PartPatch {
                selected_child_ids: Some(vec![b.id, a.id]),
                ..PartPatch::default()
            },
        )
        .unwrap();
    assert_eq!(reselected.name, "Renamed");
    assert_eq!(reselected.selected_child_ids, vec![b.id, a.id]);
    assert_eq!(reselected.revision, 2);

    let blank = hierarchy.update_part(
        part.id,
        PartPatch {
            name: Some(String::new()),
            ..PartPatch::default()
        },
    );
    assert!(matches!(
        blank,
        Err(HierarchyError::Validation(ValidationError::EmptyName))
    ));
}

#[test]
fn duplicates_are_independent_by_uid() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let title = add_child(&mut hierarchy, ParentRef::template(frame.id), "title");
    let original = add_part(&mut hierarchy, &frame, "Hero", vec![title.id]);

    let copy = hierarchy.duplicate_part(original.id).unwrap();

    assert_ne!(copy.uid, original.uid);
    assert_ne!(copy.id, original.id);
    assert_eq!(copy.name, original.name);
    assert_eq!(copy.frame_id, original.frame_id);
    assert_eq!(copy.template_markup, original.template_markup);
    assert_eq!(copy.selected_child_ids, original.selected_child_ids);
    assert_eq!(copy.order_position, original.order_position + 1);

    hierarchy.delete_part_by_uid(copy.uid).unwrap();

    assert_eq!(hierarchy.parts().len(), 1);
    assert_eq!(hierarchy.part(original.id), Some(&original));
    assert!(matches!(
        hierarchy.delete_part_by_uid(copy.uid),
        Err(HierarchyError::UidNotFound(uid)) if uid == copy.uid
    ));
}

#[test]
fn reorder_parts_updates_document_order() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let a = add_part(&mut hierarchy, &frame, "a", Vec::new());
    let b = add_part(&mut hierarchy, &frame, "b", Vec::new());
    let c = add_part(&mut hierarchy, &frame, "c", Vec::new());

    hierarchy.reorder_parts(&[c.id, a.id]).unwrap();

    assert_eq!(part_names(&hierarchy), vec!["c", "a", "b"]);
    assert!(!hierarchy.parts_dirty());
    let stored: Vec<(i64, i64)> = hierarchy
        .store()
        .list_parts()
        .unwrap()
        .iter()
        .map(|p| (p.id, p.order_position))
        .collect();
    assert_eq!(stored, vec![(c.id, 0), (a.id, 1), (b.id, 2)]);
}

#[test]
fn failed_parts_order_leaves_document_dirty() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = HierarchyStore::load(FailingStore::new(&conn)).unwrap();
    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    let a = add_part(&mut hierarchy, &frame, "a", Vec::new());
    let b = add_part(&mut hierarchy, &frame, "b", Vec::new());
    hierarchy.store().fail_part_update.set(Some(a.id));

    assert!(hierarchy.move_part(b.id, a.id));
    let error = hierarchy.save_parts_order().unwrap_err();

    let HierarchyError::Partial(failure) = error else {
        panic!("expected partial failure");
    };
    assert_eq!(failure.operation, "update_parts_order");
    assert_eq!(failure.completed, vec![b.id]);
    assert!(hierarchy.parts_dirty());
    assert_eq!(part_names(&hierarchy), vec!["b", "a"]);
}

#[test]
fn view_subscribers_hear_about_mutations() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    let views = hierarchy.subscribe_views();

    let frame = hierarchy.add_template("Hero", "<div></div>").unwrap();
    add_child(&mut hierarchy, ParentRef::template(frame.id), "title");

    let kinds: Vec<EntityKind> = views.try_iter().collect();
    assert_eq!(kinds, vec![EntityKind::Template, EntityKind::Child]);
}

#[test]
fn missing_targets_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let mut hierarchy = open_hierarchy(&conn);
    assert!(matches!(
        hierarchy.delete_child(9),
        Err(HierarchyError::NotFound {
            kind: EntityKind::Child,
            id: 9
        })
    ));
    assert!(matches!(
        hierarchy.delete_part(3),
        Err(HierarchyError::NotFound {
            kind: EntityKind::Part,
            id: 3
        })
    ));
    assert!(matches!(
        hierarchy.update_template(1, TemplatePatch::default()),
        Err(HierarchyError::NotFound {
            kind: EntityKind::Template,
            id: 1
        })
    ));
}
