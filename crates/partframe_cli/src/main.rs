//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `partframe_core` linkage.
//! - Compose a small demo document against an in-memory database.
//! - Log to `PARTFRAME_LOG_DIR`, or `partframe-logs` under the temp dir.

use partframe_core::db::open_db_in_memory;
use partframe_core::{
    default_log_level, init_logging, Composer, EngineConfig, HierarchyStore, NewFrameChild,
    NewPart, ParentRef, SqliteEntityStore,
};
use std::error::Error;
use std::path::PathBuf;

fn main() {
    println!("partframe_core ping={}", partframe_core::ping());
    println!("partframe_core version={}", partframe_core::core_version());

    let config = match std::env::args().nth(1) {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("config error: {err}");
                std::process::exit(2);
            }
        },
        None => EngineConfig::default(),
    };

    let log_dir = std::env::var_os("PARTFRAME_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("partframe-logs"));
    if let Err(err) = init_logging(default_log_level(), &log_dir.to_string_lossy()) {
        eprintln!("logging disabled: {err}");
    }

    match compose_demo(config) {
        Ok(document) => println!("{document}"),
        Err(err) => {
            log::error!("event=cli_demo module=cli status=error message={err}");
            eprintln!("demo failed: {err}");
            std::process::exit(1);
        }
    }
}

fn compose_demo(config: EngineConfig) -> Result<String, Box<dyn Error>> {
    let conn = open_db_in_memory()?;
    let store = SqliteEntityStore::try_new(&conn)?;
    let mut hierarchy = HierarchyStore::load(store)?;

    let frame = hierarchy.add_template("Button Frame", "<div><button></button></div>")?;
    let cta = hierarchy.add_child(NewFrameChild {
        parent: ParentRef::template(frame.id),
        name: "CTA".to_string(),
        content: "<span></span>".to_string(),
    })?;
    hierarchy.add_child(NewFrameChild {
        parent: ParentRef::child(cta.id),
        name: "Label".to_string(),
        content: "Buy".to_string(),
    })?;
    hierarchy.add_part(NewPart {
        name: "Hero CTA".to_string(),
        frame_id: frame.id,
        template_markup: frame.markup.clone(),
        selected_child_ids: vec![cta.id],
    })?;

    let composer = Composer::new(config);
    Ok(composer.compose_document(hierarchy.parts(), &hierarchy))
}
