//! Schema migrations tracked by `PRAGMA user_version`.
//!
//! # Invariants
//! - Versions are contiguous from 1 and applied in order.
//! - All pending steps run in one transaction; a failed step leaves the
//!   schema at its previous version.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

/// One registered schema step.
#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "templates_and_children",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "parts",
        sql: include_str!("0002_parts.sql"),
    },
];

/// Newest schema version this build can open.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the schema up to `latest_version()`.
///
/// Returns the versions applied by this call, empty when already current.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a
///   newer build.
/// - `DbError::Migration` naming the step that failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<Vec<u32>> {
    let current = schema_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current)
        .collect();
    if pending.is_empty() {
        debug!("event=db_migrate module=db status=skip version={current}");
        return Ok(Vec::new());
    }

    info!("event=db_migrate module=db status=start from_version={current} to_version={latest}");
    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;
    info!("event=db_migrate module=db status=ok version={latest}");

    Ok(pending.iter().map(|migration| migration.version).collect())
}

fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
