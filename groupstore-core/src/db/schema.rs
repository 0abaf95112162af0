//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Key in `store_meta` holding the highest identity ever stored
pub(crate) const LAST_ID_KEY: &str = "last_id";

/// Key in `store_meta` holding the global write counter
pub(crate) const LAST_REV_KEY: &str = "last_rev";

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: entity collection
    r#"
    -- `seq` records insertion order; `id` is the caller-visible identity;
    -- `rev` is bumped on every write and orders by recency.
    CREATE TABLE IF NOT EXISTS entities (
        seq              INTEGER PRIMARY KEY AUTOINCREMENT,
        id               INTEGER NOT NULL UNIQUE,
        rev              INTEGER NOT NULL,
        body             JSON NOT NULL,
        created_at       DATETIME NOT NULL,
        updated_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_entities_rev ON entities(rev DESC);

    -- Counters: identity high-water mark (deleted ids are never handed out
    -- again) and the last write revision.
    CREATE TABLE IF NOT EXISTS store_meta (
        key              TEXT PRIMARY KEY,
        value            INTEGER NOT NULL
    );

    INSERT OR IGNORE INTO store_meta (key, value) VALUES ('last_id', 0);
    INSERT OR IGNORE INTO store_meta (key, value) VALUES ('last_rev', 0);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    if current_version > SCHEMA_VERSION {
        return Err(crate::error::Error::Config(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["entities", "store_meta"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_high_water_mark_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for key in [LAST_ID_KEY, LAST_REV_KEY] {
            let value: i64 = conn
                .query_row("SELECT value FROM store_meta WHERE key = ?", [key], |r| {
                    r.get(0)
                })
                .unwrap();
            assert_eq!(value, 0, "{} should start at zero", key);
        }
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        assert!(run_migrations(&conn).is_err());
    }
}
