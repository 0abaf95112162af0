//! Entity repository
//!
//! [`Store`] owns one SQLite file and one collection of entities. Every
//! operation takes the connection mutex for its whole duration, and writes
//! run inside `BEGIN IMMEDIATE` transactions so the file lock admits a single
//! writer at a time.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::types::{Entity, EntityId, EntityMeta, ListOrder, Record};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior,
};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::schema::{self, LAST_ID_KEY, LAST_REV_KEY};

/// Durable CRUD access to a single entity collection.
///
/// Defaults to the schema-less [`Record`]; any [`Entity`] implementation
/// works. The store is `Send + Sync` and can be shared behind an `Arc`.
pub struct Store<E = Record> {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Store<E> {
    /// Open or create the store under `base_dir` with default settings
    ///
    /// The database lives at `<base_dir>/var/entities.db`; `var/` is
    /// created if it does not exist.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(base_dir, &StoreConfig::default())
    }

    /// Open or create the store under `base_dir` with explicit settings
    pub fn open_with(base_dir: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let path = config.database_path(base_dir.as_ref());

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path).map_err(open_error)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        if config.wal {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )
            .map_err(open_error)?;
        }

        schema::run_migrations(&conn)?;

        tracing::info!(path = %path.display(), wal = config.wal, "Opened store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
            _entity: PhantomData,
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
            _entity: PhantomData,
        })
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    // ============================================
    // Writes
    // ============================================

    /// Store a new entity
    ///
    /// Assigns the next free identity if the entity has none. Fails with
    /// [`Error::Conflict`] if the identity is already taken.
    pub fn add(&self, mut entity: E) -> Result<E> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id = match entity.id() {
            Some(id) => {
                if exists(&tx, id)? {
                    tracing::warn!(id = %id, "Rejected add of existing identity");
                    return Err(Error::Conflict(id));
                }
                id
            }
            None => next_id(&tx)?,
        };
        entity.set_id(id);

        insert(&tx, id, &serde_json::to_string(&entity)?)?;
        tx.commit()?;

        tracing::debug!(id = %id, "Added entity");
        Ok(entity)
    }

    /// Overwrite a stored entity
    ///
    /// Fails with [`Error::MissingId`] if the entity has no identity and
    /// [`Error::NotFound`] if nothing is stored under it. The collection is
    /// untouched on failure.
    pub fn update(&self, entity: &E) -> Result<()> {
        let id = entity.id().ok_or(Error::MissingId)?;
        let body = serde_json::to_string(entity)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !overwrite(&tx, id, &body)? {
            return Err(Error::NotFound(id));
        }
        tx.commit()?;

        tracing::debug!(id = %id, "Updated entity");
        Ok(())
    }

    /// Insert or overwrite
    ///
    /// Like [`add`](Self::add) when the identity is unset or unknown,
    /// like [`update`](Self::update) otherwise. Returns the stored entity.
    pub fn put(&self, mut entity: E) -> Result<E> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id = match entity.id() {
            Some(id) => id,
            None => next_id(&tx)?,
        };
        entity.set_id(id);
        let body = serde_json::to_string(&entity)?;

        let replaced = overwrite(&tx, id, &body)?;
        if !replaced {
            insert(&tx, id, &body)?;
        }
        tx.commit()?;

        tracing::debug!(id = %id, replaced, "Put entity");
        Ok(entity)
    }

    /// Remove an entity, failing with [`Error::NotFound`] if absent
    pub fn delete(&self, id: EntityId) -> Result<()> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM entities WHERE id = ?1", [id.get()])?;
        if removed == 0 {
            return Err(Error::NotFound(id));
        }

        tracing::debug!(id = %id, "Deleted entity");
        Ok(())
    }

    // ============================================
    // Reads
    // ============================================

    /// Fetch an entity, failing with [`Error::NotFound`] if absent
    pub fn get(&self, id: EntityId) -> Result<E> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM entities WHERE id = ?1",
                [id.get()],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(body) => decode(id, &body),
            None => Err(Error::NotFound(id)),
        }
    }

    /// Whether an entity with this identity is stored
    pub fn contains(&self, id: EntityId) -> Result<bool> {
        let conn = self.conn()?;
        exists(&conn, id)
    }

    /// Number of stored entities
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All entities in insertion order
    pub fn list(&self) -> Result<Vec<E>> {
        self.list_by(ListOrder::Inserted)
    }

    /// All entities in the requested order
    ///
    /// The result is a snapshot taken under the connection lock; later
    /// writes do not affect it.
    pub fn list_by(&self, order: ListOrder) -> Result<Vec<E>> {
        let conn = self.conn()?;
        let sql = format!("SELECT id, body FROM entities ORDER BY {}", order.order_by());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, body)| decode(EntityId(id), &body))
            .collect()
    }

    /// Creation and last-write timestamps for an entity
    pub fn meta(&self, id: EntityId) -> Result<EntityMeta> {
        let conn = self.conn()?;
        let stamps: Option<(String, String)> = conn
            .query_row(
                "SELECT created_at, updated_at FROM entities WHERE id = ?1",
                [id.get()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (created_at, updated_at) = stamps.ok_or(Error::NotFound(id))?;
        Ok(EntityMeta {
            id,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

// ============================================
// Row helpers
// ============================================

fn decode<E: Entity>(id: EntityId, body: &str) -> Result<E> {
    let mut entity: E = serde_json::from_str(body)?;
    // The id column wins over whatever identity the body carries.
    entity.set_id(id);
    Ok(entity)
}

fn exists(conn: &Connection, id: EntityId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM entities WHERE id = ?1",
            [id.get()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn insert(tx: &Transaction<'_>, id: EntityId, body: &str) -> Result<()> {
    let rev = next_rev(tx)?;
    let now = now_timestamp();
    tx.execute(
        r#"
        INSERT INTO entities (id, rev, body, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        "#,
        params![id.get(), rev, body, now],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => Error::Conflict(id),
        _ => Error::from(e),
    })?;

    tx.execute(
        "UPDATE store_meta SET value = MAX(value, ?1) WHERE key = ?2",
        params![id.get(), LAST_ID_KEY],
    )?;
    Ok(())
}

/// Returns false if no row has this identity.
fn overwrite(tx: &Transaction<'_>, id: EntityId, body: &str) -> Result<bool> {
    if !exists(tx, id)? {
        return Ok(false);
    }
    let rev = next_rev(tx)?;
    let changed = tx.execute(
        "UPDATE entities SET body = ?2, rev = ?3, updated_at = ?4 WHERE id = ?1",
        params![id.get(), body, rev, now_timestamp()],
    )?;
    Ok(changed > 0)
}

fn next_id(tx: &Transaction<'_>) -> Result<EntityId> {
    let last: i64 = tx.query_row(
        "SELECT value FROM store_meta WHERE key = ?1",
        [LAST_ID_KEY],
        |row| row.get(0),
    )?;
    last.checked_add(1).map(EntityId).ok_or(Error::IdsExhausted)
}

fn next_rev(tx: &Transaction<'_>) -> Result<i64> {
    tx.execute(
        "UPDATE store_meta SET value = value + 1 WHERE key = ?1",
        [LAST_REV_KEY],
    )?;
    let rev: i64 = tx.query_row(
        "SELECT value FROM store_meta WHERE key = ?1",
        [LAST_REV_KEY],
        |row| row.get(0),
    )?;
    Ok(rev)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::Database(rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))
        })
}

/// SQLite reports unopenable files as `CANTOPEN`; surface those as IO errors.
fn open_error(err: rusqlite::Error) -> Error {
    match err.sqlite_error_code() {
        Some(ErrorCode::CannotOpen) | Some(ErrorCode::PermissionDenied) => {
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
        }
        _ => Error::Database(err),
    }
}
