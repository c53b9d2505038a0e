//! Error type and row helpers shared by every SQLite repository.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::cursor::Cursor;
use crate::model::lifecycle::{Entity, Lifecycle};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, Row};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    /// Another row in `table` already holds `cursor`.
    #[error("cursor {cursor} is already allocated in `{table}`")]
    CursorConflict { table: &'static str, cursor: Cursor },
    /// A live-row business key (name, identifier, pair) is taken.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("repository requires table `{0}`")]
    MissingRequiredTable(&'static str),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Fails fast when `conn` has not been migrated or lacks `tables`.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

/// Highest cursor persisted in any entity table, used to seed
/// `MonotonicCursors::resume_after` at startup.
pub fn highest_cursor(conn: &Connection) -> RepoResult<Option<Cursor>> {
    let cursor = conn.query_row(
        "SELECT MAX(cursor) FROM (
            SELECT MAX(cursor) AS cursor FROM apps
            UNION ALL SELECT MAX(cursor) FROM clients
            UNION ALL SELECT MAX(cursor) FROM grants
            UNION ALL SELECT MAX(cursor) FROM resource_servers
            UNION ALL SELECT MAX(cursor) FROM products
            UNION ALL SELECT MAX(cursor) FROM product_clients
        );",
        [],
        |row| row.get::<_, Option<Cursor>>(0),
    )?;
    Ok(cursor)
}

pub(crate) fn read_lifecycle(row: &Row<'_>, table: &str) -> RepoResult<Lifecycle> {
    let id_text: String = row.get("id")?;
    let date_deleted = match row.get::<_, Option<i64>>("date_deleted")? {
        Some(micros) => Some(from_micros(micros, table, "date_deleted")?),
        None => None,
    };
    Ok(Lifecycle::restore(
        parse_uuid(&id_text, table, "id")?,
        row.get("cursor")?,
        from_micros(row.get("date_created")?, table, "date_created")?,
        from_micros(row.get("date_modified")?, table, "date_modified")?,
        date_deleted,
    ))
}

pub(crate) fn parse_uuid(value: &str, table: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in {table}.{column}"))
    })
}

pub(crate) fn to_micros(value: DateTime<Utc>) -> i64 {
    value.timestamp_micros()
}

pub(crate) fn optional_micros(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(to_micros)
}

fn from_micros(micros: i64, table: &str, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        RepoError::InvalidData(format!("timestamp {micros} out of range in {table}.{column}"))
    })
}

/// Maps a failed write on `table` to a semantic error where possible.
pub(crate) fn classify_write_error(err: rusqlite::Error, table: &'static str, cursor: Cursor) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            if message.ends_with(&format!(" {table}.cursor")) {
                return RepoError::CursorConflict { table, cursor };
            }
            if message.contains("UNIQUE") {
                return RepoError::Conflict(message.clone());
            }
        }
    }
    err.into()
}

/// Writes the mutable lifecycle columns of `entity` back to `table`.
pub(crate) fn update_lifecycle<E: Entity>(
    conn: &Connection,
    table: &'static str,
    entity: &E,
) -> RepoResult<()> {
    let lifecycle = entity.lifecycle();
    let changed = conn.execute(
        &format!("UPDATE {table} SET date_modified = ?2, date_deleted = ?3 WHERE id = ?1;"),
        params![
            lifecycle.id().to_string(),
            to_micros(lifecycle.date_modified()),
            optional_micros(lifecycle.date_deleted()),
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: E::KIND,
            id: lifecycle.id(),
        });
    }
    Ok(())
}

pub(crate) fn not_found<E: Entity>(id: Uuid) -> RepoError {
    RepoError::NotFound {
        entity: E::KIND,
        id,
    }
}
