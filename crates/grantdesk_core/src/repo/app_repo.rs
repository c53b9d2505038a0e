//! App repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist `App` aggregates into the `apps` table.
//! - Serve cursor-paged lists through the shared `ListSql` pipeline.
//!
//! # Invariants
//! - Lookups exclude soft-deleted rows unless `include_deleted` is set.
//! - Name uniqueness is enforced for live rows only.

use crate::model::app::App;
use crate::model::cursor::Cursor;
use crate::model::lifecycle::Entity;
use crate::paging::sql::ListSql;
use crate::paging::{DateFilter, Page};
use crate::repo::common::{
    classify_write_error, ensure_connection_ready, not_found, optional_micros, read_lifecycle,
    to_micros, RepoResult,
};
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const APP_TABLE: &str = "apps";
const APP_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    cursor,
    date_created,
    date_modified,
    date_deleted
FROM apps";

/// Filters for listing apps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppListQuery {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    pub description: Option<String>,
    pub dates: DateFilter,
    pub include_deleted: bool,
}

/// Repository interface for app persistence.
pub trait AppRepository {
    fn insert_app(&self, app: &App) -> RepoResult<Uuid>;
    fn update_app(&self, app: &App) -> RepoResult<()>;
    fn get_app(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<App>>;
    fn list_apps(
        &self,
        query: &AppListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<App>>;
}

/// SQLite-backed app repository.
pub struct SqliteAppRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAppRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[APP_TABLE])?;
        Ok(Self { conn })
    }
}

impl AppRepository for SqliteAppRepository<'_> {
    fn insert_app(&self, app: &App) -> RepoResult<Uuid> {
        let lifecycle = app.lifecycle();
        self.conn
            .execute(
                "INSERT INTO apps (
                    id,
                    name,
                    description,
                    cursor,
                    date_created,
                    date_modified,
                    date_deleted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    lifecycle.id().to_string(),
                    app.name(),
                    app.description(),
                    lifecycle.cursor(),
                    to_micros(lifecycle.date_created()),
                    to_micros(lifecycle.date_modified()),
                    optional_micros(lifecycle.date_deleted()),
                ],
            )
            .map_err(|err| classify_write_error(err, APP_TABLE, lifecycle.cursor()))?;

        Ok(lifecycle.id())
    }

    fn update_app(&self, app: &App) -> RepoResult<()> {
        let lifecycle = app.lifecycle();
        let changed = self
            .conn
            .execute(
                "UPDATE apps
                 SET
                    name = ?2,
                    description = ?3,
                    date_modified = ?4,
                    date_deleted = ?5
                 WHERE id = ?1;",
                params![
                    lifecycle.id().to_string(),
                    app.name(),
                    app.description(),
                    to_micros(lifecycle.date_modified()),
                    optional_micros(lifecycle.date_deleted()),
                ],
            )
            .map_err(|err| classify_write_error(err, APP_TABLE, lifecycle.cursor()))?;

        if changed == 0 {
            return Err(not_found::<App>(lifecycle.id()));
        }
        Ok(())
    }

    fn get_app(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<App>> {
        let mut stmt = self.conn.prepare(&format!(
            "{APP_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR date_deleted IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), include_deleted])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_app_row(row)?));
        }
        Ok(None)
    }

    fn list_apps(
        &self,
        query: &AppListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<App>> {
        let (sql, binds) = ListSql::select(APP_SELECT_SQL)
            .live_only(query.include_deleted)
            .cursor_after(cursor)
            .contains("name", query.name.as_deref())
            .contains("description", query.description.as_deref())
            .dates(&query.dates)
            .page(page_size);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut apps = Vec::new();
        while let Some(row) = rows.next()? {
            apps.push(parse_app_row(row)?);
        }
        Ok(Page::from_items(apps))
    }
}

fn parse_app_row(row: &Row<'_>) -> RepoResult<App> {
    Ok(App::restore(
        read_lifecycle(row, APP_TABLE)?,
        row.get("name")?,
        row.get("description")?,
    ))
}
