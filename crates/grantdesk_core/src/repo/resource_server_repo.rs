//! Resource server repository contracts and SQLite implementation.
//!
//! # Invariants
//! - The scope catalog is stored in `resource_server_scopes` keyed by
//!   position and replaced in the same transaction as the owner row.
//! - Identifier and name are unique among live rows only.

use crate::model::cursor::Cursor;
use crate::model::lifecycle::Entity;
use crate::model::resource_server::{ResourceServer, ResourceServerRecord};
use crate::model::scope::Scope;
use crate::paging::sql::ListSql;
use crate::paging::{DateFilter, Page};
use crate::repo::common::{
    classify_write_error, ensure_connection_ready, not_found, optional_micros, read_lifecycle,
    to_micros, RepoResult,
};
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const RESOURCE_SERVER_TABLE: &str = "resource_servers";
const RESOURCE_SERVER_SCOPE_TABLE: &str = "resource_server_scopes";
const RESOURCE_SERVER_SELECT_SQL: &str = "SELECT
    id,
    name,
    identifier,
    description,
    external_id,
    cursor,
    date_created,
    date_modified,
    date_deleted
FROM resource_servers";

/// Filters for listing resource servers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceServerListQuery {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    /// Exact audience identifier.
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub dates: DateFilter,
    pub include_deleted: bool,
}

/// Repository interface for resource servers and their scope catalogs.
pub trait ResourceServerRepository {
    fn insert_resource_server(&self, server: &ResourceServer) -> RepoResult<Uuid>;
    /// Writes owner columns and replaces the scope catalog.
    fn update_resource_server(&self, server: &ResourceServer) -> RepoResult<()>;
    fn get_resource_server(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> RepoResult<Option<ResourceServer>>;
    fn list_resource_servers(
        &self,
        query: &ResourceServerListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<ResourceServer>>;
}

/// SQLite-backed resource server repository.
pub struct SqliteResourceServerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteResourceServerRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[RESOURCE_SERVER_TABLE, RESOURCE_SERVER_SCOPE_TABLE])?;
        Ok(Self { conn })
    }
}

impl ResourceServerRepository for SqliteResourceServerRepository<'_> {
    fn insert_resource_server(&self, server: &ResourceServer) -> RepoResult<Uuid> {
        let lifecycle = server.lifecycle();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO resource_servers (
                id,
                name,
                identifier,
                description,
                external_id,
                cursor,
                date_created,
                date_modified,
                date_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                lifecycle.id().to_string(),
                server.name(),
                server.identifier(),
                server.description(),
                server.external_id(),
                lifecycle.cursor(),
                to_micros(lifecycle.date_created()),
                to_micros(lifecycle.date_modified()),
                optional_micros(lifecycle.date_deleted()),
            ],
        )
        .map_err(|err| classify_write_error(err, RESOURCE_SERVER_TABLE, lifecycle.cursor()))?;

        replace_catalog(&tx, server)?;
        tx.commit()?;
        Ok(lifecycle.id())
    }

    fn update_resource_server(&self, server: &ResourceServer) -> RepoResult<()> {
        let lifecycle = server.lifecycle();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx
            .execute(
                "UPDATE resource_servers
                 SET
                    name = ?2,
                    description = ?3,
                    external_id = ?4,
                    date_modified = ?5,
                    date_deleted = ?6
                 WHERE id = ?1;",
                params![
                    lifecycle.id().to_string(),
                    server.name(),
                    server.description(),
                    server.external_id(),
                    to_micros(lifecycle.date_modified()),
                    optional_micros(lifecycle.date_deleted()),
                ],
            )
            .map_err(|err| classify_write_error(err, RESOURCE_SERVER_TABLE, lifecycle.cursor()))?;
        if changed == 0 {
            return Err(not_found::<ResourceServer>(lifecycle.id()));
        }

        replace_catalog(&tx, server)?;
        tx.commit()?;
        Ok(())
    }

    fn get_resource_server(
        &self,
        id: Uuid,
        include_deleted: bool,
    ) -> RepoResult<Option<ResourceServer>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RESOURCE_SERVER_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR date_deleted IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), include_deleted])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_resource_server_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_resource_servers(
        &self,
        query: &ResourceServerListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<ResourceServer>> {
        let (sql, binds) = ListSql::select(RESOURCE_SERVER_SELECT_SQL)
            .live_only(query.include_deleted)
            .cursor_after(cursor)
            .contains("name", query.name.as_deref())
            .eq_text("identifier", query.identifier.as_deref())
            .contains("description", query.description.as_deref())
            .dates(&query.dates)
            .page(page_size);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut servers = Vec::new();
        while let Some(row) = rows.next()? {
            servers.push(parse_resource_server_row(self.conn, row)?);
        }
        Ok(Page::from_items(servers))
    }
}

fn replace_catalog(conn: &Connection, server: &ResourceServer) -> RepoResult<()> {
    let server_id = server.id().to_string();
    conn.execute(
        "DELETE FROM resource_server_scopes WHERE resource_server_id = ?1;",
        params![server_id],
    )?;

    let mut insert = conn.prepare(
        "INSERT INTO resource_server_scopes (resource_server_id, position, value, description)
         VALUES (?1, ?2, ?3, ?4);",
    )?;
    for (position, scope) in server.scopes().iter().enumerate() {
        insert.execute(params![
            server_id,
            position as i64,
            scope.value,
            scope.description,
        ])?;
    }
    Ok(())
}

fn parse_resource_server_row(conn: &Connection, row: &Row<'_>) -> RepoResult<ResourceServer> {
    let lifecycle = read_lifecycle(row, RESOURCE_SERVER_TABLE)?;
    let record = ResourceServerRecord {
        name: row.get("name")?,
        identifier: row.get("identifier")?,
        description: row.get("description")?,
        external_id: row.get("external_id")?,
    };
    let scopes = load_catalog(conn, lifecycle.id())?;
    Ok(ResourceServer::restore(lifecycle, record, scopes))
}

fn load_catalog(conn: &Connection, server_id: Uuid) -> RepoResult<Vec<Scope>> {
    let mut stmt = conn.prepare(
        "SELECT value, description
         FROM resource_server_scopes
         WHERE resource_server_id = ?1
         ORDER BY position ASC;",
    )?;

    let mut rows = stmt.query(params![server_id.to_string()])?;
    let mut scopes = Vec::new();
    while let Some(row) = rows.next()? {
        scopes.push(Scope {
            value: row.get(0)?,
            description: row.get(1)?,
            resource_server_id: server_id,
        });
    }
    Ok(scopes)
}
