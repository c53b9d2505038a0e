//! Client/grant repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist `Client` aggregates together with the grants they hold.
//! - Own grant scope replacement with atomic semantics.
//!
//! # Invariants
//! - A client write and the lifecycle writes of its held grants commit in one
//!   transaction, so a soft-delete cascade lands as one logical write.
//! - Soft-deleting a client also soft-deletes its live product links, at the
//!   client's deletion instant clamped to each link's `date_modified`.
//! - `grant_scopes` rows are replaced wholesale inside the grant's transaction.
//! - Loaded clients carry only their live grants.

use crate::model::client::{Client, ClientRecord, ClientType};
use crate::model::cursor::Cursor;
use crate::model::grant::Grant;
use crate::model::lifecycle::Entity;
use crate::model::scope::Scope;
use crate::paging::sql::ListSql;
use crate::paging::{DateFilter, Page};
use crate::repo::common::{
    classify_write_error, ensure_connection_ready, not_found, optional_micros, parse_uuid,
    read_lifecycle, to_micros, update_lifecycle, RepoError, RepoResult,
};
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const CLIENT_TABLE: &str = "clients";
const GRANT_TABLE: &str = "grants";
const GRANT_SCOPE_TABLE: &str = "grant_scopes";
const PRODUCT_CLIENT_TABLE: &str = "product_clients";

const CLIENT_SELECT_SQL: &str = "SELECT
    id,
    app_id,
    name,
    description,
    client_type,
    callbacks,
    allowed_origins,
    external_id,
    cursor,
    date_created,
    date_modified,
    date_deleted
FROM clients";

const GRANT_SELECT_SQL: &str = "SELECT
    id,
    client_id,
    resource_server_id,
    cursor,
    date_created,
    date_modified,
    date_deleted
FROM grants";

/// Filters for listing clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientListQuery {
    pub app_id: Option<Uuid>,
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    pub description: Option<String>,
    pub client_type: Option<ClientType>,
    /// Exact identity-provider identifier.
    pub external_id: Option<String>,
    pub dates: DateFilter,
    pub include_deleted: bool,
}

/// Filters for listing grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantListQuery {
    pub client_id: Option<Uuid>,
    pub resource_server_id: Option<Uuid>,
    pub dates: DateFilter,
    pub include_deleted: bool,
}

/// Repository interface for clients and their grants.
pub trait ClientRepository {
    /// Inserts a client and any grants it already holds.
    fn insert_client(&self, client: &Client) -> RepoResult<Uuid>;
    /// Writes client columns and the lifecycle of every held grant.
    /// Writes the client row and its grants' lifecycles. A deleted client's
    /// product links are soft-deleted in the same write.
    fn update_client(&self, client: &Client) -> RepoResult<()>;
    fn get_client(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<Client>>;
    fn list_clients(
        &self,
        query: &ClientListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<Client>>;
    fn insert_grant(&self, grant: &Grant) -> RepoResult<Uuid>;
    /// Writes the grant lifecycle and replaces its scope rows.
    fn update_grant(&self, grant: &Grant) -> RepoResult<()>;
    fn get_grant(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<Grant>>;
    fn list_grants(
        &self,
        query: &GrantListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<Grant>>;
}

/// SQLite-backed client/grant repository.
pub struct SqliteClientRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClientRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[CLIENT_TABLE, GRANT_TABLE, GRANT_SCOPE_TABLE, PRODUCT_CLIENT_TABLE],
        )?;
        Ok(Self { conn })
    }
}

impl ClientRepository for SqliteClientRepository<'_> {
    fn insert_client(&self, client: &Client) -> RepoResult<Uuid> {
        let lifecycle = client.lifecycle();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO clients (
                id,
                app_id,
                name,
                description,
                client_type,
                callbacks,
                allowed_origins,
                external_id,
                cursor,
                date_created,
                date_modified,
                date_deleted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                lifecycle.id().to_string(),
                client.app_id().to_string(),
                client.name(),
                client.description(),
                client.client_type().as_str(),
                encode_list(client.callbacks())?,
                encode_list(client.allowed_origins())?,
                client.external_id(),
                lifecycle.cursor(),
                to_micros(lifecycle.date_created()),
                to_micros(lifecycle.date_modified()),
                optional_micros(lifecycle.date_deleted()),
            ],
        )
        .map_err(|err| classify_write_error(err, CLIENT_TABLE, lifecycle.cursor()))?;

        for grant in client.grants() {
            write_new_grant(&tx, grant)?;
        }
        tx.commit()?;

        Ok(lifecycle.id())
    }

    fn update_client(&self, client: &Client) -> RepoResult<()> {
        let lifecycle = client.lifecycle();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx
            .execute(
                "UPDATE clients
                 SET
                    name = ?2,
                    description = ?3,
                    callbacks = ?4,
                    allowed_origins = ?5,
                    external_id = ?6,
                    date_modified = ?7,
                    date_deleted = ?8
                 WHERE id = ?1;",
                params![
                    lifecycle.id().to_string(),
                    client.name(),
                    client.description(),
                    encode_list(client.callbacks())?,
                    encode_list(client.allowed_origins())?,
                    client.external_id(),
                    to_micros(lifecycle.date_modified()),
                    optional_micros(lifecycle.date_deleted()),
                ],
            )
            .map_err(|err| classify_write_error(err, CLIENT_TABLE, lifecycle.cursor()))?;
        if changed == 0 {
            return Err(not_found::<Client>(lifecycle.id()));
        }

        for grant in client.grants() {
            update_lifecycle(&tx, GRANT_TABLE, grant)?;
        }
        if let Some(deleted_at) = lifecycle.date_deleted() {
            tx.execute(
                "UPDATE product_clients
                 SET date_deleted = MAX(date_modified, ?2)
                 WHERE client_id = ?1 AND date_deleted IS NULL;",
                params![lifecycle.id().to_string(), to_micros(deleted_at)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_client(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<Client>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CLIENT_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR date_deleted IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), include_deleted])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.parse_client_row(row)?));
        }
        Ok(None)
    }

    fn list_clients(
        &self,
        query: &ClientListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<Client>> {
        let (sql, binds) = ListSql::select(CLIENT_SELECT_SQL)
            .live_only(query.include_deleted)
            .cursor_after(cursor)
            .eq_uuid("app_id", query.app_id)
            .contains("name", query.name.as_deref())
            .contains("description", query.description.as_deref())
            .eq_text("client_type", query.client_type.map(ClientType::as_str))
            .eq_text("external_id", query.external_id.as_deref())
            .dates(&query.dates)
            .page(page_size);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut clients = Vec::new();
        while let Some(row) = rows.next()? {
            clients.push(self.parse_client_row(row)?);
        }
        Ok(Page::from_items(clients))
    }

    fn insert_grant(&self, grant: &Grant) -> RepoResult<Uuid> {
        let tx = self.conn.unchecked_transaction()?;
        write_new_grant(&tx, grant)?;
        tx.commit()?;
        Ok(grant.id())
    }

    fn update_grant(&self, grant: &Grant) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        update_lifecycle(&tx, GRANT_TABLE, grant)?;
        replace_grant_scopes(&tx, grant)?;
        tx.commit()?;
        Ok(())
    }

    fn get_grant(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<Grant>> {
        let mut stmt = self.conn.prepare(&format!(
            "{GRANT_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR date_deleted IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), include_deleted])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_grant_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_grants(
        &self,
        query: &GrantListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<Grant>> {
        let (sql, binds) = ListSql::select(GRANT_SELECT_SQL)
            .live_only(query.include_deleted)
            .cursor_after(cursor)
            .eq_uuid("client_id", query.client_id)
            .eq_uuid("resource_server_id", query.resource_server_id)
            .dates(&query.dates)
            .page(page_size);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next()? {
            grants.push(parse_grant_row(self.conn, row)?);
        }
        Ok(Page::from_items(grants))
    }
}

impl SqliteClientRepository<'_> {
    fn parse_client_row(&self, row: &Row<'_>) -> RepoResult<Client> {
        let lifecycle = read_lifecycle(row, CLIENT_TABLE)?;
        let app_id: String = row.get("app_id")?;
        let client_type: String = row.get("client_type")?;
        let callbacks: String = row.get("callbacks")?;
        let allowed_origins: String = row.get("allowed_origins")?;

        let record = ClientRecord {
            app_id: parse_uuid(&app_id, CLIENT_TABLE, "app_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            client_type: ClientType::parse(&client_type).ok_or_else(|| {
                RepoError::InvalidData(format!("unknown client_type `{client_type}`"))
            })?,
            callbacks: decode_list(&callbacks, "callbacks")?,
            allowed_origins: decode_list(&allowed_origins, "allowed_origins")?,
            external_id: row.get("external_id")?,
        };
        let grants = load_live_grants(self.conn, lifecycle.id())?;
        Ok(Client::restore(lifecycle, record, grants))
    }
}

fn write_new_grant(conn: &Connection, grant: &Grant) -> RepoResult<()> {
    let lifecycle = grant.lifecycle();
    conn.execute(
        "INSERT INTO grants (
            id,
            client_id,
            resource_server_id,
            cursor,
            date_created,
            date_modified,
            date_deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            lifecycle.id().to_string(),
            grant.client_id().to_string(),
            grant.resource_server_id().to_string(),
            lifecycle.cursor(),
            to_micros(lifecycle.date_created()),
            to_micros(lifecycle.date_modified()),
            optional_micros(lifecycle.date_deleted()),
        ],
    )
    .map_err(|err| classify_write_error(err, GRANT_TABLE, lifecycle.cursor()))?;

    replace_grant_scopes(conn, grant)
}

fn replace_grant_scopes(conn: &Connection, grant: &Grant) -> RepoResult<()> {
    let grant_id = grant.id().to_string();
    conn.execute(
        "DELETE FROM grant_scopes WHERE grant_id = ?1;",
        params![grant_id],
    )?;

    let mut insert = conn.prepare(
        "INSERT INTO grant_scopes (grant_id, position, resource_server_id, value)
         VALUES (?1, ?2, ?3, ?4);",
    )?;
    for (position, scope) in grant.scopes().iter().enumerate() {
        insert
            .execute(params![
                grant_id,
                position as i64,
                scope.resource_server_id.to_string(),
                scope.value,
            ])
            .map_err(|err| classify_write_error(err, GRANT_SCOPE_TABLE, grant.cursor()))?;
    }
    Ok(())
}

fn load_live_grants(conn: &Connection, client_id: Uuid) -> RepoResult<Vec<Grant>> {
    let mut stmt = conn.prepare(&format!(
        "{GRANT_SELECT_SQL}
         WHERE client_id = ?1
           AND date_deleted IS NULL
         ORDER BY cursor ASC;"
    ))?;

    let mut rows = stmt.query(params![client_id.to_string()])?;
    let mut grants = Vec::new();
    while let Some(row) = rows.next()? {
        grants.push(parse_grant_row(conn, row)?);
    }
    Ok(grants)
}

fn parse_grant_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Grant> {
    let lifecycle = read_lifecycle(row, GRANT_TABLE)?;
    let client_id: String = row.get("client_id")?;
    let resource_server_id: String = row.get("resource_server_id")?;
    let scopes = load_grant_scopes(conn, lifecycle.id())?;

    Ok(Grant::restore(
        lifecycle,
        parse_uuid(&client_id, GRANT_TABLE, "client_id")?,
        parse_uuid(&resource_server_id, GRANT_TABLE, "resource_server_id")?,
        scopes,
    ))
}

fn load_grant_scopes(conn: &Connection, grant_id: Uuid) -> RepoResult<Vec<Scope>> {
    let mut stmt = conn.prepare(
        "SELECT resource_server_id, value
         FROM grant_scopes
         WHERE grant_id = ?1
         ORDER BY position ASC;",
    )?;

    let mut rows = stmt.query(params![grant_id.to_string()])?;
    let mut scopes = Vec::new();
    while let Some(row) = rows.next()? {
        let resource_server_id: String = row.get(0)?;
        let value: String = row.get(1)?;
        scopes.push(Scope::new(
            parse_uuid(&resource_server_id, GRANT_SCOPE_TABLE, "resource_server_id")?,
            value,
        ));
    }
    Ok(scopes)
}

fn encode_list(values: &[String]) -> RepoResult<String> {
    serde_json::to_string(values)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode string list: {err}")))
}

fn decode_list(raw: &str, column: &str) -> RepoResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|err| {
        RepoError::InvalidData(format!("invalid json array in {CLIENT_TABLE}.{column}: {err}"))
    })
}
