//! Product/link repository contracts and SQLite implementation.
//!
//! # Invariants
//! - A product write and the lifecycle writes of its live links commit in one
//!   transaction.
//! - A client can be linked to a product at most once among live links.

use crate::model::cursor::Cursor;
use crate::model::lifecycle::Entity;
use crate::model::product::{Product, ProductClient};
use crate::paging::sql::ListSql;
use crate::paging::{DateFilter, Page};
use crate::repo::common::{
    classify_write_error, ensure_connection_ready, not_found, optional_micros, parse_uuid,
    read_lifecycle, to_micros, update_lifecycle, RepoResult,
};
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const PRODUCT_TABLE: &str = "products";
const PRODUCT_CLIENT_TABLE: &str = "product_clients";

const PRODUCT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    cursor,
    date_created,
    date_modified,
    date_deleted
FROM products";

const PRODUCT_CLIENT_SELECT_SQL: &str = "SELECT
    id,
    product_id,
    client_id,
    cursor,
    date_created,
    date_modified,
    date_deleted
FROM product_clients";

/// Filters for listing products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductListQuery {
    pub name: Option<String>,
    pub description: Option<String>,
    pub dates: DateFilter,
    pub include_deleted: bool,
}

/// Filters for listing product/client links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductClientListQuery {
    pub product_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub dates: DateFilter,
    pub include_deleted: bool,
}

/// Repository interface for products and their client links.
pub trait ProductRepository {
    fn insert_product(&self, product: &Product) -> RepoResult<Uuid>;
    /// Writes product columns and the lifecycle of every held link.
    fn update_product(&self, product: &Product) -> RepoResult<()>;
    fn get_product(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<Product>>;
    fn list_products(
        &self,
        query: &ProductListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<Product>>;
    fn insert_product_client(&self, link: &ProductClient) -> RepoResult<Uuid>;
    fn update_product_client(&self, link: &ProductClient) -> RepoResult<()>;
    fn list_product_clients(
        &self,
        query: &ProductClientListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<ProductClient>>;
}

/// SQLite-backed product repository.
pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[PRODUCT_TABLE, PRODUCT_CLIENT_TABLE])?;
        Ok(Self { conn })
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn insert_product(&self, product: &Product) -> RepoResult<Uuid> {
        let lifecycle = product.lifecycle();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO products (
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
                product.name(),
                product.description(),
                lifecycle.cursor(),
                to_micros(lifecycle.date_created()),
                to_micros(lifecycle.date_modified()),
                optional_micros(lifecycle.date_deleted()),
            ],
        )
        .map_err(|err| classify_write_error(err, PRODUCT_TABLE, lifecycle.cursor()))?;

        for link in product.clients() {
            write_new_link(&tx, link)?;
        }
        tx.commit()?;
        Ok(lifecycle.id())
    }

    fn update_product(&self, product: &Product) -> RepoResult<()> {
        let lifecycle = product.lifecycle();
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx
            .execute(
                "UPDATE products
                 SET
                    name = ?2,
                    description = ?3,
                    date_modified = ?4,
                    date_deleted = ?5
                 WHERE id = ?1;",
                params![
                    lifecycle.id().to_string(),
                    product.name(),
                    product.description(),
                    to_micros(lifecycle.date_modified()),
                    optional_micros(lifecycle.date_deleted()),
                ],
            )
            .map_err(|err| classify_write_error(err, PRODUCT_TABLE, lifecycle.cursor()))?;
        if changed == 0 {
            return Err(not_found::<Product>(lifecycle.id()));
        }

        for link in product.clients() {
            update_lifecycle(&tx, PRODUCT_CLIENT_TABLE, link)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_product(&self, id: Uuid, include_deleted: bool) -> RepoResult<Option<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PRODUCT_SELECT_SQL}
             WHERE id = ?1
               AND (?2 = 1 OR date_deleted IS NULL);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), include_deleted])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_product_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_products(
        &self,
        query: &ProductListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<Product>> {
        let (sql, binds) = ListSql::select(PRODUCT_SELECT_SQL)
            .live_only(query.include_deleted)
            .cursor_after(cursor)
            .contains("name", query.name.as_deref())
            .contains("description", query.description.as_deref())
            .dates(&query.dates)
            .page(page_size);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(self.conn, row)?);
        }
        Ok(Page::from_items(products))
    }

    fn insert_product_client(&self, link: &ProductClient) -> RepoResult<Uuid> {
        write_new_link(self.conn, link)?;
        Ok(link.id())
    }

    fn update_product_client(&self, link: &ProductClient) -> RepoResult<()> {
        update_lifecycle(self.conn, PRODUCT_CLIENT_TABLE, link)
    }

    fn list_product_clients(
        &self,
        query: &ProductClientListQuery,
        cursor: Option<Cursor>,
        page_size: u32,
    ) -> RepoResult<Page<ProductClient>> {
        let (sql, binds) = ListSql::select(PRODUCT_CLIENT_SELECT_SQL)
            .live_only(query.include_deleted)
            .cursor_after(cursor)
            .eq_uuid("product_id", query.product_id)
            .eq_uuid("client_id", query.client_id)
            .dates(&query.dates)
            .page(page_size);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(parse_link_row(row)?);
        }
        Ok(Page::from_items(links))
    }
}

fn write_new_link(conn: &Connection, link: &ProductClient) -> RepoResult<()> {
    let lifecycle = link.lifecycle();
    conn.execute(
        "INSERT INTO product_clients (
            id,
            product_id,
            client_id,
            cursor,
            date_created,
            date_modified,
            date_deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            lifecycle.id().to_string(),
            link.product_id().to_string(),
            link.client_id().to_string(),
            lifecycle.cursor(),
            to_micros(lifecycle.date_created()),
            to_micros(lifecycle.date_modified()),
            optional_micros(lifecycle.date_deleted()),
        ],
    )
    .map_err(|err| classify_write_error(err, PRODUCT_CLIENT_TABLE, lifecycle.cursor()))?;
    Ok(())
}

fn parse_product_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Product> {
    let lifecycle = read_lifecycle(row, PRODUCT_TABLE)?;
    let links = load_live_links(conn, lifecycle.id())?;
    Ok(Product::restore(
        lifecycle,
        row.get("name")?,
        row.get("description")?,
        links,
    ))
}

fn load_live_links(conn: &Connection, product_id: Uuid) -> RepoResult<Vec<ProductClient>> {
    let mut stmt = conn.prepare(&format!(
        "{PRODUCT_CLIENT_SELECT_SQL}
         WHERE product_id = ?1
           AND date_deleted IS NULL
         ORDER BY cursor ASC;"
    ))?;

    let mut rows = stmt.query(params![product_id.to_string()])?;
    let mut links = Vec::new();
    while let Some(row) = rows.next()? {
        links.push(parse_link_row(row)?);
    }
    Ok(links)
}

fn parse_link_row(row: &Row<'_>) -> RepoResult<ProductClient> {
    let product_id: String = row.get("product_id")?;
    let client_id: String = row.get("client_id")?;
    Ok(ProductClient::restore(
        read_lifecycle(row, PRODUCT_CLIENT_TABLE)?,
        parse_uuid(&product_id, PRODUCT_CLIENT_TABLE, "product_id")?,
        parse_uuid(&client_id, PRODUCT_CLIENT_TABLE, "client_id")?,
    ))
}
