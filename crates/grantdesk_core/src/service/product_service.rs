//! Product use-case service, including client links.
//!
//! # Invariants
//! - Deleting a product soft-deletes its live client links in the same write.
//! - Linking an already-linked client is a conflict, not a second link.

use crate::config::PagingConfig;
use crate::model::lifecycle::{Entity, Revision};
use crate::model::product::{Product, ProductClient, ProductPatch};
use crate::paging::{Page, PageRequest};
use crate::providers::Providers;
use crate::repo::product_repo::{ProductClientListQuery, ProductListQuery, ProductRepository};
use crate::service::{
    log_created, not_found, persist_if_changed, ServiceError, ServiceResult,
};
use uuid::Uuid;

pub struct ProductService<R: ProductRepository> {
    repo: R,
    providers: Providers,
    paging: PagingConfig,
}

impl<R: ProductRepository> ProductService<R> {
    pub fn new(repo: R, providers: Providers, paging: PagingConfig) -> Self {
        Self {
            repo,
            providers,
            paging,
        }
    }

    pub fn create_product(
        &self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> ServiceResult<Product> {
        let product = Product::new(&self.providers, name, description);
        self.repo.insert_product(&product)?;
        log_created(&product);
        Ok(product)
    }

    pub fn update_product(
        &self,
        id: Uuid,
        patch: ProductPatch,
    ) -> ServiceResult<Revision<Product>> {
        let product = self.get_product(id)?;
        let revision = product.update(patch, self.providers.clock());
        persist_if_changed(revision, "product_update", |product| {
            self.repo.update_product(product)
        })
    }

    /// Soft-deletes the product and every live client link it holds.
    pub fn delete_product(&self, id: Uuid) -> ServiceResult<Revision<Product>> {
        let product = self.get_product(id)?;
        let revision = product.soft_delete(self.providers.clock());
        persist_if_changed(revision, "product_delete", |product| {
            self.repo.update_product(product)
        })
    }

    pub fn get_product(&self, id: Uuid) -> ServiceResult<Product> {
        self.repo
            .get_product(id, false)?
            .ok_or_else(|| not_found::<Product>(id))
    }

    pub fn list_products(
        &self,
        query: &ProductListQuery,
        page: PageRequest,
    ) -> ServiceResult<Page<Product>> {
        let page_size = self.paging.normalize(page.page_size);
        Ok(self.repo.list_products(query, page.cursor, page_size)?)
    }

    pub fn link_client(&self, product_id: Uuid, client_id: Uuid) -> ServiceResult<ProductClient> {
        let product = self.get_product(product_id)?;
        if let Some(existing) = product.link_for(client_id) {
            return Err(ServiceError::Conflict(format!(
                "client {client_id} is already linked to product {product_id} by {}",
                existing.id()
            )));
        }

        let link = ProductClient::new(&self.providers, product_id, client_id);
        self.repo.insert_product_client(&link)?;
        log_created(&link);
        Ok(link)
    }

    pub fn unlink_client(
        &self,
        product_id: Uuid,
        client_id: Uuid,
    ) -> ServiceResult<Revision<ProductClient>> {
        let product = self.get_product(product_id)?;
        let link = product
            .link_for(client_id)
            .cloned()
            .ok_or(ServiceError::NotFound {
                entity: ProductClient::KIND,
                id: client_id,
            })?;

        let revision = link.soft_delete(self.providers.clock());
        persist_if_changed(revision, "product_unlink_client", |link| {
            self.repo.update_product_client(link)
        })
    }

    pub fn list_product_clients(
        &self,
        query: &ProductClientListQuery,
        page: PageRequest,
    ) -> ServiceResult<Page<ProductClient>> {
        let page_size = self.paging.normalize(page.page_size);
        Ok(self
            .repo
            .list_product_clients(query, page.cursor, page_size)?)
    }
}
