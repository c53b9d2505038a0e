//! Resource server use-case service.

use crate::config::PagingConfig;
use crate::model::lifecycle::{Entity, Revision};
use crate::model::resource_server::{ResourceServer, ResourceServerPatch};
use crate::model::scope::Scope;
use crate::paging::{Page, PageRequest};
use crate::providers::Providers;
use crate::repo::resource_server_repo::{ResourceServerListQuery, ResourceServerRepository};
use crate::service::{log_created, not_found, persist_if_changed, ServiceResult};
use uuid::Uuid;

pub struct ResourceServerService<R: ResourceServerRepository> {
    repo: R,
    providers: Providers,
    paging: PagingConfig,
}

impl<R: ResourceServerRepository> ResourceServerService<R> {
    pub fn new(repo: R, providers: Providers, paging: PagingConfig) -> Self {
        Self {
            repo,
            providers,
            paging,
        }
    }

    pub fn create_resource_server(
        &self,
        name: impl Into<String>,
        identifier: impl Into<String>,
        description: Option<String>,
        scopes: Vec<Scope>,
    ) -> ServiceResult<ResourceServer> {
        let server = ResourceServer::new(&self.providers, name, identifier, description, scopes);
        self.repo.insert_resource_server(&server)?;
        log_created(&server);
        Ok(server)
    }

    pub fn update_resource_server(
        &self,
        id: Uuid,
        patch: ResourceServerPatch,
    ) -> ServiceResult<Revision<ResourceServer>> {
        let server = self.get_resource_server(id)?;
        let revision = server.update(patch, self.providers.clock());
        persist_if_changed(revision, "resource_server_update", |server| {
            self.repo.update_resource_server(server)
        })
    }

    /// Reconciles the scope catalog; an equivalent set is not written.
    pub fn set_resource_server_scopes(
        &self,
        id: Uuid,
        scopes: &[Scope],
    ) -> ServiceResult<Revision<ResourceServer>> {
        let server = self.get_resource_server(id)?;
        let revision = server.set_scopes(scopes, self.providers.clock());
        persist_if_changed(revision, "resource_server_set_scopes", |server| {
            self.repo.update_resource_server(server)
        })
    }

    pub fn delete_resource_server(&self, id: Uuid) -> ServiceResult<Revision<ResourceServer>> {
        let server = self.get_resource_server(id)?;
        let revision = server.soft_delete(self.providers.clock());
        persist_if_changed(revision, "resource_server_delete", |server| {
            self.repo.update_resource_server(server)
        })
    }

    pub fn get_resource_server(&self, id: Uuid) -> ServiceResult<ResourceServer> {
        self.repo
            .get_resource_server(id, false)?
            .ok_or_else(|| not_found::<ResourceServer>(id))
    }

    pub fn list_resource_servers(
        &self,
        query: &ResourceServerListQuery,
        page: PageRequest,
    ) -> ServiceResult<Page<ResourceServer>> {
        let page_size = self.paging.normalize(page.page_size);
        Ok(self
            .repo
            .list_resource_servers(query, page.cursor, page_size)?)
    }
}
