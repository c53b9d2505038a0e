//! Client and grant use-case service.
//!
//! # Invariants
//! - Deleting a client soft-deletes its live grants in the same write.
//! - A client holds at most one live grant per resource server.
//! - `set_grant_scopes` writes only when the scope set really changed.

use crate::config::PagingConfig;
use crate::model::client::{Client, ClientPatch, NewClient};
use crate::model::cursor::Cursor;
use crate::model::grant::Grant;
use crate::model::lifecycle::{Entity, Revision};
use crate::model::scope::Scope;
use crate::paging::filter::{
    apply_cursor_filter, apply_date_filter, apply_eq_filter, apply_live_filter, take_page,
};
use crate::paging::{DateFilter, Page, PageRequest};
use crate::providers::Providers;
use crate::repo::client_repo::{ClientListQuery, ClientRepository, GrantListQuery};
use crate::service::{
    log_created, not_found, persist_if_changed, ServiceError, ServiceResult,
};
use uuid::Uuid;

/// In-memory filters for one client's grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientGrantFilter {
    pub resource_server_id: Option<Uuid>,
    pub dates: DateFilter,
}

/// Client service facade over repository implementations.
pub struct ClientService<R: ClientRepository> {
    repo: R,
    providers: Providers,
    paging: PagingConfig,
}

impl<R: ClientRepository> ClientService<R> {
    pub fn new(repo: R, providers: Providers, paging: PagingConfig) -> Self {
        Self {
            repo,
            providers,
            paging,
        }
    }

    pub fn create_client(&self, input: NewClient) -> ServiceResult<Client> {
        let client = Client::new(&self.providers, input);
        self.repo.insert_client(&client)?;
        log_created(&client);
        Ok(client)
    }

    pub fn update_client(&self, id: Uuid, patch: ClientPatch) -> ServiceResult<Revision<Client>> {
        let client = self.get_client(id)?;
        let revision = client.update(patch, self.providers.clock());
        persist_if_changed(revision, "client_update", |client| {
            self.repo.update_client(client)
        })
    }

    /// Soft-deletes the client, every live grant it holds and its product links.
    pub fn delete_client(&self, id: Uuid) -> ServiceResult<Revision<Client>> {
        let client = self.get_client(id)?;
        let revision = client.soft_delete(self.providers.clock());
        persist_if_changed(revision, "client_delete", |client| {
            self.repo.update_client(client)
        })
    }

    pub fn get_client(&self, id: Uuid) -> ServiceResult<Client> {
        self.repo
            .get_client(id, false)?
            .ok_or_else(|| not_found::<Client>(id))
    }

    pub fn list_clients(
        &self,
        query: &ClientListQuery,
        page: PageRequest,
    ) -> ServiceResult<Page<Client>> {
        let page_size = self.paging.normalize(page.page_size);
        Ok(self.repo.list_clients(query, page.cursor, page_size)?)
    }

    pub fn create_grant(
        &self,
        client_id: Uuid,
        resource_server_id: Uuid,
        scopes: Vec<Scope>,
    ) -> ServiceResult<Grant> {
        let client = self.get_client(client_id)?;
        if let Some(existing) = client.grant_for(resource_server_id) {
            return Err(ServiceError::Conflict(format!(
                "client {client_id} already holds grant {} on resource server {resource_server_id}",
                existing.id()
            )));
        }

        let grant = Grant::new(&self.providers, client_id, resource_server_id, scopes);
        self.repo.insert_grant(&grant)?;
        log_created(&grant);
        Ok(grant)
    }

    pub fn set_grant_scopes(
        &self,
        grant_id: Uuid,
        scopes: &[Scope],
    ) -> ServiceResult<Revision<Grant>> {
        let grant = self.get_grant(grant_id)?;
        let revision = grant.set_scopes(scopes, self.providers.clock());
        persist_if_changed(revision, "grant_set_scopes", |grant| {
            self.repo.update_grant(grant)
        })
    }

    pub fn delete_grant(&self, grant_id: Uuid) -> ServiceResult<Revision<Grant>> {
        let grant = self.get_grant(grant_id)?;
        let revision = grant.soft_delete(self.providers.clock());
        persist_if_changed(revision, "grant_delete", |grant| {
            self.repo.update_grant(grant)
        })
    }

    pub fn get_grant(&self, id: Uuid) -> ServiceResult<Grant> {
        self.repo
            .get_grant(id, false)?
            .ok_or_else(|| not_found::<Grant>(id))
    }

    pub fn list_grants(
        &self,
        query: &GrantListQuery,
        page: PageRequest,
    ) -> ServiceResult<Page<Grant>> {
        let page_size = self.paging.normalize(page.page_size);
        Ok(self.repo.list_grants(query, page.cursor, page_size)?)
    }

    /// Pages through the grants loaded with one client, filtering in memory.
    pub fn list_client_grants(
        &self,
        client_id: Uuid,
        filter: &ClientGrantFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<Grant>> {
        let client = self.get_client(client_id)?;
        Ok(page_grants(
            client.grants().to_vec(),
            filter,
            page.cursor,
            self.paging.normalize(page.page_size),
        ))
    }
}

fn page_grants(
    grants: Vec<Grant>,
    filter: &ClientGrantFilter,
    cursor: Option<Cursor>,
    page_size: u32,
) -> Page<Grant> {
    let grants = apply_live_filter(grants, false);
    let grants = apply_cursor_filter(grants, cursor);
    let grants = apply_eq_filter(grants, filter.resource_server_id, Grant::resource_server_id);
    let grants = apply_date_filter(grants, &filter.dates);
    take_page(grants, page_size)
}
