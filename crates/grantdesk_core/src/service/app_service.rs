//! App use-case service.

use crate::config::PagingConfig;
use crate::model::app::{App, AppPatch};
use crate::model::lifecycle::{Entity, Revision};
use crate::paging::{Page, PageRequest};
use crate::providers::Providers;
use crate::repo::app_repo::{AppListQuery, AppRepository};
use crate::service::{log_created, not_found, persist_if_changed, ServiceResult};
use uuid::Uuid;

/// App service facade over repository implementations.
pub struct AppService<R: AppRepository> {
    repo: R,
    providers: Providers,
    paging: PagingConfig,
}

impl<R: AppRepository> AppService<R> {
    pub fn new(repo: R, providers: Providers, paging: PagingConfig) -> Self {
        Self {
            repo,
            providers,
            paging,
        }
    }

    pub fn create_app(
        &self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> ServiceResult<App> {
        let app = App::new(&self.providers, name, description);
        self.repo.insert_app(&app)?;
        log_created(&app);
        Ok(app)
    }

    pub fn update_app(&self, id: Uuid, patch: AppPatch) -> ServiceResult<Revision<App>> {
        let app = self.get_app(id)?;
        let revision = app.update(patch, self.providers.clock());
        persist_if_changed(revision, "app_update", |app| self.repo.update_app(app))
    }

    pub fn delete_app(&self, id: Uuid) -> ServiceResult<Revision<App>> {
        let app = self.get_app(id)?;
        let revision = app.soft_delete(self.providers.clock());
        persist_if_changed(revision, "app_delete", |app| self.repo.update_app(app))
    }

    pub fn get_app(&self, id: Uuid) -> ServiceResult<App> {
        self.repo
            .get_app(id, false)?
            .ok_or_else(|| not_found::<App>(id))
    }

    pub fn list_apps(&self, query: &AppListQuery, page: PageRequest) -> ServiceResult<Page<App>> {
        let page_size = self.paging.normalize(page.page_size);
        Ok(self.repo.list_apps(query, page.cursor, page_size)?)
    }
}
