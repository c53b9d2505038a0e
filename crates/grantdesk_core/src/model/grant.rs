//! Grant aggregate: the scopes one client holds on one resource server.

use crate::model::lifecycle::{deletion_instant, Changes, Entity, Lifecycle, Revision};
use crate::model::reconcile::reconcile;
use crate::model::scope::{same_grant_scope, Scope};
use crate::providers::{Clock, Providers};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    lifecycle: Lifecycle,
    client_id: Uuid,
    resource_server_id: Uuid,
    scopes: Vec<Scope>,
}

impl Grant {
    /// Creates a grant holding `scopes`, deduplicated by value and owned by
    /// `resource_server_id`.
    pub fn new(
        providers: &Providers,
        client_id: Uuid,
        resource_server_id: Uuid,
        scopes: Vec<Scope>,
    ) -> Self {
        let mut held = Vec::new();
        reconcile(
            &mut held,
            &owned_by(resource_server_id, &scopes),
            same_grant_scope,
        );
        Self {
            lifecycle: Lifecycle::new(providers),
            client_id,
            resource_server_id,
            scopes: held,
        }
    }

    /// Rehydrates a grant read back from storage.
    pub fn restore(
        lifecycle: Lifecycle,
        client_id: Uuid,
        resource_server_id: Uuid,
        scopes: Vec<Scope>,
    ) -> Self {
        Self {
            lifecycle,
            client_id,
            resource_server_id,
            scopes,
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn resource_server_id(&self) -> Uuid {
        self.resource_server_id
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Reconciles held scopes toward `proposed`, comparing values only.
    pub fn set_scopes(mut self, proposed: &[Scope], clock: &dyn Clock) -> Revision<Self> {
        let proposed = owned_by(self.resource_server_id, proposed);
        let mut changes = Changes::new();
        changes.reconcile(&mut self.scopes, &proposed, same_grant_scope);
        let changed = changes.commit(&mut self.lifecycle, clock);
        Revision::new(self, changed)
    }

    /// Cascade step driven by the owning client: one instant for the family.
    pub(crate) fn delete_at(&mut self, at: DateTime<Utc>) {
        self.lifecycle.mark_deleted(at);
    }
}

/// Grant scopes carry only their value; descriptions live in the catalog.
fn owned_by(resource_server_id: Uuid, scopes: &[Scope]) -> Vec<Scope> {
    scopes
        .iter()
        .map(|scope| Scope::new(resource_server_id, scope.value.clone()))
        .collect()
}

impl Entity for Grant {
    const KIND: &'static str = "grant";

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}:{}", self.client_id, self.resource_server_id))
    }

    fn soft_delete(mut self, clock: &dyn Clock) -> Revision<Self> {
        self.delete_at(deletion_instant(clock));
        Revision::changed(self)
    }
}

impl Display for Grant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_serializable(), f)
    }
}
