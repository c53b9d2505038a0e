//! Resource server aggregate and its scope catalog.

use crate::model::lifecycle::{deletion_instant, Changes, Entity, Lifecycle, Revision};
use crate::model::reconcile::reconcile;
use crate::model::scope::{same_catalog_scope, Scope};
use crate::providers::{Clock, Providers};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceServer {
    lifecycle: Lifecycle,
    name: String,
    /// Audience clients request tokens for. Fixed at creation.
    identifier: String,
    description: Option<String>,
    external_id: Option<String>,
    scopes: Vec<Scope>,
}

/// Candidate values for `ResourceServer::update`; `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceServerPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub external_id: Option<String>,
}

/// Stored columns of a resource server, used to rehydrate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceServerRecord {
    pub name: String,
    pub identifier: String,
    pub description: Option<String>,
    pub external_id: Option<String>,
}

impl ResourceServer {
    /// Creates a resource server whose catalog starts as `scopes`, with
    /// duplicates under the catalog rule dropped. Scopes are re-owned by the
    /// new server.
    pub fn new(
        providers: &Providers,
        name: impl Into<String>,
        identifier: impl Into<String>,
        description: Option<String>,
        scopes: Vec<Scope>,
    ) -> Self {
        let lifecycle = Lifecycle::new(providers);
        let owned: Vec<Scope> = scopes
            .into_iter()
            .map(|scope| Scope {
                resource_server_id: lifecycle.id(),
                ..scope
            })
            .collect();
        let mut catalog = Vec::new();
        reconcile(&mut catalog, &owned, same_catalog_scope);

        Self {
            lifecycle,
            name: name.into(),
            identifier: identifier.into(),
            description,
            external_id: None,
            scopes: catalog,
        }
    }

    /// Rehydrates a resource server and its catalog read back from storage.
    pub fn restore(lifecycle: Lifecycle, record: ResourceServerRecord, scopes: Vec<Scope>) -> Self {
        Self {
            lifecycle,
            name: record.name,
            identifier: record.identifier,
            description: record.description,
            external_id: record.external_id,
            scopes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Catalog scope matching `value`, ignoring case.
    pub fn scope(&self, value: &str) -> Option<&Scope> {
        let wanted = value.to_lowercase();
        self.scopes
            .iter()
            .find(|scope| scope.value.to_lowercase() == wanted)
    }

    pub fn update(self, patch: ResourceServerPatch, clock: &dyn Clock) -> Revision<Self> {
        let Self {
            mut lifecycle,
            name,
            identifier,
            description,
            external_id,
            scopes,
        } = self;

        let mut changes = Changes::new();
        let name = changes.field(name, patch.name);
        let description = changes.optional_field(description, patch.description);
        let external_id = changes.optional_field(external_id, patch.external_id);
        let changed = changes.commit(&mut lifecycle, clock);

        Revision::new(
            Self {
                lifecycle,
                name,
                identifier,
                description,
                external_id,
                scopes,
            },
            changed,
        )
    }

    /// Reconciles the catalog toward `proposed`, comparing value and
    /// description. A description change surfaces as remove-old, add-new.
    pub fn set_scopes(mut self, proposed: &[Scope], clock: &dyn Clock) -> Revision<Self> {
        let owner = self.lifecycle.id();
        let proposed: Vec<Scope> = proposed
            .iter()
            .map(|scope| Scope {
                resource_server_id: owner,
                ..scope.clone()
            })
            .collect();

        let mut changes = Changes::new();
        changes.reconcile(&mut self.scopes, &proposed, same_catalog_scope);
        let changed = changes.commit(&mut self.lifecycle, clock);
        Revision::new(self, changed)
    }
}

impl Entity for ResourceServer {
    const KIND: &'static str = "resource_server";

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.identifier)
    }

    fn soft_delete(mut self, clock: &dyn Clock) -> Revision<Self> {
        self.lifecycle.mark_deleted(deletion_instant(clock));
        Revision::changed(self)
    }
}

impl Display for ResourceServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_serializable(), f)
    }
}
