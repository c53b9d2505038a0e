//! Product aggregate and the client links it owns.

use crate::model::lifecycle::{deletion_instant, Changes, Entity, Lifecycle, Revision};
use crate::providers::{Clock, Providers};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    lifecycle: Lifecycle,
    name: String,
    description: Option<String>,
    clients: Vec<ProductClient>,
}

/// Candidate values for `Product::update`; `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Link between a product and a client registered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductClient {
    lifecycle: Lifecycle,
    product_id: Uuid,
    client_id: Uuid,
}

impl Product {
    pub fn new(providers: &Providers, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(providers),
            name: name.into(),
            description,
            clients: Vec::new(),
        }
    }

    /// Rehydrates a product and its live client links read back from storage.
    pub fn restore(
        lifecycle: Lifecycle,
        name: String,
        description: Option<String>,
        clients: Vec<ProductClient>,
    ) -> Self {
        Self {
            lifecycle,
            name,
            description,
            clients,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn clients(&self) -> &[ProductClient] {
        &self.clients
    }

    /// Live link to `client_id`, if any.
    pub fn link_for(&self, client_id: Uuid) -> Option<&ProductClient> {
        self.clients
            .iter()
            .find(|link| link.client_id() == client_id)
    }

    pub fn update(self, patch: ProductPatch, clock: &dyn Clock) -> Revision<Self> {
        let Self {
            mut lifecycle,
            name,
            description,
            clients,
        } = self;

        let mut changes = Changes::new();
        let name = changes.field(name, patch.name);
        let description = changes.optional_field(description, patch.description);
        let changed = changes.commit(&mut lifecycle, clock);

        Revision::new(
            Self {
                lifecycle,
                name,
                description,
                clients,
            },
            changed,
        )
    }
}

impl Entity for Product {
    const KIND: &'static str = "product";

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn soft_delete(mut self, clock: &dyn Clock) -> Revision<Self> {
        let at = deletion_instant(clock);
        self.lifecycle.mark_deleted(at);
        for link in &mut self.clients {
            link.delete_at(at);
        }
        Revision::changed(self)
    }
}

impl Display for Product {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_serializable(), f)
    }
}

impl ProductClient {
    pub fn new(providers: &Providers, product_id: Uuid, client_id: Uuid) -> Self {
        Self {
            lifecycle: Lifecycle::new(providers),
            product_id,
            client_id,
        }
    }

    /// Rehydrates a link read back from storage.
    pub fn restore(lifecycle: Lifecycle, product_id: Uuid, client_id: Uuid) -> Self {
        Self {
            lifecycle,
            product_id,
            client_id,
        }
    }

    pub fn product_id(&self) -> Uuid {
        self.product_id
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub(crate) fn delete_at(&mut self, at: DateTime<Utc>) {
        self.lifecycle.mark_deleted(at);
    }
}

impl Entity for ProductClient {
    const KIND: &'static str = "product_client";

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}:{}", self.product_id, self.client_id))
    }

    fn soft_delete(mut self, clock: &dyn Clock) -> Revision<Self> {
        self.delete_at(deletion_instant(clock));
        Revision::changed(self)
    }
}

impl Display for ProductClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_serializable(), f)
    }
}
