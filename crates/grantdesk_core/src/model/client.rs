//! Client aggregate and the grants it owns.
//!
//! # Invariants
//! - `grants` holds only the live grants loaded with the client.
//! - Soft-deleting a client soft-deletes every held grant at the same instant.
//! - `callbacks` and `allowed_origins` compare with set equality on update.

use crate::model::grant::Grant;
use crate::model::lifecycle::{deletion_instant, Changes, Entity, Lifecycle, Revision};
use crate::providers::{Clock, Providers};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// OAuth application profile of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Server-to-server, client-credentials only.
    Machine,
    /// Browser single-page app.
    SinglePage,
    /// Mobile or desktop app.
    Native,
    /// Server-rendered web app.
    Regular,
}

impl ClientType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Machine => "machine",
            Self::SinglePage => "single_page",
            Self::Native => "native",
            Self::Regular => "regular",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "machine" => Some(Self::Machine),
            "single_page" => Some(Self::SinglePage),
            "native" => Some(Self::Native),
            "regular" => Some(Self::Regular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    lifecycle: Lifecycle,
    app_id: Uuid,
    name: String,
    description: Option<String>,
    client_type: ClientType,
    callbacks: Vec<String>,
    allowed_origins: Vec<String>,
    external_id: Option<String>,
    grants: Vec<Grant>,
}

/// Construction input for `Client::new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub app_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub client_type: ClientType,
    pub callbacks: Vec<String>,
    pub allowed_origins: Vec<String>,
}

/// Candidate values for `Client::update`; `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub callbacks: Option<Vec<String>>,
    pub allowed_origins: Option<Vec<String>>,
    /// Identifier assigned by the identity provider.
    pub external_id: Option<String>,
}

/// Stored columns of a client, used to rehydrate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub app_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub client_type: ClientType,
    pub callbacks: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub external_id: Option<String>,
}

impl Client {
    pub fn new(providers: &Providers, input: NewClient) -> Self {
        Self {
            lifecycle: Lifecycle::new(providers),
            app_id: input.app_id,
            name: input.name,
            description: input.description,
            client_type: input.client_type,
            callbacks: input.callbacks,
            allowed_origins: input.allowed_origins,
            external_id: None,
            grants: Vec::new(),
        }
    }

    /// Rehydrates a client and its live grants read back from storage.
    pub fn restore(lifecycle: Lifecycle, record: ClientRecord, grants: Vec<Grant>) -> Self {
        Self {
            lifecycle,
            app_id: record.app_id,
            name: record.name,
            description: record.description,
            client_type: record.client_type,
            callbacks: record.callbacks,
            allowed_origins: record.allowed_origins,
            external_id: record.external_id,
            grants,
        }
    }

    pub fn app_id(&self) -> Uuid {
        self.app_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    pub fn callbacks(&self) -> &[String] {
        &self.callbacks
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Live grant on `resource_server_id`, if any.
    pub fn grant_for(&self, resource_server_id: Uuid) -> Option<&Grant> {
        self.grants
            .iter()
            .find(|grant| grant.resource_server_id() == resource_server_id)
    }

    pub fn update(self, patch: ClientPatch, clock: &dyn Clock) -> Revision<Self> {
        let Self {
            mut lifecycle,
            app_id,
            name,
            description,
            client_type,
            callbacks,
            allowed_origins,
            external_id,
            grants,
        } = self;

        let mut changes = Changes::new();
        let name = changes.field(name, patch.name);
        let description = changes.optional_field(description, patch.description);
        let callbacks = changes.set_field(callbacks, patch.callbacks);
        let allowed_origins = changes.set_field(allowed_origins, patch.allowed_origins);
        let external_id = changes.optional_field(external_id, patch.external_id);
        let changed = changes.commit(&mut lifecycle, clock);

        Revision::new(
            Self {
                lifecycle,
                app_id,
                name,
                description,
                client_type,
                callbacks,
                allowed_origins,
                external_id,
                grants,
            },
            changed,
        )
    }
}

impl Entity for Client {
    const KIND: &'static str = "client";

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn soft_delete(mut self, clock: &dyn Clock) -> Revision<Self> {
        let at = deletion_instant(clock);
        self.lifecycle.mark_deleted(at);
        for grant in &mut self.grants {
            grant.delete_at(at);
        }
        Revision::changed(self)
    }
}

impl Display for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_serializable(), f)
    }
}
