//! App aggregate: the top-level owner clients are registered under.

use crate::model::lifecycle::{deletion_instant, Changes, Entity, Lifecycle, Revision};
use crate::providers::{Clock, Providers};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
    lifecycle: Lifecycle,
    name: String,
    description: Option<String>,
}

/// Candidate values for `App::update`; `None` means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl App {
    pub fn new(providers: &Providers, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            lifecycle: Lifecycle::new(providers),
            name: name.into(),
            description,
        }
    }

    /// Rehydrates an app read back from storage.
    pub fn restore(lifecycle: Lifecycle, name: String, description: Option<String>) -> Self {
        Self {
            lifecycle,
            name,
            description,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn update(self, patch: AppPatch, clock: &dyn Clock) -> Revision<Self> {
        let Self {
            mut lifecycle,
            name,
            description,
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
            },
            changed,
        )
    }
}

impl Entity for App {
    const KIND: &'static str = "app";

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn soft_delete(mut self, clock: &dyn Clock) -> Revision<Self> {
        self.lifecycle.mark_deleted(deletion_instant(clock));
        Revision::changed(self)
    }
}

impl Display for App {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.as_serializable(), f)
    }
}
