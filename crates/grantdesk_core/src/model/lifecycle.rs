//! Entity lifecycle base shared by every persisted aggregate.
//!
//! # Responsibility
//! - Hold identity, cursor and the created/modified/deleted timestamps.
//! - Provide the field-update primitive (`Changes`) every aggregate's
//!   `update` is written with, and the `Revision` it returns.
//!
//! # Invariants
//! - `id`, `cursor` and `date_created` never change after construction.
//! - `date_modified >= date_created`; `date_deleted >= date_modified` when set.
//! - One mutating call bumps `date_modified` at most once, and only when at
//!   least one observable field really changed.

use crate::model::cursor::Cursor;
use crate::model::reconcile;
use crate::providers::{stamp, Clock, Providers};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identity and timestamps embedded in every aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    id: Uuid,
    cursor: Cursor,
    date_created: DateTime<Utc>,
    date_modified: DateTime<Utc>,
    date_deleted: Option<DateTime<Utc>>,
}

impl Lifecycle {
    /// Stamps a brand new entity: fresh id, creation instant, cursor.
    pub fn new(providers: &Providers) -> Self {
        let created = stamp(providers.clock());
        Self {
            id: providers.ids().next_id(),
            cursor: providers.cursors().allocate(created),
            date_created: created,
            date_modified: created,
            date_deleted: None,
        }
    }

    /// Rehydrates a lifecycle read back from storage.
    pub fn restore(
        id: Uuid,
        cursor: Cursor,
        date_created: DateTime<Utc>,
        date_modified: DateTime<Utc>,
        date_deleted: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            cursor,
            date_created,
            date_modified,
            date_deleted,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.date_created
    }

    pub fn date_modified(&self) -> DateTime<Utc> {
        self.date_modified
    }

    pub fn date_deleted(&self) -> Option<DateTime<Utc>> {
        self.date_deleted
    }

    pub fn is_deleted(&self) -> bool {
        self.date_deleted.is_some()
    }

    pub(crate) fn touch(&mut self, clock: &dyn Clock) {
        self.date_modified = stamp(clock).max(self.date_modified);
    }

    /// Unconditional: a second call overwrites the previous deletion instant.
    pub(crate) fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.date_deleted = Some(at.max(self.date_modified));
    }
}

/// Result of a mutating call: the new value plus whether it differs from the
/// value the call started with. `is_changed()` is the dirty flag callers use
/// to decide whether to persist.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision<T> {
    value: T,
    changed: bool,
}

impl<T> Revision<T> {
    pub fn new(value: T, changed: bool) -> Self {
        Self { value, changed }
    }

    pub fn unchanged(value: T) -> Self {
        Self {
            value,
            changed: false,
        }
    }

    pub fn changed(value: T) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn into_parts(self) -> (T, bool) {
        (self.value, self.changed)
    }
}

/// Per-call change tracker behind every aggregate `update`.
///
/// Each helper takes the current value and an optional candidate. An absent
/// candidate, or one equal to the current value, keeps the current value and
/// records nothing.
#[derive(Debug, Default)]
pub struct Changes {
    changed: bool,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalar field, exact equality.
    pub fn field<V: PartialEq>(&mut self, current: V, candidate: Option<V>) -> V {
        match candidate {
            Some(candidate) if candidate != current => {
                self.changed = true;
                candidate
            }
            _ => current,
        }
    }

    /// Nullable field. A candidate can set or replace the value but, since
    /// absence means "not supplied", never clear it.
    pub fn optional_field<V: PartialEq>(
        &mut self,
        current: Option<V>,
        candidate: Option<V>,
    ) -> Option<V> {
        match candidate {
            Some(candidate) if current.as_ref() != Some(&candidate) => {
                self.changed = true;
                Some(candidate)
            }
            _ => current,
        }
    }

    /// Collection field compared with set equality: order and duplicates in
    /// the candidate do not count as a change.
    pub fn set_field<V: Ord>(&mut self, current: Vec<V>, candidate: Option<Vec<V>>) -> Vec<V> {
        match candidate {
            Some(candidate) if !same_set(&current, &candidate) => {
                self.changed = true;
                candidate
            }
            _ => current,
        }
    }

    /// Many-to-many reconciliation of `current` toward `proposed` under the
    /// owner's equality rule.
    pub fn reconcile<T: Clone>(
        &mut self,
        current: &mut Vec<T>,
        proposed: &[T],
        same: impl Fn(&T, &T) -> bool,
    ) {
        if reconcile::reconcile(current, proposed, same) {
            self.changed = true;
        }
    }

    pub fn any(&self) -> bool {
        self.changed
    }

    /// Bumps `date_modified` once if anything changed; returns the dirty flag.
    pub(crate) fn commit(self, lifecycle: &mut Lifecycle, clock: &dyn Clock) -> bool {
        if self.changed {
            lifecycle.touch(clock);
        }
        self.changed
    }
}

fn same_set<V: Ord>(left: &[V], right: &[V]) -> bool {
    left.iter().collect::<BTreeSet<_>>() == right.iter().collect::<BTreeSet<_>>()
}

/// Behaviour shared by every aggregate built on `Lifecycle`.
pub trait Entity {
    /// Stable kind name used in logs and summaries.
    const KIND: &'static str;

    fn lifecycle(&self) -> &Lifecycle;

    /// Human-meaningful label for logs.
    fn label(&self) -> Cow<'_, str>;

    /// Soft-deletes the entity and every child it owns by composition.
    fn soft_delete(self, clock: &dyn Clock) -> Revision<Self>
    where
        Self: Sized;

    fn id(&self) -> Uuid {
        self.lifecycle().id()
    }

    fn cursor(&self) -> Cursor {
        self.lifecycle().cursor()
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle().is_deleted()
    }

    /// Minimal projection for logging and auditing.
    fn as_serializable(&self) -> EntitySummary<'_> {
        let lifecycle = self.lifecycle();
        EntitySummary {
            kind: Self::KIND,
            id: lifecycle.id(),
            label: self.label(),
            cursor: lifecycle.cursor(),
            date_created: lifecycle.date_created(),
            date_modified: lifecycle.date_modified(),
            date_deleted: lifecycle.date_deleted(),
        }
    }
}

/// Audit projection of an entity. `Display` renders it as compact JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary<'a> {
    pub kind: &'static str,
    pub id: Uuid,
    pub label: Cow<'a, str>,
    pub cursor: Cursor,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_deleted: Option<DateTime<Utc>>,
}

impl Display for EntitySummary<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&json)
    }
}

/// Deletion instant shared by a parent and the children it cascades to.
pub(crate) fn deletion_instant(clock: &dyn Clock) -> DateTime<Utc> {
    stamp(clock)
}
