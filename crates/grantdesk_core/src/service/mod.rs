//! Use-case services over repository implementations.
//!
//! # Responsibility
//! - Run the load, mutate, persist-if-changed cycle for every aggregate.
//! - Normalize page sizes before they reach a repository.
//!
//! # Invariants
//! - A revision with `is_changed() == false` is never written back.
//! - Lookups by id exclude soft-deleted rows.

pub mod app_service;
pub mod client_service;
pub mod product_service;
pub mod resource_server_service;

use crate::model::lifecycle::{Entity, Revision};
use crate::repo::common::{RepoError, RepoResult};
use log::{debug, info};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for management use-cases.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
    /// The use-case would create a second live row for the same pair.
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

pub(crate) fn not_found<T: Entity>(id: Uuid) -> ServiceError {
    ServiceError::NotFound {
        entity: T::KIND,
        id,
    }
}

/// Writes the revision through `write` only when it carries a change.
pub(crate) fn persist_if_changed<T: Entity>(
    revision: Revision<T>,
    event: &str,
    write: impl FnOnce(&T) -> RepoResult<()>,
) -> ServiceResult<Revision<T>> {
    let entity = revision.value();
    if !revision.is_changed() {
        debug!(
            "event={event} module=service status=skipped reason=unchanged kind={} id={}",
            T::KIND,
            entity.id()
        );
        return Ok(revision);
    }

    write(entity)?;
    info!(
        "event={event} module=service status=ok kind={} id={}",
        T::KIND,
        entity.id()
    );
    Ok(revision)
}

pub(crate) fn log_created<T: Entity>(entity: &T) {
    info!(
        "event=entity_create module=service status=ok kind={} id={} cursor={}",
        T::KIND,
        entity.id(),
        entity.cursor()
    );
}
