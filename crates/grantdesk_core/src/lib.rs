//! Core of the grantdesk management API.
//! Owns the entity lifecycle substrate, the aggregates built on it, and
//! their SQLite persistence.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod paging;
pub mod providers;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, CursorPolicy, PagingConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::app::{App, AppPatch};
pub use model::client::{Client, ClientPatch, ClientType, NewClient};
pub use model::cursor::{cursor_for, Cursor, CursorAllocator, EpochMicros, MonotonicCursors};
pub use model::grant::Grant;
pub use model::lifecycle::{Changes, Entity, EntitySummary, Lifecycle, Revision};
pub use model::product::{Product, ProductClient, ProductPatch};
pub use model::resource_server::{ResourceServer, ResourceServerPatch};
pub use model::scope::{same_catalog_scope, same_grant_scope, Scope};
pub use paging::{DateFilter, Page, PageRequest};
pub use providers::{
    Clock, IdGenerator, ManualClock, Providers, RandomIds, SequentialIds, SteppingClock,
    SystemClock,
};
pub use repo::common::{RepoError, RepoResult};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
