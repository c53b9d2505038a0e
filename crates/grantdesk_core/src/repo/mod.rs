//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define per-aggregate data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Constructors reject connections whose migrations have not run.
//! - Aggregate writes with composed children commit in one transaction.
//! - Repository APIs return semantic errors (`NotFound`, `CursorConflict`,
//!   `Conflict`) in addition to DB transport errors.

pub mod app_repo;
pub mod client_repo;
pub mod common;
pub mod product_repo;
pub mod resource_server_repo;
