//! Domain model: the lifecycle substrate and the aggregates built on it.
//!
//! # Responsibility
//! - Define every persisted aggregate as a `Lifecycle` plus business fields.
//! - Keep all state transitions pure and in-memory.
//!
//! # Invariants
//! - Mutations consume the aggregate and return a `Revision` carrying the
//!   changed flag; no-op calls return `is_changed() == false`.
//! - Deletion is a `date_deleted` tombstone, never a hard delete.

pub mod app;
pub mod client;
pub mod cursor;
pub mod grant;
pub mod lifecycle;
pub mod product;
pub mod reconcile;
pub mod resource_server;
pub mod scope;
