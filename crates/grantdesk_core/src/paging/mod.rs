//! Cursor-based pagination shared by every list query.
//!
//! # Responsibility
//! - Define the page request/response shapes and the shared date filter.
//! - Provide the same filter pipeline in memory (`filter`) and as SQL
//!   (`sql`), so repositories and in-memory callers agree on semantics.
//!
//! # Invariants
//! - Pages are ordered by `cursor ASC` and hold at most `page_size` items.
//! - `next_cursor` is the largest cursor in the page, `None` when empty.
//! - Date ranges are from-inclusive, to-exclusive.

pub mod filter;
pub mod sql;

use crate::model::cursor::Cursor;
use crate::model::lifecycle::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position and size requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Exclusive lower bound: only entities with `cursor > this` are returned.
    pub cursor: Option<Cursor>,
    pub page_size: Option<u32>,
}

/// Shared created/modified range filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub modified_from: Option<DateTime<Utc>>,
    pub modified_to: Option<DateTime<Utc>>,
}

/// One page of entities plus the token for the next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T: Entity> Page<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        let next_cursor = items.iter().map(Entity::cursor).max();
        Self { items, next_cursor }
    }
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Case folding shared by the in-memory text filter and the `fold_case`
/// SQL function registered on every opened connection.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
