//! In-memory filter pipeline over owned collections of entities.
//!
//! Every filter takes the collection by value. An absent filter value hands
//! the very same `Vec` back (same allocation), so "no filter applied" is
//! observable by identity as well as by content.

use crate::model::cursor::Cursor;
use crate::model::lifecycle::Entity;
use crate::paging::{fold_case, DateFilter, Page};
use chrono::{DateTime, Utc};

/// Drops soft-deleted entities unless `include_deleted`.
pub fn apply_live_filter<T: Entity>(items: Vec<T>, include_deleted: bool) -> Vec<T> {
    if include_deleted {
        return items;
    }
    items.into_iter().filter(|item| !item.is_deleted()).collect()
}

/// Keeps entities created after the one holding `cursor`.
pub fn apply_cursor_filter<T: Entity>(items: Vec<T>, cursor: Option<Cursor>) -> Vec<T> {
    match cursor {
        None => items,
        Some(cursor) => items
            .into_iter()
            .filter(|item| item.cursor() > cursor)
            .collect(),
    }
}

/// Exact match on a copyable key such as a foreign id.
pub fn apply_eq_filter<T, V: PartialEq>(
    items: Vec<T>,
    value: Option<V>,
    key: impl Fn(&T) -> V,
) -> Vec<T> {
    match value {
        None => items,
        Some(value) => items.into_iter().filter(|item| key(item) == value).collect(),
    }
}

/// Exact, case-sensitive match on a text column.
pub fn apply_text_eq_filter<T>(
    items: Vec<T>,
    value: Option<&str>,
    field: impl Fn(&T) -> &str,
) -> Vec<T> {
    match value {
        None => items,
        Some(value) => items
            .into_iter()
            .filter(|item| field(item) == value)
            .collect(),
    }
}

/// Case-insensitive substring match on a nullable text column. Entities
/// whose column is null never match.
pub fn apply_text_filter<T>(
    items: Vec<T>,
    needle: Option<&str>,
    field: impl Fn(&T) -> Option<&str>,
) -> Vec<T> {
    match needle {
        None => items,
        Some(needle) => {
            let needle = fold_case(needle);
            items
                .into_iter()
                .filter(|item| field(item).is_some_and(|text| fold_case(text).contains(&needle)))
                .collect()
        }
    }
}

/// `date_created >= from`.
pub fn apply_created_from<T: Entity>(items: Vec<T>, from: Option<DateTime<Utc>>) -> Vec<T> {
    match from {
        None => items,
        Some(from) => items
            .into_iter()
            .filter(|item| item.lifecycle().date_created() >= from)
            .collect(),
    }
}

/// `date_created < to`.
pub fn apply_created_to<T: Entity>(items: Vec<T>, to: Option<DateTime<Utc>>) -> Vec<T> {
    match to {
        None => items,
        Some(to) => items
            .into_iter()
            .filter(|item| item.lifecycle().date_created() < to)
            .collect(),
    }
}

/// `date_modified >= from`.
pub fn apply_modified_from<T: Entity>(items: Vec<T>, from: Option<DateTime<Utc>>) -> Vec<T> {
    match from {
        None => items,
        Some(from) => items
            .into_iter()
            .filter(|item| item.lifecycle().date_modified() >= from)
            .collect(),
    }
}

/// `date_modified < to`.
pub fn apply_modified_to<T: Entity>(items: Vec<T>, to: Option<DateTime<Utc>>) -> Vec<T> {
    match to {
        None => items,
        Some(to) => items
            .into_iter()
            .filter(|item| item.lifecycle().date_modified() < to)
            .collect(),
    }
}

pub fn apply_date_filter<T: Entity>(items: Vec<T>, dates: &DateFilter) -> Vec<T> {
    let items = apply_created_from(items, dates.created_from);
    let items = apply_created_to(items, dates.created_to);
    let items = apply_modified_from(items, dates.modified_from);
    apply_modified_to(items, dates.modified_to)
}

/// Orders by cursor ascending and keeps the first `page_size` entities.
pub fn take_page<T: Entity>(mut items: Vec<T>, page_size: u32) -> Page<T> {
    items.sort_by_key(Entity::cursor);
    items.truncate(page_size as usize);
    Page::from_items(items)
}

#[cfg(test)]
mod tests {
    use super::{apply_eq_filter, apply_text_eq_filter, apply_text_filter};

    #[test]
    fn absent_values_return_the_same_allocation() {
        let items = vec![(1, "a"), (2, "b")];
        let before = items.as_ptr();

        let items = apply_eq_filter(items, None::<i32>, |item| item.0);
        let items = apply_text_eq_filter(items, None, |item| item.1);
        let items = apply_text_filter(items, None, |item| Some(item.1));
        assert_eq!(items.as_ptr(), before);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn text_filter_is_case_insensitive_contains_and_skips_nulls() {
        let items = vec![(1, Some("Billing API")), (2, None), (3, Some("search"))];
        let kept = apply_text_filter(items, Some("API"), |item| item.1);
        assert_eq!(kept, vec![(1, Some("Billing API"))]);
    }
}
