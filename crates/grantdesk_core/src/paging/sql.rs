//! SQL rendering of the list filter pipeline.
//!
//! Mirrors `paging::filter`: every method with an absent value appends
//! nothing. Column names are `&'static str` so only code-defined identifiers
//! reach the statement text; values are always bound parameters.

use crate::model::cursor::Cursor;
use crate::paging::{fold_case, DateFilter};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use uuid::Uuid;

/// Scalar function applying `paging::fold_case` inside SQLite. The builtin
/// `lower()` folds ASCII only.
pub const FOLD_CASE_FN: &str = "fold_case";

/// List statement under construction.
#[derive(Debug, Clone)]
pub struct ListSql {
    sql: String,
    binds: Vec<Value>,
}

impl ListSql {
    /// Starts from a `SELECT ... FROM table` without a `WHERE` clause.
    pub fn select(base: &str) -> Self {
        Self {
            sql: format!("{base} WHERE 1 = 1"),
            binds: Vec::new(),
        }
    }

    pub fn live_only(mut self, include_deleted: bool) -> Self {
        if !include_deleted {
            self.sql.push_str(" AND date_deleted IS NULL");
        }
        self
    }

    pub fn cursor_after(self, cursor: Option<Cursor>) -> Self {
        match cursor {
            None => self,
            Some(cursor) => self.push(" AND cursor > ?", Value::Integer(cursor)),
        }
    }

    pub fn eq_uuid(self, column: &'static str, value: Option<Uuid>) -> Self {
        match value {
            None => self,
            Some(value) => self.push(
                &format!(" AND {column} = ?"),
                Value::Text(value.to_string()),
            ),
        }
    }

    pub fn eq_text(self, column: &'static str, value: Option<&str>) -> Self {
        match value {
            None => self,
            Some(value) => self.push(&format!(" AND {column} = ?"), Value::Text(value.to_string())),
        }
    }

    /// Case-insensitive substring match; null columns never match.
    /// Requires the connection to carry `FOLD_CASE_FN`.
    pub fn contains(self, column: &'static str, needle: Option<&str>) -> Self {
        match needle {
            None => self,
            Some(needle) => self.push(
                &format!(" AND instr({FOLD_CASE_FN}({column}), ?) > 0"),
                Value::Text(fold_case(needle)),
            ),
        }
    }

    pub fn dates(self, dates: &DateFilter) -> Self {
        self.bound("date_created", ">=", dates.created_from)
            .bound("date_created", "<", dates.created_to)
            .bound("date_modified", ">=", dates.modified_from)
            .bound("date_modified", "<", dates.modified_to)
    }

    /// Finishes the statement: `ORDER BY cursor ASC LIMIT page_size`.
    pub fn page(mut self, page_size: u32) -> (String, Vec<Value>) {
        self.sql.push_str(" ORDER BY cursor ASC LIMIT ?");
        self.binds.push(Value::Integer(i64::from(page_size)));
        (self.sql, self.binds)
    }

    fn bound(self, column: &'static str, op: &'static str, value: Option<DateTime<Utc>>) -> Self {
        match value {
            None => self,
            Some(value) => self.push(
                &format!(" AND {column} {op} ?"),
                Value::Integer(value.timestamp_micros()),
            ),
        }
    }

    fn push(mut self, fragment: &str, value: Value) -> Self {
        self.sql.push_str(fragment);
        self.binds.push(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::ListSql;
    use crate::paging::DateFilter;
    use chrono::{TimeZone, Utc};
    use rusqlite::types::Value;

    #[test]
    fn absent_filters_add_nothing() {
        let (sql, binds) = ListSql::select("SELECT id FROM apps")
            .live_only(true)
            .cursor_after(None)
            .eq_uuid("app_id", None)
            .contains("name", None)
            .dates(&DateFilter::default())
            .page(10);

        assert_eq!(
            sql,
            "SELECT id FROM apps WHERE 1 = 1 ORDER BY cursor ASC LIMIT ?"
        );
        assert_eq!(binds, vec![Value::Integer(10)]);
    }

    #[test]
    fn present_filters_bind_in_order() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let dates = DateFilter {
            created_from: Some(from),
            ..DateFilter::default()
        };
        let (sql, binds) = ListSql::select("SELECT id FROM apps")
            .live_only(false)
            .cursor_after(Some(42))
            .contains("name", Some("Api"))
            .dates(&dates)
            .page(5);

        assert_eq!(
            sql,
            "SELECT id FROM apps WHERE 1 = 1 AND date_deleted IS NULL AND cursor > ? \
             AND instr(fold_case(name), ?) > 0 AND date_created >= ? ORDER BY cursor ASC LIMIT ?"
        );
        assert_eq!(
            binds,
            vec![
                Value::Integer(42),
                Value::Text("api".to_string()),
                Value::Integer(from.timestamp_micros()),
                Value::Integer(5),
            ]
        );
    }
}
