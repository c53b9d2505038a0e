//! Scope value and the two equality rules it is reconciled under.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named permission exposed by a resource server.
///
/// Not an entity: no cursor, no soft delete. Held by `ResourceServer` (the
/// catalog) and by `Grant` (the subset a client was given).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub value: String,
    pub description: Option<String>,
    pub resource_server_id: Uuid,
}

impl Scope {
    pub fn new(resource_server_id: Uuid, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
            resource_server_id,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Grant rule: same scope when the values match, ignoring case.
pub fn same_grant_scope(left: &Scope, right: &Scope) -> bool {
    same_value(&left.value, &right.value)
}

/// Catalog rule: values match ignoring case and descriptions match exactly,
/// with a missing description equal to an empty one.
pub fn same_catalog_scope(left: &Scope, right: &Scope) -> bool {
    same_value(&left.value, &right.value)
        && left.description.as_deref().unwrap_or("") == right.description.as_deref().unwrap_or("")
}

fn same_value(left: &str, right: &str) -> bool {
    left == right || left.to_lowercase() == right.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{same_catalog_scope, same_grant_scope, Scope};
    use uuid::Uuid;

    #[test]
    fn grant_rule_ignores_case_and_description() {
        let server = Uuid::from_u128(7);
        let left = Scope::new(server, "read.items").with_description("one");
        let right = Scope::new(server, "READ.ITEMS").with_description("two");
        assert!(same_grant_scope(&left, &right));
    }

    #[test]
    fn catalog_rule_treats_missing_and_empty_description_alike() {
        let server = Uuid::from_u128(7);
        let missing = Scope::new(server, "read");
        let empty = Scope::new(server, "READ").with_description("");
        assert!(same_catalog_scope(&missing, &empty));
    }

    #[test]
    fn catalog_rule_compares_description_case_sensitively() {
        let server = Uuid::from_u128(7);
        let lower = Scope::new(server, "read").with_description("desc");
        let upper = Scope::new(server, "READ").with_description("DESC");
        assert!(!same_catalog_scope(&lower, &upper));
    }
}
