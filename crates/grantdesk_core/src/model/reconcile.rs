//! Set reconciliation for many-to-many collections.
//!
//! The equality rule is a parameter: the same routine serves grant scopes
//! (value only) and resource-server scopes (value and description).

/// Minimal delta turning `current` into `proposed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDelta<T> {
    /// Proposed items with no match in `current`, first occurrence wins.
    pub to_add: Vec<T>,
    /// Items of `current` with no match in `proposed`.
    pub to_remove: Vec<T>,
    remove_positions: Vec<usize>,
}

impl<T> SetDelta<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the add/remove delta between `current` and `proposed`.
pub fn diff<T: Clone>(current: &[T], proposed: &[T], same: impl Fn(&T, &T) -> bool) -> SetDelta<T> {
    let mut to_add: Vec<T> = Vec::new();
    for candidate in proposed {
        let held = current.iter().any(|item| same(candidate, item));
        let queued = to_add.iter().any(|item| same(candidate, item));
        if !held && !queued {
            to_add.push(candidate.clone());
        }
    }

    let mut to_remove = Vec::new();
    let mut remove_positions = Vec::new();
    for (position, item) in current.iter().enumerate() {
        if !proposed.iter().any(|candidate| same(candidate, item)) {
            to_remove.push(item.clone());
            remove_positions.push(position);
        }
    }

    SetDelta {
        to_add,
        to_remove,
        remove_positions,
    }
}

/// Applies the delta to `current` in place: adds first, then removes.
/// Returns `false` and leaves `current` untouched when the sets already match.
pub fn reconcile<T: Clone>(
    current: &mut Vec<T>,
    proposed: &[T],
    same: impl Fn(&T, &T) -> bool,
) -> bool {
    let delta = diff(current.as_slice(), proposed, same);
    if delta.is_empty() {
        return false;
    }

    current.extend(delta.to_add);
    // Positions index the original prefix, which appending does not shift.
    for position in delta.remove_positions.into_iter().rev() {
        current.remove(position);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{diff, reconcile};

    fn same_ignore_case(left: &String, right: &String) -> bool {
        left.to_lowercase() == right.to_lowercase()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn diff_deduplicates_proposed_keeping_first() {
        let delta = diff(&strings(&["a"]), &strings(&["B", "b", "a"]), same_ignore_case);
        assert_eq!(delta.to_add, strings(&["B"]));
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn reconcile_is_noop_for_equivalent_sets() {
        let mut current = strings(&["a", "b"]);
        assert!(!reconcile(&mut current, &strings(&["B", "A"]), same_ignore_case));
        assert_eq!(current, strings(&["a", "b"]));
    }

    #[test]
    fn reconcile_keeps_survivors_in_place_and_appends_additions() {
        let mut current = strings(&["a", "b", "c"]);
        assert!(reconcile(&mut current, &strings(&["d", "c", "a"]), same_ignore_case));
        assert_eq!(current, strings(&["a", "c", "d"]));
    }

    #[test]
    fn reconcile_to_empty_removes_everything() {
        let mut current = strings(&["a", "b"]);
        assert!(reconcile(&mut current, &[], same_ignore_case));
        assert!(current.is_empty());
    }
}
