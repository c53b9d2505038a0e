//! Pagination cursor allocation.
//!
//! # Responsibility
//! - Turn an entity's creation instant into its sortable pagination token.
//!
//! # Invariants
//! - A cursor is assigned once at construction and never reassigned.
//! - Cursors sort consistently with creation order within one table.
//! - `MonotonicCursors` never hands out the same value twice in one process.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Per-row pagination token: microseconds since the Unix epoch.
pub type Cursor = i64;

/// Cursor for an entity created at `created`.
pub fn cursor_for(created: DateTime<Utc>) -> Cursor {
    created.timestamp_micros()
}

/// Allocates the cursor of a freshly constructed entity.
pub trait CursorAllocator: Send + Sync {
    fn allocate(&self, created: DateTime<Utc>) -> Cursor;
}

/// Plain epoch-microsecond cursors. Two entities created in the same
/// microsecond collide and the store's unique index rejects the second.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochMicros;

impl CursorAllocator for EpochMicros {
    fn allocate(&self, created: DateTime<Utc>) -> Cursor {
        cursor_for(created)
    }
}

/// Epoch-microsecond cursors with a strictly increasing fallback: a request
/// that would repeat or precede the last issued value gets `last + 1`.
#[derive(Debug)]
pub struct MonotonicCursors {
    last: AtomicI64,
}

impl Default for MonotonicCursors {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicCursors {
    pub fn new() -> Self {
        Self::resume_after(i64::MIN)
    }

    /// Seeds the allocator with the highest cursor already persisted.
    pub fn resume_after(last: Cursor) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }

    pub fn last_issued(&self) -> Cursor {
        self.last.load(Ordering::Acquire)
    }
}

impl CursorAllocator for MonotonicCursors {
    fn allocate(&self, created: DateTime<Utc>) -> Cursor {
        let wanted = cursor_for(created);
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let next = wanted.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(observed) => last = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{cursor_for, CursorAllocator, EpochMicros, MonotonicCursors};
    use chrono::{TimeDelta, TimeZone, Utc};

    #[test]
    fn cursor_is_microseconds_since_unix_epoch() {
        let instant = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(cursor_for(instant), 1_000_000);
        assert_eq!(EpochMicros.allocate(instant), 1_000_000);
    }

    #[test]
    fn monotonic_cursors_break_same_microsecond_ties() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let cursors = MonotonicCursors::new();

        let first = cursors.allocate(instant);
        let second = cursors.allocate(instant);
        assert_eq!(first, cursor_for(instant));
        assert_eq!(second, first + 1);
    }

    #[test]
    fn monotonic_cursors_follow_the_clock_when_it_is_ahead() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let cursors = MonotonicCursors::new();

        cursors.allocate(instant);
        let later = instant + TimeDelta::seconds(1);
        assert_eq!(cursors.allocate(later), cursor_for(later));
    }

    #[test]
    fn resumed_allocator_never_goes_below_seed() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let seed = cursor_for(instant) + 500;
        let cursors = MonotonicCursors::resume_after(seed);

        assert_eq!(cursors.allocate(instant), seed + 1);
        assert_eq!(cursors.last_issued(), seed + 1);
    }
}
