//! Injectable sources of "now" and fresh identifiers.
//!
//! # Responsibility
//! - Supply the instant and id an entity is stamped with at construction.
//! - Ship deterministic fakes so lifecycle tests never depend on wall time.
//!
//! # Invariants
//! - Providers are passed explicitly; nothing in core reads ambient state.
//! - Lifecycle instants are truncated to microseconds (storage precision).

use crate::config::CursorPolicy;
use crate::model::cursor::{Cursor, CursorAllocator, EpochMicros, MonotonicCursors};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of fresh entity identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *lock(&self.now) = instant;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = lock(&self.now);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Clock whose every read returns the current value and then advances by
/// `step`, so consecutive reads are strictly increasing.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
    step: TimeDelta,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: TimeDelta) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = lock(&self.next);
        let current = *next;
        *next = current + self.step;
        current
    }
}

/// Ids `00000000-0000-0000-0000-000000000001`, `...02`, and so on.
#[derive(Debug, Default)]
pub struct SequentialIds {
    last: Mutex<u128>,
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> Uuid {
        let mut last = lock(&self.last);
        *last += 1;
        Uuid::from_u128(*last)
    }
}

/// Bundle of the providers an entity constructor needs.
#[derive(Clone)]
pub struct Providers {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    cursors: Arc<dyn CursorAllocator>,
}

impl Providers {
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        cursors: Arc<dyn CursorAllocator>,
    ) -> Self {
        Self {
            clock,
            ids,
            cursors,
        }
    }

    /// Production providers for the given cursor policy.
    pub fn system(policy: CursorPolicy) -> Self {
        Self::system_resuming(policy, None)
    }

    /// Production providers whose monotonic allocator continues after the
    /// highest cursor already persisted.
    pub fn system_resuming(policy: CursorPolicy, last: Option<Cursor>) -> Self {
        let cursors: Arc<dyn CursorAllocator> = match (policy, last) {
            (CursorPolicy::EpochMicros, _) => Arc::new(EpochMicros),
            (CursorPolicy::Monotonic, None) => Arc::new(MonotonicCursors::new()),
            (CursorPolicy::Monotonic, Some(last)) => Arc::new(MonotonicCursors::resume_after(last)),
        };
        Self::new(Arc::new(SystemClock), Arc::new(RandomIds), cursors)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    pub fn cursors(&self) -> &dyn CursorAllocator {
        self.cursors.as_ref()
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}

/// Reads `clock` at the precision lifecycle columns are stored with.
pub fn stamp(clock: &dyn Clock) -> DateTime<Utc> {
    clock.now().trunc_subsecs(6)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::{stamp, Clock, IdGenerator, ManualClock, SequentialIds, SteppingClock};
    use chrono::{TimeDelta, TimeZone, Timelike, Utc};
    use uuid::Uuid;

    #[test]
    fn stepping_clock_advances_after_each_read() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = SteppingClock::new(start, TimeDelta::seconds(2));

        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + TimeDelta::seconds(2));
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), clock.now());

        clock.advance(TimeDelta::milliseconds(5));
        assert_eq!(clock.now(), start + TimeDelta::milliseconds(5));
    }

    #[test]
    fn sequential_ids_start_at_one() {
        let ids = SequentialIds::default();
        assert_eq!(ids.next_id(), Uuid::from_u128(1));
        assert_eq!(ids.next_id(), Uuid::from_u128(2));
    }

    #[test]
    fn stamp_truncates_to_microseconds() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + TimeDelta::nanoseconds(1_234_567);
        let clock = ManualClock::new(instant);

        assert_eq!(stamp(&clock).nanosecond(), 1_234_000);
    }
}
