use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use grantdesk_core::{
    cursor_for, App, CursorAllocator, EpochMicros, Entity, ManualClock, MonotonicCursors,
    Providers, SequentialIds,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()
}

#[test]
fn cursors_follow_creation_order() {
    let t1 = start();
    let t2 = t1 + TimeDelta::microseconds(1);
    assert!(cursor_for(t1) < cursor_for(t2));

    let clock = Arc::new(ManualClock::new(t1));
    let providers = Providers::new(
        clock.clone(),
        Arc::new(SequentialIds::default()),
        Arc::new(EpochMicros),
    );
    let first = App::new(&providers, "first", None);
    clock.advance(TimeDelta::milliseconds(3));
    let second = App::new(&providers, "second", None);

    assert!(first.cursor() < second.cursor());
    assert_eq!(second.cursor() - first.cursor(), 3_000);
}

#[test]
fn epoch_policy_collides_within_one_microsecond() {
    let clock = Arc::new(ManualClock::new(start()));
    let providers = Providers::new(
        clock,
        Arc::new(SequentialIds::default()),
        Arc::new(EpochMicros),
    );

    let first = App::new(&providers, "first", None);
    let second = App::new(&providers, "second", None);
    assert_eq!(first.cursor(), second.cursor());
    assert_ne!(first.id(), second.id());
}

#[test]
fn monotonic_policy_separates_same_instant_creates() {
    let clock = Arc::new(ManualClock::new(start()));
    let providers = Providers::new(
        clock.clone(),
        Arc::new(SequentialIds::default()),
        Arc::new(MonotonicCursors::new()),
    );

    let first = App::new(&providers, "first", None);
    let second = App::new(&providers, "second", None);
    assert_eq!(first.cursor(), cursor_for(start()));
    assert_eq!(second.cursor(), first.cursor() + 1);

    clock.advance(TimeDelta::seconds(1));
    let third = App::new(&providers, "third", None);
    assert_eq!(third.cursor(), cursor_for(start() + TimeDelta::seconds(1)));
}

#[test]
fn monotonic_policy_resumes_after_persisted_cursor() {
    let allocator = MonotonicCursors::resume_after(cursor_for(start()) + 10);

    assert_eq!(allocator.allocate(start()), cursor_for(start()) + 11);
    assert_eq!(allocator.last_issued(), cursor_for(start()) + 11);
}

#[test]
fn monotonic_policy_is_unique_across_threads() {
    let allocator = Arc::new(MonotonicCursors::new());
    let instant = start();

    let issued: Vec<i64> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                scope.spawn(move || {
                    (0..250)
                        .map(|_| allocator.allocate(instant))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .collect()
    });

    let unique: BTreeSet<i64> = issued.iter().copied().collect();
    assert_eq!(unique.len(), 1_000);
    assert_eq!(unique.first().copied(), Some(cursor_for(instant)));
    assert_eq!(unique.last().copied(), Some(cursor_for(instant) + 999));
}
