use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use grantdesk_core::{
    Entity, Grant, ManualClock, MonotonicCursors, Providers, ResourceServer, Scope, SequentialIds,
    SteppingClock,
};
use std::sync::Arc;
use uuid::Uuid;

const RESOURCE_SERVER: Uuid = Uuid::from_u128(500);
const CLIENT: Uuid = Uuid::from_u128(400);

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap()
}

fn providers_with(clock: Arc<dyn grantdesk_core::Clock>) -> Providers {
    Providers::new(
        clock,
        Arc::new(SequentialIds::default()),
        Arc::new(MonotonicCursors::new()),
    )
}

fn scope(value: &str) -> Scope {
    Scope::new(RESOURCE_SERVER, value)
}

fn values(scopes: &[Scope]) -> Vec<&str> {
    scopes.iter().map(|scope| scope.value.as_str()).collect()
}

#[test]
fn grant_with_same_set_in_any_order_is_a_no_op() {
    let clock = Arc::new(ManualClock::new(start()));
    let grant = Grant::new(
        &providers_with(clock.clone()),
        CLIENT,
        RESOURCE_SERVER,
        vec![scope("a"), scope("b")],
    );
    clock.advance(TimeDelta::minutes(1));

    let revision = grant.clone().set_scopes(&[scope("b"), scope("a")], clock.as_ref());
    assert!(!revision.is_changed());
    assert_eq!(revision.value(), &grant);
}

#[test]
fn grant_add_and_remove_lands_on_the_proposed_set_with_one_bump() {
    let clock = Arc::new(SteppingClock::new(start(), TimeDelta::seconds(1)));
    let grant = Grant::new(
        &providers_with(clock.clone()),
        CLIENT,
        RESOURCE_SERVER,
        vec![scope("a"), scope("b")],
    );

    let revision = grant.set_scopes(&[scope("b"), scope("c")], clock.as_ref());
    assert!(revision.is_changed());

    let mut held = values(revision.value().scopes());
    held.sort_unstable();
    assert_eq!(held, vec!["b", "c"]);
    assert_eq!(
        revision.value().lifecycle().date_modified(),
        start() + TimeDelta::seconds(1)
    );
}

#[test]
fn grant_scope_values_compare_case_insensitively() {
    let clock = Arc::new(ManualClock::new(start()));
    let grant = Grant::new(
        &providers_with(clock.clone()),
        CLIENT,
        RESOURCE_SERVER,
        vec![scope("read.items")],
    );

    let revision = grant.set_scopes(&[scope("READ.ITEMS")], clock.as_ref());
    assert!(!revision.is_changed());
    assert_eq!(values(revision.value().scopes()), vec!["read.items"]);
}

#[test]
fn grant_construction_keeps_first_of_duplicate_values() {
    let clock = Arc::new(ManualClock::new(start()));
    let grant = Grant::new(
        &providers_with(clock),
        CLIENT,
        RESOURCE_SERVER,
        vec![scope("Read"), scope("read"), scope("write")],
    );

    assert_eq!(values(grant.scopes()), vec!["Read", "write"]);
}

#[test]
fn grant_scopes_are_owned_by_the_grant_resource_server() {
    let clock = Arc::new(ManualClock::new(start()));
    let foreign = Uuid::from_u128(999);
    let grant = Grant::new(
        &providers_with(clock.clone()),
        CLIENT,
        RESOURCE_SERVER,
        vec![Scope::new(foreign, "read").with_description("Read items")],
    );
    assert_eq!(grant.scopes()[0].resource_server_id, RESOURCE_SERVER);
    assert_eq!(grant.scopes()[0].description, None);

    clock.advance(TimeDelta::seconds(1));
    let revision = grant.set_scopes(
        &[Scope::new(foreign, "read"), Scope::new(Uuid::nil(), "write")],
        clock.as_ref(),
    );
    assert!(revision.is_changed());
    assert!(revision
        .value()
        .scopes()
        .iter()
        .all(|scope| scope.resource_server_id == RESOURCE_SERVER));
}

#[test]
fn catalog_description_case_change_is_remove_plus_add() {
    let clock = Arc::new(ManualClock::new(start()));
    let server = ResourceServer::new(
        &providers_with(clock.clone()),
        "Orders API",
        "https://orders.example",
        None,
        vec![scope("read").with_description("desc")],
    );
    clock.advance(TimeDelta::seconds(30));

    let proposed = Scope::new(Uuid::nil(), "READ").with_description("DESC");
    let revision = server.set_scopes(&[proposed], clock.as_ref());
    assert!(revision.is_changed());

    let server = revision.into_inner();
    assert_eq!(server.scopes().len(), 1);
    assert_eq!(server.scopes()[0].value, "READ");
    assert_eq!(server.scopes()[0].description.as_deref(), Some("DESC"));
    assert_eq!(server.scopes()[0].resource_server_id, server.id());
    assert_eq!(
        server.lifecycle().date_modified(),
        start() + TimeDelta::seconds(30)
    );
}

#[test]
fn catalog_treats_missing_and_empty_description_alike() {
    let clock = Arc::new(ManualClock::new(start()));
    let server = ResourceServer::new(
        &providers_with(clock.clone()),
        "Orders API",
        "https://orders.example",
        None,
        vec![scope("read"), scope("write").with_description("Write orders")],
    );

    let revision = server.set_scopes(
        &[
            scope("WRITE").with_description("Write orders"),
            scope("Read").with_description(""),
        ],
        clock.as_ref(),
    );
    assert!(!revision.is_changed());
}

#[test]
fn catalog_keeps_both_variants_proposed_together() {
    let clock = Arc::new(ManualClock::new(start()));
    let server = ResourceServer::new(
        &providers_with(clock.clone()),
        "Orders API",
        "https://orders.example",
        None,
        vec![scope("read").with_description("old")],
    );

    let revision = server.set_scopes(
        &[
            scope("read").with_description("old"),
            scope("read").with_description("new"),
        ],
        clock.as_ref(),
    );
    assert!(revision.is_changed());

    let descriptions: Vec<Option<&str>> = revision
        .value()
        .scopes()
        .iter()
        .map(|scope| scope.description.as_deref())
        .collect();
    assert_eq!(descriptions, vec![Some("old"), Some("new")]);
}
