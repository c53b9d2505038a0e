use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use grantdesk_core::db::open_db_in_memory;
use grantdesk_core::repo::app_repo::SqliteAppRepository;
use grantdesk_core::repo::client_repo::{
    ClientListQuery, ClientRepository, GrantListQuery, SqliteClientRepository,
};
use grantdesk_core::service::app_service::AppService;
use grantdesk_core::service::client_service::{ClientGrantFilter, ClientService};
use grantdesk_core::{
    ClientPatch, ClientType, Entity, ManualClock, MonotonicCursors, NewClient, PageRequest,
    PagingConfig, Providers, RepoError, Scope, SequentialIds, ServiceError,
};
use rusqlite::{params, Connection};
use std::sync::Arc;
use uuid::Uuid;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap()
}

struct Fixture {
    conn: Connection,
    clock: Arc<ManualClock>,
    providers: Providers,
    app_id: Uuid,
    server_ids: [Uuid; 2],
}

impl Fixture {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let providers = Providers::new(
            clock.clone(),
            Arc::new(SequentialIds::default()),
            Arc::new(MonotonicCursors::new()),
        );

        let app_id = {
            let apps = AppService::new(
                SqliteAppRepository::try_new(&conn).unwrap(),
                providers.clone(),
                PagingConfig::default(),
            );
            apps.create_app("storefront", None).unwrap().id()
        };
        let server_ids = [Uuid::from_u128(0xA1), Uuid::from_u128(0xA2)];
        for (index, id) in server_ids.iter().enumerate() {
            conn.execute(
                "INSERT INTO resource_servers
                    (id, name, identifier, cursor, date_created, date_modified)
                 VALUES (?1, ?2, ?3, ?4, 0, 0);",
                params![
                    id.to_string(),
                    format!("server-{index}"),
                    format!("https://api-{index}.example"),
                    index as i64,
                ],
            )
            .unwrap();
        }

        Self {
            conn,
            clock,
            providers,
            app_id,
            server_ids,
        }
    }

    fn service(&self) -> ClientService<SqliteClientRepository<'_>> {
        ClientService::new(
            SqliteClientRepository::try_new(&self.conn).unwrap(),
            self.providers.clone(),
            PagingConfig::default(),
        )
    }

    fn new_client(&self, name: &str) -> NewClient {
        NewClient {
            app_id: self.app_id,
            name: name.to_string(),
            description: Some(format!("{name} client")),
            client_type: ClientType::Regular,
            callbacks: vec![format!("https://{name}.example/callback")],
            allowed_origins: Vec::new(),
        }
    }

    fn date_modified(&self, table: &str, id: Uuid) -> i64 {
        self.conn
            .query_row(
                &format!("SELECT date_modified FROM {table} WHERE id = ?1;"),
                params![id.to_string()],
                |row| row.get(0),
            )
            .unwrap()
    }
}

#[test]
fn created_client_round_trips_through_storage() {
    let fixture = Fixture::new();
    let service = fixture.service();

    let created = service.create_client(fixture.new_client("portal")).unwrap();
    let loaded = service.get_client(created.id()).unwrap();

    assert_eq!(loaded, created);
    assert_eq!(loaded.client_type(), ClientType::Regular);
    assert_eq!(
        loaded.callbacks(),
        ["https://portal.example/callback".to_string()]
    );
}

#[test]
fn unchanged_update_is_not_written() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let created = service.create_client(fixture.new_client("portal")).unwrap();
    fixture.clock.advance(TimeDelta::minutes(5));

    let revision = service
        .update_client(
            created.id(),
            ClientPatch {
                name: Some("portal".to_string()),
                callbacks: Some(created.callbacks().to_vec()),
                ..ClientPatch::default()
            },
        )
        .unwrap();

    assert!(!revision.is_changed());
    assert_eq!(
        fixture.date_modified("clients", created.id()),
        start().timestamp_micros()
    );
}

#[test]
fn changed_update_is_persisted() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let created = service.create_client(fixture.new_client("portal")).unwrap();
    fixture.clock.advance(TimeDelta::minutes(5));

    let revision = service
        .update_client(
            created.id(),
            ClientPatch {
                allowed_origins: Some(vec!["https://portal.example".to_string()]),
                external_id: Some("idp|portal".to_string()),
                ..ClientPatch::default()
            },
        )
        .unwrap();
    assert!(revision.is_changed());

    let loaded = service.get_client(created.id()).unwrap();
    assert_eq!(loaded.external_id(), Some("idp|portal"));
    assert_eq!(
        loaded.allowed_origins(),
        ["https://portal.example".to_string()]
    );
    assert_eq!(
        loaded.lifecycle().date_modified(),
        start() + TimeDelta::minutes(5)
    );
}

#[test]
fn grant_scopes_are_persisted_and_reconciled() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let server = fixture.server_ids[0];
    let client = service.create_client(fixture.new_client("portal")).unwrap();

    let grant = service
        .create_grant(
            client.id(),
            server,
            vec![Scope::new(server, "a"), Scope::new(server, "b")],
        )
        .unwrap();
    fixture.clock.advance(TimeDelta::seconds(10));

    let same = service
        .set_grant_scopes(grant.id(), &[Scope::new(server, "B"), Scope::new(server, "A")])
        .unwrap();
    assert!(!same.is_changed());
    assert_eq!(
        fixture.date_modified("grants", grant.id()),
        start().timestamp_micros()
    );

    let changed = service
        .set_grant_scopes(grant.id(), &[Scope::new(server, "b"), Scope::new(server, "c")])
        .unwrap();
    assert!(changed.is_changed());

    let loaded = service.get_grant(grant.id()).unwrap();
    let mut values: Vec<&str> = loaded.scopes().iter().map(|s| s.value.as_str()).collect();
    values.sort_unstable();
    assert_eq!(values, vec!["b", "c"]);
    assert_eq!(
        loaded.lifecycle().date_modified(),
        start() + TimeDelta::seconds(10)
    );
}

#[test]
fn second_live_grant_for_the_same_pair_is_a_conflict() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let server = fixture.server_ids[0];
    let client = service.create_client(fixture.new_client("portal")).unwrap();
    service.create_grant(client.id(), server, Vec::new()).unwrap();

    let err = service
        .create_grant(client.id(), server, Vec::new())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[test]
fn deleting_a_client_cascades_to_stored_grants() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let client = service.create_client(fixture.new_client("portal")).unwrap();
    let grants: Vec<Uuid> = fixture
        .server_ids
        .iter()
        .map(|server| {
            service
                .create_grant(client.id(), *server, vec![Scope::new(*server, "read")])
                .unwrap()
                .id()
        })
        .collect();
    fixture.clock.advance(TimeDelta::hours(1));

    let revision = service.delete_client(client.id()).unwrap();
    assert!(revision.is_changed());

    let deleted_at = (start() + TimeDelta::hours(1)).timestamp_micros();
    for grant in &grants {
        let stored: Option<i64> = fixture
            .conn
            .query_row(
                "SELECT date_deleted FROM grants WHERE id = ?1;",
                params![grant.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, Some(deleted_at));
    }

    assert!(matches!(
        service.get_client(client.id()),
        Err(ServiceError::NotFound { entity: "client", .. })
    ));
    let repo = SqliteClientRepository::try_new(&fixture.conn).unwrap();
    let tombstone = repo.get_client(client.id(), true).unwrap().unwrap();
    assert!(tombstone.is_deleted());
    assert!(tombstone.grants().is_empty());
}

#[test]
fn deleted_client_name_can_be_reused() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let first = service.create_client(fixture.new_client("portal")).unwrap();

    let duplicate = service.create_client(fixture.new_client("PORTAL")).unwrap_err();
    assert!(matches!(
        duplicate,
        ServiceError::Repo(RepoError::Conflict(_))
    ));

    fixture.clock.advance(TimeDelta::seconds(1));
    service.delete_client(first.id()).unwrap();
    let second = service.create_client(fixture.new_client("portal")).unwrap();
    assert_ne!(first.id(), second.id());
}

#[test]
fn client_list_pages_by_cursor_and_filters() {
    let fixture = Fixture::new();
    let service = fixture.service();
    for name in ["alpha", "beta", "gamma", "delta", "epsilon"] {
        service.create_client(fixture.new_client(name)).unwrap();
        fixture.clock.advance(TimeDelta::seconds(1));
    }

    let query = ClientListQuery {
        app_id: Some(fixture.app_id),
        ..ClientListQuery::default()
    };
    let first = service
        .list_clients(
            &query,
            PageRequest {
                cursor: None,
                page_size: Some(2),
            },
        )
        .unwrap();
    let names: Vec<&str> = first.items.iter().map(|client| client.name()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);

    let rest = service
        .list_clients(
            &query,
            PageRequest {
                cursor: first.next_cursor,
                page_size: None,
            },
        )
        .unwrap();
    let names: Vec<&str> = rest.items.iter().map(|client| client.name()).collect();
    assert_eq!(names, vec!["gamma", "delta", "epsilon"]);
    assert_eq!(rest.next_cursor, rest.items.last().map(|client| client.cursor()));

    let filtered = service
        .list_clients(
            &ClientListQuery {
                name: Some("LTA".to_string()),
                ..ClientListQuery::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    let names: Vec<&str> = filtered.items.iter().map(|client| client.name()).collect();
    assert_eq!(names, vec!["delta"]);
}

#[test]
fn grants_list_in_storage_and_in_memory_agree() {
    let fixture = Fixture::new();
    let service = fixture.service();
    let client = service.create_client(fixture.new_client("portal")).unwrap();
    for server in fixture.server_ids {
        service.create_grant(client.id(), server, Vec::new()).unwrap();
        fixture.clock.advance(TimeDelta::seconds(1));
    }

    let stored = service
        .list_grants(
            &GrantListQuery {
                client_id: Some(client.id()),
                resource_server_id: Some(fixture.server_ids[1]),
                ..GrantListQuery::default()
            },
            PageRequest::default(),
        )
        .unwrap();
    let in_memory = service
        .list_client_grants(
            client.id(),
            &ClientGrantFilter {
                resource_server_id: Some(fixture.server_ids[1]),
                ..ClientGrantFilter::default()
            },
            PageRequest::default(),
        )
        .unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored, in_memory);
}
