//! Behavioural tests of the checkout, fencing and expiry protocol, run against the
//! in-memory store.

use std::sync::Arc;

use sessionstate_seaorm_store::{
    DocumentStore, Error, LockingProtocol, MemoryStore, RecordFilter, SessionItems,
    SessionRecord, SessionStateActions, SessionStateConfig, SessionStateStore,
};
use time::{Duration, OffsetDateTime};

const APP: &str = "/shop";

fn sessions() -> SessionStateStore<MemoryStore> {
    SessionStateStore::new(
        MemoryStore::new(),
        SessionStateConfig::default().with_application_name(APP),
    )
}

async fn stored(sessions: &SessionStateStore<MemoryStore>, id: &str) -> Option<SessionRecord> {
    sessions
        .store()
        .find_one(&RecordFilter::by_key(id, APP))
        .await
        .unwrap()
}

async fn save_new(sessions: &SessionStateStore<MemoryStore>, id: &str, items: SessionItems) {
    let mut data = sessions.create_new_data(20);
    data.items = items;
    sessions
        .set_and_release_item(id, &data, 0, true)
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exclusive_fetches_have_a_single_winner() {
    let sessions = Arc::new(sessions());
    save_new(&sessions, "s1", SessionItems::new()).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let sessions = Arc::clone(&sessions);
        handles.push(tokio::spawn(async move {
            sessions.get_item_exclusive("s1").await.unwrap()
        }));
    }

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        let fetched = handle.await.unwrap();
        if fetched.locked {
            assert!(fetched.data.is_none());
            losers += 1;
        } else {
            assert!(fetched.data.is_some());
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(losers, 15);
}

#[tokio::test]
async fn each_acquisition_advances_the_token_by_one() {
    let sessions = sessions();
    save_new(&sessions, "s1", SessionItems::new()).await;

    let mut previous = None;
    for _ in 0..5 {
        let fetched = sessions.get_item_exclusive("s1").await.unwrap();
        let lock_id = fetched.lock_id.unwrap();
        if let Some(previous) = previous {
            assert_eq!(lock_id, previous + 1);
        }
        sessions.release_item_exclusive("s1", lock_id).await.unwrap();
        previous = Some(lock_id);
    }
}

#[tokio::test]
async fn losing_fetch_reports_holder_token_and_lock_age() {
    let sessions = sessions();
    save_new(&sessions, "s1", SessionItems::new()).await;

    let ninety_seconds_ago = OffsetDateTime::now_utc() - Duration::seconds(90);
    let protocol = LockingProtocol::new(sessions.store(), APP);
    assert!(protocol.acquire("s1", ninety_seconds_ago).await.unwrap());

    let fetched = sessions.get_item_exclusive("s1").await.unwrap();
    assert!(fetched.locked);
    assert!(fetched.data.is_none());
    assert_eq!(fetched.lock_id, Some(0));
    assert!(fetched.lock_age >= Duration::seconds(90));
}

#[tokio::test]
async fn read_only_fetch_of_locked_session_returns_no_data() {
    let sessions = sessions();
    save_new(&sessions, "s1", SessionItems::new()).await;
    let holder = sessions.get_item_exclusive("s1").await.unwrap();

    let reader = sessions.get_item("s1").await.unwrap();
    assert!(reader.locked);
    assert!(reader.data.is_none());
    assert_eq!(stored(&sessions, "s1").await.unwrap().lock_id, holder.lock_id.unwrap());
}

#[tokio::test]
async fn save_with_superseded_token_changes_nothing() {
    let sessions = sessions();
    let mut items = SessionItems::new();
    items.insert("owner", "nobody");
    save_new(&sessions, "s1", items).await;

    let first = sessions.get_item_exclusive("s1").await.unwrap();
    let first_token = first.lock_id.unwrap();
    sessions
        .release_item_exclusive("s1", first_token)
        .await
        .unwrap();

    let second = sessions.get_item_exclusive("s1").await.unwrap();
    let second_token = second.lock_id.unwrap();
    assert!(second_token > first_token);

    let mut late = first.data.unwrap();
    late.items.insert("owner", "first");
    sessions
        .set_and_release_item("s1", &late, first_token, false)
        .await
        .unwrap();

    let record = stored(&sessions, "s1").await.unwrap();
    assert!(record.locked, "second holder must keep its lock");
    let items = SessionItems::decode("s1", &record.session_items).unwrap();
    assert_eq!(items.get("owner"), Some(&serde_json::Value::from("nobody")));
}

#[tokio::test]
async fn release_and_remove_with_superseded_token_are_ignored() {
    let sessions = sessions();
    save_new(&sessions, "s1", SessionItems::new()).await;

    let first = sessions.get_item_exclusive("s1").await.unwrap().lock_id.unwrap();
    sessions.release_item_exclusive("s1", first).await.unwrap();
    let second = sessions.get_item_exclusive("s1").await.unwrap().lock_id.unwrap();

    sessions.release_item_exclusive("s1", first).await.unwrap();
    assert!(stored(&sessions, "s1").await.unwrap().locked);

    sessions.remove_item("s1", first).await.unwrap();
    assert!(stored(&sessions, "s1").await.is_some());

    sessions.remove_item("s1", second).await.unwrap();
    assert!(stored(&sessions, "s1").await.is_none());
}

#[tokio::test]
async fn expired_session_is_deleted_by_the_first_fetch() {
    let sessions = sessions();
    let an_hour_ago = OffsetDateTime::now_utc() - Duration::hours(1);
    sessions
        .store()
        .insert(&SessionRecord::new(
            "s1",
            APP,
            "",
            20,
            SessionStateActions::NONE,
            an_hour_ago,
        ))
        .await
        .unwrap();

    let fetched = sessions.get_item("s1").await.unwrap();
    assert!(fetched.data.is_none());
    assert!(!fetched.locked);
    assert!(stored(&sessions, "s1").await.is_none());
}

#[tokio::test]
async fn expired_lock_is_never_reported_as_held() {
    let sessions = sessions();
    let an_hour_ago = OffsetDateTime::now_utc() - Duration::hours(1);
    let mut record = SessionRecord::new("s1", APP, "", 20, SessionStateActions::NONE, an_hour_ago);
    record.locked = true;
    sessions.store().insert(&record).await.unwrap();

    let fetched = sessions.get_item_exclusive("s1").await.unwrap();
    assert!(!fetched.locked);
    assert!(fetched.data.is_none());
    assert!(fetched.lock_id.is_none());
    assert!(sessions.store().is_empty().await);
}

#[tokio::test]
async fn touch_twice_matches_touch_once() {
    let sessions = sessions();
    save_new(&sessions, "s1", SessionItems::new()).await;

    sessions.reset_item_timeout("s1").await.unwrap();
    let once = stored(&sessions, "s1").await.unwrap();
    sessions.reset_item_timeout("s1").await.unwrap();
    let twice = stored(&sessions, "s1").await.unwrap();

    let window = twice.expires - OffsetDateTime::now_utc();
    assert!(window <= Duration::minutes(20));
    assert!(window > Duration::minutes(19));
    assert!(twice.expires >= once.expires);
    assert_eq!(twice.lock_id, once.lock_id);
    assert_eq!(twice.locked, once.locked);
    assert_eq!(twice.session_items, once.session_items);
}

#[tokio::test]
async fn saved_payload_round_trips_unlocked() {
    let sessions = sessions();
    let mut items = SessionItems::new();
    items.insert("user_id", 42);
    items.insert("roles", serde_json::json!(["admin", "billing"]));
    save_new(&sessions, "s1", items.clone()).await;

    let fetched = sessions.get_item("s1").await.unwrap();
    assert!(!fetched.locked);
    assert_eq!(fetched.actions, SessionStateActions::NONE);
    let data = fetched.data.unwrap();
    assert_eq!(data.items, items);
    assert_eq!(data.timeout, 20);
}

#[tokio::test]
async fn placeholder_initializes_once() {
    let sessions = sessions();
    sessions.create_uninitialized("s1", 15).await.unwrap();

    let first = sessions.get_item_exclusive("s1").await.unwrap();
    assert_eq!(first.actions, SessionStateActions::INITIALIZE_ITEM);
    let data = first.data.unwrap();
    assert!(data.items.is_empty());
    assert_eq!(data.timeout, 15);
    assert_eq!(
        stored(&sessions, "s1").await.unwrap().flags,
        SessionStateActions::NONE
    );

    sessions
        .release_item_exclusive("s1", first.lock_id.unwrap())
        .await
        .unwrap();

    let second = sessions.get_item_exclusive("s1").await.unwrap();
    assert_eq!(second.actions, SessionStateActions::NONE);
    assert!(second.data.unwrap().items.is_empty());
}

#[tokio::test]
async fn create_replaces_expired_leftover_but_not_live_session() {
    let sessions = sessions();
    let an_hour_ago = OffsetDateTime::now_utc() - Duration::hours(1);
    sessions
        .store()
        .insert(&SessionRecord::new(
            "s1",
            APP,
            "",
            20,
            SessionStateActions::NONE,
            an_hour_ago,
        ))
        .await
        .unwrap();

    sessions.create_uninitialized("s1", 20).await.unwrap();
    assert!(stored(&sessions, "s1").await.unwrap().expires > OffsetDateTime::now_utc());

    let err = sessions.create_uninitialized("s1", 20).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateSession(id) if id == "s1"));
}

#[tokio::test]
async fn applications_do_not_see_each_other() {
    let store = MemoryStore::new();
    let shop = SessionStateStore::new(
        store.clone(),
        SessionStateConfig::default().with_application_name("/shop"),
    );
    let blog = SessionStateStore::new(
        store.clone(),
        SessionStateConfig::default().with_application_name("/blog"),
    );

    let data = shop.create_new_data(20);
    shop.set_and_release_item("s1", &data, 0, true).await.unwrap();

    assert!(blog.get_item("s1").await.unwrap().data.is_none());
    blog.set_and_release_item("s1", &data, 0, true).await.unwrap();
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn corrupt_payload_is_surfaced_and_left_in_place() {
    let sessions = sessions();
    let mut record = SessionRecord::new(
        "s1",
        APP,
        "%%% not base64 %%%",
        20,
        SessionStateActions::NONE,
        OffsetDateTime::now_utc(),
    );
    record.lock_id = 4;
    sessions.store().insert(&record).await.unwrap();

    let err = sessions.get_item("s1").await.unwrap_err();
    assert!(matches!(err, Error::Decode { id, .. } if id == "s1"));

    let after = stored(&sessions, "s1").await.unwrap();
    assert_eq!(after.lock_id, 4);
    assert_eq!(after.session_items, "%%% not base64 %%%");
}

#[tokio::test]
async fn corrupt_payload_under_exclusive_fetch_keeps_token() {
    let sessions = sessions();
    let mut record = SessionRecord::new(
        "s1",
        APP,
        "%%% not base64 %%%",
        20,
        SessionStateActions::NONE,
        OffsetDateTime::now_utc(),
    );
    record.lock_id = 4;
    sessions.store().insert(&record).await.unwrap();

    let err = sessions.get_item_exclusive("s1").await.unwrap_err();
    assert!(matches!(err, Error::Decode { id, .. } if id == "s1"));

    let after = stored(&sessions, "s1").await.unwrap();
    assert_eq!(after.lock_id, 4);
    assert_eq!(after.session_items, "%%% not base64 %%%");
    assert!(after.locked, "the lock stays held until the lease runs out");

    let contender = sessions.get_item_exclusive("s1").await.unwrap();
    assert!(contender.locked);
    assert_eq!(contender.lock_id, Some(4));
}
