//! Session record and in-memory store tests

use std::time::Duration;
use tandem::store::{Member, MemoryStore, RecordUpdate, SessionRecord, StateStore, StoreError};
use tandem::Side;

fn member(identity: &str, side: Side) -> Member {
    Member {
        identity: identity.to_string(),
        side,
    }
}

fn record(id: &str) -> SessionRecord {
    SessionRecord::new(id, "start", "5|3")
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let store = MemoryStore::new();
    let result = store.get("nope").await;
    assert!(matches!(result, Err(StoreError::NotFound(id)) if id == "nope"));
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = MemoryStore::new();
    let result = store
        .update("nope", RecordUpdate::new().position("x"))
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_set_then_get() {
    let store = MemoryStore::new();
    store.set("s1", &record("s1"), None).await.unwrap();

    let fetched = store.get("s1").await.unwrap();
    assert_eq!(fetched, record("s1"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_update_merges_only_named_fields() {
    let store = MemoryStore::new();
    store.set("s1", &record("s1"), None).await.unwrap();

    let updated = store
        .update("s1", RecordUpdate::new().clock(Side::Black, 42))
        .await
        .unwrap();
    assert_eq!(updated.black_time_ms, 42);
    assert_eq!(updated.white_time_ms, 0);
    assert_eq!(updated.position, "start");

    let fetched = store.get("s1").await.unwrap();
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_record_expires() {
    let store = MemoryStore::new();
    store
        .set("s1", &record("s1"), Some(Duration::from_millis(20)))
        .await
        .unwrap();
    assert!(store.get("s1").await.is_ok());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(matches!(store.get("s1").await, Err(StoreError::NotFound(_))));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_update_keeps_expiry() {
    let store = MemoryStore::new();
    store
        .set("s1", &record("s1"), Some(Duration::from_millis(50)))
        .await
        .unwrap();
    store
        .update("s1", RecordUpdate::new().position("next"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        matches!(store.get("s1").await, Err(StoreError::NotFound(_))),
        "update must not make a record immortal"
    );
}

#[test]
fn test_members_capped_at_two() {
    let mut rec = record("s1");
    rec.apply(RecordUpdate::new().members(vec![
        member("a", Side::White),
        member("b", Side::Black),
    ]))
    .unwrap();

    let result = rec.apply(RecordUpdate::new().members(vec![
        member("a", Side::White),
        member("b", Side::Black),
        member("c", Side::White),
    ]));
    assert!(matches!(result, Err(StoreError::Invariant(_))));
    assert_eq!(rec.members.len(), 2);
}

#[test]
fn test_side_and_identity_unique() {
    let mut rec = record("s1");
    let same_side = rec.apply(RecordUpdate::new().members(vec![
        member("a", Side::White),
        member("b", Side::White),
    ]));
    assert!(matches!(same_side, Err(StoreError::Invariant(_))));

    let same_identity = rec.apply(RecordUpdate::new().members(vec![
        member("a", Side::White),
        member("a", Side::Black),
    ]));
    assert!(matches!(same_identity, Err(StoreError::Invariant(_))));
    assert!(rec.members.is_empty());
}

#[test]
fn test_members_cannot_be_removed() {
    let mut rec = record("s1");
    rec.apply(RecordUpdate::new().members(vec![member("a", Side::White)]))
        .unwrap();
    let result = rec.apply(RecordUpdate::new().members(vec![member("b", Side::Black)]));
    assert!(matches!(result, Err(StoreError::Invariant(_))));
}

#[test]
fn test_ended_is_final() {
    let mut rec = record("s1");
    rec.apply(RecordUpdate::new().ended(true)).unwrap();
    assert!(rec.ended);

    // Clearing the flag is ignored
    rec.apply(RecordUpdate::new().ended(false)).unwrap();
    assert!(rec.ended);

    let result = rec.apply(RecordUpdate::new().position("after"));
    assert!(matches!(result, Err(StoreError::SessionEnded(_))));
    let result = rec.apply(RecordUpdate::new().clocks(1, 1));
    assert!(matches!(result, Err(StoreError::SessionEnded(_))));
    assert_eq!(rec.position, "start");
}

#[test]
fn test_last_move_at_never_goes_back() {
    let mut rec = record("s1");
    rec.apply(RecordUpdate::new().last_move_at(1_000)).unwrap();
    rec.apply(RecordUpdate::new().last_move_at(500)).unwrap();
    assert_eq!(rec.last_move_at_ms, Some(1_000));
    rec.apply(RecordUpdate::new().last_move_at(2_000)).unwrap();
    assert_eq!(rec.last_move_at_ms, Some(2_000));
}

#[test]
fn test_record_json_shape() {
    let mut rec = record("s1");
    rec.members.push(member("guest-1", Side::Black));
    let value = serde_json::to_value(&rec).unwrap();

    assert_eq!(value["sessionId"], "s1");
    assert_eq!(value["members"][0]["side"], "b");
    assert_eq!(value["whiteTimeMs"], 0);
    assert!(value["lastMoveAtMs"].is_null());
    assert_eq!(value["ended"], false);

    let back: SessionRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, rec);
    assert_eq!(back.side_of("guest-1"), Some(Side::Black));
    assert_eq!(back.identity_of(Side::White), None);
}
